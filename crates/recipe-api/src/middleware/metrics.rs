//! HTTP 요청 metrics middleware.
//!
//! `path` 라벨은 요청 URI가 아니라 매칭된 라우트 템플릿(`/users/{id}`)입니다.
//! 어떤 라우트에도 매칭되지 않은 요청은 모두 `unmatched` 하나로 묶입니다.

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::metrics::{record_http_duration, record_http_request, record_http_response};

/// 매칭되지 않은 요청의 `path` 라벨.
pub const UNMATCHED_PATH: &str = "unmatched";

/// 요청의 `path` 라벨.
pub fn path_label(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_PATH.to_string())
}

/// HTTP 메트릭을 수집하는 미들웨어 레이어.
///
/// `Router::layer`로 적용해야 `MatchedPath`를 볼 수 있습니다.
/// - `http_requests_total`: 총 요청 수 (method, path 라벨)
/// - `http_responses_total`: 총 응답 수 (method, path, status 라벨)
/// - `http_request_duration_seconds`: 요청 처리 시간 히스토그램
pub async fn metrics_layer(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = path_label(&request);

    record_http_request(&method, &path);
    let response = next.run(request).await;

    record_http_response(&method, &path, response.status().as_u16());
    record_http_duration(&method, &path, start.elapsed().as_secs_f64());

    response
}
