//! 인증 API 라우트
//!
//! # 엔드포인트
//!
//! - `POST /login` - 로그인 (Access Token + Refresh Token 쿠키)
//! - `GET /refresh` - Refresh Token 쿠키로 Access Token 재발급
//! - `GET /logout` - 세션 해제 및 쿠키 삭제
//! - `POST /register` - 회원 가입

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::SET_COOKIE, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::{RefreshCookie, Registration, Role, REDACTED};
use crate::error::{ApiError, ApiErrorResponse, ApiResult};
use crate::state::AppState;

// ================================================================================================
// Request/Response Types
// ================================================================================================

/// 로그인 요청
#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    /// `pwd` 필드명도 허용
    #[serde(default, alias = "pwd")]
    pub password: Option<String>,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| REDACTED))
            .finish()
    }
}

/// 로그인 응답
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    /// 역할 ID 목록 (User, Admin 순)
    #[schema(value_type = Vec<i32>, example = json!([80085]))]
    pub roles: Vec<Role>,
}

/// Access Token 재발급 응답
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    #[schema(value_type = Vec<i32>, example = json!([80085]))]
    pub roles: Vec<Role>,
    pub access_token: String,
}

/// 회원 가입 요청
#[derive(Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[serde(default, alias = "pwd")]
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
    #[serde(default)]
    #[validate(must_match(other = "password", message = "passwords do not match"))]
    pub confirm: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "firstname is required"))]
    pub firstname: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "lastname is required"))]
    pub lastname: String,
    #[serde(default)]
    #[validate(email(message = "a valid email is required"))]
    pub email: String,
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("password", &REDACTED)
            .field("confirm", &REDACTED)
            .field("firstname", &self.firstname)
            .field("lastname", &self.lastname)
            .field("email", &self.email)
            .finish()
    }
}

/// 성공 응답
#[derive(Debug, Serialize, ToSchema)]
pub struct SuccessResponse {
    pub success: String,
}

// ================================================================================================
// Handlers
// ================================================================================================

/// POST /login - 로그인
#[utoipa::path(
    post,
    path = "/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "로그인 성공, Refresh Token은 `jwt` 쿠키로 전달", body = LoginResponse),
        (status = 400, description = "사용자 이름 또는 비밀번호 누락", body = ApiErrorResponse),
        (status = 401, description = "알 수 없는 사용자 또는 비밀번호 불일치", body = ApiErrorResponse)
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let username = req.username.unwrap_or_default();
    let password = req.password.unwrap_or_default();

    let outcome = state.sessions.login(&username, &password).await?;
    let cookie = state
        .cookie
        .issue(&outcome.refresh_token)
        .map_err(|e| ApiError::Internal(format!("refresh cookie: {}", e)))?;

    Ok((
        [(SET_COOKIE, cookie)],
        Json(LoginResponse {
            access_token: outcome.access_token,
            roles: outcome.roles,
        }),
    ))
}

/// GET /refresh - Access Token 재발급
#[utoipa::path(
    get,
    path = "/refresh",
    tag = "auth",
    responses(
        (status = 200, description = "재발급 성공", body = RefreshResponse),
        (status = 401, description = "Refresh Token 쿠키 없음", body = ApiErrorResponse),
        (status = 403, description = "일치하는 세션 없음 또는 토큰 무효", body = ApiErrorResponse)
    )
)]
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    RefreshCookie(cookie): RefreshCookie,
) -> ApiResult<Json<RefreshResponse>> {
    let outcome = state.sessions.refresh(cookie.as_deref()).await?;

    Ok(Json(RefreshResponse {
        roles: outcome.roles,
        access_token: outcome.access_token,
    }))
}

/// GET /logout - 로그아웃
///
/// 세션 존재 여부와 관계없이 항상 204를 반환합니다.
#[utoipa::path(
    get,
    path = "/logout",
    tag = "auth",
    responses(
        (status = 204, description = "로그아웃 완료, 쿠키 삭제")
    )
)]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    RefreshCookie(cookie): RefreshCookie,
) -> ApiResult<impl IntoResponse> {
    state.sessions.logout(cookie.as_deref()).await;

    let cleared = state
        .cookie
        .clear()
        .map_err(|e| ApiError::Internal(format!("clear cookie: {}", e)))?;

    Ok((StatusCode::NO_CONTENT, [(SET_COOKIE, cleared)]))
}

/// POST /register - 회원 가입
#[utoipa::path(
    post,
    path = "/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "가입 완료", body = SuccessResponse),
        (status = 400, description = "필수 항목 누락 또는 비밀번호 확인 불일치", body = ApiErrorResponse),
        (status = 409, description = "사용자 이름 또는 이메일 중복", body = ApiErrorResponse)
    )
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    req.validate()?;

    let user = state
        .registration
        .register(Registration {
            username: req.username,
            password: req.password,
            firstname: req.firstname,
            lastname: req.lastname,
            email: req.email,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse {
            success: format!("New user {} created!", user.username),
        }),
    ))
}

/// 인증 라우터 생성.
pub fn auth_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", post(login))
        .route("/refresh", get(refresh))
        .route("/logout", get(logout))
        .route("/register", post(register))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header::COOKIE, Request, Response},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::state::create_test_state;

    fn app(state: Arc<AppState>) -> Router {
        auth_router().with_state(state)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn cookie_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = cookie {
            builder = builder.header(COOKIE, format!("jwt={}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response<Body>) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn set_cookie(response: &Response<Body>) -> String {
        response
            .headers()
            .get(SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    /// `jwt=<token>; ...` 에서 토큰 추출
    fn cookie_token(set_cookie: &str) -> String {
        set_cookie
            .split(';')
            .next()
            .and_then(|kv| kv.strip_prefix("jwt="))
            .unwrap()
            .to_string()
    }

    fn alice() -> Value {
        json!({
            "username": "alice",
            "password": "wonderland",
            "confirm": "wonderland",
            "firstname": "Alice",
            "lastname": "Liddell",
            "email": "alice@example.com"
        })
    }

    async fn register_and_login(state: &Arc<AppState>) -> String {
        app(state.clone())
            .oneshot(json_request("POST", "/register", alice()))
            .await
            .unwrap();
        let response = app(state.clone())
            .oneshot(json_request(
                "POST",
                "/login",
                json!({"username": "alice", "password": "wonderland"}),
            ))
            .await
            .unwrap();
        cookie_token(&set_cookie(&response))
    }

    #[test]
    fn test_request_debug_hides_passwords() {
        let login: LoginRequest =
            serde_json::from_value(json!({"username": "alice", "pwd": "wonderland"})).unwrap();
        let debug = format!("{:?}", login);
        assert!(debug.contains("alice"));
        assert!(!debug.contains("wonderland"));

        let register: RegisterRequest = serde_json::from_value(alice()).unwrap();
        let debug = format!("{:?}", register);
        assert!(debug.contains("alice@example.com"));
        assert!(!debug.contains("wonderland"));
    }

    #[tokio::test]
    async fn test_full_session_scenario() {
        let state = Arc::new(create_test_state());

        // 가입
        let response = app(state.clone())
            .oneshot(json_request("POST", "/register", alice()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(response).await["success"], "New user alice created!");

        // 로그인
        let response = app(state.clone())
            .oneshot(json_request(
                "POST",
                "/login",
                json!({"username": "alice", "password": "wonderland"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = set_cookie(&response);
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=None"));
        assert!(cookie.contains("Max-Age=86400"));
        let token = cookie_token(&cookie);

        let body = body_json(response).await;
        assert_eq!(body["roles"], json!([80085]));
        let access = body["accessToken"].as_str().unwrap();
        let claims = state.keys.verify_access(access).unwrap();
        assert_eq!(claims.user_info.username, "alice");

        // 갱신
        let response = app(state.clone())
            .oneshot(cookie_request("/refresh", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["roles"], json!([80085]));
        assert!(body["accessToken"].is_string());

        // 로그아웃
        let response = app(state.clone())
            .oneshot(cookie_request("/logout", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(set_cookie(&response).contains("Max-Age=0"));

        // 이전 쿠키로 갱신
        let response = app(state.clone())
            .oneshot(cookie_request("/refresh", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_login_unknown_user_and_bad_password() {
        let state = Arc::new(create_test_state());
        register_and_login(&state).await;

        let response = app(state.clone())
            .oneshot(json_request(
                "POST",
                "/login",
                json!({"username": "bob", "password": "wonderland"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["message"], "User not found.");

        let response = app(state.clone())
            .oneshot(json_request(
                "POST",
                "/login",
                json!({"username": "alice", "pwd": "wrong"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(response).await["message"],
            "Username or password doesn't match."
        );
    }

    #[tokio::test]
    async fn test_login_accepts_pwd_alias() {
        let state = Arc::new(create_test_state());
        register_and_login(&state).await;

        let response = app(state)
            .oneshot(json_request(
                "POST",
                "/login",
                json!({"username": "alice", "pwd": "wonderland"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_login_missing_fields() {
        let state = Arc::new(create_test_state());

        let response = app(state.clone())
            .oneshot(json_request("POST", "/login", json!({"username": "alice"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/login")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_refresh_without_cookie_is_401() {
        let state = Arc::new(create_test_state());
        let response = app(state)
            .oneshot(cookie_request("/refresh", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_refresh_with_unknown_signed_token_is_403() {
        let state = Arc::new(create_test_state());
        register_and_login(&state).await;

        let forged = state.keys.issue_refresh_token("alice").unwrap();
        let response = app(state)
            .oneshot(cookie_request("/refresh", Some(&forged)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let state = Arc::new(create_test_state());
        let token = register_and_login(&state).await;

        for _ in 0..2 {
            let response = app(state.clone())
                .oneshot(cookie_request("/logout", Some(&token)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NO_CONTENT);
        }

        let response = app(state)
            .oneshot(cookie_request("/logout", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_register_validation_and_conflicts() {
        let state = Arc::new(create_test_state());

        let mut mismatch = alice();
        mismatch["confirm"] = json!("different");
        let response = app(state.clone())
            .oneshot(json_request("POST", "/register", mismatch))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let mut missing = alice();
        missing["lastname"] = json!("");
        let response = app(state.clone())
            .oneshot(json_request("POST", "/register", missing))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(state.users.find_by_username("alice").await.unwrap().is_none());

        let response = app(state.clone())
            .oneshot(json_request("POST", "/register", alice()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app(state.clone())
            .oneshot(json_request("POST", "/register", alice()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let mut same_email = alice();
        same_email["username"] = json!("alice2");
        let response = app(state)
            .oneshot(json_request("POST", "/register", same_email))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
