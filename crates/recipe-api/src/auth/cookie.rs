//! Refresh Token 쿠키 처리.
//!
//! 쿠키는 `HttpOnly; Secure; SameSite=None` 속성으로 발급되며,
//! 로그아웃 시 같은 속성에 `Max-Age=0`을 붙여 삭제합니다.

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{
        header::{InvalidHeaderValue, COOKIE},
        request::Parts,
        HeaderMap, HeaderValue,
    },
};
use chrono::Duration;

/// Refresh Token 쿠키 설정.
#[derive(Debug, Clone)]
pub struct SessionCookie {
    name: Arc<str>,
    max_age: Duration,
}

impl SessionCookie {
    pub fn new(name: impl Into<Arc<str>>, max_age: Duration) -> Self {
        Self {
            name: name.into(),
            max_age,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 요청 헤더에서 쿠키 값 추출.
    ///
    /// 여러 `Cookie` 헤더를 모두 확인하며, 빈 값은 없는 것으로 취급합니다.
    pub fn read(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|cookies| cookies.split(';'))
            .find_map(|cookie| {
                let (name, value) = cookie.trim().split_once('=')?;
                (name.trim() == &*self.name).then(|| value.trim().to_string())
            })
            .filter(|value| !value.is_empty())
    }

    /// Refresh Token을 담은 `Set-Cookie` 값.
    pub fn issue(&self, token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        HeaderValue::from_str(&format!(
            "{}={}; HttpOnly; Secure; SameSite=None; Max-Age={}; Path=/",
            self.name,
            token,
            self.max_age.num_seconds()
        ))
    }

    /// 쿠키 삭제용 `Set-Cookie` 값.
    pub fn clear(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        HeaderValue::from_str(&format!(
            "{}=; HttpOnly; Secure; SameSite=None; Max-Age=0; Path=/",
            self.name
        ))
    }
}

/// 요청에 실린 Refresh Token 쿠키 추출기 (없으면 `None`).
#[derive(Debug, Clone)]
pub struct RefreshCookie(pub Option<String>);

impl<S> FromRequestParts<S> for RefreshCookie
where
    S: Send + Sync,
    SessionCookie: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let cookie = SessionCookie::from_ref(state);
        Ok(RefreshCookie(cookie.read(&parts.headers)))
    }
}
