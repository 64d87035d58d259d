//! Axum용 JWT 인증 미들웨어.
//!
//! Bearer 토큰 추출기와 역할 게이트.
//!
//! - Authorization 헤더가 없거나 Bearer 형식이 아니면 401
//! - 토큰 검증 실패(만료, 서명 불일치, 디코딩 실패)는 403
//! - 역할 교집합이 비어 있으면 403

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use super::jwt::{AccessClaims, TokenError, TokenKeys};
use super::{any_role_allowed, Role};
use crate::error::ApiErrorResponse;

/// JWT 인증 추출기.
///
/// 검증된 Access Token의 Claims를 핸들러에 전달합니다.
///
/// # 사용 예시
///
/// ```rust,ignore
/// async fn protected_handler(
///     JwtAuth(claims): JwtAuth,
/// ) -> impl IntoResponse {
///     format!("Authenticated user: {}", claims.username())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct JwtAuth(pub AccessClaims);

/// JWT 인증 에러.
#[derive(Debug, thiserror::Error)]
pub enum JwtAuthError {
    #[error("Authorization header is required.")]
    MissingToken,
    #[error("Authorization header must use the Bearer scheme.")]
    InvalidAuthHeader,
    #[error("Access token has expired.")]
    TokenExpired,
    #[error("Access token is not valid.")]
    InvalidToken,
    #[error("Insufficient permission.")]
    InsufficientPermission,
}

impl JwtAuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            JwtAuthError::MissingToken | JwtAuthError::InvalidAuthHeader => {
                StatusCode::UNAUTHORIZED
            }
            JwtAuthError::TokenExpired
            | JwtAuthError::InvalidToken
            | JwtAuthError::InsufficientPermission => StatusCode::FORBIDDEN,
        }
    }
}

impl From<TokenError> for JwtAuthError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Expired => JwtAuthError::TokenExpired,
            _ => JwtAuthError::InvalidToken,
        }
    }
}

impl IntoResponse for JwtAuthError {
    fn into_response(self) -> Response {
        let code = match &self {
            JwtAuthError::MissingToken => "MISSING_TOKEN",
            JwtAuthError::InvalidAuthHeader => "INVALID_AUTH_HEADER",
            JwtAuthError::TokenExpired => "TOKEN_EXPIRED",
            JwtAuthError::InvalidToken => "INVALID_TOKEN",
            JwtAuthError::InsufficientPermission => "INSUFFICIENT_PERMISSION",
        };

        (self.status(), Json(ApiErrorResponse::new(code, self.to_string()))).into_response()
    }
}

/// Authorization 헤더에서 Bearer 토큰 추출.
fn bearer_token(parts: &Parts) -> Result<&str, JwtAuthError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or(JwtAuthError::MissingToken)?
        .to_str()
        .map_err(|_| JwtAuthError::InvalidAuthHeader)?;

    header
        .strip_prefix("Bearer ")
        .ok_or(JwtAuthError::InvalidAuthHeader)
}

impl<S> FromRequestParts<S> for JwtAuth
where
    S: Send + Sync,
    TokenKeys: FromRef<S>,
{
    type Rejection = JwtAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // 역할 게이트가 이미 검증한 경우
        if let Some(claims) = parts.extensions.get::<AccessClaims>() {
            return Ok(JwtAuth(claims.clone()));
        }

        let token = bearer_token(parts)?;
        let keys = TokenKeys::from_ref(state);
        let claims = keys.verify_access(token).map_err(|e| {
            tracing::debug!(error = %e, "Access token rejected");
            JwtAuthError::from(e)
        })?;

        parts.extensions.insert(claims.clone());
        Ok(JwtAuth(claims))
    }
}

/// 허용 역할 중 하나 이상을 요구.
pub fn require_roles(allowed: &[Role], claims: &AccessClaims) -> Result<(), JwtAuthError> {
    if any_role_allowed(claims.roles(), allowed) {
        Ok(())
    } else {
        Err(JwtAuthError::InsufficientPermission)
    }
}

/// 라우터 단위 역할 게이트 상태.
///
/// ```rust,ignore
/// Router::new()
///     .route("/handle", get(list_users))
///     .route_layer(middleware::from_fn_with_state(
///         RoleGate::new(keys, [Role::Admin]),
///         role_gate,
///     ))
/// ```
#[derive(Debug, Clone)]
pub struct RoleGate {
    keys: TokenKeys,
    allowed: Arc<[Role]>,
}

impl RoleGate {
    pub fn new(keys: TokenKeys, allowed: impl IntoIterator<Item = Role>) -> Self {
        Self {
            keys,
            allowed: allowed.into_iter().collect(),
        }
    }

    pub fn allowed(&self) -> &[Role] {
        &self.allowed
    }
}

impl FromRef<RoleGate> for TokenKeys {
    fn from_ref(gate: &RoleGate) -> Self {
        gate.keys.clone()
    }
}

/// 역할 게이트 미들웨어.
pub async fn role_gate(
    State(gate): State<RoleGate>,
    JwtAuth(claims): JwtAuth,
    req: Request,
    next: Next,
) -> Result<Response, JwtAuthError> {
    if let Err(e) = require_roles(gate.allowed(), &claims) {
        tracing::info!(
            username = %claims.username(),
            roles = ?claims.roles(),
            "Role gate denied request"
        );
        return Err(e);
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request as HttpRequest, middleware, routing::get, Router};
    use chrono::{Duration, Utc};
    use tower::ServiceExt;

    use super::super::jwt::UserInfo;

    fn keys() -> TokenKeys {
        TokenKeys::new(
            b"middleware-test-access-secret-0123456789",
            b"middleware-test-refresh-secret-0123456789",
            Duration::hours(1),
            Duration::days(1),
        )
    }

    fn claims(roles: Vec<Role>) -> AccessClaims {
        AccessClaims::issued_at(
            UserInfo {
                username: "alice".to_string(),
                firstname: "Alice".to_string(),
                lastname: "Liddell".to_string(),
                email: "alice@example.com".to_string(),
                roles,
            },
            Utc::now(),
            Duration::hours(1),
        )
    }

    async fn whoami(JwtAuth(claims): JwtAuth) -> String {
        claims.username().to_string()
    }

    fn app() -> Router {
        let keys = keys();
        let admin = Router::new()
            .route("/admin", get(whoami))
            .route_layer(middleware::from_fn_with_state(
                RoleGate::new(keys.clone(), [Role::Admin]),
                role_gate,
            ));

        Router::new()
            .route("/me", get(whoami))
            .merge(admin)
            .with_state(keys)
    }

    async fn call(uri: &str, auth: Option<String>) -> StatusCode {
        let mut builder = HttpRequest::builder().uri(uri);
        if let Some(value) = auth {
            builder = builder.header(AUTHORIZATION, value);
        }
        app()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    fn bearer(roles: Vec<Role>) -> Option<String> {
        let token = keys().encode_access(&claims(roles)).unwrap();
        Some(format!("Bearer {}", token))
    }

    #[test]
    fn test_require_roles() {
        let user = claims(vec![Role::User]);
        let admin = claims(vec![Role::User, Role::Admin]);

        assert!(require_roles(&[Role::Admin], &user).is_err());
        assert!(require_roles(&[Role::Admin], &admin).is_ok());
        assert!(require_roles(&[Role::User, Role::Admin], &user).is_ok());
    }

    #[test]
    fn test_jwt_auth_error_statuses() {
        assert_eq!(JwtAuthError::MissingToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(JwtAuthError::InvalidAuthHeader.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(JwtAuthError::TokenExpired.status(), StatusCode::FORBIDDEN);
        assert_eq!(JwtAuthError::InvalidToken.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            JwtAuthError::InsufficientPermission.status(),
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn test_missing_or_non_bearer_header_is_401() {
        assert_eq!(call("/me", None).await, StatusCode::UNAUTHORIZED);
        assert_eq!(
            call("/me", Some("Basic YWxpY2U6cHc=".to_string())).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_invalid_token_is_403() {
        assert_eq!(
            call("/me", Some("Bearer not-a-token".to_string())).await,
            StatusCode::FORBIDDEN
        );

        let expired = claims(vec![Role::User]);
        let expired = AccessClaims {
            iat: expired.iat - 7200,
            exp: expired.exp - 7200,
            ..expired
        };
        let token = keys().encode_access(&expired).unwrap();
        assert_eq!(
            call("/me", Some(format!("Bearer {}", token))).await,
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn test_valid_token_passes() {
        assert_eq!(call("/me", bearer(vec![Role::User])).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_role_gate() {
        assert_eq!(
            call("/admin", bearer(vec![Role::User])).await,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            call("/admin", bearer(vec![Role::User, Role::Admin])).await,
            StatusCode::OK
        );
        assert_eq!(call("/admin", None).await, StatusCode::UNAUTHORIZED);
    }
}
