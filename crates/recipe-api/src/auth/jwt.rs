//! JWT 토큰 처리.
//!
//! Access Token 및 Refresh Token 발급/검증 로직.
//!
//! 두 토큰은 서로 다른 비밀 키와 만료 시간을 사용합니다.
//! - Access Token: 사용자 프로필 + 역할 스냅샷, 기본 1시간
//! - Refresh Token: 사용자 이름만, 기본 1일

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::Role;
use crate::config::AuthConfig;

/// Access Token에 담기는 사용자 정보.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserInfo {
    /// 사용자 이름
    pub username: String,
    /// 이름
    pub firstname: String,
    /// 성
    pub lastname: String,
    /// 이메일
    pub email: String,
    /// 발급 시점의 역할 ID 목록
    #[schema(value_type = Vec<i32>, example = json!([80085]))]
    pub roles: Vec<Role>,
}

/// JWT Access Token 페이로드.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// 사용자 정보
    #[serde(rename = "UserInfo")]
    pub user_info: UserInfo,
    /// Issued At - 토큰 발급 시간 (Unix timestamp)
    pub iat: i64,
    /// Expiration - 토큰 만료 시간 (Unix timestamp)
    pub exp: i64,
}

impl AccessClaims {
    /// 지정 시각 기준 Claims 생성.
    pub fn issued_at(user_info: UserInfo, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            user_info,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }

    pub fn username(&self) -> &str {
        &self.user_info.username
    }

    pub fn roles(&self) -> &[Role] {
        &self.user_info.roles
    }
}

/// Refresh Token 페이로드.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// 사용자 이름
    pub username: String,
    /// Issued At
    pub iat: i64,
    /// Expiration
    pub exp: i64,
    /// JWT ID - 같은 초에 발급된 토큰도 서로 다른 문자열이 되도록 함
    pub jti: String,
}

impl RefreshClaims {
    /// 지정 시각 기준 Refresh Claims 생성.
    pub fn issued_at(username: impl Into<String>, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            username: username.into(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// JWT 토큰 에러.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("토큰 인코딩 실패: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),
    #[error("토큰이 만료되었습니다")]
    Expired,
    #[error("토큰 서명이 유효하지 않습니다")]
    InvalidSignature,
    #[error("잘못된 토큰 형식")]
    Malformed,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            _ => TokenError::Malformed,
        }
    }
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

struct KeysInner {
    access: KeyPair,
    refresh: KeyPair,
    access_ttl: Duration,
    refresh_ttl: Duration,
    validation: Validation,
}

/// 토큰 발급기 겸 검증기.
///
/// 비밀 키는 생성 시점에 주입되며, 복제 비용이 낮도록 내부를 `Arc`로 공유합니다.
#[derive(Clone)]
pub struct TokenKeys {
    inner: Arc<KeysInner>,
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenKeys")
            .field("access_ttl", &self.inner.access_ttl)
            .field("refresh_ttl", &self.inner.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenKeys {
    /// 비밀 키와 만료 시간으로 생성.
    pub fn new(
        access_secret: &[u8],
        refresh_secret: &[u8],
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            inner: Arc::new(KeysInner {
                access: KeyPair::from_secret(access_secret),
                refresh: KeyPair::from_secret(refresh_secret),
                access_ttl,
                refresh_ttl,
                validation,
            }),
        }
    }

    /// 인증 설정에서 생성.
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.access_token_secret.expose_secret().as_bytes(),
            config.refresh_token_secret.expose_secret().as_bytes(),
            Duration::minutes(config.access_token_ttl_minutes),
            Duration::hours(config.refresh_token_ttl_hours),
        )
    }

    pub fn access_ttl(&self) -> Duration {
        self.inner.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.inner.refresh_ttl
    }

    /// Access Token 발급 (현재 시각 기준).
    pub fn issue_access_token(&self, user_info: UserInfo) -> Result<String, TokenError> {
        let claims = AccessClaims::issued_at(user_info, Utc::now(), self.inner.access_ttl);
        self.encode_access(&claims)
    }

    /// Access Claims 서명.
    pub fn encode_access(&self, claims: &AccessClaims) -> Result<String, TokenError> {
        encode(&Header::default(), claims, &self.inner.access.encoding)
            .map_err(TokenError::Encoding)
    }

    /// Refresh Token 발급 (현재 시각 기준).
    pub fn issue_refresh_token(&self, username: &str) -> Result<String, TokenError> {
        let claims = RefreshClaims::issued_at(username, Utc::now(), self.inner.refresh_ttl);
        self.encode_refresh(&claims)
    }

    /// Refresh Claims 서명.
    pub fn encode_refresh(&self, claims: &RefreshClaims) -> Result<String, TokenError> {
        encode(&Header::default(), claims, &self.inner.refresh.encoding)
            .map_err(TokenError::Encoding)
    }

    /// Access Token 검증 및 디코딩.
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        decode::<AccessClaims>(token, &self.inner.access.decoding, &self.inner.validation)
            .map(|data| data.claims)
            .map_err(TokenError::from)
    }

    /// Refresh Token 검증 및 디코딩.
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        decode::<RefreshClaims>(token, &self.inner.refresh.decoding, &self.inner.validation)
            .map(|data| data.claims)
            .map_err(TokenError::from)
    }
}
