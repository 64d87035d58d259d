//! 세션 순환 프로토콜 (로그인 / 갱신 / 로그아웃).
//!
//! 사용자당 저장된 Refresh Token은 최대 하나입니다.
//! 재로그인은 기존 토큰을 덮어쓰며, 저장된 값과 다른 Refresh Token은
//! 서명과 만료가 유효하더라도 거부됩니다.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::jwt::{TokenError, TokenKeys};
use super::password::{CredentialHasher, PasswordError};
use super::Role;
use crate::metrics::{record_auth_login, record_auth_logout, record_auth_refresh};
use crate::repository::{StoreError, UserStore};

/// 인증 흐름 에러.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Username and password are required.")]
    MissingCredentials,
    #[error("User not found.")]
    UserNotFound,
    #[error("Username or password doesn't match.")]
    InvalidCredential,
    #[error("Refresh token cookie is missing.")]
    MissingSession,
    #[error("Refresh token is not valid.")]
    InvalidSession,
    #[error("Username is already taken.")]
    UsernameTaken,
    #[error("Email is already registered.")]
    EmailTaken,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Password(#[from] PasswordError),
}

/// 로그인 결과.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub access_token: String,
    pub refresh_token: String,
    pub roles: Vec<Role>,
}

/// 갱신 결과.
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub access_token: String,
    pub roles: Vec<Role>,
}

/// 세션 서비스.
#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn UserStore>,
    keys: TokenKeys,
    hasher: CredentialHasher,
}

impl SessionService {
    pub fn new(store: Arc<dyn UserStore>, keys: TokenKeys, hasher: CredentialHasher) -> Self {
        Self {
            store,
            keys,
            hasher,
        }
    }

    /// 로그인.
    ///
    /// 성공 시 Access Token과 Refresh Token을 발급하고 Refresh Token을 레코드에 저장합니다.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let result = self.try_login(username, password).await;
        record_auth_login(match &result {
            Ok(_) => "success",
            Err(AuthError::UserNotFound) => "unknown_user",
            Err(AuthError::InvalidCredential) => "bad_password",
            Err(_) => "error",
        });
        result
    }

    async fn try_login(&self, username: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let Some(user) = self.store.find_by_username(username).await? else {
            debug!(username = %username, "Login rejected: unknown user");
            return Err(AuthError::UserNotFound);
        };

        let matched = self
            .hasher
            .verify_async(password.to_string(), user.password_hash.clone())
            .await?;
        if !matched {
            debug!(username = %username, "Login rejected: password mismatch");
            return Err(AuthError::InvalidCredential);
        }

        let info = user.user_info();
        let roles = info.roles.clone();
        let access_token = self.keys.issue_access_token(info)?;
        let refresh_token = self.keys.issue_refresh_token(&user.username)?;

        if !self.store.set_refresh_token(user.id, &refresh_token).await? {
            // 조회와 저장 사이에 삭제된 계정
            return Err(AuthError::UserNotFound);
        }

        info!(username = %user.username, "User logged in");
        Ok(LoginOutcome {
            access_token,
            refresh_token,
            roles,
        })
    }

    /// Access Token 갱신.
    ///
    /// 저장된 값으로 먼저 조회한 뒤 서명/만료와 사용자 이름을 확인합니다.
    /// Refresh Token 자체는 교체하지 않습니다.
    pub async fn refresh(&self, cookie: Option<&str>) -> Result<RefreshOutcome, AuthError> {
        let result = self.try_refresh(cookie).await;
        record_auth_refresh(match &result {
            Ok(_) => "success",
            Err(AuthError::MissingSession) => "missing",
            Err(AuthError::InvalidSession) => "rejected",
            Err(_) => "error",
        });
        result
    }

    async fn try_refresh(&self, cookie: Option<&str>) -> Result<RefreshOutcome, AuthError> {
        let token = cookie
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingSession)?;

        let Some(user) = self.store.find_by_refresh_token(token).await? else {
            debug!("Refresh rejected: no matching session");
            return Err(AuthError::InvalidSession);
        };

        let claims = self.keys.verify_refresh(token).map_err(|e| {
            debug!(username = %user.username, error = %e, "Refresh rejected: token invalid");
            AuthError::InvalidSession
        })?;
        if claims.username != user.username {
            warn!(username = %user.username, "Refresh rejected: username mismatch");
            return Err(AuthError::InvalidSession);
        }

        let info = user.user_info();
        let roles = info.roles.clone();
        let access_token = self.keys.issue_access_token(info)?;

        debug!(username = %user.username, "Access token refreshed");
        Ok(RefreshOutcome {
            access_token,
            roles,
        })
    }

    /// 로그아웃.
    ///
    /// 해당 토큰을 가진 레코드가 있으면 비웁니다. 결과는 호출자에게 노출되지 않으며
    /// 저장소 오류도 로그만 남깁니다.
    pub async fn logout(&self, cookie: Option<&str>) {
        let Some(token) = cookie.filter(|t| !t.is_empty()) else {
            return;
        };

        match self.store.clear_refresh_token(token).await {
            Ok(true) => {
                record_auth_logout();
                info!("User logged out");
            }
            Ok(false) => debug!("Logout with unknown session"),
            Err(e) => warn!(error = %e, "Failed to clear refresh token on logout"),
        }
    }
}
