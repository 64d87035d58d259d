//! 회원 가입.

use std::sync::Arc;

use tracing::info;

use super::password::{CredentialHasher, REDACTED};
use super::session::AuthError;
use super::RoleSet;
use crate::metrics::record_auth_registration;
use crate::repository::{NewUser, StoreError, UserRecord, UserStore};

/// 검증을 통과한 가입 요청.
#[derive(Clone)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("username", &self.username)
            .field("password", &REDACTED)
            .field("firstname", &self.firstname)
            .field("lastname", &self.lastname)
            .field("email", &self.email)
            .finish()
    }
}

/// 가입 서비스.
#[derive(Clone)]
pub struct RegistrationService {
    store: Arc<dyn UserStore>,
    hasher: CredentialHasher,
}

impl RegistrationService {
    pub fn new(store: Arc<dyn UserStore>, hasher: CredentialHasher) -> Self {
        Self { store, hasher }
    }

    /// 신규 사용자 생성.
    ///
    /// 사용자 이름과 이메일 중복을 각각 확인하고 기본 역할 `{User}`로 저장합니다.
    /// 동시 가입으로 인한 중복은 저장소의 유일성 제약에서 다시 걸러집니다.
    pub async fn register(&self, form: Registration) -> Result<UserRecord, AuthError> {
        let result = self.try_register(form).await;
        record_auth_registration(match &result {
            Ok(_) => "success",
            Err(AuthError::UsernameTaken | AuthError::EmailTaken) => "conflict",
            Err(_) => "error",
        });
        result
    }

    async fn try_register(&self, form: Registration) -> Result<UserRecord, AuthError> {
        if self.store.find_by_username(&form.username).await?.is_some() {
            return Err(AuthError::UsernameTaken);
        }
        if self.store.find_by_email(&form.email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = self.hasher.hash_async(form.password).await?;

        let user = self
            .store
            .create(NewUser {
                username: form.username,
                email: form.email,
                firstname: form.firstname,
                lastname: form.lastname,
                password_hash,
                roles: RoleSet::new_user(),
            })
            .await
            .map_err(|e| match e {
                StoreError::Duplicate("email") => AuthError::EmailTaken,
                StoreError::Duplicate(_) => AuthError::UsernameTaken,
                other => AuthError::Store(other),
            })?;

        info!(username = %user.username, "New user registered");
        Ok(user)
    }
}
