//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! AppState는 `Arc`로 래핑되어 여러 요청 간에 공유됩니다.
//! 저장소 외에는 변경 가능한 공유 상태가 없습니다.

use std::sync::Arc;

use axum::extract::FromRef;
use chrono::{DateTime, Utc};

use crate::auth::{
    CredentialHasher, PasswordError, RegistrationService, SessionCookie, SessionService, TokenKeys,
};
use crate::config::AuthConfig;
use crate::repository::UserStore;

/// 애플리케이션 공유 상태.
#[derive(Clone)]
pub struct AppState {
    /// 사용자 저장소 (PostgreSQL 또는 인메모리)
    pub users: Arc<dyn UserStore>,

    /// 토큰 발급/검증기
    pub keys: TokenKeys,

    /// 비밀번호 해셔
    pub hasher: CredentialHasher,

    /// Refresh Token 쿠키 설정
    pub cookie: SessionCookie,

    /// 로그인 / 갱신 / 로그아웃
    pub sessions: SessionService,

    /// 회원 가입
    pub registration: RegistrationService,

    /// API 버전
    pub version: String,

    /// 서버 시작 시간
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// 저장소와 구성 요소로 상태 생성.
    pub fn new(
        users: Arc<dyn UserStore>,
        keys: TokenKeys,
        hasher: CredentialHasher,
        cookie: SessionCookie,
    ) -> Self {
        let sessions = SessionService::new(users.clone(), keys.clone(), hasher.clone());
        let registration = RegistrationService::new(users.clone(), hasher.clone());

        Self {
            users,
            keys,
            hasher,
            cookie,
            sessions,
            registration,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Utc::now(),
        }
    }

    /// 인증 설정에서 상태 생성.
    pub fn from_config(users: Arc<dyn UserStore>, auth: &AuthConfig) -> Result<Self, PasswordError> {
        let keys = TokenKeys::from_config(auth);
        let hasher = CredentialHasher::new(
            auth.argon2_memory_kib,
            auth.argon2_iterations,
            auth.argon2_parallelism,
        )?;
        let cookie = SessionCookie::new(auth.cookie_name.as_str(), keys.refresh_ttl());

        Ok(Self::new(users, keys, hasher, cookie))
    }

    /// 서버 업타임(초).
    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }

    /// 저장소 연결 상태.
    pub async fn is_store_healthy(&self) -> bool {
        self.users.ping().await.is_ok()
    }
}

impl FromRef<Arc<AppState>> for TokenKeys {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.keys.clone()
    }
}

impl FromRef<Arc<AppState>> for SessionCookie {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.cookie.clone()
    }
}

/// 테스트용 AppState 생성.
///
/// 인메모리 저장소, 고정 비밀 키, 낮은 비용의 Argon2 파라미터를 사용합니다.
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_state() -> AppState {
    use crate::repository::MemoryUserStore;
    use chrono::Duration;

    let keys = TokenKeys::new(
        b"test-access-token-secret-0123456789abcdef",
        b"test-refresh-token-secret-0123456789abcdef",
        Duration::hours(1),
        Duration::days(1),
    );
    let hasher = CredentialHasher::new(1024, 1, 1).expect("valid test argon2 params");
    let cookie = SessionCookie::new("jwt", keys.refresh_ttl());

    AppState::new(Arc::new(MemoryUserStore::new()), keys, hasher, cookie)
}
