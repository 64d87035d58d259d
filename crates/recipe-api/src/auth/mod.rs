//! 인증 및 권한 부여.
//!
//! JWT 기반 세션 관리와 역할 기반 접근 제어(RBAC)를 제공합니다.
//!
//! # 구성 요소
//!
//! - [`TokenKeys`]: Access/Refresh Token 발급 및 검증
//! - [`CredentialHasher`]: Argon2id 비밀번호 해싱
//! - [`SessionService`]: 로그인 / 갱신 / 로그아웃
//! - [`RegistrationService`]: 회원 가입
//! - [`JwtAuth`], [`RoleGate`]: Axum 추출기와 역할 게이트
//!
//! # 사용 예시
//!
//! ```rust,ignore
//! async fn protected_handler(
//!     JwtAuth(claims): JwtAuth,
//! ) -> impl IntoResponse {
//!     format!("Hello, {}!", claims.username())
//! }
//! ```

mod cookie;
mod jwt;
mod middleware;
mod password;
mod registration;
mod roles;
mod session;

pub use cookie::{RefreshCookie, SessionCookie};
pub use jwt::{AccessClaims, RefreshClaims, TokenError, TokenKeys, UserInfo};
pub use middleware::{require_roles, role_gate, JwtAuth, JwtAuthError, RoleGate};
pub use password::{CredentialHasher, PasswordError, REDACTED};
pub use registration::{Registration, RegistrationService};
pub use roles::{any_role_allowed, Role, RoleSet, UnknownRole};
pub use session::{AuthError, LoginOutcome, RefreshOutcome, SessionService};
