//! API 라우트.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (liveness)
//! - `/health/ready` - 상세 헬스 체크 (readiness)
//! - `/login`, `/refresh`, `/logout`, `/register` - 인증
//! - `/users` - 사용자 관리 (Bearer 인증, 일부 Admin 전용)

pub mod auth;
pub mod health;
pub mod users;

pub use auth::{
    auth_router, LoginRequest, LoginResponse, RefreshResponse, RegisterRequest, SuccessResponse,
};
pub use health::{health_router, ComponentHealth, ComponentStatus, HealthResponse};
pub use users::{
    users_router, DeleteUserRequest, DeleteUserResponse, UpdateProfileRequest,
    UpdateRolesRequest, UsersListResponse,
};

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

/// 전체 API 라우터 생성.
pub fn create_api_router(state: &AppState) -> Router<Arc<AppState>> {
    Router::new()
        .nest("/health", health_router())
        .merge(auth_router())
        .nest("/users", users_router(state))
}
