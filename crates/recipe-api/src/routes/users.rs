//! 사용자 관리 API 라우트
//!
//! 모든 엔드포인트는 Bearer Access Token이 필요합니다.
//!
//! # 엔드포인트
//!
//! - `GET /users` - 내 프로필 조회
//! - `PUT /users` - 내 프로필 부분 수정
//! - `GET /users/handle` - 전체 사용자 목록 (Admin)
//! - `PUT /users/handle` - 사용자 역할 변경 (Admin)
//! - `DELETE /users/handle` - 사용자 삭제 (Admin)
//! - `GET /users/{id}` - 사용자 프로필 조회 (Admin)

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    middleware,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::auth::{role_gate, JwtAuth, Role, RoleGate, RoleSet, REDACTED};
use crate::error::{ApiError, ApiErrorResponse, ApiResult};
use crate::repository::{ProfileUpdate, UserProfile};
use crate::state::AppState;

// ================================================================================================
// Request/Response Types
// ================================================================================================

/// 프로필 수정 요청 (제공된 필드만 변경)
#[derive(Default, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_password_confirmation"))]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, message = "firstname must not be empty"))]
    pub firstname: Option<String>,
    #[validate(length(min = 1, message = "lastname must not be empty"))]
    pub lastname: Option<String>,
    #[validate(length(min = 1, message = "password must not be empty"))]
    #[serde(alias = "pwd")]
    pub password: Option<String>,
    pub confirm: Option<String>,
}

impl std::fmt::Debug for UpdateProfileRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateProfileRequest")
            .field("firstname", &self.firstname)
            .field("lastname", &self.lastname)
            .field("password", &self.password.as_ref().map(|_| REDACTED))
            .field("confirm", &self.confirm.as_ref().map(|_| REDACTED))
            .finish()
    }
}

fn validate_password_confirmation(req: &UpdateProfileRequest) -> Result<(), ValidationError> {
    match &req.password {
        Some(password) if req.confirm.as_ref() != Some(password) => {
            let mut error = ValidationError::new("password_mismatch");
            error.message = Some("passwords do not match".into());
            Err(error)
        }
        _ => Ok(()),
    }
}

/// 역할 변경 요청
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRolesRequest {
    pub id: Option<Uuid>,
    /// 역할 이름 → 역할 ID 맵. `User`는 항상 유지됩니다.
    #[schema(value_type = Object, example = json!({"User": 80085, "Admin": 420420}))]
    #[serde(default)]
    pub roles: Option<RoleSet>,
}

/// 사용자 삭제 요청
#[derive(Debug, Deserialize, ToSchema)]
pub struct DeleteUserRequest {
    pub id: Option<Uuid>,
}

/// 사용자 목록 응답
#[derive(Debug, Serialize, ToSchema)]
pub struct UsersListResponse {
    pub users: Vec<UserProfile>,
    pub total: usize,
}

/// 삭제 응답
#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteUserResponse {
    pub success: String,
}

// ================================================================================================
// Handlers
// ================================================================================================

/// GET /users - 내 프로필
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "프로필", body = UserProfile),
        (status = 204, description = "계정이 삭제됨"),
        (status = 401, description = "인증 헤더 없음", body = ApiErrorResponse),
        (status = 403, description = "토큰 무효", body = ApiErrorResponse)
    )
)]
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    JwtAuth(claims): JwtAuth,
) -> ApiResult<Json<UserProfile>> {
    let user = state
        .users
        .find_by_username(claims.username())
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(user.profile()))
}

/// PUT /users - 내 프로필 수정
///
/// 비밀번호 변경은 기존 세션을 해제하지 않습니다.
#[utoipa::path(
    put,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "수정된 프로필", body = UserProfile),
        (status = 204, description = "계정이 삭제됨"),
        (status = 400, description = "변경할 항목 없음 또는 비밀번호 확인 불일치", body = ApiErrorResponse)
    )
)]
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    JwtAuth(claims): JwtAuth,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> ApiResult<Json<UserProfile>> {
    let Json(req) = payload?;
    req.validate()?;

    let password_hash = match req.password {
        Some(password) => Some(
            state
                .hasher
                .hash_async(password)
                .await
                .map_err(|e| ApiError::Internal(e.to_string()))?,
        ),
        None => None,
    };
    let update = ProfileUpdate {
        firstname: req.firstname,
        lastname: req.lastname,
        password_hash,
    };
    if update.is_empty() {
        return Err(ApiError::BadRequest("Nothing to update.".to_string()));
    }

    let user = state
        .users
        .find_by_username(claims.username())
        .await?
        .ok_or(ApiError::NotFound)?;

    let updated = state
        .users
        .update_profile(user.id, update)
        .await?
        .ok_or(ApiError::NotFound)?;

    info!(username = %updated.username, "Profile updated");
    Ok(Json(updated.profile()))
}

/// GET /users/handle - 전체 사용자 목록
#[utoipa::path(
    get,
    path = "/users/handle",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "사용자 목록", body = UsersListResponse),
        (status = 403, description = "Admin 권한 필요", body = ApiErrorResponse)
    )
)]
pub async fn list_users(State(state): State<Arc<AppState>>) -> ApiResult<Json<UsersListResponse>> {
    let users: Vec<UserProfile> = state
        .users
        .list()
        .await?
        .iter()
        .map(|u| u.profile())
        .collect();

    Ok(Json(UsersListResponse {
        total: users.len(),
        users,
    }))
}

/// PUT /users/handle - 역할 변경
#[utoipa::path(
    put,
    path = "/users/handle",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = UpdateRolesRequest,
    responses(
        (status = 200, description = "변경된 프로필", body = UserProfile),
        (status = 400, description = "ID 누락 또는 알 수 없는 사용자", body = ApiErrorResponse),
        (status = 403, description = "Admin 권한 필요", body = ApiErrorResponse)
    )
)]
pub async fn update_roles(
    State(state): State<Arc<AppState>>,
    JwtAuth(admin): JwtAuth,
    payload: Result<Json<UpdateRolesRequest>, JsonRejection>,
) -> ApiResult<Json<UserProfile>> {
    let Json(req) = payload?;
    let id = req
        .id
        .ok_or_else(|| ApiError::BadRequest("User ID required.".to_string()))?;
    let roles = req
        .roles
        .ok_or_else(|| ApiError::BadRequest("Roles required.".to_string()))?
        .with_user();

    let updated = state
        .users
        .update_roles(id, roles)
        .await?
        .ok_or_else(|| ApiError::BadRequest(format!("No user matches ID {}.", id)))?;

    info!(
        admin = %admin.username(),
        username = %updated.username,
        roles = ?updated.roles.snapshot(),
        "User roles updated"
    );
    Ok(Json(updated.profile()))
}

/// DELETE /users/handle - 사용자 삭제
#[utoipa::path(
    delete,
    path = "/users/handle",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = DeleteUserRequest,
    responses(
        (status = 200, description = "삭제 완료", body = DeleteUserResponse),
        (status = 204, description = "해당 사용자 없음"),
        (status = 400, description = "ID 누락", body = ApiErrorResponse),
        (status = 403, description = "Admin 권한 필요", body = ApiErrorResponse)
    )
)]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    JwtAuth(admin): JwtAuth,
    payload: Result<Json<DeleteUserRequest>, JsonRejection>,
) -> ApiResult<Json<DeleteUserResponse>> {
    let Json(req) = payload?;
    let id = req
        .id
        .ok_or_else(|| ApiError::BadRequest("User ID required.".to_string()))?;

    if !state.users.delete(id).await? {
        return Err(ApiError::NotFound);
    }

    info!(admin = %admin.username(), user_id = %id, "User deleted");
    Ok(Json(DeleteUserResponse {
        success: format!("User {} deleted.", id),
    }))
}

/// GET /users/{id} - 사용자 프로필
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "사용자 ID")),
    responses(
        (status = 200, description = "프로필", body = UserProfile),
        (status = 204, description = "해당 사용자 없음"),
        (status = 403, description = "Admin 권한 필요", body = ApiErrorResponse)
    )
)]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserProfile>> {
    let user = state.users.find_by_id(id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(user.profile()))
}

/// 사용자 라우터 생성.
///
/// 관리 라우트에는 `[Admin]` 역할 게이트가 적용됩니다.
pub fn users_router(state: &AppState) -> Router<Arc<AppState>> {
    let admin = Router::new()
        .route(
            "/handle",
            get(list_users).put(update_roles).delete(delete_user),
        )
        .route("/{id}", get(get_user))
        .route_layer(middleware::from_fn_with_state(
            RoleGate::new(state.keys.clone(), [Role::Admin]),
            role_gate,
        ));

    Router::new()
        .route("/", get(get_me).put(update_me))
        .merge(admin)
}
