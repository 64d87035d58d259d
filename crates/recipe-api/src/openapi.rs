//! OpenAPI 문서화 설정.
//!
//! utoipa를 사용하여 REST API의 OpenAPI 3.0 스펙을 생성합니다.
//! Swagger UI는 `/swagger-ui` 경로에서 사용 가능합니다.
//!
//! 새로운 엔드포인트를 추가할 때:
//!
//! 1. 응답/요청 타입에 `#[derive(ToSchema)]` 추가
//! 2. 핸들러에 `#[utoipa::path(...)]` 어노테이션 추가
//! 3. 이 파일의 `components(schemas(...))` 및 `paths(...)` 섹션에 추가

use axum::Router;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::UserInfo;
use crate::error::ApiErrorResponse;
use crate::repository::UserProfile;
use crate::routes::{
    ComponentHealth, ComponentStatus, DeleteUserRequest, DeleteUserResponse, HealthResponse,
    LoginRequest, LoginResponse, RefreshResponse, RegisterRequest, SuccessResponse,
    UpdateProfileRequest, UpdateRolesRequest, UsersListResponse,
};

/// Recipe API 문서.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Recipe Sharing API",
        version = "0.1.0",
        description = r#"
# Recipe Sharing REST API

## 인증

- `POST /login`으로 Access Token을 받고, Refresh Token은 `jwt` HttpOnly 쿠키로 전달됩니다.
- 보호된 엔드포인트는 `Authorization: Bearer <accessToken>` 헤더가 필요합니다.
- Access Token이 만료되면 `GET /refresh`로 재발급합니다.

## 역할

| 역할 | ID |
|------|-----|
| User | 80085 |
| Admin | 420420 |
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3500", description = "로컬 개발 서버"),
    ),
    tags(
        (name = "health", description = "헬스 체크 - 서버 상태 확인"),
        (name = "auth", description = "인증 - 로그인, 토큰 갱신, 로그아웃, 가입"),
        (name = "users", description = "사용자 - 프로필 및 관리자 기능")
    ),
    modifiers(&SecurityAddon),
    components(
        schemas(
            // ===== Health =====
            HealthResponse,
            ComponentHealth,
            ComponentStatus,

            // ===== Common =====
            ApiErrorResponse,

            // ===== Auth =====
            LoginRequest,
            LoginResponse,
            RefreshResponse,
            RegisterRequest,
            SuccessResponse,
            UserInfo,

            // ===== Users =====
            UserProfile,
            UpdateProfileRequest,
            UpdateRolesRequest,
            DeleteUserRequest,
            DeleteUserResponse,
            UsersListResponse,
        )
    ),
    paths(
        // ===== Health =====
        crate::routes::health::health_check,
        crate::routes::health::health_ready,

        // ===== Auth =====
        crate::routes::auth::login,
        crate::routes::auth::refresh,
        crate::routes::auth::logout,
        crate::routes::auth::register,

        // ===== Users =====
        crate::routes::users::get_me,
        crate::routes::users::update_me,
        crate::routes::users::list_users,
        crate::routes::users::update_roles,
        crate::routes::users::delete_user,
        crate::routes::users::get_user,
    )
)]
pub struct ApiDoc;

/// Bearer 인증 스키마 등록.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Swagger UI 라우터 생성.
///
/// - `/swagger-ui` - Swagger UI 대화형 문서
/// - `/api-docs/openapi.json` - OpenAPI JSON 스펙
pub fn swagger_ui_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}
