//! Users Repository
//!
//! 사용자 레코드 저장소. 인증 코어는 [`UserStore`] 트레이트를 통해서만 접근합니다.
//!
//! Refresh Token 필드 갱신은 모두 단일 문장으로 처리됩니다.
//! - 로그인: `UPDATE ... WHERE id = $1`
//! - 로그아웃: `UPDATE ... SET refresh_token = '' WHERE refresh_token = $1` (compare-and-set)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{RoleSet, UnknownRole, UserInfo};

// ================================================================================================
// Types
// ================================================================================================

/// 사용자 레코드.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    /// PHC 형식 Argon2id 해시
    pub password_hash: String,
    pub roles: RoleSet,
    /// 현재 유효한 Refresh Token (빈 문자열이면 세션 없음)
    pub refresh_token: String,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// Access Token에 담을 사용자 정보 (역할 스냅샷 포함).
    pub fn user_info(&self) -> UserInfo {
        UserInfo {
            username: self.username.clone(),
            firstname: self.firstname.clone(),
            lastname: self.lastname.clone(),
            email: self.email.clone(),
            roles: self.roles.snapshot(),
        }
    }

    /// 외부 노출용 프로필 (자격 증명 필드 제외).
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            firstname: self.firstname.clone(),
            lastname: self.lastname.clone(),
            roles: self.roles.clone(),
            created_at: self.created_at,
        }
    }
}

/// 사용자 프로필 응답.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    /// 역할 이름 → 역할 ID 맵
    #[schema(value_type = Object, example = json!({"User": 80085}))]
    pub roles: RoleSet,
    pub created_at: DateTime<Utc>,
}

/// DB 행 (roles는 정수 배열).
#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    firstname: String,
    lastname: String,
    password_hash: String,
    roles: Vec<i32>,
    refresh_token: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let roles = RoleSet::from_ids(&row.roles)
            .map_err(|UnknownRole(id)| StoreError::Corrupt(format!("user {}: role {}", row.id, id)))?;

        Ok(Self {
            id: row.id,
            username: row.username,
            email: row.email,
            firstname: row.firstname,
            lastname: row.lastname,
            password_hash: row.password_hash,
            roles,
            refresh_token: row.refresh_token,
            created_at: row.created_at,
        })
    }
}

/// 신규 사용자 입력.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub password_hash: String,
    pub roles: RoleSet,
}

/// 프로필 부분 수정 입력. `None` 필드는 유지됩니다.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub password_hash: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.firstname.is_none() && self.lastname.is_none() && self.password_hash.is_none()
    }
}

/// 저장소 에러.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// 유일성 제약 위반 (필드 이름)
    #[error("중복된 {0}")]
    Duplicate(&'static str),
    #[error("데이터베이스 에러: {0}")]
    Database(#[from] sqlx::Error),
    #[error("손상된 사용자 레코드: {0}")]
    Corrupt(String),
}

// ================================================================================================
// Store trait
// ================================================================================================

/// 사용자 레코드 저장소.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    /// 저장된 Refresh Token 값으로 조회. 빈 문자열은 항상 `None`입니다.
    async fn find_by_refresh_token(&self, token: &str) -> Result<Option<UserRecord>, StoreError>;

    /// 전체 사용자 (가입 순).
    async fn list(&self) -> Result<Vec<UserRecord>, StoreError>;

    async fn create(&self, user: NewUser) -> Result<UserRecord, StoreError>;

    /// 사용자의 Refresh Token을 덮어씀. 사용자가 없으면 `false`.
    async fn set_refresh_token(&self, id: Uuid, token: &str) -> Result<bool, StoreError>;

    /// 해당 토큰을 가진 레코드의 Refresh Token을 비움. 일치하는 레코드가 없으면 `false`.
    async fn clear_refresh_token(&self, token: &str) -> Result<bool, StoreError>;

    async fn update_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Option<UserRecord>, StoreError>;

    async fn update_roles(&self, id: Uuid, roles: RoleSet)
        -> Result<Option<UserRecord>, StoreError>;

    /// 삭제. 사용자가 없으면 `false`.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    /// 연결 상태 확인.
    async fn ping(&self) -> Result<(), StoreError>;
}

// ================================================================================================
// PostgreSQL
// ================================================================================================

/// PostgreSQL 사용자 저장소.
#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_unique_violation(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return match db.constraint() {
                Some("users_email_key") => StoreError::Duplicate("email"),
                _ => StoreError::Duplicate("username"),
            };
        }
    }
    StoreError::Database(e)
}

fn into_record(row: Option<UserRow>) -> Result<Option<UserRecord>, StoreError> {
    row.map(UserRecord::try_from).transpose()
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, email, firstname, lastname, password_hash,
                   roles, refresh_token, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        into_record(row)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, email, firstname, lastname, password_hash,
                   roles, refresh_token, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        into_record(row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, email, firstname, lastname, password_hash,
                   roles, refresh_token, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        into_record(row)
    }

    async fn find_by_refresh_token(&self, token: &str) -> Result<Option<UserRecord>, StoreError> {
        if token.is_empty() {
            return Ok(None);
        }

        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, email, firstname, lastname, password_hash,
                   roles, refresh_token, created_at
            FROM users
            WHERE refresh_token = $1
            LIMIT 1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        into_record(row)
    }

    async fn list(&self) -> Result<Vec<UserRecord>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, email, firstname, lastname, password_hash,
                   roles, refresh_token, created_at
            FROM users
            ORDER BY created_at, username
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(UserRecord::try_from).collect()
    }

    async fn create(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, username, email, firstname, lastname, password_hash, roles)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, username, email, firstname, lastname, password_hash,
                      roles, refresh_token, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.firstname)
        .bind(&user.lastname)
        .bind(&user.password_hash)
        .bind(user.roles.ids())
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        UserRecord::try_from(row)
    }

    async fn set_refresh_token(&self, id: Uuid, token: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE users SET refresh_token = $2 WHERE id = $1")
            .bind(id)
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear_refresh_token(&self, token: &str) -> Result<bool, StoreError> {
        if token.is_empty() {
            return Ok(false);
        }

        let result = sqlx::query("UPDATE users SET refresh_token = '' WHERE refresh_token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users SET
                firstname = COALESCE($2, firstname),
                lastname = COALESCE($3, lastname),
                password_hash = COALESCE($4, password_hash)
            WHERE id = $1
            RETURNING id, username, email, firstname, lastname, password_hash,
                      roles, refresh_token, created_at
            "#,
        )
        .bind(id)
        .bind(update.firstname)
        .bind(update.lastname)
        .bind(update.password_hash)
        .fetch_optional(&self.pool)
        .await?;

        into_record(row)
    }

    async fn update_roles(
        &self,
        id: Uuid,
        roles: RoleSet,
    ) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users SET roles = $2
            WHERE id = $1
            RETURNING id, username, email, firstname, lastname, password_hash,
                      roles, refresh_token, created_at
            "#,
        )
        .bind(id)
        .bind(roles.ids())
        .fetch_optional(&self.pool)
        .await?;

        into_record(row)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
