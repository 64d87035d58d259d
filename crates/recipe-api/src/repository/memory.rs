//! 인메모리 사용자 저장소.
//!
//! 테스트 및 DB 없는 개발 모드(`--memory`)에서 사용합니다.
//! 모든 변경은 단일 쓰기 잠금 안에서 처리되어 PostgreSQL 구현과 같은 원자성을 가집니다.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::users::{NewUser, ProfileUpdate, StoreError, UserRecord, UserStore};
use crate::auth::RoleSet;

/// 인메모리 사용자 저장소.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, UserRecord>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn find_by<F>(&self, pred: F) -> Option<UserRecord>
    where
        F: Fn(&UserRecord) -> bool,
    {
        self.users.read().await.values().find(|u| pred(u)).cloned()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.find_by(|u| u.username == username).await)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.find_by(|u| u.email == email).await)
    }

    async fn find_by_refresh_token(&self, token: &str) -> Result<Option<UserRecord>, StoreError> {
        if token.is_empty() {
            return Ok(None);
        }
        Ok(self.find_by(|u| u.refresh_token == token).await)
    }

    async fn list(&self) -> Result<Vec<UserRecord>, StoreError> {
        let mut users: Vec<_> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.username.cmp(&b.username))
        });
        Ok(users)
    }

    async fn create(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let mut users = self.users.write().await;

        if users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Duplicate("username"));
        }
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate("email"));
        }

        let record = UserRecord {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            firstname: user.firstname,
            lastname: user.lastname,
            password_hash: user.password_hash,
            roles: user.roles,
            refresh_token: String::new(),
            created_at: Utc::now(),
        };
        users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn set_refresh_token(&self, id: Uuid, token: &str) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        Ok(match users.get_mut(&id) {
            Some(user) => {
                user.refresh_token = token.to_string();
                true
            }
            None => false,
        })
    }

    async fn clear_refresh_token(&self, token: &str) -> Result<bool, StoreError> {
        if token.is_empty() {
            return Ok(false);
        }

        let mut users = self.users.write().await;
        let mut cleared = false;
        for user in users.values_mut().filter(|u| u.refresh_token == token) {
            user.refresh_token.clear();
            cleared = true;
        }
        Ok(cleared)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Option<UserRecord>, StoreError> {
        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(firstname) = update.firstname {
            user.firstname = firstname;
        }
        if let Some(lastname) = update.lastname {
            user.lastname = lastname;
        }
        if let Some(password_hash) = update.password_hash {
            user.password_hash = password_hash;
        }
        Ok(Some(user.clone()))
    }

    async fn update_roles(
        &self,
        id: Uuid,
        roles: RoleSet,
    ) -> Result<Option<UserRecord>, StoreError> {
        let mut users = self.users.write().await;
        Ok(users.get_mut(&id).map(|user| {
            user.roles = roles;
            user.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.users.write().await.remove(&id).is_some())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
