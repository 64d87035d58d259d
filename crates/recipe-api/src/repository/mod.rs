//! Repository pattern for database operations.
//!
//! 데이터베이스 접근 로직을 라우트 핸들러에서 분리하여 관리합니다.
//! 핸들러와 서비스는 `Arc<dyn UserStore>`만 알고, 구현은 시작 시 선택됩니다.

pub mod memory;
pub mod users;

pub use memory::MemoryUserStore;
pub use users::{
    NewUser, PgUserStore, ProfileUpdate, StoreError, UserProfile, UserRecord, UserStore,
};
