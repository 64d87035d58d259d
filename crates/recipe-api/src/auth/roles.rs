//! 역할 기반 접근 제어 (RBAC).
//!
//! 사용자 역할과 사용자별 역할 집합 정의.
//!
//! 역할은 안정적인 정수 ID를 가진 닫힌 집합입니다. 토큰과 응답에서는 ID로,
//! 저장된 역할 집합은 `{"User": 80085, "Admin": 420420}` 형태의 맵으로 직렬화됩니다.

use std::collections::BTreeSet;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 사용자 역할.
///
/// 선언 순서가 역할 스냅샷의 순서입니다 (User, Admin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum Role {
    /// 일반 사용자 - 가입 시 기본 부여
    User,
    /// 관리자 - 사용자 관리 권한
    Admin,
}

impl Role {
    /// 모든 역할 (선언 순서).
    pub const ALL: [Role; 2] = [Role::User, Role::Admin];

    /// 역할의 고정 정수 ID.
    pub const fn id(self) -> i32 {
        match self {
            Role::User => 80085,
            Role::Admin => 420420,
        }
    }

    /// 정수 ID에서 역할 조회.
    pub fn from_id(id: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.id() == id)
    }

    /// 역할 이름 (역할 맵의 키).
    pub const fn name(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Admin => "Admin",
        }
    }

    /// 문자열에서 역할 파싱 (대소문자 무시).
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|role| role.name().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl From<Role> for i32 {
    fn from(role: Role) -> Self {
        role.id()
    }
}

/// 알 수 없는 역할 ID 또는 이름.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("알 수 없는 역할: {0}")]
pub struct UnknownRole(pub String);

impl TryFrom<i32> for Role {
    type Error = UnknownRole;

    fn try_from(id: i32) -> Result<Self, Self::Error> {
        Role::from_id(id).ok_or_else(|| UnknownRole(id.to_string()))
    }
}

/// 요청 역할과 허용 역할의 교집합이 비어있지 않은지 확인.
pub fn any_role_allowed(held: &[Role], allowed: &[Role]) -> bool {
    held.iter().any(|role| allowed.contains(role))
}

/// 사용자에게 부여된 역할 집합.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoleSet {
    roles: BTreeSet<Role>,
}

impl RoleSet {
    /// 가입 시 기본 역할 집합 (`User`만 포함).
    pub fn new_user() -> Self {
        Self::from_roles([Role::User])
    }

    /// 역할 목록으로 생성.
    pub fn from_roles(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            roles: roles.into_iter().collect(),
        }
    }

    /// 저장소의 정수 ID 목록으로 생성.
    pub fn from_ids(ids: &[i32]) -> Result<Self, UnknownRole> {
        ids.iter()
            .map(|id| Role::try_from(*id))
            .collect::<Result<BTreeSet<_>, _>>()
            .map(|roles| Self { roles })
    }

    /// 저장용 정수 ID 목록 (선언 순서).
    pub fn ids(&self) -> Vec<i32> {
        self.roles.iter().map(|role| role.id()).collect()
    }

    /// 토큰에 담길 역할 스냅샷 (선언 순서).
    pub fn snapshot(&self) -> Vec<Role> {
        self.roles.iter().copied().collect()
    }

    pub fn contains(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn insert(&mut self, role: Role) {
        self.roles.insert(role);
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// `User` 역할이 항상 포함되도록 보정.
    #[must_use]
    pub fn with_user(mut self) -> Self {
        self.roles.insert(Role::User);
        self
    }
}

impl Serialize for RoleSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.roles.len()))?;
        for role in &self.roles {
            map.serialize_entry(role.name(), &role.id())?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RoleSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RoleSetVisitor;

        impl<'de> Visitor<'de> for RoleSetVisitor {
            type Value = RoleSet;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of role name to role id")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<RoleSet, A::Error> {
                let mut set = RoleSet::default();
                while let Some((name, id)) = access.next_entry::<String, Option<i32>>()? {
                    let role = Role::parse(&name)
                        .ok_or_else(|| serde::de::Error::custom(UnknownRole(name.clone())))?;
                    // null 또는 0은 "부여되지 않음"
                    match id {
                        None | Some(0) => continue,
                        Some(id) if id == role.id() => set.insert(role),
                        Some(id) => {
                            return Err(serde::de::Error::custom(format!(
                                "역할 {} 의 ID가 일치하지 않습니다: {}",
                                role, id
                            )))
                        }
                    }
                }
                Ok(set)
            }
        }

        deserializer.deserialize_map(RoleSetVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ids() {
        assert_eq!(Role::User.id(), 80085);
        assert_eq!(Role::Admin.id(), 420420);
        assert_eq!(Role::from_id(420420), Some(Role::Admin));
        assert_eq!(Role::from_id(1), None);
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("USER"), Some(Role::User));
        assert_eq!(Role::parse("editor"), None);
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&vec![Role::User, Role::Admin]).unwrap();
        assert_eq!(json, "[80085,420420]");

        let parsed: Vec<Role> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, vec![Role::User, Role::Admin]);

        assert!(serde_json::from_str::<Role>("12345").is_err());
    }

    #[test]
    fn test_snapshot_keeps_declaration_order() {
        let set = RoleSet::from_roles([Role::Admin, Role::User]);
        assert_eq!(set.snapshot(), vec![Role::User, Role::Admin]);
        assert_eq!(set.ids(), vec![80085, 420420]);
    }

    #[test]
    fn test_role_set_map_form() {
        let set = RoleSet::from_roles([Role::User, Role::Admin]);
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"{"User":80085,"Admin":420420}"#);

        let parsed: RoleSet = serde_json::from_str(r#"{"User":80085,"Admin":null}"#).unwrap();
        assert_eq!(parsed.snapshot(), vec![Role::User]);

        assert!(serde_json::from_str::<RoleSet>(r#"{"User":1}"#).is_err());
        assert!(serde_json::from_str::<RoleSet>(r#"{"Owner":1}"#).is_err());
    }

    #[test]
    fn test_role_set_from_ids() {
        let set = RoleSet::from_ids(&[420420, 80085]).unwrap();
        assert!(set.contains(Role::Admin));
        assert!(RoleSet::from_ids(&[7]).is_err());
    }

    #[test]
    fn test_with_user() {
        let set = RoleSet::from_roles([Role::Admin]).with_user();
        assert_eq!(set.snapshot(), vec![Role::User, Role::Admin]);
    }

    #[test]
    fn test_any_role_allowed() {
        assert!(!any_role_allowed(&[Role::User], &[Role::Admin]));
        assert!(any_role_allowed(&[Role::User, Role::Admin], &[Role::Admin]));
        assert!(!any_role_allowed(&[], &[Role::User]));
    }
}
