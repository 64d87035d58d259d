//! 비밀번호 해싱 유틸리티.
//!
//! Argon2id 기반 비밀번호 해싱 및 검증.
//! 해싱은 CPU/메모리 집약적이므로 비동기 경로에서는 blocking 스레드풀에서 실행합니다.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

/// 로그와 `Debug` 출력에서 비밀번호 대신 쓰는 값.
pub const REDACTED: &str = "[REDACTED]";

/// 비밀번호 처리 에러.
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("비밀번호 해싱 실패")]
    HashingFailed,
    #[error("잘못된 해시 형식")]
    InvalidHashFormat,
    #[error("잘못된 Argon2 파라미터: {0}")]
    InvalidParams(String),
    #[error("해싱 작업 실행 실패: {0}")]
    TaskFailed(String),
}

/// Argon2id 해셔.
///
/// 파라미터는 설정에서 주입됩니다. 테스트에서는 낮은 비용의 파라미터를 사용합니다.
#[derive(Debug, Clone)]
pub struct CredentialHasher {
    params: Params,
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl CredentialHasher {
    /// 메모리(KiB), 반복 횟수, 병렬도로 생성.
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, PasswordError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// 비밀번호 해싱. PHC 형식 문자열(솔트 포함)을 반환합니다.
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);

        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|_| PasswordError::HashingFailed)?;

        Ok(hash.to_string())
    }

    /// 비밀번호 검증.
    ///
    /// 불일치는 `Ok(false)`, 저장된 해시가 손상된 경우만 에러입니다.
    /// 해시에 기록된 파라미터로 검증하므로 설정이 바뀌어도 기존 해시는 유효합니다.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHashFormat)?;

        match self.argon2().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(_) => Err(PasswordError::InvalidHashFormat),
        }
    }

    /// blocking 스레드풀에서 해싱.
    pub async fn hash_async(&self, password: String) -> Result<String, PasswordError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| PasswordError::TaskFailed(e.to_string()))?
    }

    /// blocking 스레드풀에서 검증.
    pub async fn verify_async(&self, password: String, hash: String) -> Result<bool, PasswordError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| PasswordError::TaskFailed(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> CredentialHasher {
        CredentialHasher::new(1024, 1, 1).unwrap()
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hasher = cheap();
        let hash = hasher.hash("TestPassword123!").unwrap();

        // 해시 형식 확인 (argon2id)
        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains("TestPassword123!"));

        assert!(hasher.verify("TestPassword123!", &hash).unwrap());
        assert!(!hasher.verify("WrongPassword123!", &hash).unwrap());
    }

    #[test]
    fn test_same_password_different_salt() {
        let hasher = cheap();
        let hash1 = hasher.hash("Password1").unwrap();
        let hash2 = hasher.hash("Password1").unwrap();

        assert_ne!(hash1, hash2);
        assert!(hasher.verify("Password1", &hash1).unwrap());
        assert!(hasher.verify("Password1", &hash2).unwrap());
    }

    #[test]
    fn test_invalid_hash_format() {
        let result = cheap().verify("password", "not-a-valid-hash");
        assert!(matches!(result, Err(PasswordError::InvalidHashFormat)));
    }

    #[test]
    fn test_invalid_params() {
        assert!(matches!(
            CredentialHasher::new(1, 0, 0),
            Err(PasswordError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_hash_from_other_params_still_verifies() {
        let hash = cheap().hash("한글패스워드123").unwrap();
        let other = CredentialHasher::new(2048, 2, 1).unwrap();
        assert!(other.verify("한글패스워드123", &hash).unwrap());
    }

    #[tokio::test]
    async fn test_async_round_trip() {
        let hasher = cheap();
        let hash = hasher.hash_async("secret".to_string()).await.unwrap();
        assert!(hasher
            .verify_async("secret".to_string(), hash.clone())
            .await
            .unwrap());
        assert!(!hasher.verify_async("nope".to_string(), hash).await.unwrap());
    }
}
