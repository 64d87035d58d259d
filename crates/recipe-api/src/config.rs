//! 설정 관리.
//!
//! 우선순위 (낮음 → 높음):
//! 1. 기본값
//! 2. 레거시 환경 변수 (`ACCESS_TOKEN_SECRET`, `REFRESH_TOKEN_SECRET`,
//!    `DATABASE_URI` / `DATABASE_URL`)
//! 3. 설정 파일 (`config/default.toml`, 선택)
//! 4. `RECIPE__SECTION__KEY` 환경 변수

use std::path::Path;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};

/// 설정 에러.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("설정 로드 실패: {0}")]
    Load(#[from] config::ConfigError),
    #[error("잘못된 설정: {0}")]
    Invalid(String),
}

/// 애플리케이션 설정.
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub cors: CorsConfig,
    pub log: LogConfig,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
    /// 요청 처리 제한 시간 (초)
    pub request_timeout_secs: u64,
}

/// 데이터베이스 설정.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL 연결 URL (`--memory` 실행 시 불필요)
    pub url: Option<String>,
    /// 최대 연결 수
    pub max_connections: u32,
    /// 연결 획득 타임아웃 (초)
    pub acquire_timeout_secs: u64,
}

/// 인증 설정.
#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    /// Access Token 서명 키
    #[serde(deserialize_with = "deserialize_secret")]
    pub access_token_secret: SecretString,
    /// Refresh Token 서명 키
    #[serde(deserialize_with = "deserialize_secret")]
    pub refresh_token_secret: SecretString,
    /// Access Token 유효 시간 (분)
    pub access_token_ttl_minutes: i64,
    /// Refresh Token 유효 시간 (시간)
    pub refresh_token_ttl_hours: i64,
    /// Refresh Token 쿠키 이름
    pub cookie_name: String,
    /// Argon2 메모리 비용 (KiB)
    pub argon2_memory_kib: u32,
    /// Argon2 반복 횟수
    pub argon2_iterations: u32,
    /// Argon2 병렬도
    pub argon2_parallelism: u32,
}

/// CORS 설정.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// 자격 증명(쿠키) 전송을 허용할 Origin 목록
    pub allowed_origins: Vec<String>,
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// JSON 형식 출력
    pub json: bool,
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(SecretString::new(raw.into_boxed_str()))
}

type Builder = config::ConfigBuilder<config::builder::DefaultState>;

impl ApiConfig {
    /// 기본 경로(`config/default.toml`)와 환경 변수에서 설정 로드.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new("config/default.toml"))
    }

    /// 지정한 파일(없으면 무시)과 환경 변수에서 설정 로드.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let builder = Self::defaults()?
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix("RECIPE")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins")
                    .try_parsing(true),
            );

        Self::build(builder)
    }

    /// 기본값과 레거시 환경 변수.
    fn defaults() -> Result<Builder, ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3500)?
            .set_default("server.request_timeout_secs", 30)?
            .set_default("database.max_connections", 10)?
            .set_default("database.acquire_timeout_secs", 5)?
            .set_default("auth.access_token_ttl_minutes", 60)?
            .set_default("auth.refresh_token_ttl_hours", 24)?
            .set_default("auth.cookie_name", "jwt")?
            .set_default("auth.argon2_memory_kib", 19_456)?
            .set_default("auth.argon2_iterations", 2)?
            .set_default("auth.argon2_parallelism", 1)?
            .set_default("cors.allowed_origins", vec!["http://localhost:3000"])?
            .set_default("log.json", false)?;

        let legacy = [
            ("auth.access_token_secret", "ACCESS_TOKEN_SECRET"),
            ("auth.refresh_token_secret", "REFRESH_TOKEN_SECRET"),
            ("database.url", "DATABASE_URI"),
            ("database.url", "DATABASE_URL"),
        ];
        for (key, var) in legacy {
            if let Ok(value) = std::env::var(var) {
                builder = builder.set_default(key, value)?;
            }
        }

        Ok(builder)
    }

    fn build(builder: Builder) -> Result<Self, ConfigError> {
        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// 설정 값 검증.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.auth.validate()?;

        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "server.request_timeout_secs must be positive".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl AuthConfig {
    /// 비밀 키는 비어 있지 않고 서로 달라야 합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let access = self.access_token_secret.expose_secret();
        let refresh = self.refresh_token_secret.expose_secret();

        if access.is_empty() || refresh.is_empty() {
            return Err(ConfigError::Invalid(
                "access and refresh token secrets must be set".to_string(),
            ));
        }
        if access == refresh {
            return Err(ConfigError::Invalid(
                "access and refresh token secrets must differ".to_string(),
            ));
        }
        if self.access_token_ttl_minutes <= 0 || self.refresh_token_ttl_hours <= 0 {
            return Err(ConfigError::Invalid("token lifetimes must be positive".to_string()));
        }
        if self.cookie_name.is_empty() {
            return Err(ConfigError::Invalid("auth.cookie_name must be set".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    fn from_toml(toml: &str) -> Result<ApiConfig, ConfigError> {
        let builder = config::Config::builder()
            .add_source(ApiConfig::defaults()?.build()?)
            .add_source(File::from_str(toml, FileFormat::Toml));
        ApiConfig::build(builder)
    }

    const SECRETS: &str = r#"
        [auth]
        access_token_secret = "access-secret"
        refresh_token_secret = "refresh-secret"
    "#;

    #[test]
    fn test_defaults() {
        let config = from_toml(SECRETS).unwrap();

        assert_eq!(config.server.port, 3500);
        assert_eq!(config.server.request_timeout_secs, 30);
        assert_eq!(config.auth.access_token_ttl_minutes, 60);
        assert_eq!(config.auth.refresh_token_ttl_hours, 24);
        assert_eq!(config.auth.cookie_name, "jwt");
        assert!(!config.log.json);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let toml = format!(
            "{}\ncookie_name = \"session\"\n[server]\nport = 8080\n[cors]\nallowed_origins = [\"https://recipes.example.com\"]\n",
            SECRETS
        );
        let config = from_toml(&toml).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.cookie_name, "session");
        assert_eq!(
            config.cors.allowed_origins,
            vec!["https://recipes.example.com".to_string()]
        );
    }

    #[test]
    fn test_equal_secrets_rejected() {
        let result = from_toml(
            r#"
            [auth]
            access_token_secret = "same"
            refresh_token_secret = "same"
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_empty_secret_rejected() {
        let result = from_toml(
            r#"
            [auth]
            access_token_secret = ""
            refresh_token_secret = "refresh"
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_secret_not_in_debug_output() {
        let config = from_toml(SECRETS).unwrap();
        let debug = format!("{:?}", config.auth);
        assert!(!debug.contains("access-secret"));
    }
}
