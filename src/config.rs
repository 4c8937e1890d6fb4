//! Configuration management for PocketPilot.
//!
//! Configuration is read from environment variables:
//! - `GEMINI_API_KEY` - Required. API key for the text-completion service.
//! - `LLM_MODEL` - Optional. Model identifier. Defaults to `gemini-2.0-flash`.
//! - `LLM_RETRY_LIMIT` - Optional. Attempts per completion call. Defaults to `3`.
//! - `LLM_RETRY_DELAY_MS` - Optional. Base backoff delay. Defaults to `1000`.
//! - `JWT_SECRET` - Required. Secret used to sign bearer tokens.
//! - `JWT_TTL_DAYS` - Optional. Token lifetime. Defaults to `30`.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `5000`.
//! - `LEDGER_BACKEND` - Optional. `sqlite` or `memory`. Defaults to `sqlite`.
//! - `DATA_DIR` - Optional. Directory for the SQLite database. Defaults to `./data`.
//! - `ROUND_UP_INCREMENT` - Optional. Round-up increment. Defaults to `10`.
//! - `PENDING_DECISION_TTL_SECS` - Optional. Regret decision token lifetime. Defaults to `600`.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::llm::RetryConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Which ledger store backs the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerBackend {
    Sqlite,
    Memory,
}

impl FromStr for LedgerBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" => Ok(LedgerBackend::Sqlite),
            "memory" => Ok(LedgerBackend::Memory),
            other => Err(ConfigError::InvalidValue(
                "LEDGER_BACKEND".to_string(),
                format!("expected 'sqlite' or 'memory', got '{}'", other),
            )),
        }
    }
}

/// Text-completion settings.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub retry: RetryConfig,
}

/// Bearer-token settings.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_ttl_days: i64,
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,

    pub auth: AuthConfig,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    pub ledger_backend: LedgerBackend,

    /// Directory holding `ledger.db` when the SQLite backend is used
    pub data_dir: PathBuf,

    /// Expenses are rounded up to the next multiple of this amount
    pub round_up_increment: f64,

    /// How long a regret warning's decision token stays redeemable
    pub pending_decision_ttl: Duration,
}

fn parse_var<T>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    std::env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `GEMINI_API_KEY` or `JWT_SECRET`
    /// is not set, and `ConfigError::InvalidValue` for unparsable values.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("GEMINI_API_KEY".to_string()))?;

        let jwt_secret = std::env::var("JWT_SECRET")
            .map_err(|_| ConfigError::MissingEnvVar("JWT_SECRET".to_string()))?;

        let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| "gemini-2.0-flash".to_string());

        let max_attempts: u32 = parse_var("LLM_RETRY_LIMIT", "3")?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "LLM_RETRY_LIMIT".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let retry_delay_ms: u64 = parse_var("LLM_RETRY_DELAY_MS", "1000")?;

        let round_up_increment: f64 = parse_var("ROUND_UP_INCREMENT", "10")?;
        if !round_up_increment.is_finite() || round_up_increment <= 0.0 {
            return Err(ConfigError::InvalidValue(
                "ROUND_UP_INCREMENT".to_string(),
                "must be a positive number".to_string(),
            ));
        }

        let ttl_secs: u64 = parse_var("PENDING_DECISION_TTL_SECS", "600")?;

        Ok(Self {
            llm: LlmConfig {
                api_key,
                model,
                retry: RetryConfig {
                    max_attempts,
                    base_delay: Duration::from_millis(retry_delay_ms),
                },
            },
            auth: AuthConfig {
                jwt_secret,
                jwt_ttl_days: parse_var("JWT_TTL_DAYS", "30")?,
            },
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var("PORT", "5000")?,
            ledger_backend: std::env::var("LEDGER_BACKEND")
                .unwrap_or_else(|_| "sqlite".to_string())
                .parse()?,
            data_dir: std::env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            round_up_increment,
            pending_decision_ttl: Duration::from_secs(ttl_secs),
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(api_key: String, jwt_secret: String) -> Self {
        Self {
            llm: LlmConfig {
                api_key,
                model: "gemini-2.0-flash".to_string(),
                retry: RetryConfig::default(),
            },
            auth: AuthConfig {
                jwt_secret,
                jwt_ttl_days: 30,
            },
            host: "127.0.0.1".to_string(),
            port: 5000,
            ledger_backend: LedgerBackend::Memory,
            data_dir: PathBuf::from("./data"),
            round_up_increment: 10.0,
            pending_decision_ttl: Duration::from_secs(600),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_backend_parses_case_insensitively() {
        assert_eq!("SQLite".parse::<LedgerBackend>().unwrap(), LedgerBackend::Sqlite);
        assert_eq!(" memory ".parse::<LedgerBackend>().unwrap(), LedgerBackend::Memory);
        assert!("mongo".parse::<LedgerBackend>().is_err());
    }

    #[test]
    fn test_config_default_retry_envelope() {
        let config = Config::new("key".to_string(), "secret".to_string());
        assert_eq!(config.llm.retry.max_attempts, 3);
        assert_eq!(config.llm.retry.base_delay, Duration::from_secs(1));
        assert_eq!(config.round_up_increment, 10.0);
    }
}
