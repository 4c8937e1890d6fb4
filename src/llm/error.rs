//! Completion failures and the retry envelope around them.
//!
//! The gateway retries every failed attempt, so the kind recorded here only
//! feeds logs and error messages.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// HTTP 429
    RateLimited,
    /// HTTP 5xx, or any status we don't recognise
    ServerError,
    /// Other HTTP 4xx (bad request, bad key, unknown model)
    ClientError,
    /// No HTTP response at all
    NetworkError,
    /// A response arrived but carried no usable text
    ParseError,
}

impl LlmErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmErrorKind::RateLimited => "rate limited",
            LlmErrorKind::ServerError => "server error",
            LlmErrorKind::ClientError => "client error",
            LlmErrorKind::NetworkError => "network error",
            LlmErrorKind::ParseError => "unreadable response",
        }
    }
}

impl std::fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn classify_http_status(status: u16) -> LlmErrorKind {
    match status {
        429 => LlmErrorKind::RateLimited,
        400..=499 => LlmErrorKind::ClientError,
        _ => LlmErrorKind::ServerError,
    }
}

/// One failed completion attempt.
#[derive(Debug, Clone, Error)]
#[error("{kind}{}: {message}", http_suffix(.status_code))]
pub struct LlmError {
    pub kind: LlmErrorKind,
    pub status_code: Option<u16>,
    pub message: String,
}

fn http_suffix(status_code: &Option<u16>) -> String {
    status_code
        .map(|code| format!(" (HTTP {})", code))
        .unwrap_or_default()
}

impl LlmError {
    pub fn new(kind: LlmErrorKind, status_code: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind,
            status_code,
            message: message.into(),
        }
    }

    /// Non-success HTTP response; `body` becomes the message.
    pub fn from_status(status_code: u16, body: &str) -> Self {
        Self::new(classify_http_status(status_code), Some(status_code), body)
    }

    pub fn server_error(status_code: u16, message: String) -> Self {
        Self::new(LlmErrorKind::ServerError, Some(status_code), message)
    }

    pub fn client_error(status_code: u16, message: String) -> Self {
        Self::new(LlmErrorKind::ClientError, Some(status_code), message)
    }

    pub fn network_error(message: String) -> Self {
        Self::new(LlmErrorKind::NetworkError, None, message)
    }

    pub fn parse_error(message: String) -> Self {
        Self::new(LlmErrorKind::ParseError, None, message)
    }
}

/// Attempts per gateway call and the linear backoff between them.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Including the first attempt
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryConfig {
    /// Wait after failed attempt `attempt` (1-based): `attempt * base_delay`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Failed to generate content after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: LlmError },
}

impl GatewayError {
    pub fn last_error(&self) -> &LlmError {
        match self {
            GatewayError::Exhausted { last, .. } => last,
        }
    }
}
