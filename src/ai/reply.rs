//! Pulling structured data out of free-text model replies.

use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("reply contains no JSON object")]
    NoObject,

    #[error("reply is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Invalid(String),
}

/// The span from the first `{` to the last `}` of a reply, inclusive.
pub fn json_span(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&reply[start..=end])
}

/// Locate the JSON object in `reply` and deserialize it.
pub fn parse_object<T: DeserializeOwned>(reply: &str) -> Result<T, ReplyError> {
    let span = json_span(reply).ok_or(ReplyError::NoObject)?;
    Ok(serde_json::from_str(span)?)
}

/// Reject empty or whitespace-only text fields.
pub fn require_text(field: &str, value: &str) -> Result<(), ReplyError> {
    if value.trim().is_empty() {
        Err(ReplyError::Invalid(format!("'{}' is empty", field)))
    } else {
        Ok(())
    }
}

/// Reject empty lists and lists holding blank entries.
pub fn require_items(field: &str, values: &[String]) -> Result<(), ReplyError> {
    if values.is_empty() {
        return Err(ReplyError::Invalid(format!("'{}' has no entries", field)));
    }
    values.iter().try_for_each(|v| require_text(field, v))
}
