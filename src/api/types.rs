//! API request types and input parsing helpers.
//!
//! Request bodies use optional fields so that missing values surface as
//! readable 400 messages instead of generic deserialization failures.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{ApiError, ApiResult};
use crate::ledger::{Category, GoalPriority, PaymentMethod, TransactionType};

// ─────────────────────────────────────────────────────────────────────────────
// Auth
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub monthly_income: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// User summary returned by register/login, carrying the bearer token.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub monthly_income: f64,
    pub round_up_enabled: bool,
    pub token: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// AI
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceCommandRequest {
    pub command: Option<String>,
    pub confirm_regret: Option<bool>,
    /// Token from an earlier regret warning; replaces `command`
    pub decision_token: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffordabilityRequest {
    pub item_name: Option<String>,
    pub item_price: Option<f64>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegretRadarRequest {
    pub item_name: Option<String>,
    pub item_price: Option<f64>,
    pub category: Option<String>,
    pub current_mood: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Regret feedback
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct RegretCommandRequest {
    pub command: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegretTransactionRequest {
    pub transaction_id: Option<Uuid>,
    pub notes: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Ledger CRUD
// ─────────────────────────────────────────────────────────────────────────────

/// Body for creating or updating a transaction. On update, absent fields
/// keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub amount: Option<f64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub payment_method: Option<String>,
    pub regret_feedback: Option<bool>,
    pub regret_notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetRequest {
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub category: Option<String>,
    pub amount: Option<f64>,
    pub notes: Option<String>,
}

/// `?month&year`; unparsable values fall back to the current period.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PeriodQuery {
    pub month: Option<String>,
    pub year: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalRequest {
    pub name: Option<String>,
    pub target_amount: Option<f64>,
    pub current_amount: Option<f64>,
    pub target_date: Option<String>,
    pub priority: Option<String>,
    pub notes: Option<String>,
    pub is_completed: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoalListQuery {
    pub completed: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgressRequest {
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncomeRequest {
    pub amount: Option<f64>,
    pub source: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundUpPreferenceRequest {
    /// Kept loose so a non-boolean gets the dedicated 400 message.
    pub round_up_enabled: Option<serde_json::Value>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Parsing helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Non-blank text, trimmed.
pub fn required_text(value: Option<&str>, message: &str) -> ApiResult<String> {
    match value.map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => Err(ApiError::Validation(message.to_string())),
    }
}

pub fn required_amount(value: Option<f64>, message: &str) -> ApiResult<f64> {
    value
        .filter(|v| v.is_finite())
        .ok_or_else(|| ApiError::Validation(message.to_string()))
}

/// Category from REST input; accepts legacy lowercase spellings.
pub fn parse_category(raw: &str) -> ApiResult<Category> {
    raw.parse().map_err(ApiError::Validation)
}

pub fn parse_kind(raw: &str) -> ApiResult<TransactionType> {
    raw.trim().to_lowercase().parse().map_err(ApiError::Validation)
}

pub fn parse_payment_method(raw: &str) -> ApiResult<PaymentMethod> {
    raw.parse().map_err(ApiError::Validation)
}

pub fn parse_priority(raw: &str) -> ApiResult<GoalPriority> {
    raw.trim().to_lowercase().parse().map_err(ApiError::Validation)
}

fn parse_day(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

fn start_of_day(day: NaiveDate) -> Option<DateTime<Utc>> {
    day.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc())
}

/// Stored dates sort as text, which needs a four-digit year.
fn four_digit_year(ts: DateTime<Utc>, raw: &str) -> ApiResult<DateTime<Utc>> {
    if (0..=9999).contains(&ts.year()) {
        Ok(ts)
    } else {
        Err(ApiError::Validation(format!(
            "Date '{}' is outside the years 0000-9999",
            raw
        )))
    }
}

/// RFC 3339 timestamp or a bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_date(raw: &str) -> ApiResult<DateTime<Utc>> {
    let raw = raw.trim();
    let ts = match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => ts.with_timezone(&Utc),
        Err(_) => parse_day(raw)
            .and_then(start_of_day)
            .ok_or_else(|| ApiError::Validation(format!("Invalid date '{}'", raw)))?,
    };
    four_digit_year(ts, raw)
}

/// Exclusive upper bound for an inclusive end date. A bare day covers the
/// whole day; a timestamp covers itself.
pub fn exclusive_end(raw: &str) -> ApiResult<DateTime<Utc>> {
    let raw = raw.trim();
    let end = match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => ts.with_timezone(&Utc) + Duration::microseconds(1),
        Err(_) => parse_day(raw)
            .and_then(|day| day.succ_opt())
            .and_then(start_of_day)
            .ok_or_else(|| ApiError::Validation(format!("Invalid date '{}'", raw)))?,
    };
    four_digit_year(end, raw)
}

/// Lenient positive integer from a query string, like `parseInt(x) || default`.
pub fn positive_or(raw: Option<&str>, default: usize) -> usize {
    raw.and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn dates_accept_rfc3339_and_bare_days() {
        assert_eq!(
            parse_date("2024-05-03").unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 3, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_date("2024-05-03T10:00:00+02:00").unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 3, 8, 0, 0).unwrap()
        );
        assert_eq!(
            exclusive_end("2024-05-31").unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
        );
        assert!(parse_date("yesterday").is_err());
    }

    #[test]
    fn vocabulary_parsers_are_lenient_on_case() {
        assert_eq!(parse_category("food").unwrap(), Category::Food);
        assert_eq!(parse_kind("Expense").unwrap(), TransactionType::Expense);
        assert_eq!(parse_priority("HIGH").unwrap(), GoalPriority::High);
        assert!(parse_category("Crypto").is_err());
    }

    #[test]
    fn query_numbers_fall_back_to_defaults() {
        assert_eq!(positive_or(Some("3"), 1), 3);
        assert_eq!(positive_or(Some("zero"), 10), 10);
        assert_eq!(positive_or(Some("0"), 10), 10);
        assert_eq!(positive_or(None, 10), 10);
        assert_eq!(positive_or(Some("-4"), 10), 10);
        assert_eq!(positive_or(Some(" 7 "), 10), 7);
        assert_eq!(positive_or(Some("99999999999999999999999"), 10), 10);
        assert_eq!(positive_or(Some("18446744073709551615"), 10), usize::MAX);
    }

    #[test]
    fn dates_outside_four_digit_years_are_rejected() {
        assert!(parse_date("+10000-01-01").is_err());
        assert!(parse_date("0000-01-01T00:00:00+01:00").is_err());
        assert!(exclusive_end("9999-12-31").is_err());
        assert!(parse_date("9999-12-31").is_ok());
        assert!(parse_date("0000-01-01").is_ok());
    }
}
