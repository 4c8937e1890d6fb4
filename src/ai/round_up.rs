//! Rounding expenses up and diverting the difference into savings.

use serde::Deserialize;

use super::reply::{parse_object, ReplyError};
use crate::llm::CompletionGateway;

/// Round to whole cents.
pub fn to_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Smallest multiple of `increment` that is `>= amount`.
pub fn ceil_to_increment(amount: f64, increment: f64) -> f64 {
    let steps = (to_cents(amount) / increment - 1e-9).ceil();
    to_cents(steps * increment).max(amount)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustmentSource {
    Model,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundUpAdjustment {
    pub original: f64,
    pub adjusted: f64,
    pub source: AdjustmentSource,
}

impl RoundUpAdjustment {
    /// Never negative.
    pub fn added(&self) -> f64 {
        to_cents(self.adjusted - self.original).max(0.0)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RoundedReply {
    rounded_amount: f64,
}

pub fn round_up_prompt(amount: f64, increment: f64) -> String {
    format!(
        r#"You are a savings assistant that rounds purchases up so the spare change can be saved.

Round the expense amount {amount} up to the next multiple of {increment}.
If it already is a multiple of {increment}, keep it unchanged.

Reply with a single JSON object and nothing else:
{{"roundedAmount": <number>}}"#,
        amount = amount,
        increment = increment,
    )
}

/// Accept the model's figure only if it is exactly the next multiple of
/// `increment` at or above `original`, to the cent.
pub fn parse_rounded(reply: &str, original: f64, increment: f64) -> Result<f64, ReplyError> {
    let parsed: RoundedReply = parse_object(reply)?;
    let rounded = parsed.rounded_amount;
    let expected = ceil_to_increment(original, increment);
    if !rounded.is_finite() || (rounded - expected).abs() > 0.005 {
        return Err(ReplyError::Invalid(format!(
            "rounded amount {} is not {} rounded up to a multiple of {} ({})",
            rounded, original, increment, expected
        )));
    }
    Ok(expected)
}

#[derive(Clone)]
pub struct RoundUpAdjuster {
    gateway: CompletionGateway,
    increment: f64,
}

impl RoundUpAdjuster {
    pub fn new(gateway: CompletionGateway, increment: f64) -> Self {
        Self { gateway, increment }
    }

    pub fn increment(&self) -> f64 {
        self.increment
    }

    /// Ask the model for the rounded amount; fall back to local arithmetic
    /// when the call fails or the reply is unusable.
    pub async fn adjust(&self, original: f64) -> RoundUpAdjustment {
        let model_result = match self
            .gateway
            .complete(&round_up_prompt(original, self.increment))
            .await
        {
            Ok(reply) => parse_rounded(&reply, original, self.increment).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match model_result {
            Ok(adjusted) => RoundUpAdjustment {
                original,
                adjusted,
                source: AdjustmentSource::Model,
            },
            Err(reason) => {
                let adjusted = ceil_to_increment(original, self.increment);
                tracing::warn!(
                    "Round-up via model failed ({}), rounding {} locally to {}",
                    reason,
                    original,
                    adjusted
                );
                RoundUpAdjustment {
                    original,
                    adjusted,
                    source: AdjustmentSource::Fallback,
                }
            }
        }
    }
}
