//! Turns free-text money commands into structured intents.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::reply::{parse_object, ReplyError};
use crate::ledger::{Category, PaymentMethod, TransactionType};
use crate::llm::{CompletionGateway, GatewayError};

#[derive(Debug, Error)]
pub enum InterpretError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Invalid response from AI: {0}")]
    InvalidAiResponse(String),
}

impl From<ReplyError> for InterpretError {
    fn from(e: ReplyError) -> Self {
        InterpretError::InvalidAiResponse(e.to_string())
    }
}

/// A validated transaction intent. `amount` is always positive.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedIntent {
    pub amount: f64,
    pub category: Category,
    pub payment_method: PaymentMethod,
    #[serde(rename = "type")]
    pub kind: TransactionType,
}

/// What a user regrets, as extracted from a feedback sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct RegretReport {
    pub category: Category,
    pub product_keyword: String,
    pub notes: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawIntent {
    amount: Option<f64>,
    category: Option<String>,
    payment_method: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRegretReport {
    category: Option<String>,
    product_keyword: Option<String>,
    notes: Option<String>,
}

fn bullet_list<I: IntoIterator<Item = &'static str>>(items: I) -> String {
    items
        .into_iter()
        .map(|s| format!("- {}", s))
        .collect::<Vec<_>>()
        .join("\n")
}

fn category_list() -> String {
    bullet_list(Category::ALL.iter().map(|c| c.as_str()))
}

pub fn categorize_prompt(command: &str) -> String {
    format!(
        r#"You are a financial assistant for a budget planning website.

Given a user message like:
"I spent 100 for buying chocolate with cash"

Your task:
- Extract the amount as a number.
- Assign a category from the strict list below, spelled exactly as shown.
- Assign a payment method and a type from their lists.

Valid categories:
{categories}

Valid payment methods:
{methods}

Valid types:
- income
- expense

Reply with a single JSON object and nothing else, for example:
{{"amount": 100, "category": "Shopping", "paymentMethod": "cash", "type": "expense"}}

User message: "{command}""#,
        categories = category_list(),
        methods = bullet_list(PaymentMethod::ALL.iter().map(|m| m.as_str())),
        command = command,
    )
}

pub fn keyword_prompt(command: &str) -> String {
    format!(
        r#"You are a financial assistant.

Extract the main product or item name from this user message:
"{}"

Respond with just the product keyword or short phrase."#,
        command
    )
}

pub fn regret_feedback_prompt(command: &str) -> String {
    format!(
        r#"You are a financial assistant.

A user describes a purchase they regret, for example:
"I bought a Fitbit, used it for two days and then stopped, I regret buying it."

Extract:
- category (spelled exactly as one of the categories below)
- productKeyword (the main item name)
- notes (a brief reason or sentiment)

Valid categories:
{}

Reply with a single JSON object and nothing else, for example:
{{"category": "Shopping", "productKeyword": "Fitbit", "notes": "used it for two days then stopped"}}

User message: "{}""#,
        category_list(),
        command
    )
}

fn strict_category(raw: Option<&str>) -> Result<Category, InterpretError> {
    let raw = raw.ok_or_else(|| InterpretError::InvalidAiResponse("missing category".to_string()))?;
    Category::from_canonical(raw.trim())
        .ok_or_else(|| InterpretError::InvalidAiResponse(format!("Invalid category '{}'", raw)))
}

/// Validate a categorisation reply against the closed vocabularies.
pub fn parse_intent(reply: &str) -> Result<ParsedIntent, InterpretError> {
    let raw: RawIntent = parse_object(reply)?;

    let amount = raw
        .amount
        .filter(|a| a.is_finite() && *a != 0.0)
        .ok_or_else(|| {
            InterpretError::InvalidAiResponse("Failed to extract amount".to_string())
        })?
        .abs();

    let category = strict_category(raw.category.as_deref())?;

    let kind = match raw.kind.as_deref().map(str::trim) {
        None | Some("") => category.kind(),
        Some(s) => s.parse().map_err(InterpretError::InvalidAiResponse)?,
    };
    if kind != category.kind() {
        return Err(InterpretError::InvalidAiResponse(format!(
            "type '{}' does not match category '{}'",
            kind.as_str(),
            category
        )));
    }

    let payment_method = match raw.payment_method.as_deref().map(str::trim) {
        None | Some("") => PaymentMethod::Other,
        Some(s) => s.parse().map_err(InterpretError::InvalidAiResponse)?,
    };

    Ok(ParsedIntent {
        amount,
        category,
        payment_method,
        kind,
    })
}

/// First line of the reply without surrounding quotes or trailing punctuation.
pub fn clean_keyword(reply: &str) -> String {
    let is_quote = |c: char| matches!(c, '"' | '\'' | '`' | '*');
    let is_punct = |c: char| matches!(c, '.' | ',' | '!' | '?' | ';' | ':');

    let line = reply.trim().lines().next().unwrap_or_default();
    line.trim()
        .trim_end_matches(is_punct)
        .trim_matches(is_quote)
        .trim_end_matches(is_punct)
        .trim()
        .to_string()
}

pub fn parse_regret_report(reply: &str) -> Result<RegretReport, InterpretError> {
    let raw: RawRegretReport = parse_object(reply)?;
    let category = strict_category(raw.category.as_deref())?;
    let product_keyword = raw
        .product_keyword
        .as_deref()
        .map(clean_keyword)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| {
            InterpretError::InvalidAiResponse("Invalid regret feedback data".to_string())
        })?;

    Ok(RegretReport {
        category,
        product_keyword,
        notes: raw.notes.unwrap_or_default().trim().to_string(),
    })
}

/// Prompts the gateway and validates what comes back.
#[derive(Clone)]
pub struct CommandInterpreter {
    gateway: CompletionGateway,
}

impl CommandInterpreter {
    pub fn new(gateway: CompletionGateway) -> Self {
        Self { gateway }
    }

    pub async fn interpret(&self, command: &str) -> Result<ParsedIntent, InterpretError> {
        let reply = self.gateway.complete(&categorize_prompt(command)).await?;
        tracing::debug!("Categorisation reply: {}", reply);
        parse_intent(&reply).map_err(|e| {
            tracing::warn!("Rejected categorisation reply: {}", e);
            e
        })
    }

    /// May return an empty string, which matches nothing downstream.
    pub async fn extract_keyword(&self, command: &str) -> Result<String, InterpretError> {
        let reply = self.gateway.complete(&keyword_prompt(command)).await?;
        Ok(clean_keyword(&reply))
    }

    pub async fn parse_regret_feedback(
        &self,
        command: &str,
    ) -> Result<RegretReport, InterpretError> {
        let reply = self
            .gateway
            .complete(&regret_feedback_prompt(command))
            .await?;
        parse_regret_report(&reply)
    }
}
