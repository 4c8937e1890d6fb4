//! Ledger entities and the closed vocabularies they share.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Vocabularies
// ─────────────────────────────────────────────────────────────────────────────

/// Direction of money flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(TransactionType::Income),
            "expense" => Ok(TransactionType::Expense),
            other => Err(format!("Invalid transaction type '{}'", other)),
        }
    }
}

/// The one category vocabulary used by transactions, budgets and the
/// command interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Salary,
    Investment,
    Freelance,
    Gift,
    OtherIncome,
    Housing,
    Food,
    Transportation,
    Utilities,
    Entertainment,
    Healthcare,
    Education,
    Shopping,
    Bills,
    Debt,
    Savings,
    OtherExpense,
}

impl Category {
    pub const ALL: [Category; 17] = [
        Category::Salary,
        Category::Investment,
        Category::Freelance,
        Category::Gift,
        Category::OtherIncome,
        Category::Housing,
        Category::Food,
        Category::Transportation,
        Category::Utilities,
        Category::Entertainment,
        Category::Healthcare,
        Category::Education,
        Category::Shopping,
        Category::Bills,
        Category::Debt,
        Category::Savings,
        Category::OtherExpense,
    ];

    /// Canonical spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Salary => "Salary",
            Category::Investment => "Investment",
            Category::Freelance => "Freelance",
            Category::Gift => "Gift",
            Category::OtherIncome => "other-income",
            Category::Housing => "Housing",
            Category::Food => "Food",
            Category::Transportation => "Transportation",
            Category::Utilities => "Utilities",
            Category::Entertainment => "Entertainment",
            Category::Healthcare => "Healthcare",
            Category::Education => "Education",
            Category::Shopping => "Shopping",
            Category::Bills => "Bills",
            Category::Debt => "Debt",
            Category::Savings => "Savings",
            Category::OtherExpense => "other-expense",
        }
    }

    /// Whether this category classifies income or expenses.
    pub fn kind(&self) -> TransactionType {
        match self {
            Category::Salary
            | Category::Investment
            | Category::Freelance
            | Category::Gift
            | Category::OtherIncome => TransactionType::Income,
            _ => TransactionType::Expense,
        }
    }

    /// Exact match against the canonical spelling only.
    pub fn from_canonical(s: &str) -> Option<Category> {
        Category::ALL.iter().copied().find(|c| c.as_str() == s)
    }

    /// Categories of the given kind, in canonical order.
    pub fn of_kind(kind: TransactionType) -> impl Iterator<Item = Category> {
        Category::ALL.into_iter().filter(move |c| c.kind() == kind)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the canonical spelling and any casing of it, so legacy lowercase
/// values (`food`, `housing`, `savings`) normalise to one variant.
impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| format!("Invalid category '{}'", trimmed))
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentMethod {
    Cash,
    CreditCard,
    DebitCard,
    BankTransfer,
    MobilePayment,
    #[default]
    Other,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 6] = [
        PaymentMethod::Cash,
        PaymentMethod::CreditCard,
        PaymentMethod::DebitCard,
        PaymentMethod::BankTransfer,
        PaymentMethod::MobilePayment,
        PaymentMethod::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::CreditCard => "credit-card",
            PaymentMethod::DebitCard => "debit-card",
            PaymentMethod::BankTransfer => "bank-transfer",
            PaymentMethod::MobilePayment => "mobile-payment",
            PaymentMethod::Other => "other",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentMethod::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("Invalid payment method '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl GoalPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalPriority::Low => "low",
            GoalPriority::Medium => "medium",
            GoalPriority::High => "high",
        }
    }
}

impl FromStr for GoalPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(GoalPriority::Low),
            "medium" => Ok(GoalPriority::Medium),
            "high" => Ok(GoalPriority::High),
            other => Err(format!("Invalid priority '{}'", other)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Entities
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub monthly_income: f64,
    pub round_up_enabled: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    #[serde(rename = "user")]
    pub user_id: Uuid,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub category: Category,
    /// Free text; for AI-captured entries this is the original command.
    pub description: String,
    pub date: DateTime<Utc>,
    pub payment_method: PaymentMethod,
    pub regret_feedback: bool,
    pub regret_notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// A fresh, unflagged transaction dated now.
    pub fn new(
        user_id: Uuid,
        amount: f64,
        kind: TransactionType,
        category: Category,
        description: impl Into<String>,
        payment_method: PaymentMethod,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            amount,
            kind,
            category,
            description: description.into(),
            date: now,
            payment_method,
            regret_feedback: false,
            regret_notes: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if !self.amount.is_finite() {
            errors.push("Please add a transaction amount".to_string());
        } else if self.amount < 0.0 {
            errors.push("Transaction amount cannot be negative".to_string());
        }
        if self.description.trim().is_empty() {
            errors.push("Please add a description".to_string());
        }
        finish(errors)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub id: Uuid,
    #[serde(rename = "user")]
    pub user_id: Uuid,
    pub month: u32,
    pub year: i32,
    pub category: Category,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Budget {
    pub fn new(user_id: Uuid, month: u32, year: i32, category: Category, amount: f64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            month,
            year,
            category,
            amount,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if !(1..=12).contains(&self.month) {
            errors.push("Please specify month (1-12)".to_string());
        }
        if !(2000..=2100).contains(&self.year) {
            errors.push("Year must be between 2000 and 2100".to_string());
        }
        if self.category.kind() != TransactionType::Expense {
            errors.push(format!(
                "Budgets can only be set for expense categories, not '{}'",
                self.category
            ));
        }
        if !self.amount.is_finite() || self.amount < 0.0 {
            errors.push("Please add a budget amount of at least 0".to_string());
        }
        finish(errors)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsGoal {
    pub id: Uuid,
    #[serde(rename = "user")]
    pub user_id: Uuid,
    pub name: String,
    pub target_amount: f64,
    pub current_amount: f64,
    pub target_date: DateTime<Utc>,
    pub priority: GoalPriority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SavingsGoal {
    /// Recompute `is_completed` from the amounts.
    pub fn refresh_completion(&mut self) {
        self.is_completed = self.current_amount >= self.target_amount;
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push("Please add a name for your savings goal".to_string());
        }
        if !self.target_amount.is_finite() || self.target_amount < 1.0 {
            errors.push("Target amount must be at least 1".to_string());
        }
        if !self.current_amount.is_finite() || self.current_amount < 0.0 {
            errors.push("Current amount cannot be negative".to_string());
        }
        finish(errors)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundUp {
    pub id: Uuid,
    #[serde(rename = "user")]
    pub user_id: Uuid,
    #[serde(rename = "transaction")]
    pub transaction_id: Uuid,
    pub added_amount: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Income {
    pub id: Uuid,
    #[serde(rename = "user")]
    pub user_id: Uuid,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub date: DateTime<Utc>,
}

impl Income {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        if !self.amount.is_finite() {
            return Err(vec!["Amount is required and must be a number.".to_string()]);
        }
        let mut errors = Vec::new();
        if self.amount <= 0.0 {
            errors.push("Income amount must be greater than 0".to_string());
        }
        finish(errors)
    }
}

fn finish(errors: Vec<String>) -> Result<(), Vec<String>> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn income_amount_must_be_positive() {
        let mut income = Income {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            amount: 10.0,
            source: None,
            date: Utc::now(),
        };
        assert!(income.validate().is_ok());
        for amount in [0.0, -5.0] {
            income.amount = amount;
            assert_eq!(
                income.validate(),
                Err(vec!["Income amount must be greater than 0".to_string()])
            );
        }
        income.amount = f64::NAN;
        assert!(income.validate().is_err());
    }

    #[test]
    fn canonical_lookup_is_case_sensitive() {
        assert_eq!(Category::from_canonical("Shopping"), Some(Category::Shopping));
        assert_eq!(Category::from_canonical("shopping"), None);
        assert_eq!(Category::from_canonical("other-income"), Some(Category::OtherIncome));
        assert_eq!(Category::from_canonical("Crypto"), None);
    }

    #[test]
    fn lenient_parse_normalises_legacy_spellings() {
        assert_eq!("food".parse::<Category>().unwrap(), Category::Food);
        assert_eq!("housing".parse::<Category>().unwrap(), Category::Housing);
        assert_eq!("savings".parse::<Category>().unwrap(), Category::Savings);
        assert_eq!("Other-Expense".parse::<Category>().unwrap(), Category::OtherExpense);
        assert!("groceries".parse::<Category>().is_err());
    }

    #[test]
    fn category_kinds_partition_vocabulary() {
        let income: Vec<_> = Category::of_kind(TransactionType::Income).collect();
        let expense: Vec<_> = Category::of_kind(TransactionType::Expense).collect();
        assert_eq!(income.len(), 5);
        assert_eq!(expense.len(), 12);
        assert!(expense.contains(&Category::Bills));
        assert!(expense.contains(&Category::Debt));
    }

    #[test]
    fn category_serde_uses_canonical_spelling() {
        let json = serde_json::to_string(&Category::OtherExpense).unwrap();
        assert_eq!(json, "\"other-expense\"");
        let parsed: Category = serde_json::from_str("\"utilities\"").unwrap();
        assert_eq!(parsed, Category::Utilities);
    }

    #[test]
    fn payment_method_round_trips_kebab_case() {
        let json = serde_json::to_string(&PaymentMethod::MobilePayment).unwrap();
        assert_eq!(json, "\"mobile-payment\"");
        assert_eq!("credit-card".parse::<PaymentMethod>().unwrap(), PaymentMethod::CreditCard);
        assert!("cheque".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn budget_rejects_income_category_and_bad_month() {
        let now = Utc::now();
        let budget = Budget {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            month: 13,
            year: 2024,
            category: Category::Salary,
            amount: 100.0,
            notes: None,
            created_at: now,
            updated_at: now,
        };
        let errors = budget.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn goal_completion_follows_amounts() {
        let now = Utc::now();
        let mut goal = SavingsGoal {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Bike".to_string(),
            target_amount: 500.0,
            current_amount: 499.0,
            target_date: now,
            priority: GoalPriority::default(),
            notes: None,
            is_completed: true,
            created_at: now,
            updated_at: now,
        };
        goal.refresh_completion();
        assert!(!goal.is_completed);
        goal.current_amount = 500.0;
        goal.refresh_completion();
        assert!(goal.is_completed);
    }
}
