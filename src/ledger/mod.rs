//! Ledger storage with pluggable backends.
//!
//! Supports:
//! - `memory`: In-memory storage (non-persistent, for testing)
//! - `sqlite`: SQLite database file under the data directory

mod memory;
mod sqlite;
mod types;

pub use memory::InMemoryLedgerStore;
pub use sqlite::SqliteLedgerStore;
pub use types::{
    Budget, Category, GoalPriority, Income, PaymentMethod, RoundUp, SavingsGoal, Transaction,
    TransactionType, User,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Field-level validation failures, already human readable.
    #[error("{}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("{0}")]
    Duplicate(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Storage error: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        StoreError::Backend(format!("Task join error: {}", e))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Filter for transaction listings. Results are ordered newest `date` first.
#[derive(Debug, Clone, Default)]
pub struct TransactionQuery {
    pub user_id: Uuid,
    pub kind: Option<TransactionType>,
    pub category: Option<Category>,
    pub regretted: Option<bool>,
    /// Inclusive lower bound on `date`
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `date`
    pub to: Option<DateTime<Utc>>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl TransactionQuery {
    pub fn for_user(user_id: Uuid) -> Self {
        Self {
            user_id,
            ..Self::default()
        }
    }

    pub fn kind(mut self, kind: TransactionType) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn regretted(mut self, regretted: bool) -> Self {
        self.regretted = Some(regretted);
        self
    }

    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }

    /// Whether a transaction passes every filter (pagination aside).
    pub fn matches(&self, tx: &Transaction) -> bool {
        tx.user_id == self.user_id
            && self.kind.map_or(true, |k| tx.kind == k)
            && self.category.map_or(true, |c| tx.category == c)
            && self.regretted.map_or(true, |r| tx.regret_feedback == r)
            && self.from.map_or(true, |from| tx.date >= from)
            && self.to.map_or(true, |to| tx.date < to)
    }
}

/// Filter for budget listings.
#[derive(Debug, Clone, Default)]
pub struct BudgetQuery {
    pub user_id: Uuid,
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub category: Option<Category>,
}

impl BudgetQuery {
    pub fn matches(&self, budget: &Budget) -> bool {
        budget.user_id == self.user_id
            && self.month.map_or(true, |m| budget.month == m)
            && self.year.map_or(true, |y| budget.year == y)
            && self.category.map_or(true, |c| budget.category == c)
    }
}

pub(crate) fn validated<T>(
    value: T,
    check: impl FnOnce(&T) -> Result<(), Vec<String>>,
) -> StoreResult<T> {
    check(&value).map_err(StoreError::Validation)?;
    Ok(value)
}

pub(crate) fn duplicate_budget(budget: &Budget) -> StoreError {
    StoreError::Duplicate(format!(
        "Budget for {} already exists for {}/{}",
        budget.category, budget.month, budget.year
    ))
}

/// Ledger store trait, implemented by all storage backends.
///
/// Every record is owned by exactly one user; ownership checks happen in the
/// API layer, the store only filters by `user_id` where a listing asks for it.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Whether this store persists data across restarts.
    fn is_persistent(&self) -> bool;

    // Users

    /// Create a user. Emails are unique (case-insensitive).
    async fn create_user(&self, user: User) -> StoreResult<User>;
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn set_round_up_enabled(&self, id: Uuid, enabled: bool) -> StoreResult<User>;

    // Transactions

    async fn insert_transaction(&self, tx: Transaction) -> StoreResult<Transaction>;
    async fn get_transaction(&self, id: Uuid) -> StoreResult<Option<Transaction>>;
    async fn update_transaction(&self, tx: Transaction) -> StoreResult<Transaction>;
    async fn delete_transaction(&self, id: Uuid) -> StoreResult<bool>;
    async fn find_transactions(&self, query: &TransactionQuery) -> StoreResult<Vec<Transaction>>;
    async fn count_transactions(&self, query: &TransactionQuery) -> StoreResult<usize>;

    /// Persist a transaction together with its round-up record, if any.
    /// Either both rows are written or neither is.
    async fn commit_transaction(
        &self,
        tx: Transaction,
        round_up: Option<f64>,
    ) -> StoreResult<(Transaction, Option<RoundUp>)>;

    // Budgets

    /// At most one budget per (user, month, year, category).
    async fn insert_budget(&self, budget: Budget) -> StoreResult<Budget>;
    async fn get_budget(&self, id: Uuid) -> StoreResult<Option<Budget>>;
    async fn update_budget(&self, budget: Budget) -> StoreResult<Budget>;
    async fn delete_budget(&self, id: Uuid) -> StoreResult<bool>;
    /// Ordered by year, month, then category.
    async fn find_budgets(&self, query: &BudgetQuery) -> StoreResult<Vec<Budget>>;

    // Savings goals

    async fn insert_goal(&self, goal: SavingsGoal) -> StoreResult<SavingsGoal>;
    async fn get_goal(&self, id: Uuid) -> StoreResult<Option<SavingsGoal>>;
    async fn update_goal(&self, goal: SavingsGoal) -> StoreResult<SavingsGoal>;
    async fn delete_goal(&self, id: Uuid) -> StoreResult<bool>;
    /// Ordered by target date, soonest first.
    async fn list_goals(&self, user_id: Uuid) -> StoreResult<Vec<SavingsGoal>>;

    /// Save a goal whose amount moved and write the matching ledger entry,
    /// atomically.
    async fn record_goal_movement(
        &self,
        goal: SavingsGoal,
        entry: Transaction,
    ) -> StoreResult<(SavingsGoal, Transaction)>;

    // Round-ups

    /// Newest first.
    async fn list_round_ups(&self, user_id: Uuid) -> StoreResult<Vec<RoundUp>>;
    async fn total_round_ups(&self, user_id: Uuid) -> StoreResult<f64>;

    // Income

    async fn insert_income(&self, income: Income) -> StoreResult<Income>;
    async fn get_income(&self, id: Uuid) -> StoreResult<Option<Income>>;
    async fn update_income(&self, income: Income) -> StoreResult<Income>;
    async fn delete_income(&self, id: Uuid) -> StoreResult<bool>;
    /// Newest first.
    async fn list_income(&self, user_id: Uuid) -> StoreResult<Vec<Income>>;
}

/// Build the round-up record that accompanies a committed transaction.
pub(crate) fn round_up_for(tx: &Transaction, added_amount: f64) -> StoreResult<RoundUp> {
    if !added_amount.is_finite() || added_amount < 0.0 {
        return Err(StoreError::Validation(vec![
            "Round-up amount cannot be negative".to_string(),
        ]));
    }
    Ok(RoundUp {
        id: Uuid::new_v4(),
        user_id: tx.user_id,
        transaction_id: tx.id,
        added_amount,
        created_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_joins_messages() {
        let err = StoreError::Validation(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(err.to_string(), "a, b");
    }

    #[test]
    fn query_filters_compose() {
        let user = Uuid::new_v4();
        let mut tx = Transaction::new(
            user,
            12.0,
            TransactionType::Expense,
            Category::Food,
            "lunch",
            PaymentMethod::Cash,
        );
        let q = TransactionQuery::for_user(user)
            .kind(TransactionType::Expense)
            .category(Category::Food);
        assert!(q.matches(&tx));
        assert!(!q.clone().regretted(true).matches(&tx));
        tx.regret_feedback = true;
        assert!(q.regretted(true).matches(&tx));
        assert!(!TransactionQuery::for_user(Uuid::new_v4()).matches(&tx));
    }
}
