//! In-memory ledger store (non-persistent).

use super::{
    duplicate_budget, round_up_for, validated, Budget, BudgetQuery, Income, LedgerStore, RoundUp,
    SavingsGoal, StoreError, StoreResult, Transaction, TransactionQuery, User,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Ledger {
    users: HashMap<Uuid, User>,
    transactions: HashMap<Uuid, Transaction>,
    budgets: HashMap<Uuid, Budget>,
    goals: HashMap<Uuid, SavingsGoal>,
    round_ups: HashMap<Uuid, RoundUp>,
    income: HashMap<Uuid, Income>,
}

impl Ledger {
    fn budget_slot_taken(&self, budget: &Budget) -> bool {
        self.budgets.values().any(|b| {
            b.id != budget.id
                && b.user_id == budget.user_id
                && b.month == budget.month
                && b.year == budget.year
                && b.category == budget.category
        })
    }

    fn sorted_transactions(&self, query: &TransactionQuery) -> Vec<&Transaction> {
        let mut matches: Vec<&Transaction> = self
            .transactions
            .values()
            .filter(|tx| query.matches(tx))
            .collect();
        matches.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        matches
    }
}

/// All collections sit behind one lock so multi-record writes are atomic.
#[derive(Clone, Default)]
pub struct InMemoryLedgerStore {
    inner: Arc<RwLock<Ledger>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    fn is_persistent(&self) -> bool {
        false
    }

    async fn create_user(&self, user: User) -> StoreResult<User> {
        let mut ledger = self.inner.write().await;
        if ledger
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(StoreError::Duplicate("User already exists".to_string()));
        }
        ledger.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .inner
            .read()
            .await
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn set_round_up_enabled(&self, id: Uuid, enabled: bool) -> StoreResult<User> {
        let mut ledger = self.inner.write().await;
        let user = ledger.users.get_mut(&id).ok_or(StoreError::NotFound("User"))?;
        user.round_up_enabled = enabled;
        Ok(user.clone())
    }

    async fn insert_transaction(&self, tx: Transaction) -> StoreResult<Transaction> {
        let tx = validated(tx, Transaction::validate)?;
        self.inner
            .write()
            .await
            .transactions
            .insert(tx.id, tx.clone());
        Ok(tx)
    }

    async fn get_transaction(&self, id: Uuid) -> StoreResult<Option<Transaction>> {
        Ok(self.inner.read().await.transactions.get(&id).cloned())
    }

    async fn update_transaction(&self, mut tx: Transaction) -> StoreResult<Transaction> {
        tx.updated_at = Utc::now();
        let tx = validated(tx, Transaction::validate)?;
        let mut ledger = self.inner.write().await;
        match ledger.transactions.get_mut(&tx.id) {
            Some(slot) => {
                *slot = tx.clone();
                Ok(tx)
            }
            None => Err(StoreError::NotFound("Transaction")),
        }
    }

    async fn delete_transaction(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.inner.write().await.transactions.remove(&id).is_some())
    }

    async fn find_transactions(&self, query: &TransactionQuery) -> StoreResult<Vec<Transaction>> {
        let ledger = self.inner.read().await;
        let page = ledger
            .sorted_transactions(query)
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(page)
    }

    async fn count_transactions(&self, query: &TransactionQuery) -> StoreResult<usize> {
        let ledger = self.inner.read().await;
        Ok(ledger
            .transactions
            .values()
            .filter(|tx| query.matches(tx))
            .count())
    }

    async fn commit_transaction(
        &self,
        tx: Transaction,
        round_up: Option<f64>,
    ) -> StoreResult<(Transaction, Option<RoundUp>)> {
        let tx = validated(tx, Transaction::validate)?;
        let record = round_up.map(|amount| round_up_for(&tx, amount)).transpose()?;

        let mut ledger = self.inner.write().await;
        ledger.transactions.insert(tx.id, tx.clone());
        if let Some(record) = &record {
            ledger.round_ups.insert(record.id, record.clone());
        }
        Ok((tx, record))
    }

    async fn insert_budget(&self, budget: Budget) -> StoreResult<Budget> {
        let budget = validated(budget, Budget::validate)?;
        let mut ledger = self.inner.write().await;
        if ledger.budget_slot_taken(&budget) {
            return Err(duplicate_budget(&budget));
        }
        ledger.budgets.insert(budget.id, budget.clone());
        Ok(budget)
    }

    async fn get_budget(&self, id: Uuid) -> StoreResult<Option<Budget>> {
        Ok(self.inner.read().await.budgets.get(&id).cloned())
    }

    async fn update_budget(&self, mut budget: Budget) -> StoreResult<Budget> {
        budget.updated_at = Utc::now();
        let budget = validated(budget, Budget::validate)?;
        let mut ledger = self.inner.write().await;
        if !ledger.budgets.contains_key(&budget.id) {
            return Err(StoreError::NotFound("Budget"));
        }
        if ledger.budget_slot_taken(&budget) {
            return Err(duplicate_budget(&budget));
        }
        ledger.budgets.insert(budget.id, budget.clone());
        Ok(budget)
    }

    async fn delete_budget(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.inner.write().await.budgets.remove(&id).is_some())
    }

    async fn find_budgets(&self, query: &BudgetQuery) -> StoreResult<Vec<Budget>> {
        let ledger = self.inner.read().await;
        let mut budgets: Vec<Budget> = ledger
            .budgets
            .values()
            .filter(|b| query.matches(b))
            .cloned()
            .collect();
        budgets.sort_by(|a, b| {
            (a.year, a.month, a.category.as_str()).cmp(&(b.year, b.month, b.category.as_str()))
        });
        Ok(budgets)
    }

    async fn insert_goal(&self, goal: SavingsGoal) -> StoreResult<SavingsGoal> {
        let goal = validated(goal, SavingsGoal::validate)?;
        self.inner.write().await.goals.insert(goal.id, goal.clone());
        Ok(goal)
    }

    async fn get_goal(&self, id: Uuid) -> StoreResult<Option<SavingsGoal>> {
        Ok(self.inner.read().await.goals.get(&id).cloned())
    }

    async fn update_goal(&self, mut goal: SavingsGoal) -> StoreResult<SavingsGoal> {
        goal.updated_at = Utc::now();
        let goal = validated(goal, SavingsGoal::validate)?;
        let mut ledger = self.inner.write().await;
        match ledger.goals.get_mut(&goal.id) {
            Some(slot) => {
                *slot = goal.clone();
                Ok(goal)
            }
            None => Err(StoreError::NotFound("Savings goal")),
        }
    }

    async fn delete_goal(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.inner.write().await.goals.remove(&id).is_some())
    }

    async fn list_goals(&self, user_id: Uuid) -> StoreResult<Vec<SavingsGoal>> {
        let ledger = self.inner.read().await;
        let mut goals: Vec<SavingsGoal> = ledger
            .goals
            .values()
            .filter(|g| g.user_id == user_id)
            .cloned()
            .collect();
        goals.sort_by(|a, b| a.target_date.cmp(&b.target_date));
        Ok(goals)
    }

    async fn record_goal_movement(
        &self,
        mut goal: SavingsGoal,
        entry: Transaction,
    ) -> StoreResult<(SavingsGoal, Transaction)> {
        goal.updated_at = Utc::now();
        let goal = validated(goal, SavingsGoal::validate)?;
        let entry = validated(entry, Transaction::validate)?;

        let mut ledger = self.inner.write().await;
        if !ledger.goals.contains_key(&goal.id) {
            return Err(StoreError::NotFound("Savings goal"));
        }
        ledger.goals.insert(goal.id, goal.clone());
        ledger.transactions.insert(entry.id, entry.clone());
        Ok((goal, entry))
    }

    async fn list_round_ups(&self, user_id: Uuid) -> StoreResult<Vec<RoundUp>> {
        let ledger = self.inner.read().await;
        let mut records: Vec<RoundUp> = ledger
            .round_ups
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn total_round_ups(&self, user_id: Uuid) -> StoreResult<f64> {
        let ledger = self.inner.read().await;
        Ok(ledger
            .round_ups
            .values()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.added_amount)
            .sum())
    }

    async fn insert_income(&self, income: Income) -> StoreResult<Income> {
        let income = validated(income, Income::validate)?;
        self.inner
            .write()
            .await
            .income
            .insert(income.id, income.clone());
        Ok(income)
    }

    async fn get_income(&self, id: Uuid) -> StoreResult<Option<Income>> {
        Ok(self.inner.read().await.income.get(&id).cloned())
    }

    async fn update_income(&self, income: Income) -> StoreResult<Income> {
        let income = validated(income, Income::validate)?;
        let mut ledger = self.inner.write().await;
        match ledger.income.get_mut(&income.id) {
            Some(slot) => {
                *slot = income.clone();
                Ok(income)
            }
            None => Err(StoreError::NotFound("Income")),
        }
    }

    async fn delete_income(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.inner.write().await.income.remove(&id).is_some())
    }

    async fn list_income(&self, user_id: Uuid) -> StoreResult<Vec<Income>> {
        let ledger = self.inner.read().await;
        let mut entries: Vec<Income> = ledger
            .income
            .values()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(entries)
    }
}
