//! Ledger aggregates feeding the advice generators.
//!
//! Every figure here is computed from stored records; nothing is estimated.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use super::insights::{
    AffordabilityInput, BudgetUsage, CategoryVelocity, GoalSnapshot, MonthTotals,
    OverspendingInput, PastRegret, PurchaseBuckets, RegretRiskInput, SavingsInput,
};
use crate::ledger::{
    BudgetQuery, Category, LedgerStore, SavingsGoal, StoreResult, Transaction, TransactionQuery,
    TransactionType,
};

/// Days of round-up history used for the daily average.
const ROUND_UP_WINDOW_DAYS: i64 = 30;

/// A calendar month in UTC, as the half-open range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthWindow {
    pub year: i32,
    pub month: u32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

fn first_of_month(year: i32, month: u32) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

impl MonthWindow {
    /// `None` for an invalid month or a year chrono cannot represent.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        let start = first_of_month(year, month)?;
        let (next_year, next) = next_month(year, month);
        let end = first_of_month(next_year, next)?;
        Some(Self {
            year,
            month,
            start,
            end,
        })
    }

    pub fn containing(at: DateTime<Utc>) -> Option<Self> {
        Self::new(at.year(), at.month())
    }

    pub fn previous(&self) -> Option<Self> {
        if self.month == 1 {
            Self::new(self.year - 1, 12)
        } else {
            Self::new(self.year, self.month - 1)
        }
    }

    pub fn days_in_month(&self) -> u32 {
        (self.end - self.start).num_days() as u32
    }

    /// Days elapsed including the one containing `at`, clamped to the month.
    pub fn days_passed(&self, at: DateTime<Utc>) -> u32 {
        if at < self.start {
            return 0;
        }
        ((at - self.start).num_days() as u32 + 1).min(self.days_in_month())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pure reductions
// ─────────────────────────────────────────────────────────────────────────────

pub fn month_totals(transactions: &[Transaction]) -> MonthTotals {
    let mut totals = MonthTotals::default();
    let mut by_category: HashMap<Category, f64> = HashMap::new();

    for tx in transactions {
        match tx.kind {
            TransactionType::Income => totals.income += tx.amount,
            TransactionType::Expense => {
                totals.expenses += tx.amount;
                *by_category.entry(tx.category).or_insert(0.0) += tx.amount;
            }
        }
    }

    let mut by_category: Vec<(Category, f64)> = by_category.into_iter().collect();
    by_category.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    totals.by_category = by_category;
    totals
}

pub fn purchase_buckets(transactions: &[Transaction]) -> PurchaseBuckets {
    transactions
        .iter()
        .filter(|tx| tx.kind == TransactionType::Expense)
        .fold(PurchaseBuckets::default(), |mut buckets, tx| {
            if tx.amount < 100.0 {
                buckets.small += 1;
            } else if tx.amount <= 500.0 {
                buckets.medium += 1;
            } else {
                buckets.large += 1;
            }
            buckets
        })
}

fn goal_snapshots(goals: &[SavingsGoal]) -> Vec<GoalSnapshot> {
    goals
        .iter()
        .filter(|g| !g.is_completed)
        .map(|g| GoalSnapshot {
            name: g.name.clone(),
            target: g.target_amount,
            current: g.current_amount,
            deadline: g.target_date,
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Store-backed gatherers
// ─────────────────────────────────────────────────────────────────────────────

pub async fn month_transactions(
    store: &dyn LedgerStore,
    user_id: Uuid,
    window: &MonthWindow,
) -> StoreResult<Vec<Transaction>> {
    store
        .find_transactions(&TransactionQuery::for_user(user_id).between(window.start, window.end))
        .await
}

/// Budgets of one month joined with that month's spending per category.
pub async fn budget_usage(
    store: &dyn LedgerStore,
    user_id: Uuid,
    window: &MonthWindow,
    totals: &MonthTotals,
) -> StoreResult<Vec<BudgetUsage>> {
    let budgets = store
        .find_budgets(&BudgetQuery {
            user_id,
            month: Some(window.month),
            year: Some(window.year),
            category: None,
        })
        .await?;
    Ok(budgets
        .into_iter()
        .map(|b| BudgetUsage {
            category: b.category,
            budget: b.amount,
            spent: totals.spent_on(b.category),
        })
        .collect())
}

/// Current and previous month totals plus this month's budget usage.
pub struct InsightSnapshot {
    pub current: MonthTotals,
    pub previous: MonthTotals,
    pub budgets: Vec<BudgetUsage>,
}

pub async fn insight_snapshot(
    store: &dyn LedgerStore,
    user_id: Uuid,
    window: &MonthWindow,
) -> StoreResult<InsightSnapshot> {
    let current = month_totals(&month_transactions(store, user_id, window).await?);
    let previous = match window.previous() {
        Some(prev) => month_totals(&month_transactions(store, user_id, &prev).await?),
        None => MonthTotals::default(),
    };
    let budgets = budget_usage(store, user_id, window, &current).await?;
    Ok(InsightSnapshot {
        current,
        previous,
        budgets,
    })
}

pub async fn affordability_input(
    store: &dyn LedgerStore,
    user_id: Uuid,
    window: &MonthWindow,
    item_name: &str,
    item_price: f64,
    category: Category,
) -> StoreResult<AffordabilityInput> {
    let totals = month_totals(&month_transactions(store, user_id, window).await?);
    let category_budget = store
        .find_budgets(&BudgetQuery {
            user_id,
            month: Some(window.month),
            year: Some(window.year),
            category: Some(category),
        })
        .await?
        .first()
        .map(|b| b.amount);
    let goals = goal_snapshots(&store.list_goals(user_id).await?);

    Ok(AffordabilityInput {
        item_name: item_name.to_string(),
        item_price,
        category,
        month_income: totals.income,
        month_expenses: totals.expenses,
        category_budget,
        category_spent: totals.spent_on(category),
        goals,
    })
}

pub async fn regret_risk_input(
    store: &dyn LedgerStore,
    user_id: Uuid,
    item_name: &str,
    item_price: f64,
    category: Category,
    current_mood: &str,
) -> StoreResult<RegretRiskInput> {
    let past_regrets = store
        .find_transactions(&TransactionQuery::for_user(user_id).regretted(true))
        .await?
        .into_iter()
        .map(|tx| PastRegret {
            description: tx.description,
            amount: tx.amount,
            category: tx.category,
            notes: tx.regret_notes,
        })
        .collect();

    let expenses = store
        .find_transactions(&TransactionQuery::for_user(user_id).kind(TransactionType::Expense))
        .await?;
    let average_expense = if expenses.is_empty() {
        0.0
    } else {
        expenses.iter().map(|tx| tx.amount).sum::<f64>() / expenses.len() as f64
    };

    Ok(RegretRiskInput {
        item_name: item_name.to_string(),
        item_price,
        category,
        current_mood: current_mood.to_string(),
        past_regrets,
        average_expense,
    })
}

pub async fn overspending_input(
    store: &dyn LedgerStore,
    user_id: Uuid,
    window: &MonthWindow,
    now: DateTime<Utc>,
) -> StoreResult<OverspendingInput> {
    let totals = month_totals(&month_transactions(store, user_id, window).await?);
    let budgets = budget_usage(store, user_id, window, &totals).await?;

    let days_in_month = window.days_in_month();
    let days_passed = window.days_passed(now).max(1);
    let velocity = totals
        .by_category
        .iter()
        .map(|(category, spent)| {
            let daily_average = spent / days_passed as f64;
            CategoryVelocity {
                category: *category,
                spent: *spent,
                daily_average,
                projected_month_end: daily_average * days_in_month as f64,
            }
        })
        .collect();

    Ok(OverspendingInput {
        budgets,
        velocity,
        days_passed,
        days_left: days_in_month.saturating_sub(days_passed),
    })
}

pub async fn savings_input(
    store: &dyn LedgerStore,
    user_id: Uuid,
    window: &MonthWindow,
    now: DateTime<Utc>,
    round_up_increment: f64,
) -> StoreResult<SavingsInput> {
    let round_ups = store.list_round_ups(user_id).await?;
    let since = now - Duration::days(ROUND_UP_WINDOW_DAYS);
    let recent: f64 = round_ups
        .iter()
        .filter(|r| r.created_at >= since)
        .map(|r| r.added_amount)
        .sum();
    let monthly_total: f64 = round_ups
        .iter()
        .filter(|r| r.created_at >= window.start && r.created_at < window.end)
        .map(|r| r.added_amount)
        .sum();
    let daily_average = recent / ROUND_UP_WINDOW_DAYS as f64;

    let purchases = purchase_buckets(&month_transactions(store, user_id, window).await?);
    let goals = goal_snapshots(&store.list_goals(user_id).await?);

    Ok(SavingsInput {
        daily_average,
        monthly_total,
        year_projection: daily_average * 365.0,
        purchases,
        goals,
        round_up_increment,
    })
}
