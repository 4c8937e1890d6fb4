//! SQLite-backed ledger store.

use super::{
    duplicate_budget, round_up_for, validated, Budget, BudgetQuery, Income, LedgerStore, RoundUp,
    SavingsGoal, StoreError, StoreResult, Transaction, TransactionQuery, User,
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE COLLATE NOCASE,
    password_hash TEXT NOT NULL,
    monthly_income REAL NOT NULL DEFAULT 0,
    round_up_enabled INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS transactions (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL,
    amount REAL NOT NULL,
    kind TEXT NOT NULL,
    category TEXT NOT NULL,
    description TEXT NOT NULL,
    date TEXT NOT NULL,
    payment_method TEXT NOT NULL DEFAULT 'other',
    regret_feedback INTEGER NOT NULL DEFAULT 0,
    regret_notes TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_transactions_user_date ON transactions(user_id, date DESC);
CREATE INDEX IF NOT EXISTS idx_transactions_regret ON transactions(user_id, category, regret_feedback);

CREATE TABLE IF NOT EXISTS budgets (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL,
    month INTEGER NOT NULL,
    year INTEGER NOT NULL,
    category TEXT NOT NULL,
    amount REAL NOT NULL,
    notes TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (user_id, month, year, category)
);

CREATE TABLE IF NOT EXISTS savings_goals (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL,
    name TEXT NOT NULL,
    target_amount REAL NOT NULL,
    current_amount REAL NOT NULL DEFAULT 0,
    target_date TEXT NOT NULL,
    priority TEXT NOT NULL DEFAULT 'medium',
    notes TEXT,
    is_completed INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_goals_user ON savings_goals(user_id, target_date);

CREATE TABLE IF NOT EXISTS round_ups (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL,
    transaction_id TEXT NOT NULL,
    added_amount REAL NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_round_ups_user ON round_ups(user_id, created_at DESC);

CREATE TABLE IF NOT EXISTS income (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL,
    amount REAL NOT NULL,
    source TEXT,
    date TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_income_user ON income(user_id, date DESC);
"#;

const USER_COLUMNS: &str =
    "id, name, email, password_hash, monthly_income, round_up_enabled, created_at";
const TX_COLUMNS: &str = "id, user_id, amount, kind, category, description, date, payment_method,
     regret_feedback, regret_notes, created_at, updated_at";
const BUDGET_COLUMNS: &str =
    "id, user_id, month, year, category, amount, notes, created_at, updated_at";
const GOAL_COLUMNS: &str = "id, user_id, name, target_amount, current_amount, target_date,
     priority, notes, is_completed, created_at, updated_at";
const ROUND_UP_COLUMNS: &str = "id, user_id, transaction_id, added_amount, created_at";
const INCOME_COLUMNS: &str = "id, user_id, amount, source, date";

pub struct SqliteLedgerStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLedgerStore {
    /// Open (or create) `ledger.db` inside `data_dir`.
    pub async fn new(data_dir: PathBuf) -> StoreResult<Self> {
        tokio::fs::create_dir_all(&data_dir).await.map_err(|e| {
            StoreError::Backend(format!("Failed to create ledger data dir: {}", e))
        })?;
        Self::open(data_dir.join("ledger.db")).await
    }

    pub async fn open(db_path: PathBuf) -> StoreResult<Self> {
        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&db_path).map_err(|e| {
                StoreError::Backend(format!("Failed to open SQLite database: {}", e))
            })?;
            conn.execute_batch(SCHEMA)
                .map_err(|e| StoreError::Backend(format!("Failed to run schema: {}", e)))?;
            tracing::info!("Ledger database ready at {}", db_path.display());
            Ok::<_, StoreError>(conn)
        })
        .await??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.blocking_lock();
            f(&mut conn)
        })
        .await?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Column encoding
// ─────────────────────────────────────────────────────────────────────────────

/// Fixed-width UTC timestamps so text ordering matches time ordering.
/// Fixed-width RFC 3339 in UTC, so text order is time order. That holds for
/// four-digit years only; API dates are limited to 0000..=9999 on input.
fn ts(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn get_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, e.to_string()))
}

fn get_time(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e.to_string()))
}

fn get_parsed<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

fn get_bool(row: &Row<'_>, idx: usize) -> rusqlite::Result<bool> {
    Ok(row.get::<_, i64>(idx)? != 0)
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation
    )
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: get_uuid(row, 0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        monthly_income: row.get(4)?,
        round_up_enabled: get_bool(row, 5)?,
        created_at: get_time(row, 6)?,
    })
}

fn row_to_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: get_uuid(row, 0)?,
        user_id: get_uuid(row, 1)?,
        amount: row.get(2)?,
        kind: get_parsed(row, 3)?,
        category: get_parsed(row, 4)?,
        description: row.get(5)?,
        date: get_time(row, 6)?,
        payment_method: get_parsed(row, 7)?,
        regret_feedback: get_bool(row, 8)?,
        regret_notes: row.get(9)?,
        created_at: get_time(row, 10)?,
        updated_at: get_time(row, 11)?,
    })
}

fn row_to_budget(row: &Row<'_>) -> rusqlite::Result<Budget> {
    Ok(Budget {
        id: get_uuid(row, 0)?,
        user_id: get_uuid(row, 1)?,
        month: row.get(2)?,
        year: row.get(3)?,
        category: get_parsed(row, 4)?,
        amount: row.get(5)?,
        notes: row.get(6)?,
        created_at: get_time(row, 7)?,
        updated_at: get_time(row, 8)?,
    })
}

fn row_to_goal(row: &Row<'_>) -> rusqlite::Result<SavingsGoal> {
    Ok(SavingsGoal {
        id: get_uuid(row, 0)?,
        user_id: get_uuid(row, 1)?,
        name: row.get(2)?,
        target_amount: row.get(3)?,
        current_amount: row.get(4)?,
        target_date: get_time(row, 5)?,
        priority: get_parsed(row, 6)?,
        notes: row.get(7)?,
        is_completed: get_bool(row, 8)?,
        created_at: get_time(row, 9)?,
        updated_at: get_time(row, 10)?,
    })
}

fn row_to_round_up(row: &Row<'_>) -> rusqlite::Result<RoundUp> {
    Ok(RoundUp {
        id: get_uuid(row, 0)?,
        user_id: get_uuid(row, 1)?,
        transaction_id: get_uuid(row, 2)?,
        added_amount: row.get(3)?,
        created_at: get_time(row, 4)?,
    })
}

fn row_to_income(row: &Row<'_>) -> rusqlite::Result<Income> {
    Ok(Income {
        id: get_uuid(row, 0)?,
        user_id: get_uuid(row, 1)?,
        amount: row.get(2)?,
        source: row.get(3)?,
        date: get_time(row, 4)?,
    })
}

fn insert_transaction_row(conn: &Connection, tx: &Transaction) -> rusqlite::Result<usize> {
    conn.execute(
        &format!(
            "INSERT INTO transactions ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            TX_COLUMNS
        ),
        params![
            tx.id.to_string(),
            tx.user_id.to_string(),
            tx.amount,
            tx.kind.as_str(),
            tx.category.as_str(),
            tx.description,
            ts(&tx.date),
            tx.payment_method.as_str(),
            tx.regret_feedback as i64,
            tx.regret_notes,
            ts(&tx.created_at),
            ts(&tx.updated_at),
        ],
    )
}

fn update_goal_row(conn: &Connection, goal: &SavingsGoal) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE savings_goals SET name = ?2, target_amount = ?3, current_amount = ?4,
                target_date = ?5, priority = ?6, notes = ?7, is_completed = ?8, updated_at = ?9
         WHERE id = ?1",
        params![
            goal.id.to_string(),
            goal.name,
            goal.target_amount,
            goal.current_amount,
            ts(&goal.target_date),
            goal.priority.as_str(),
            goal.notes,
            goal.is_completed as i64,
            ts(&goal.updated_at),
        ],
    )
}

/// WHERE clause (without pagination) and its positional values.
fn transaction_filter(query: &TransactionQuery) -> (String, Vec<Value>) {
    let mut clauses = vec!["user_id = ?"];
    let mut values = vec![Value::Text(query.user_id.to_string())];

    if let Some(kind) = query.kind {
        clauses.push("kind = ?");
        values.push(Value::Text(kind.as_str().to_string()));
    }
    if let Some(category) = query.category {
        clauses.push("category = ?");
        values.push(Value::Text(category.as_str().to_string()));
    }
    if let Some(regretted) = query.regretted {
        clauses.push("regret_feedback = ?");
        values.push(Value::Integer(regretted as i64));
    }
    if let Some(from) = &query.from {
        clauses.push("date >= ?");
        values.push(Value::Text(ts(from)));
    }
    if let Some(to) = &query.to {
        clauses.push("date < ?");
        values.push(Value::Text(ts(to)));
    }

    (clauses.join(" AND "), values)
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    fn is_persistent(&self) -> bool {
        true
    }

    // ─────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────

    async fn create_user(&self, user: User) -> StoreResult<User> {
        self.with_conn(move |conn| {
            let result = conn.execute(
                &format!(
                    "INSERT INTO users ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    USER_COLUMNS
                ),
                params![
                    user.id.to_string(),
                    user.name,
                    user.email,
                    user.password_hash,
                    user.monthly_income,
                    user.round_up_enabled as i64,
                    ts(&user.created_at),
                ],
            );
            match result {
                Ok(_) => Ok(user),
                Err(e) if is_unique_violation(&e) => {
                    Err(StoreError::Duplicate("User already exists".to_string()))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        self.with_conn(move |conn| {
            let user = conn
                .query_row(
                    &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                    params![id.to_string()],
                    row_to_user,
                )
                .optional()?;
            Ok(user)
        })
        .await
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = email.to_string();
        self.with_conn(move |conn| {
            let user = conn
                .query_row(
                    &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
                    params![email],
                    row_to_user,
                )
                .optional()?;
            Ok(user)
        })
        .await
    }

    async fn set_round_up_enabled(&self, id: Uuid, enabled: bool) -> StoreResult<User> {
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE users SET round_up_enabled = ?2 WHERE id = ?1",
                params![id.to_string(), enabled as i64],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound("User"));
            }
            let user = conn.query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                params![id.to_string()],
                row_to_user,
            )?;
            Ok(user)
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Transactions
    // ─────────────────────────────────────────────────────────────────────

    async fn insert_transaction(&self, tx: Transaction) -> StoreResult<Transaction> {
        let tx = validated(tx, Transaction::validate)?;
        self.with_conn(move |conn| {
            insert_transaction_row(conn, &tx)?;
            Ok(tx)
        })
        .await
    }

    async fn get_transaction(&self, id: Uuid) -> StoreResult<Option<Transaction>> {
        self.with_conn(move |conn| {
            let tx = conn
                .query_row(
                    &format!("SELECT {} FROM transactions WHERE id = ?1", TX_COLUMNS),
                    params![id.to_string()],
                    row_to_transaction,
                )
                .optional()?;
            Ok(tx)
        })
        .await
    }

    async fn update_transaction(&self, mut tx: Transaction) -> StoreResult<Transaction> {
        tx.updated_at = Utc::now();
        let tx = validated(tx, Transaction::validate)?;
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE transactions SET amount = ?2, kind = ?3, category = ?4, description = ?5,
                        date = ?6, payment_method = ?7, regret_feedback = ?8, regret_notes = ?9,
                        updated_at = ?10
                 WHERE id = ?1",
                params![
                    tx.id.to_string(),
                    tx.amount,
                    tx.kind.as_str(),
                    tx.category.as_str(),
                    tx.description,
                    ts(&tx.date),
                    tx.payment_method.as_str(),
                    tx.regret_feedback as i64,
                    tx.regret_notes,
                    ts(&tx.updated_at),
                ],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound("Transaction"));
            }
            Ok(tx)
        })
        .await
    }

    async fn delete_transaction(&self, id: Uuid) -> StoreResult<bool> {
        self.with_conn(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM transactions WHERE id = ?1",
                params![id.to_string()],
            )?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn find_transactions(&self, query: &TransactionQuery) -> StoreResult<Vec<Transaction>> {
        let (filter, mut values) = transaction_filter(query);
        values.push(Value::Integer(
            query.limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX)),
        ));
        values.push(Value::Integer(
            i64::try_from(query.offset).unwrap_or(i64::MAX),
        ));

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM transactions WHERE {}
                 ORDER BY date DESC, created_at DESC
                 LIMIT ? OFFSET ?",
                TX_COLUMNS, filter
            ))?;
            let rows = stmt
                .query_map(params_from_iter(values), row_to_transaction)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn count_transactions(&self, query: &TransactionQuery) -> StoreResult<usize> {
        let (filter, values) = transaction_filter(query);
        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM transactions WHERE {}", filter),
                params_from_iter(values),
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
        .await
    }

    async fn commit_transaction(
        &self,
        tx: Transaction,
        round_up: Option<f64>,
    ) -> StoreResult<(Transaction, Option<RoundUp>)> {
        let tx = validated(tx, Transaction::validate)?;
        let record = round_up.map(|amount| round_up_for(&tx, amount)).transpose()?;

        self.with_conn(move |conn| {
            let db_tx = conn.transaction()?;
            insert_transaction_row(&db_tx, &tx)?;
            if let Some(record) = &record {
                db_tx.execute(
                    &format!(
                        "INSERT INTO round_ups ({}) VALUES (?1, ?2, ?3, ?4, ?5)",
                        ROUND_UP_COLUMNS
                    ),
                    params![
                        record.id.to_string(),
                        record.user_id.to_string(),
                        record.transaction_id.to_string(),
                        record.added_amount,
                        ts(&record.created_at),
                    ],
                )?;
            }
            db_tx.commit()?;
            Ok((tx, record))
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Budgets
    // ─────────────────────────────────────────────────────────────────────

    async fn insert_budget(&self, budget: Budget) -> StoreResult<Budget> {
        let budget = validated(budget, Budget::validate)?;
        self.with_conn(move |conn| {
            let result = conn.execute(
                &format!(
                    "INSERT INTO budgets ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    BUDGET_COLUMNS
                ),
                params![
                    budget.id.to_string(),
                    budget.user_id.to_string(),
                    budget.month,
                    budget.year,
                    budget.category.as_str(),
                    budget.amount,
                    budget.notes,
                    ts(&budget.created_at),
                    ts(&budget.updated_at),
                ],
            );
            match result {
                Ok(_) => Ok(budget),
                Err(e) if is_unique_violation(&e) => Err(duplicate_budget(&budget)),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn get_budget(&self, id: Uuid) -> StoreResult<Option<Budget>> {
        self.with_conn(move |conn| {
            let budget = conn
                .query_row(
                    &format!("SELECT {} FROM budgets WHERE id = ?1", BUDGET_COLUMNS),
                    params![id.to_string()],
                    row_to_budget,
                )
                .optional()?;
            Ok(budget)
        })
        .await
    }

    async fn update_budget(&self, mut budget: Budget) -> StoreResult<Budget> {
        budget.updated_at = Utc::now();
        let budget = validated(budget, Budget::validate)?;
        self.with_conn(move |conn| {
            let result = conn.execute(
                "UPDATE budgets SET month = ?2, year = ?3, category = ?4, amount = ?5, notes = ?6,
                        updated_at = ?7
                 WHERE id = ?1",
                params![
                    budget.id.to_string(),
                    budget.month,
                    budget.year,
                    budget.category.as_str(),
                    budget.amount,
                    budget.notes,
                    ts(&budget.updated_at),
                ],
            );
            match result {
                Ok(0) => Err(StoreError::NotFound("Budget")),
                Ok(_) => Ok(budget),
                Err(e) if is_unique_violation(&e) => Err(duplicate_budget(&budget)),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn delete_budget(&self, id: Uuid) -> StoreResult<bool> {
        self.with_conn(move |conn| {
            let deleted =
                conn.execute("DELETE FROM budgets WHERE id = ?1", params![id.to_string()])?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn find_budgets(&self, query: &BudgetQuery) -> StoreResult<Vec<Budget>> {
        let mut clauses = vec!["user_id = ?"];
        let mut values = vec![Value::Text(query.user_id.to_string())];
        if let Some(month) = query.month {
            clauses.push("month = ?");
            values.push(Value::Integer(month as i64));
        }
        if let Some(year) = query.year {
            clauses.push("year = ?");
            values.push(Value::Integer(year as i64));
        }
        if let Some(category) = query.category {
            clauses.push("category = ?");
            values.push(Value::Text(category.as_str().to_string()));
        }
        let filter = clauses.join(" AND ");

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM budgets WHERE {} ORDER BY year, month, category",
                BUDGET_COLUMNS, filter
            ))?;
            let rows = stmt
                .query_map(params_from_iter(values), row_to_budget)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Savings goals
    // ─────────────────────────────────────────────────────────────────────

    async fn insert_goal(&self, goal: SavingsGoal) -> StoreResult<SavingsGoal> {
        let goal = validated(goal, SavingsGoal::validate)?;
        self.with_conn(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO savings_goals ({})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    GOAL_COLUMNS
                ),
                params![
                    goal.id.to_string(),
                    goal.user_id.to_string(),
                    goal.name,
                    goal.target_amount,
                    goal.current_amount,
                    ts(&goal.target_date),
                    goal.priority.as_str(),
                    goal.notes,
                    goal.is_completed as i64,
                    ts(&goal.created_at),
                    ts(&goal.updated_at),
                ],
            )?;
            Ok(goal)
        })
        .await
    }

    async fn get_goal(&self, id: Uuid) -> StoreResult<Option<SavingsGoal>> {
        self.with_conn(move |conn| {
            let goal = conn
                .query_row(
                    &format!("SELECT {} FROM savings_goals WHERE id = ?1", GOAL_COLUMNS),
                    params![id.to_string()],
                    row_to_goal,
                )
                .optional()?;
            Ok(goal)
        })
        .await
    }

    async fn update_goal(&self, mut goal: SavingsGoal) -> StoreResult<SavingsGoal> {
        goal.updated_at = Utc::now();
        let goal = validated(goal, SavingsGoal::validate)?;
        self.with_conn(move |conn| {
            if update_goal_row(conn, &goal)? == 0 {
                return Err(StoreError::NotFound("Savings goal"));
            }
            Ok(goal)
        })
        .await
    }

    async fn delete_goal(&self, id: Uuid) -> StoreResult<bool> {
        self.with_conn(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM savings_goals WHERE id = ?1",
                params![id.to_string()],
            )?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn list_goals(&self, user_id: Uuid) -> StoreResult<Vec<SavingsGoal>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM savings_goals WHERE user_id = ?1 ORDER BY target_date ASC",
                GOAL_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![user_id.to_string()], row_to_goal)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn record_goal_movement(
        &self,
        mut goal: SavingsGoal,
        entry: Transaction,
    ) -> StoreResult<(SavingsGoal, Transaction)> {
        goal.updated_at = Utc::now();
        let goal = validated(goal, SavingsGoal::validate)?;
        let entry = validated(entry, Transaction::validate)?;

        self.with_conn(move |conn| {
            let db_tx = conn.transaction()?;
            if update_goal_row(&db_tx, &goal)? == 0 {
                return Err(StoreError::NotFound("Savings goal"));
            }
            insert_transaction_row(&db_tx, &entry)?;
            db_tx.commit()?;
            Ok((goal, entry))
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Round-ups
    // ─────────────────────────────────────────────────────────────────────

    async fn list_round_ups(&self, user_id: Uuid) -> StoreResult<Vec<RoundUp>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM round_ups WHERE user_id = ?1 ORDER BY created_at DESC",
                ROUND_UP_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![user_id.to_string()], row_to_round_up)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn total_round_ups(&self, user_id: Uuid) -> StoreResult<f64> {
        self.with_conn(move |conn| {
            let total: f64 = conn.query_row(
                "SELECT COALESCE(SUM(added_amount), 0.0) FROM round_ups WHERE user_id = ?1",
                params![user_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(total)
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Income
    // ─────────────────────────────────────────────────────────────────────

    async fn insert_income(&self, income: Income) -> StoreResult<Income> {
        let income = validated(income, Income::validate)?;
        self.with_conn(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO income ({}) VALUES (?1, ?2, ?3, ?4, ?5)",
                    INCOME_COLUMNS
                ),
                params![
                    income.id.to_string(),
                    income.user_id.to_string(),
                    income.amount,
                    income.source,
                    ts(&income.date),
                ],
            )?;
            Ok(income)
        })
        .await
    }

    async fn get_income(&self, id: Uuid) -> StoreResult<Option<Income>> {
        self.with_conn(move |conn| {
            let income = conn
                .query_row(
                    &format!("SELECT {} FROM income WHERE id = ?1", INCOME_COLUMNS),
                    params![id.to_string()],
                    row_to_income,
                )
                .optional()?;
            Ok(income)
        })
        .await
    }

    async fn update_income(&self, income: Income) -> StoreResult<Income> {
        let income = validated(income, Income::validate)?;
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE income SET amount = ?2, source = ?3, date = ?4 WHERE id = ?1",
                params![
                    income.id.to_string(),
                    income.amount,
                    income.source,
                    ts(&income.date),
                ],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound("Income"));
            }
            Ok(income)
        })
        .await
    }

    async fn delete_income(&self, id: Uuid) -> StoreResult<bool> {
        self.with_conn(move |conn| {
            let deleted =
                conn.execute("DELETE FROM income WHERE id = ?1", params![id.to_string()])?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn list_income(&self, user_id: Uuid) -> StoreResult<Vec<Income>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM income WHERE user_id = ?1 ORDER BY date DESC",
                INCOME_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![user_id.to_string()], row_to_income)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }
}
