//! Monthly budget endpoints and budget analytics.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Extension, Json, Router,
};
use chrono::{Datelike, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::auth::AuthUser;
use super::error::{ApiError, ApiJson, ApiResult};
use super::routes::AppState;
use super::types::{parse_category, required_amount, required_text, BudgetRequest, PeriodQuery};
use crate::ai::aggregates::{month_totals, MonthWindow};
use crate::ledger::{Budget, BudgetQuery, StoreError, TransactionQuery, TransactionType};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_budgets).post(create_budget))
        .route("/analytics", get(analytics))
        .route("/category/:category", get(by_category))
        .route("/:id", put(update_budget).delete(delete_budget))
}

/// `?month&year`, each falling back to the current one when absent or invalid.
fn period(params: &PeriodQuery) -> (u32, i32) {
    let today = Utc::now();
    let month = params
        .month
        .as_deref()
        .and_then(|m| m.trim().parse::<u32>().ok())
        .filter(|m| (1..=12).contains(m))
        .unwrap_or(today.month());
    let year = params
        .year
        .as_deref()
        .and_then(|y| y.trim().parse::<i32>().ok())
        .filter(|y| *y > 0)
        .unwrap_or(today.year());
    (month, year)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetStatus {
    Good,
    Warning,
    Exceeded,
}

impl BudgetStatus {
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 100.0 {
            BudgetStatus::Exceeded
        } else if percentage >= 80.0 {
            BudgetStatus::Warning
        } else {
            BudgetStatus::Good
        }
    }
}

fn rounded_percentage(spent: f64, budgeted: f64) -> f64 {
    if budgeted > 0.0 {
        (spent * 100.0 / budgeted).round()
    } else {
        0.0
    }
}

async fn owned_budget(state: &AppState, user_id: Uuid, id: Uuid) -> ApiResult<Budget> {
    let budget = state
        .store
        .get_budget(id)
        .await?
        .ok_or(StoreError::NotFound("Budget"))?;
    if budget.user_id != user_id {
        return Err(ApiError::not_authorized());
    }
    Ok(budget)
}

async fn list_budgets(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Query(params): Query<PeriodQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let (month, year) = period(&params);
    let budgets = state
        .store
        .find_budgets(&BudgetQuery {
            user_id: user.id,
            month: Some(month),
            year: Some(year),
            category: None,
        })
        .await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "count": budgets.len(),
        "data": budgets,
    })))
}

async fn create_budget(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    ApiJson(req): ApiJson<BudgetRequest>,
) -> ApiResult<impl IntoResponse> {
    let month = req
        .month
        .ok_or_else(|| ApiError::Validation("Please specify month (1-12)".to_string()))?;
    let year = req
        .year
        .ok_or_else(|| ApiError::Validation("Please specify year".to_string()))?;
    let category = parse_category(&required_text(
        req.category.as_deref(),
        "Please select a category",
    )?)?;
    let amount = required_amount(req.amount, "Please add a budget amount")?;

    let mut budget = Budget::new(user.id, month, year, category, amount);
    budget.notes = req.notes.filter(|n| !n.trim().is_empty());

    let budget = state.store.insert_budget(budget).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "success": true, "data": budget })),
    ))
}

async fn update_budget(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<BudgetRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut budget = owned_budget(&state, user.id, id).await?;
    if let Some(month) = req.month {
        budget.month = month;
    }
    if let Some(year) = req.year {
        budget.year = year;
    }
    if let Some(category) = req.category.as_deref() {
        budget.category = parse_category(category)?;
    }
    if let Some(amount) = req.amount {
        budget.amount = amount;
    }
    if let Some(notes) = req.notes {
        budget.notes = Some(notes).filter(|n| !n.trim().is_empty());
    }
    budget.updated_at = Utc::now();

    let budget = state.store.update_budget(budget).await?;
    Ok(Json(serde_json::json!({ "success": true, "data": budget })))
}

async fn delete_budget(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    owned_budget(&state, user.id, id).await?;
    state.store.delete_budget(id).await?;
    Ok(Json(serde_json::json!({ "success": true, "data": {} })))
}

async fn by_category(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(category): Path<String>,
    Query(params): Query<PeriodQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let (month, year) = period(&params);
    let budget = state
        .store
        .find_budgets(&BudgetQuery {
            user_id: user.id,
            month: Some(month),
            year: Some(year),
            category: Some(parse_category(&category)?),
        })
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::NotFound("Budget not found for this category".to_string()))?;
    Ok(Json(serde_json::json!({ "success": true, "data": budget })))
}

/// Spending against each budget of the month, plus totals.
async fn analytics(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Query(params): Query<PeriodQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let (month, year) = period(&params);
    let window = MonthWindow::new(year, month)
        .ok_or_else(|| ApiError::Validation(format!("Invalid period {}/{}", month, year)))?;

    let budgets = state
        .store
        .find_budgets(&BudgetQuery {
            user_id: user.id,
            month: Some(month),
            year: Some(year),
            category: None,
        })
        .await?;
    let expenses = state
        .store
        .find_transactions(
            &TransactionQuery::for_user(user.id)
                .kind(TransactionType::Expense)
                .between(window.start, window.end),
        )
        .await?;
    let totals = month_totals(&expenses);

    let analytics: Vec<serde_json::Value> = budgets
        .iter()
        .map(|budget| {
            let spent = totals.spent_on(budget.category);
            let percentage = rounded_percentage(spent, budget.amount);
            serde_json::json!({
                "category": budget.category,
                "budgeted": budget.amount,
                "spent": spent,
                "remaining": budget.amount - spent,
                "percentage": percentage,
                "status": BudgetStatus::from_percentage(percentage),
            })
        })
        .collect();

    let total_budgeted: f64 = budgets.iter().map(|b| b.amount).sum();
    let total_spent = totals.expenses;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": {
            "analytics": analytics,
            "summary": {
                "totalBudgeted": total_budgeted,
                "totalSpent": total_spent,
                "remaining": total_budgeted - total_spent,
                "percentage": rounded_percentage(total_spent, total_budgeted),
            },
        },
    })))
}

#[cfg(test)]
mod tests {
    use super::super::routes::testing::TestApp;
    use super::*;
    use serde_json::json;

    #[test]
    fn status_thresholds() {
        assert_eq!(BudgetStatus::from_percentage(79.0), BudgetStatus::Good);
        assert_eq!(BudgetStatus::from_percentage(80.0), BudgetStatus::Warning);
        assert_eq!(BudgetStatus::from_percentage(100.0), BudgetStatus::Exceeded);
        assert_eq!(rounded_percentage(5.0, 0.0), 0.0);
    }

    #[tokio::test]
    async fn duplicate_budget_is_rejected_on_create_and_update() {
        let app = TestApp::offline();
        let token = app.register("budget@example.com").await;
        let food = json!({"month": 5, "year": 2024, "category": "Food", "amount": 400});

        let (status, _) = app.send("POST", "/api/budget", Some(&token), Some(food.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = app.send("POST", "/api/budget", Some(&token), Some(food)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (_, bills) = app
            .send(
                "POST",
                "/api/budget",
                Some(&token),
                Some(json!({"month": 5, "year": 2024, "category": "Bills", "amount": 100})),
            )
            .await;
        let uri = format!("/api/budget/{}", bills["data"]["id"].as_str().unwrap());
        let (status, _) = app
            .send("PUT", &uri, Some(&token), Some(json!({"category": "Food"})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn income_categories_cannot_be_budgeted() {
        let app = TestApp::offline();
        let token = app.register("budget-kind@example.com").await;
        let (status, _) = app
            .send(
                "POST",
                "/api/budget",
                Some(&token),
                Some(json!({"month": 5, "year": 2024, "category": "Salary", "amount": 400})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn analytics_reports_usage_per_budget() {
        let app = TestApp::offline();
        let token = app.register("analytics@example.com").await;
        for (category, amount) in [("Food", 200.0), ("Bills", 450.0)] {
            app.send(
                "POST",
                "/api/budget",
                Some(&token),
                Some(json!({"month": 5, "year": 2024, "category": category, "amount": amount})),
            )
            .await;
        }
        for (category, amount) in [("Food", 170.0), ("Bills", 500.0), ("Shopping", 30.0)] {
            app.send(
                "POST",
                "/api/transactions",
                Some(&token),
                Some(json!({
                    "amount": amount,
                    "type": "expense",
                    "category": category,
                    "description": "spend",
                    "date": "2024-05-10",
                })),
            )
            .await;
        }

        let (status, body) = app
            .send("GET", "/api/budget/analytics?month=5&year=2024", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let rows = body["data"]["analytics"].as_array().unwrap();
        let bills = rows.iter().find(|r| r["category"] == "Bills").unwrap();
        assert_eq!(bills["status"], "exceeded");
        let food = rows.iter().find(|r| r["category"] == "Food").unwrap();
        assert_eq!(food["percentage"], 85.0);
        assert_eq!(food["status"], "warning");
        assert_eq!(body["data"]["summary"]["totalSpent"], 700.0);
        assert_eq!(body["data"]["summary"]["totalBudgeted"], 650.0);

        let (status, body) = app
            .send("GET", "/api/budget/category/food?month=5&year=2024", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["amount"], 200.0);

        let (status, _) = app
            .send("GET", "/api/budget/category/Debt?month=5&year=2024", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
