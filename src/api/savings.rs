//! Savings goal endpoints.
//!
//! Every progress update also writes a ledger entry so goal funding shows up
//! in spending: deposits as a `Savings` expense, withdrawals as
//! `other-income`.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Extension, Json, Router,
};
use chrono::Utc;
use uuid::Uuid;

use super::auth::AuthUser;
use super::error::{ApiError, ApiJson, ApiResult};
use super::routes::AppState;
use super::types::{
    parse_date, parse_priority, required_amount, required_text, GoalListQuery, GoalRequest,
    ProgressRequest,
};
use crate::ledger::{
    Category, GoalPriority, PaymentMethod, SavingsGoal, StoreError, Transaction, TransactionType,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_goals).post(create_goal))
        .route(
            "/:id",
            get(get_goal).put(update_goal).delete(delete_goal),
        )
        .route("/:id/progress", patch(update_progress))
}

async fn owned_goal(state: &AppState, user_id: Uuid, id: Uuid) -> ApiResult<SavingsGoal> {
    let goal = state
        .store
        .get_goal(id)
        .await?
        .ok_or(StoreError::NotFound("Savings goal"))?;
    if goal.user_id != user_id {
        return Err(ApiError::not_authorized());
    }
    Ok(goal)
}

/// The ledger entry mirroring a change of `delta` on `goal`.
fn goal_entry(goal: &SavingsGoal, delta: f64) -> Transaction {
    let (kind, category, description) = if delta > 0.0 {
        (
            TransactionType::Expense,
            Category::Savings,
            format!("Savings progress update for goal: {}", goal.name),
        )
    } else {
        (
            TransactionType::Income,
            Category::OtherIncome,
            format!("Savings withdrawal from goal: {}", goal.name),
        )
    };
    Transaction::new(
        goal.user_id,
        delta.abs(),
        kind,
        category,
        description,
        PaymentMethod::Other,
    )
}

async fn list_goals(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Query(params): Query<GoalListQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let completed = params
        .completed
        .as_deref()
        .filter(|c| !c.is_empty())
        .map(|c| c == "true");
    let goals: Vec<SavingsGoal> = state
        .store
        .list_goals(user.id)
        .await?
        .into_iter()
        .filter(|g| completed.map_or(true, |c| g.is_completed == c))
        .collect();
    Ok(Json(serde_json::json!({
        "success": true,
        "count": goals.len(),
        "data": goals,
    })))
}

async fn get_goal(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let goal = owned_goal(&state, user.id, id).await?;
    Ok(Json(serde_json::json!({ "success": true, "data": goal })))
}

async fn create_goal(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    ApiJson(req): ApiJson<GoalRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = required_text(req.name.as_deref(), "Please add a name for your savings goal")?;
    let target_amount = required_amount(req.target_amount, "Please add a target amount")?;
    let target_date = parse_date(&required_text(
        req.target_date.as_deref(),
        "Please add a target date",
    )?)?;
    let priority = match req.priority.as_deref() {
        Some(raw) => parse_priority(raw)?,
        None => GoalPriority::default(),
    };

    let now = Utc::now();
    let mut goal = SavingsGoal {
        id: Uuid::new_v4(),
        user_id: user.id,
        name,
        target_amount,
        current_amount: req.current_amount.unwrap_or(0.0),
        target_date,
        priority,
        notes: req.notes.filter(|n| !n.trim().is_empty()),
        is_completed: false,
        created_at: now,
        updated_at: now,
    };
    goal.refresh_completion();

    let goal = state.store.insert_goal(goal).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "success": true, "data": goal })),
    ))
}

async fn update_goal(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<GoalRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut goal = owned_goal(&state, user.id, id).await?;
    let was_completed = goal.is_completed;

    if let Some(name) = req.name {
        goal.name = name;
    }
    if let Some(target) = req.target_amount {
        goal.target_amount = target;
    }
    if let Some(current) = req.current_amount {
        goal.current_amount = current;
    }
    if let Some(date) = req.target_date.as_deref() {
        goal.target_date = parse_date(date)?;
    }
    if let Some(priority) = req.priority.as_deref() {
        goal.priority = parse_priority(priority)?;
    }
    if let Some(notes) = req.notes {
        goal.notes = Some(notes).filter(|n| !n.trim().is_empty());
    }

    // Marking a goal done fills it up.
    if !was_completed && req.is_completed == Some(true) {
        goal.current_amount = goal.target_amount;
    }
    goal.refresh_completion();

    let goal = state.store.update_goal(goal).await?;
    Ok(Json(serde_json::json!({ "success": true, "data": goal })))
}

async fn delete_goal(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    owned_goal(&state, user.id, id).await?;
    state.store.delete_goal(id).await?;
    Ok(Json(serde_json::json!({ "success": true, "data": {} })))
}

async fn update_progress(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<ProgressRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let delta = required_amount(req.amount, "Please provide an amount")?;
    if delta == 0.0 {
        return Err(ApiError::Validation(
            "Progress amount must not be zero".to_string(),
        ));
    }

    let mut goal = owned_goal(&state, user.id, id).await?;
    let new_amount = goal.current_amount + delta;
    if new_amount < 0.0 {
        return Err(ApiError::Validation(
            "Current amount cannot go below 0".to_string(),
        ));
    }
    goal.current_amount = new_amount;
    goal.refresh_completion();

    let entry = goal_entry(&goal, delta);
    let (goal, entry) = state.store.record_goal_movement(goal, entry).await?;
    tracing::debug!(
        goal_id = %goal.id,
        transaction_id = %entry.id,
        delta,
        "Recorded savings goal movement"
    );

    Ok(Json(serde_json::json!({ "success": true, "data": goal })))
}

#[cfg(test)]
mod tests {
    use super::super::routes::testing::TestApp;
    use super::*;
    use serde_json::{json, Value};

    async fn new_goal(app: &TestApp, token: &str, target: f64) -> String {
        let (status, body) = app
            .send(
                "POST",
                "/api/savings",
                Some(token),
                Some(json!({
                    "name": "Bike",
                    "targetAmount": target,
                    "targetDate": "2030-01-01",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["data"]["id"].as_str().unwrap().to_string()
    }

    async fn progress(app: &TestApp, token: &str, id: &str, amount: Value) -> (StatusCode, Value) {
        app.send(
            "PATCH",
            &format!("/api/savings/{}/progress", id),
            Some(token),
            Some(json!({ "amount": amount })),
        )
        .await
    }

    #[test]
    fn entries_mirror_direction() {
        let now = Utc::now();
        let goal = SavingsGoal {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Trip".to_string(),
            target_amount: 100.0,
            current_amount: 0.0,
            target_date: now,
            priority: GoalPriority::High,
            notes: None,
            is_completed: false,
            created_at: now,
            updated_at: now,
        };
        let deposit = goal_entry(&goal, 25.0);
        assert_eq!(deposit.kind, TransactionType::Expense);
        assert_eq!(deposit.category, Category::Savings);
        assert_eq!(deposit.description, "Savings progress update for goal: Trip");

        let withdrawal = goal_entry(&goal, -10.0);
        assert_eq!(withdrawal.kind, TransactionType::Income);
        assert_eq!(withdrawal.category, Category::OtherIncome);
        assert_eq!(withdrawal.amount, 10.0);
    }

    #[tokio::test]
    async fn progress_updates_goal_and_ledger() {
        let app = TestApp::offline();
        let token = app.register("saver@example.com").await;
        let id = new_goal(&app, &token, 100.0).await;

        let (status, body) = progress(&app, &token, &id, json!(60)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["currentAmount"], 60.0);
        assert_eq!(body["data"]["isCompleted"], false);

        let (_, body) = progress(&app, &token, &id, json!(40)).await;
        assert_eq!(body["data"]["isCompleted"], true);

        let (_, body) = progress(&app, &token, &id, json!(-30)).await;
        assert_eq!(body["data"]["currentAmount"], 70.0);
        assert_eq!(body["data"]["isCompleted"], false);

        let (_, body) = app
            .send("GET", "/api/transactions/category/Savings", Some(&token), None)
            .await;
        assert_eq!(body["count"], 2);
        let (_, body) = app
            .send("GET", "/api/transactions/category/other-income", Some(&token), None)
            .await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["data"][0]["description"], "Savings withdrawal from goal: Bike");
    }

    #[tokio::test]
    async fn progress_rejects_missing_zero_and_overdrawn_amounts() {
        let app = TestApp::offline();
        let token = app.register("careful@example.com").await;
        let id = new_goal(&app, &token, 100.0).await;

        let (status, body) = app
            .send(
                "PATCH",
                &format!("/api/savings/{}/progress", id),
                Some(&token),
                Some(json!({})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Please provide an amount");

        let (status, _) = progress(&app, &token, &id, json!(0)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = progress(&app, &token, &id, json!(-1)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Current amount cannot go below 0");

        let (_, body) = app.send("GET", "/api/transactions", Some(&token), None).await;
        assert_eq!(body["total"], 0);
    }

    #[tokio::test]
    async fn completing_via_put_fills_the_goal() {
        let app = TestApp::offline();
        let token = app.register("finisher@example.com").await;
        let id = new_goal(&app, &token, 250.0).await;
        new_goal(&app, &token, 900.0).await;

        let (status, body) = app
            .send(
                "PUT",
                &format!("/api/savings/{}", id),
                Some(&token),
                Some(json!({"isCompleted": true})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["currentAmount"], 250.0);
        assert_eq!(body["data"]["isCompleted"], true);

        let (_, body) = app
            .send("GET", "/api/savings?completed=true", Some(&token), None)
            .await;
        assert_eq!(body["count"], 1);
        let (_, body) = app
            .send("GET", "/api/savings?completed=false", Some(&token), None)
            .await;
        assert_eq!(body["count"], 1);
    }

    #[tokio::test]
    async fn goals_are_private() {
        let app = TestApp::offline();
        let owner = app.register("goal-owner@example.com").await;
        let other = app.register("goal-other@example.com").await;
        let id = new_goal(&app, &owner, 100.0).await;

        let (status, _) = app
            .send("GET", &format!("/api/savings/{}", id), Some(&other), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = progress(&app, &other, &id, json!(5)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app
            .send("DELETE", &format!("/api/savings/{}", id), Some(&owner), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = app
            .send("GET", &format!("/api/savings/{}", id), Some(&owner), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Savings goal not found");
    }
}
