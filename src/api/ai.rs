//! AI endpoints: voice commands and the advice generators.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};

use super::auth::AuthUser;
use super::error::{ApiError, ApiJson, ApiResult};
use super::routes::AppState;
use super::types::{
    parse_category, required_amount, required_text, AffordabilityRequest, RegretRadarRequest,
    VoiceCommandRequest,
};
use crate::ai::aggregates::{self, MonthWindow};
use crate::ai::insights::financial_insights;
use crate::ai::{CommitOutcome, Submission};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/voice-command", post(voice_command))
        .route("/insights", get(insights))
        .route("/affordability", post(affordability))
        .route("/regret-radar", post(regret_radar))
        .route("/overspending", post(overspending))
        .route("/savings-optimizer", post(savings_optimizer))
}

fn current_month() -> ApiResult<(MonthWindow, DateTime<Utc>)> {
    let now = Utc::now();
    let window = MonthWindow::containing(now)
        .ok_or_else(|| ApiError::Internal(format!("No calendar month contains {}", now)))?;
    Ok((window, now))
}

fn positive_price(value: Option<f64>) -> ApiResult<f64> {
    let price = required_amount(value, "Please provide an item price")?;
    if price <= 0.0 {
        return Err(ApiError::Validation(
            "Item price must be greater than 0".to_string(),
        ));
    }
    Ok(price)
}

/// Interpret a command and commit it, pausing on a regret match.
///
/// Round 1 sends `command`. A regret warning returns a `decisionToken`;
/// round 2 sends either the token or the same command, with `confirmRegret`.
async fn voice_command(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    ApiJson(req): ApiJson<VoiceCommandRequest>,
) -> ApiResult<Response> {
    let submission = match req.decision_token {
        Some(token) => Submission::Decision {
            token,
            confirm_regret: req.confirm_regret.ok_or_else(|| {
                ApiError::Validation("Please provide confirmRegret with the decision token".to_string())
            })?,
        },
        None => Submission::Command {
            command: required_text(req.command.as_deref(), "Please provide a voice command")?,
            confirm_regret: req.confirm_regret,
        },
    };

    let response = match state.workflow.submit(&user, submission).await? {
        CommitOutcome::Committed {
            transaction,
            round_up,
        } => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "success": true,
                "data": transaction,
                "roundUp": round_up,
            })),
        ),
        CommitOutcome::RegretWarning {
            keyword,
            message,
            token,
        } => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "regretWarning": true,
                "message": message,
                "keyword": keyword,
                "decisionToken": token,
            })),
        ),
        CommitOutcome::Cancelled { message } => (
            StatusCode::OK,
            Json(serde_json::json!({ "success": true, "message": message })),
        ),
    };
    Ok(response.into_response())
}

async fn insights(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> ApiResult<Json<serde_json::Value>> {
    let (window, _) = current_month()?;
    let snapshot = aggregates::insight_snapshot(state.store.as_ref(), user.id, &window).await?;
    let data = financial_insights(&snapshot.current, &snapshot.previous, &snapshot.budgets);
    Ok(Json(serde_json::json!({ "success": true, "data": data })))
}

async fn affordability(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    ApiJson(req): ApiJson<AffordabilityRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let item_name = required_text(req.item_name.as_deref(), "Please provide an item name")?;
    let item_price = positive_price(req.item_price)?;
    let category = parse_category(&required_text(
        req.category.as_deref(),
        "Please provide a category",
    )?)?;

    let (window, _) = current_month()?;
    let input = aggregates::affordability_input(
        state.store.as_ref(),
        user.id,
        &window,
        &item_name,
        item_price,
        category,
    )
    .await?;
    let data = state.insights.affordability(&input).await;
    Ok(Json(serde_json::json!({ "success": true, "data": data })))
}

async fn regret_radar(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    ApiJson(req): ApiJson<RegretRadarRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let item_name = required_text(req.item_name.as_deref(), "Please provide an item name")?;
    let item_price = positive_price(req.item_price)?;
    let category = parse_category(&required_text(
        req.category.as_deref(),
        "Please provide a category",
    )?)?;
    let mood = req.current_mood.unwrap_or_else(|| "neutral".to_string());

    let input = aggregates::regret_risk_input(
        state.store.as_ref(),
        user.id,
        &item_name,
        item_price,
        category,
        &mood,
    )
    .await?;
    let data = state.insights.regret_risk(&input).await;
    Ok(Json(serde_json::json!({ "success": true, "data": data })))
}

async fn overspending(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> ApiResult<Json<serde_json::Value>> {
    let (window, now) = current_month()?;
    let input = aggregates::overspending_input(state.store.as_ref(), user.id, &window, now).await?;
    let data = state.insights.overspending(&input).await;
    Ok(Json(serde_json::json!({ "success": true, "data": data })))
}

async fn savings_optimizer(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> ApiResult<Json<serde_json::Value>> {
    let (window, now) = current_month()?;
    let input = aggregates::savings_input(
        state.store.as_ref(),
        user.id,
        &window,
        now,
        state.config.round_up_increment,
    )
    .await?;
    let data = state.insights.savings_optimization(&input).await;
    Ok(Json(serde_json::json!({ "success": true, "data": data })))
}
