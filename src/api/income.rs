//! Income log endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use chrono::Utc;
use uuid::Uuid;

use super::auth::AuthUser;
use super::error::{ApiError, ApiJson, ApiResult};
use super::routes::AppState;
use super::types::{parse_date, IncomeRequest};
use crate::ledger::{Income, StoreError};

const AMOUNT_REQUIRED: &str = "Amount is required and must be a number.";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_income).post(create_income))
        .route("/total", get(total_income))
        .route(
            "/:id",
            get(get_income).put(update_income).delete(delete_income),
        )
}

async fn owned_income(state: &AppState, user_id: Uuid, id: Uuid) -> ApiResult<Income> {
    let income = state
        .store
        .get_income(id)
        .await?
        .ok_or(StoreError::NotFound("Income"))?;
    if income.user_id != user_id {
        return Err(ApiError::not_authorized());
    }
    Ok(income)
}

async fn create_income(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    ApiJson(req): ApiJson<IncomeRequest>,
) -> ApiResult<impl IntoResponse> {
    let amount = req
        .amount
        .filter(|a| a.is_finite() && *a > 0.0)
        .ok_or_else(|| ApiError::Validation(AMOUNT_REQUIRED.to_string()))?;
    let date = match req.date.as_deref() {
        Some(raw) => parse_date(raw)?,
        None => Utc::now(),
    };

    let income = state
        .store
        .insert_income(Income {
            id: Uuid::new_v4(),
            user_id: user.id,
            amount,
            source: req.source.filter(|s| !s.trim().is_empty()),
            date,
        })
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "success": true, "data": income })),
    ))
}

async fn list_income(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> ApiResult<Json<serde_json::Value>> {
    let entries = state.store.list_income(user.id).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "count": entries.len(),
        "data": entries,
    })))
}

async fn total_income(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> ApiResult<Json<serde_json::Value>> {
    let total: f64 = state
        .store
        .list_income(user.id)
        .await?
        .iter()
        .map(|i| i.amount)
        .sum();
    Ok(Json(serde_json::json!({ "success": true, "total": total })))
}

async fn get_income(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let income = owned_income(&state, user.id, id).await?;
    Ok(Json(serde_json::json!({ "success": true, "data": income })))
}

async fn update_income(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<IncomeRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut income = owned_income(&state, user.id, id).await?;
    if let Some(amount) = req.amount {
        income.amount = amount;
    }
    if let Some(source) = req.source {
        income.source = Some(source).filter(|s| !s.trim().is_empty());
    }
    if let Some(date) = req.date.as_deref() {
        income.date = parse_date(date)?;
    }
    let income = state.store.update_income(income).await?;
    Ok(Json(serde_json::json!({ "success": true, "data": income })))
}

async fn delete_income(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    owned_income(&state, user.id, id).await?;
    state.store.delete_income(id).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Income deleted successfully",
    })))
}

#[cfg(test)]
mod tests {
    use super::super::routes::testing::TestApp;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn income_log_and_total() {
        let app = TestApp::offline();
        let token = app.register("earner@example.com").await;

        let (status, body) = app
            .send("POST", "/api/income", Some(&token), Some(json!({"source": "gig"})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Amount is required and must be a number.");

        for (amount, date) in [(1200.0, "2024-04-01"), (300.5, "2024-05-01")] {
            let (status, _) = app
                .send(
                    "POST",
                    "/api/income",
                    Some(&token),
                    Some(json!({"amount": amount, "source": "work", "date": date})),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (_, body) = app.send("GET", "/api/income", Some(&token), None).await;
        assert_eq!(body["count"], 2);
        assert_eq!(body["data"][0]["amount"], 300.5);

        let (_, body) = app.send("GET", "/api/income/total", Some(&token), None).await;
        assert_eq!(body["total"], 1500.5);
    }

    #[tokio::test]
    async fn income_entries_are_private() {
        let app = TestApp::offline();
        let owner = app.register("income-owner@example.com").await;
        let other = app.register("income-other@example.com").await;
        let (_, body) = app
            .send("POST", "/api/income", Some(&owner), Some(json!({"amount": 50})))
            .await;
        let uri = format!("/api/income/{}", body["data"]["id"].as_str().unwrap());

        let (status, _) = app.send("GET", &uri, Some(&other), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (_, body) = app.send("GET", "/api/income/total", Some(&other), None).await;
        assert_eq!(body["total"], 0.0);

        let (status, body) = app
            .send("PUT", &uri, Some(&owner), Some(json!({"amount": 75, "source": "refund"})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["source"], "refund");

        for bad in [json!({"amount": 0}), json!({"amount": -5})] {
            let (status, body) = app.send("PUT", &uri, Some(&owner), Some(bad)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["message"], "Income amount must be greater than 0");
        }
        let (_, body) = app.send("GET", &uri, Some(&owner), None).await;
        assert_eq!(body["data"]["amount"], 75.0);

        let (status, body) = app.send("DELETE", &uri, Some(&owner), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Income deleted successfully");
        let (status, body) = app.send("GET", &uri, Some(&owner), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Income not found");
    }
}
