//! Regret feedback: flag past purchases the user wishes they hadn't made.

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;

use super::auth::AuthUser;
use super::error::{ApiError, ApiJson, ApiResult};
use super::routes::AppState;
use super::transactions::owned_transaction;
use super::types::{required_text, RegretCommandRequest, RegretTransactionRequest};
use crate::ledger::{Transaction, TransactionQuery};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_regrets).post(regret_from_command))
        .route("/transaction", post(regret_transaction))
}

async fn flag(state: &AppState, mut tx: Transaction, notes: String) -> ApiResult<Transaction> {
    tx.regret_feedback = true;
    tx.regret_notes = notes;
    tx.updated_at = Utc::now();
    let tx = state.store.update_transaction(tx).await?;
    tracing::info!(transaction_id = %tx.id, "Recorded regret feedback");
    Ok(tx)
}

fn saved(tx: Transaction) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "message": "Regret feedback saved",
        "data": tx,
    }))
}

async fn list_regrets(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> ApiResult<Json<serde_json::Value>> {
    let regrets = state
        .store
        .find_transactions(&TransactionQuery::for_user(user.id).regretted(true))
        .await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "count": regrets.len(),
        "data": regrets,
    })))
}

/// "I regret buying the Fitbit" → flag the latest Fitbit purchase.
async fn regret_from_command(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    ApiJson(req): ApiJson<RegretCommandRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let command = required_text(
        req.command.as_deref(),
        "Please provide regret feedback command",
    )?;
    let report = state.interpreter.parse_regret_feedback(&command).await?;

    let tx = state
        .matcher
        .find_latest(user.id, report.category, &report.product_keyword)
        .await?
        .ok_or_else(|| ApiError::NotFound("Matching transaction not found".to_string()))?;

    Ok(saved(flag(&state, tx, report.notes).await?))
}

async fn regret_transaction(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    ApiJson(req): ApiJson<RegretTransactionRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = req
        .transaction_id
        .ok_or_else(|| ApiError::Validation("Please provide a transactionId".to_string()))?;
    let tx = owned_transaction(&state, &user, id).await?;
    let notes = req.notes.unwrap_or_default().trim().to_string();
    Ok(saved(flag(&state, tx, notes).await?))
}

#[cfg(test)]
mod tests {
    use super::super::routes::testing::TestApp;
    use crate::ledger::{Category, PaymentMethod, Transaction, TransactionType, User};
    use crate::llm::testing::ScriptedClient;
    use axum::http::StatusCode;
    use chrono::{Duration, Utc};
    use serde_json::json;

    fn regret_model(reply: &'static str) -> std::sync::Arc<ScriptedClient> {
        ScriptedClient::new(move |_| Ok(reply.to_string()))
    }

    async fn caller(app: &TestApp, email: &str) -> User {
        app.state
            .store
            .find_user_by_email(email)
            .await
            .unwrap()
            .unwrap()
    }

    async fn purchase(app: &TestApp, user: &User, description: &str, days_ago: i64) -> Transaction {
        let mut tx = Transaction::new(
            user.id,
            120.0,
            TransactionType::Expense,
            Category::Shopping,
            description,
            PaymentMethod::CreditCard,
        );
        tx.date = Utc::now() - Duration::days(days_ago);
        app.state.store.insert_transaction(tx).await.unwrap()
    }

    #[tokio::test]
    async fn command_flags_the_latest_matching_purchase() {
        let app = TestApp::new(regret_model(
            r#"Sure: {"category": "Shopping", "productKeyword": "fitbit", "notes": "stopped using it"}"#,
        ));
        let token = app.register("regretful@example.com").await;
        let user = caller(&app, "regretful@example.com").await;
        purchase(&app, &user, "Bought a Fitbit band", 40).await;
        let latest = purchase(&app, &user, "New FITBIT watch", 3).await;
        purchase(&app, &user, "Headphones", 1).await;

        let (status, body) = app
            .send(
                "POST",
                "/api/regret-feedback",
                Some(&token),
                Some(json!({"command": "I regret buying the Fitbit"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Regret feedback saved");
        assert_eq!(body["data"]["id"], latest.id.to_string());
        assert_eq!(body["data"]["regretNotes"], "stopped using it");

        let (_, body) = app.send("GET", "/api/regret-feedback", Some(&token), None).await;
        assert_eq!(body["count"], 1);
    }

    #[tokio::test]
    async fn command_without_a_match_is_404() {
        let app = TestApp::new(regret_model(
            r#"{"category": "Shopping", "productKeyword": "Drone", "notes": ""}"#,
        ));
        let token = app.register("nomatch@example.com").await;
        let (status, body) = app
            .send(
                "POST",
                "/api/regret-feedback",
                Some(&token),
                Some(json!({"command": "I regret the drone"})),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Matching transaction not found");
    }

    #[tokio::test]
    async fn unusable_model_replies_are_rejected() {
        let app = TestApp::new(regret_model(r#"{"category": "Gadgets", "productKeyword": "Drone"}"#));
        let token = app.register("badreply@example.com").await;
        let (status, body) = app
            .send(
                "POST",
                "/api/regret-feedback",
                Some(&token),
                Some(json!({"command": "I regret the drone"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, body) = app
            .send("POST", "/api/regret-feedback", Some(&token), Some(json!({})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Please provide regret feedback command");
    }

    #[tokio::test]
    async fn direct_flagging_checks_ownership() {
        let app = TestApp::offline();
        let token = app.register("direct@example.com").await;
        let intruder = app.register("direct-intruder@example.com").await;
        let user = caller(&app, "direct@example.com").await;
        let tx = purchase(&app, &user, "Espresso machine", 2).await;

        let (status, _) = app
            .send(
                "POST",
                "/api/regret-feedback/transaction",
                Some(&intruder),
                Some(json!({"transactionId": tx.id})),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app
            .send(
                "POST",
                "/api/regret-feedback/transaction",
                Some(&token),
                Some(json!({"transactionId": tx.id, "notes": " too loud "})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["regretFeedback"], true);
        assert_eq!(body["data"]["regretNotes"], "too loud");
    }
}
