//! Round-up history. Records are only ever written by the commit workflow.

use std::sync::Arc;

use axum::{extract::State, routing::get, Extension, Json, Router};

use super::auth::AuthUser;
use super::error::ApiResult;
use super::routes::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_round_ups))
        .route("/total", get(total_round_ups))
}

async fn list_round_ups(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> ApiResult<Json<serde_json::Value>> {
    let records = state.store.list_round_ups(user.id).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "count": records.len(),
        "data": records,
    })))
}

async fn total_round_ups(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> ApiResult<Json<serde_json::Value>> {
    let total = state.store.total_round_ups(user.id).await?;
    Ok(Json(serde_json::json!({ "success": true, "total": total })))
}

#[cfg(test)]
mod tests {
    use super::super::routes::testing::TestApp;
    use crate::ledger::{Category, PaymentMethod, Transaction, TransactionType};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn lists_only_the_callers_round_ups() {
        let app = TestApp::offline();
        let token = app.register("rounder@example.com").await;
        app.register("bystander@example.com").await;
        let store = &app.state.store;
        let user = store
            .find_user_by_email("rounder@example.com")
            .await
            .unwrap()
            .unwrap();
        let other = store
            .find_user_by_email("bystander@example.com")
            .await
            .unwrap()
            .unwrap();

        for (owner, amount, added) in [(user.id, 7.5, 2.5), (user.id, 31.0, 9.0), (other.id, 4.0, 6.0)] {
            let tx = Transaction::new(
                owner,
                amount,
                TransactionType::Expense,
                Category::Food,
                "snack",
                PaymentMethod::Cash,
            );
            store.commit_transaction(tx, Some(added)).await.unwrap();
        }

        let (status, body) = app.send("GET", "/api/round-ups", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
        assert!(body["data"][0]["transaction"].is_string());

        let (_, body) = app.send("GET", "/api/round-ups/total", Some(&token), None).await;
        assert_eq!(body["total"], 11.5);
    }
}
