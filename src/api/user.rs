//! Per-user preferences.

use std::sync::Arc;

use axum::{extract::State, routing::put, Extension, Json, Router};

use super::auth::AuthUser;
use super::error::{ApiError, ApiJson, ApiResult};
use super::routes::AppState;
use super::types::RoundUpPreferenceRequest;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/round-up-preference", put(update_round_up_preference))
}

/// Only a JSON boolean is accepted; `"true"` or `1` are rejected.
async fn update_round_up_preference(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    ApiJson(req): ApiJson<RoundUpPreferenceRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let enabled = req
        .round_up_enabled
        .as_ref()
        .and_then(serde_json::Value::as_bool)
        .ok_or_else(|| ApiError::Validation("Invalid input".to_string()))?;

    let user = state.store.set_round_up_enabled(user.id, enabled).await?;
    tracing::info!(user_id = %user.id, enabled, "Updated round-up preference");

    Ok(Json(serde_json::json!({
        "success": true,
        "data": {
            "id": user.id,
            "name": user.name,
            "email": user.email,
            "roundUpEnabled": user.round_up_enabled,
        },
    })))
}

#[cfg(test)]
mod tests {
    use super::super::routes::testing::TestApp;
    use crate::llm::testing::ScriptedClient;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn preference_must_be_a_boolean() {
        let app = TestApp::offline();
        let token = app.register("pref@example.com").await;
        for bad in [json!({"roundUpEnabled": "true"}), json!({"roundUpEnabled": 1}), json!({})] {
            let (status, body) = app
                .send("PUT", "/api/user/round-up-preference", Some(&token), Some(bad))
                .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["message"], "Invalid input");
        }

        let (status, body) = app
            .send(
                "PUT",
                "/api/user/round-up-preference",
                Some(&token),
                Some(json!({"roundUpEnabled": true})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["roundUpEnabled"], true);
        assert_eq!(body["data"]["email"], "pref@example.com");
    }

    #[tokio::test]
    async fn enabled_round_ups_accompany_voice_commits() {
        // Categorises everything as a 47 cash snack; the round-up prompt gets 50.
        let model = ScriptedClient::new(|prompt| {
            if prompt.contains("roundedAmount") {
                Ok(r#"{"roundedAmount": 50}"#.to_string())
            } else if prompt.contains("main product or item name") {
                Ok("snack".to_string())
            } else {
                Ok(r#"{"amount": 47, "category": "Food", "paymentMethod": "cash", "type": "expense"}"#
                    .to_string())
            }
        });
        let app = TestApp::new(model);
        let token = app.register("roundup@example.com").await;
        app.send(
            "PUT",
            "/api/user/round-up-preference",
            Some(&token),
            Some(json!({"roundUpEnabled": true})),
        )
        .await;

        let (status, body) = app
            .send(
                "POST",
                "/api/ai/voice-command",
                Some(&token),
                Some(json!({"command": "spent 47 on a snack"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        assert_eq!(body["roundUp"]["addedAmount"], 3.0);

        let (_, body) = app.send("GET", "/api/round-ups/total", Some(&token), None).await;
        assert_eq!(body["total"], 3.0);
    }
}
