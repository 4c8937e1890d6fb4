//! Application state, router assembly and the HTTP server.

use std::sync::Arc;

use axum::middleware;
use axum::{extract::State, response::Json, routing::get, routing::post, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::ai::{
    start_cleanup_task, CommandInterpreter, InsightService, PendingDecisions, RegretMatcher,
    RoundUpAdjuster, TransactionCommitWorkflow,
};
use crate::config::{Config, LedgerBackend};
use crate::ledger::{InMemoryLedgerStore, LedgerStore, SqliteLedgerStore};
use crate::llm::{CompletionGateway, GeminiClient, LlmClient};

use super::ai as ai_api;
use super::auth;
use super::budgets as budgets_api;
use super::income as income_api;
use super::regret as regret_api;
use super::round_ups as round_ups_api;
use super::savings as savings_api;
use super::transactions as transactions_api;
use super::user as user_api;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn LedgerStore>,
    /// Voice/text command to transaction
    pub workflow: TransactionCommitWorkflow,
    pub interpreter: CommandInterpreter,
    pub matcher: RegretMatcher,
    pub insights: InsightService,
    /// Regret warnings awaiting an answer
    pub pending: Arc<PendingDecisions>,
}

impl AppState {
    /// Wire the AI services around one completion client.
    pub fn new(config: Config, store: Arc<dyn LedgerStore>, client: Arc<dyn LlmClient>) -> Self {
        let gateway = CompletionGateway::new(client, config.llm.retry.clone());
        let interpreter = CommandInterpreter::new(gateway.clone());
        let adjuster = RoundUpAdjuster::new(gateway.clone(), config.round_up_increment);
        let pending = Arc::new(PendingDecisions::new(config.pending_decision_ttl));
        let workflow = TransactionCommitWorkflow::new(
            Arc::clone(&store),
            interpreter.clone(),
            adjuster,
            Arc::clone(&pending),
        );

        Self {
            matcher: RegretMatcher::new(Arc::clone(&store)),
            insights: InsightService::new(gateway),
            config,
            store,
            workflow,
            interpreter,
            pending,
        }
    }
}

/// Build the API router over `state`.
pub fn app(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/api/auth/profile", get(auth::profile))
        .nest("/api/ai", ai_api::routes())
        .nest("/api/transactions", transactions_api::routes())
        .nest("/api/budget", budgets_api::routes())
        .nest("/api/savings", savings_api::routes())
        .nest("/api/income", income_api::routes())
        .nest("/api/round-ups", round_ups_api::routes())
        .nest("/api/regret-feedback", regret_api::routes())
        .nest("/api/user", user_api::routes())
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let store: Arc<dyn LedgerStore> = match config.ledger_backend {
        LedgerBackend::Sqlite => Arc::new(SqliteLedgerStore::new(config.data_dir.clone()).await?),
        LedgerBackend::Memory => {
            tracing::warn!("Using in-memory ledger; data is lost on restart");
            Arc::new(InMemoryLedgerStore::new())
        }
    };
    tracing::info!(
        persistent = store.is_persistent(),
        "Ledger store ready ({:?})",
        config.ledger_backend
    );

    let client: Arc<dyn LlmClient> = Arc::new(GeminiClient::new(
        config.llm.api_key.clone(),
        config.llm.model.clone(),
    ));

    let state = Arc::new(AppState::new(config.clone(), store, client));

    let cleanup_interval = (config.pending_decision_ttl / 2).max(std::time::Duration::from_secs(1));
    tokio::spawn(start_cleanup_task(Arc::clone(&state.pending), cleanup_interval));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "persistent": state.store.is_persistent(),
    }))
}

#[cfg(test)]
pub(crate) mod testing {
    //! Router harness for handler tests.

    use super::*;
    use crate::llm::testing::ScriptedClient;
    use crate::llm::RetryConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    pub struct TestApp {
        pub router: Router,
        pub state: Arc<AppState>,
    }

    impl TestApp {
        pub fn new(client: Arc<ScriptedClient>) -> Self {
            let mut config = Config::new("test-key".to_string(), "test-secret".to_string());
            config.llm.retry = RetryConfig {
                max_attempts: 3,
                base_delay: Duration::ZERO,
            };
            let store: Arc<dyn LedgerStore> = Arc::new(InMemoryLedgerStore::new());
            let state = Arc::new(AppState::new(config, store, client));
            Self {
                router: app(Arc::clone(&state)),
                state,
            }
        }

        /// An app whose model calls always fail.
        pub fn offline() -> Self {
            Self::new(ScriptedClient::failing())
        }

        pub async fn send(
            &self,
            method: &str,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header("authorization", format!("Bearer {}", token));
            }
            let request = match body {
                Some(body) => builder
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, json)
        }

        /// Register a user and return their bearer token.
        pub async fn register(&self, email: &str) -> String {
            let (status, body) = self
                .send(
                    "POST",
                    "/api/auth/register",
                    None,
                    Some(serde_json::json!({
                        "name": "Test User",
                        "email": email,
                        "password": "secret123",
                        "monthlyIncome": 5000,
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
            body["user"]["token"].as_str().unwrap().to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::TestApp;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn health_is_public() {
        let app = TestApp::offline();
        let (status, body) = app.send("GET", "/api/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn protected_routes_require_a_valid_token() {
        let app = TestApp::offline();
        let (status, body) = app.send("GET", "/api/transactions", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Not authorized, no token");

        let (status, _) = app
            .send("GET", "/api/transactions", Some("not-a-jwt"), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn register_login_and_profile() {
        let app = TestApp::offline();
        let token = app.register("ana@example.com").await;

        let (status, body) = app.send("GET", "/api/auth/profile", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["email"], "ana@example.com");
        assert!(body["user"].get("passwordHash").is_none());

        let (status, body) = app
            .send(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({"email": "ANA@example.com", "password": "secret123"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["user"]["token"].is_string());

        let (status, body) = app
            .send(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({"email": "ana@example.com", "password": "wrong"})),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid credentials");
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let app = TestApp::offline();
        app.register("dup@example.com").await;
        let (status, body) = app
            .send(
                "POST",
                "/api/auth/register",
                None,
                Some(json!({"name": "Again", "email": "dup@example.com", "password": "secret123"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "User already exists");
    }

    #[tokio::test]
    async fn malformed_json_uses_error_envelope() {
        let app = TestApp::offline();
        let (status, body) = app
            .send("POST", "/api/auth/login", None, Some(json!("just a string")))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }
}
