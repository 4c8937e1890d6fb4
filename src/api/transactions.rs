//! Transaction CRUD endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Extension, Json, Router,
};
use chrono::Utc;
use uuid::Uuid;

use super::auth::AuthUser;
use super::error::{ApiError, ApiJson, ApiResult};
use super::routes::AppState;
use super::types::{
    exclusive_end, parse_category, parse_date, parse_kind, parse_payment_method, positive_or,
    required_amount, required_text, TransactionListQuery, TransactionRequest,
};
use crate::ledger::{PaymentMethod, StoreError, Transaction, TransactionQuery, User};

const DEFAULT_PAGE_SIZE: usize = 10;
const MAX_PAGE_SIZE: usize = 100;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_transactions).post(create_transaction))
        .route("/:id", put(update_transaction).delete(delete_transaction))
        .route("/category/:category", get(by_category))
        .route("/date/:start/:end", get(by_date))
}

/// Load a transaction the caller owns: 404 if missing, 403 if foreign.
pub(super) async fn owned_transaction(
    state: &AppState,
    user: &User,
    id: Uuid,
) -> ApiResult<Transaction> {
    let tx = state
        .store
        .get_transaction(id)
        .await?
        .ok_or(StoreError::NotFound("Transaction"))?;
    if tx.user_id != user.id {
        return Err(ApiError::not_authorized());
    }
    Ok(tx)
}

fn listing(transactions: Vec<Transaction>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "count": transactions.len(),
        "data": transactions,
    }))
}

async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Query(params): Query<TransactionListQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let page = positive_or(params.page.as_deref(), 1);
    let limit = positive_or(params.limit.as_deref(), DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    let offset = page.saturating_sub(1).saturating_mul(limit);

    let mut query = TransactionQuery::for_user(user.id);
    if let Some(kind) = params.kind.as_deref().filter(|k| !k.trim().is_empty()) {
        query = query.kind(parse_kind(kind)?);
    }
    let total = state.store.count_transactions(&query).await?;
    let transactions = state
        .store
        .find_transactions(&query.page(offset, limit))
        .await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "count": transactions.len(),
        "total": total,
        "pagination": {
            "page": page,
            "limit": limit,
            "totalPages": total.div_ceil(limit),
        },
        "data": transactions,
    })))
}

async fn create_transaction(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    ApiJson(req): ApiJson<TransactionRequest>,
) -> ApiResult<impl IntoResponse> {
    let amount = required_amount(req.amount, "Please add a transaction amount")?;
    let kind = parse_kind(&required_text(
        req.kind.as_deref(),
        "Please specify transaction type",
    )?)?;
    let category = parse_category(&required_text(
        req.category.as_deref(),
        "Please select a category",
    )?)?;
    let description = required_text(req.description.as_deref(), "Please add a description")?;
    let payment_method = match req.payment_method.as_deref() {
        Some(raw) => parse_payment_method(raw)?,
        None => PaymentMethod::default(),
    };

    let mut tx = Transaction::new(user.id, amount, kind, category, description, payment_method);
    if let Some(date) = req.date.as_deref() {
        tx.date = parse_date(date)?;
    }
    tx.regret_feedback = req.regret_feedback.unwrap_or(false);
    tx.regret_notes = req.regret_notes.unwrap_or_default();

    let tx = state.store.insert_transaction(tx).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "success": true, "data": tx })),
    ))
}

async fn update_transaction(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<TransactionRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut tx = owned_transaction(&state, &user, id).await?;

    if let Some(amount) = req.amount {
        tx.amount = amount;
    }
    if let Some(kind) = req.kind.as_deref() {
        tx.kind = parse_kind(kind)?;
    }
    if let Some(category) = req.category.as_deref() {
        tx.category = parse_category(category)?;
    }
    if let Some(description) = req.description {
        tx.description = description;
    }
    if let Some(date) = req.date.as_deref() {
        tx.date = parse_date(date)?;
    }
    if let Some(method) = req.payment_method.as_deref() {
        tx.payment_method = parse_payment_method(method)?;
    }
    if let Some(flag) = req.regret_feedback {
        tx.regret_feedback = flag;
    }
    if let Some(notes) = req.regret_notes {
        tx.regret_notes = notes;
    }
    tx.updated_at = Utc::now();

    let tx = state.store.update_transaction(tx).await?;
    Ok(Json(serde_json::json!({ "success": true, "data": tx })))
}

async fn delete_transaction(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    owned_transaction(&state, &user, id).await?;
    state.store.delete_transaction(id).await?;
    Ok(Json(serde_json::json!({ "success": true, "data": {} })))
}

async fn by_category(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(category): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let query = TransactionQuery::for_user(user.id).category(parse_category(&category)?);
    Ok(listing(state.store.find_transactions(&query).await?))
}

/// Both bounds inclusive.
async fn by_date(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path((start, end)): Path<(String, String)>,
) -> ApiResult<Json<serde_json::Value>> {
    let query =
        TransactionQuery::for_user(user.id).between(parse_date(&start)?, exclusive_end(&end)?);
    Ok(listing(state.store.find_transactions(&query).await?))
}
