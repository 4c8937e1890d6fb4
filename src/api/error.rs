//! API error type and its JSON envelope.

use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::ai::{CommitError, DecisionError, InterpretError};
use crate::ledger::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidAiResponse(String),

    #[error("{0}")]
    Gateway(String),

    #[error("{0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::InvalidAiResponse(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Gateway(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn not_authorized() -> Self {
        ApiError::Forbidden("User not authorized".to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Gateway(raw) => {
                tracing::error!("AI service failure: {}", raw);
                serde_json::json!({
                    "success": false,
                    "message": "AI service unavailable",
                    "error": raw,
                })
            }
            ApiError::Internal(raw) => {
                tracing::error!("Internal error: {}", raw);
                serde_json::json!({
                    "success": false,
                    "message": "Server error",
                    "error": raw,
                })
            }
            other => serde_json::json!({
                "success": false,
                "message": other.to_string(),
            }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Validation(_) | StoreError::Duplicate(_) => {
                ApiError::Validation(e.to_string())
            }
            StoreError::NotFound(_) => ApiError::NotFound(e.to_string()),
            StoreError::Backend(raw) => ApiError::Internal(raw),
        }
    }
}

impl From<InterpretError> for ApiError {
    fn from(e: InterpretError) -> Self {
        match e {
            InterpretError::Gateway(inner) => ApiError::Gateway(inner.to_string()),
            InterpretError::InvalidAiResponse(_) => ApiError::InvalidAiResponse(e.to_string()),
        }
    }
}

impl From<DecisionError> for ApiError {
    fn from(e: DecisionError) -> Self {
        match e {
            DecisionError::Unknown => ApiError::NotFound(e.to_string()),
            DecisionError::Forbidden => ApiError::Forbidden(e.to_string()),
        }
    }
}

impl From<CommitError> for ApiError {
    fn from(e: CommitError) -> Self {
        match e {
            CommitError::Interpret(inner) => inner.into(),
            CommitError::Decision(inner) => inner.into(),
            CommitError::Store(inner) => inner.into(),
        }
    }
}

/// `Json` extractor whose rejections use the API error envelope.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e: JsonRejection| ApiError::Validation(e.body_text()))?;
        Ok(ApiJson(value))
    }
}
