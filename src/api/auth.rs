//! Per-user JWT auth.
//!
//! - `POST /api/auth/register` creates an account and returns a token
//! - `POST /api/auth/login` exchanges email + password for a token
//! - Every other endpoint requires `Authorization: Bearer <jwt>`; the
//!   middleware resolves the token's subject to a stored user
//!
//! Passwords are stored as `pbkdf2:<iterations>:<hex salt>:<hex hash>`
//! (PBKDF2-HMAC-SHA256).

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use sha2::Sha256;
use uuid::Uuid;

use super::error::{ApiError, ApiJson, ApiResult};
use super::routes::AppState;
use super::types::{required_text, AuthenticatedUser, LoginRequest, RegisterRequest};
use crate::ledger::User;

#[cfg(not(test))]
const PBKDF2_ITERATIONS: u32 = 100_000;
#[cfg(test)]
const PBKDF2_ITERATIONS: u32 = 1_000;

const MIN_PASSWORD_LEN: usize = 6;

/// The authenticated caller, inserted by [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Claims {
    /// User id
    sub: String,
    /// Issued-at unix seconds
    iat: i64,
    /// Expiration unix seconds
    exp: i64,
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for i in 0..a.len() {
        diff |= a[i] ^ b[i];
    }
    diff == 0
}

fn derive_key(password: &str, salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut out = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out
}

pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let hash = derive_key(password, &salt, PBKDF2_ITERATIONS);
    format!(
        "pbkdf2:{}:{}:{}",
        PBKDF2_ITERATIONS,
        hex::encode(salt),
        hex::encode(hash)
    )
}

/// False for a wrong password and for any malformed stored hash.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let parts: Vec<&str> = stored.split(':').collect();
    let [scheme, iterations, salt, expected] = parts.as_slice() else {
        return false;
    };
    if *scheme != "pbkdf2" {
        return false;
    }
    let (Ok(iterations), Ok(salt), Ok(expected)) = (
        iterations.parse::<u32>(),
        hex::decode(salt),
        hex::decode(expected),
    ) else {
        return false;
    };
    constant_time_eq(&derive_key(password, &salt, iterations), &expected)
}

pub fn issue_jwt(secret: &str, ttl_days: i64, user_id: Uuid) -> ApiResult<String> {
    let now = Utc::now();
    let exp = now + Duration::days(ttl_days.max(1));
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("Failed to sign token: {}", e)))
}

/// The user id a valid token was issued for.
fn verify_jwt(token: &str, secret: &str) -> Option<Uuid> {
    let token_data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()?;
    token_data.claims.sub.parse().ok()
}

fn authenticated(state: &AppState, user: &User) -> ApiResult<AuthenticatedUser> {
    let token = issue_jwt(
        &state.config.auth.jwt_secret,
        state.config.auth.jwt_ttl_days,
        user.id,
    )?;
    Ok(AuthenticatedUser {
        id: user.id,
        name: user.name.clone(),
        email: user.email.clone(),
        monthly_income: user.monthly_income,
        round_up_enabled: user.round_up_enabled,
        token,
    })
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = required_text(req.name.as_deref(), "Please add a name")?;
    let email = required_text(req.email.as_deref(), "Please add an email")?;
    if !email.contains('@') {
        return Err(ApiError::Validation("Please add a valid email".to_string()));
    }
    let password = req.password.unwrap_or_default();
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    let monthly_income = req.monthly_income.filter(|v| v.is_finite()).unwrap_or(0.0);

    let user = User {
        id: Uuid::new_v4(),
        name,
        email,
        password_hash: hash_password(&password),
        monthly_income,
        round_up_enabled: false,
        created_at: Utc::now(),
    };
    let user = state.store.create_user(user).await?;
    tracing::info!(user_id = %user.id, "Registered new user");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "user": authenticated(&state, &user)?,
        })),
    ))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let invalid = || ApiError::Unauthorized("Invalid credentials".to_string());
    let (Some(email), Some(password)) = (req.email, req.password) else {
        return Err(ApiError::Validation(
            "Please provide an email and password".to_string(),
        ));
    };

    let user = state
        .store
        .find_user_by_email(email.trim())
        .await?
        .ok_or_else(invalid)?;
    if !verify_password(&password, &user.password_hash) {
        tracing::debug!(user_id = %user.id, "Rejected login with wrong password");
        return Err(invalid());
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "user": authenticated(&state, &user)?,
    })))
}

pub async fn profile(Extension(AuthUser(user)): Extension<AuthUser>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "success": true, "user": user }))
}

pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    let token = auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .unwrap_or("")
        .trim();

    if token.is_empty() {
        return ApiError::Unauthorized("Not authorized, no token".to_string()).into_response();
    }

    let Some(user_id) = verify_jwt(token, &state.config.auth.jwt_secret) else {
        return ApiError::Unauthorized("Not authorized, token failed".to_string()).into_response();
    };

    match state.store.get_user(user_id).await {
        Ok(Some(user)) => {
            req.extensions_mut().insert(AuthUser(user));
            next.run(req).await
        }
        Ok(None) => {
            ApiError::Unauthorized("Not authorized, user not found".to_string()).into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip_and_format() {
        let stored = hash_password("hunter22");
        assert!(stored.starts_with(&format!("pbkdf2:{}:", PBKDF2_ITERATIONS)));
        assert_eq!(stored.split(':').count(), 4);
        assert!(verify_password("hunter22", &stored));
        assert!(!verify_password("hunter23", &stored));
    }

    #[test]
    fn malformed_hashes_never_verify() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "bcrypt:10:aa:bb"));
        assert!(!verify_password("x", "pbkdf2:ten:aa:bb"));
        assert!(!verify_password("x", "pbkdf2:10:zz:bb"));
    }

    #[test]
    fn jwt_subject_is_user_id() {
        let id = Uuid::new_v4();
        let token = issue_jwt("secret", 30, id).unwrap();
        assert_eq!(verify_jwt(&token, "secret"), Some(id));
        assert_eq!(verify_jwt(&token, "other"), None);
    }
}
