//! HTTP API for PocketPilot.
//!
//! ## Endpoints
//!
//! - `GET /api/health` - Health check
//! - `POST /api/auth/register`, `POST /api/auth/login` - Obtain a bearer token
//! - `GET /api/auth/profile` - The authenticated user
//! - `POST /api/ai/voice-command` - Record a transaction from free text
//! - `GET /api/ai/insights` - Month-over-month summary
//! - `POST /api/ai/affordability`, `/regret-radar`, `/overspending`,
//!   `/savings-optimizer` - Model-backed advice with local fallbacks
//! - `/api/transactions`, `/api/budget`, `/api/savings`, `/api/income` - CRUD
//! - `GET /api/round-ups`, `GET /api/round-ups/total` - Round-up history
//! - `/api/regret-feedback` - Flag regretted purchases
//! - `PUT /api/user/round-up-preference` - Toggle round-ups

mod ai;
mod auth;
mod budgets;
mod error;
mod income;
mod regret;
mod round_ups;
mod routes;
mod savings;
mod transactions;
pub mod types;
mod user;

pub use error::{ApiError, ApiResult};
pub use routes::{app, serve, AppState};
