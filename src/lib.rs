//! # PocketPilot
//!
//! Personal-finance API: users log income and expenses, set monthly
//! budgets, fund savings goals and get language-model advice on their
//! spending.
//!
//! ## Architecture
//!
//! ```text
//!   HTTP (axum) ──► api ──► ai ──► llm (Gemini, retried)
//!                    │       │
//!                    ▼       ▼
//!                  ledger (memory | sqlite)
//! ```
//!
//! ## Modules
//! - `api`: routes, JWT auth and the JSON error envelope
//! - `ai`: command interpretation, the commit workflow, regret matching,
//!   round-ups and insight generators
//! - `ledger`: storage trait and backends
//! - `llm`: completion client and retrying gateway
//! - `config`: environment configuration

pub mod ai;
pub mod api;
pub mod config;
pub mod ledger;
pub mod llm;

pub use config::Config;
