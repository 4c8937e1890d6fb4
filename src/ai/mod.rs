//! AI-assisted features on top of the ledger.
//!
//! - `interpreter`: free-text command to structured intent, product keyword,
//!   regret feedback
//! - `commit`: the regret-gated, round-up-aware transaction workflow
//! - `insights`: advice generators with deterministic fallbacks
//! - `aggregates`: ledger figures those generators are fed

pub mod aggregates;
pub mod commit;
pub mod insights;
pub mod interpreter;
pub mod pending;
pub mod regret;
pub mod reply;
pub mod round_up;

pub use commit::{CommitError, CommitOutcome, Submission, TransactionCommitWorkflow};
pub use insights::InsightService;
pub use interpreter::{CommandInterpreter, InterpretError, ParsedIntent, RegretReport};
pub use pending::{start_cleanup_task, DecisionError, PendingDecisions};
pub use regret::RegretMatcher;
pub use round_up::RoundUpAdjuster;
