//! Short-lived regret decisions awaiting the user's answer.
//!
//! A regret warning parks the already-parsed intent under a random token, so
//! the second round can confirm or cancel without sending the command again.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::interpreter::ParsedIntent;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecisionError {
    #[error("Decision token not found or expired")]
    Unknown,

    #[error("Decision token belongs to another user")]
    Forbidden,
}

#[derive(Debug, Clone)]
pub struct PendingDecision {
    pub user_id: Uuid,
    pub command: String,
    pub intent: ParsedIntent,
    pub keyword: String,
    created_at: Instant,
}

pub struct PendingDecisions {
    entries: RwLock<HashMap<Uuid, PendingDecision>>,
    ttl: Duration,
}

impl PendingDecisions {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    fn is_expired(&self, decision: &PendingDecision) -> bool {
        decision.created_at.elapsed() >= self.ttl
    }

    pub async fn park(
        &self,
        user_id: Uuid,
        command: &str,
        intent: ParsedIntent,
        keyword: &str,
    ) -> Uuid {
        let token = Uuid::new_v4();
        let decision = PendingDecision {
            user_id,
            command: command.to_string(),
            intent,
            keyword: keyword.to_string(),
            created_at: Instant::now(),
        };
        self.entries.write().await.insert(token, decision);
        token
    }

    /// Redeem a token. Each token works once; a foreign user's attempt
    /// leaves it in place for its owner.
    pub async fn take(&self, token: Uuid, user_id: Uuid) -> Result<PendingDecision, DecisionError> {
        let mut entries = self.entries.write().await;
        let decision = entries.get(&token).ok_or(DecisionError::Unknown)?;

        if self.is_expired(decision) {
            entries.remove(&token);
            return Err(DecisionError::Unknown);
        }
        if decision.user_id != user_id {
            return Err(DecisionError::Forbidden);
        }
        entries.remove(&token).ok_or(DecisionError::Unknown)
    }

    /// Drop expired entries, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        let ttl = self.ttl;
        entries.retain(|_, d| d.created_at.elapsed() < ttl);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

/// Periodically purge expired decisions. Runs until the runtime shuts down.
pub async fn start_cleanup_task(decisions: Arc<PendingDecisions>, interval: Duration) {
    tracing::info!("Starting pending decision cleanup background task");

    loop {
        tokio::time::sleep(interval).await;
        let purged = decisions.purge_expired().await;
        if purged > 0 {
            tracing::debug!("Purged {} expired regret decisions", purged);
        }
    }
}
