//! Voice/text command to persisted transaction.
//!
//! interpret → extract keyword → regret gate → optional round-up → commit.
//! A regret match halts the flow until the caller answers; nothing is
//! written on the warning or cancel paths.

use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use super::interpreter::{CommandInterpreter, InterpretError, ParsedIntent};
use super::pending::{DecisionError, PendingDecisions};
use super::regret::RegretMatcher;
use super::round_up::RoundUpAdjuster;
use crate::ledger::{
    LedgerStore, RoundUp, StoreError, Transaction, TransactionType, User,
};

pub const CANCELLED_MESSAGE: &str = "Transaction cancelled based on your regret feedback.";

#[derive(Debug, Error)]
pub enum CommitError {
    #[error(transparent)]
    Interpret(#[from] InterpretError),

    #[error(transparent)]
    Decision(#[from] DecisionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One round of the submission protocol.
#[derive(Debug, Clone)]
pub enum Submission {
    /// Free-text command, optionally with the answer to an earlier warning.
    Command {
        command: String,
        confirm_regret: Option<bool>,
    },
    /// Answer to a warning, referring to the intent parked under `token`.
    Decision { token: Uuid, confirm_regret: bool },
}

#[derive(Debug, Clone)]
pub enum CommitOutcome {
    Committed {
        transaction: Transaction,
        round_up: Option<RoundUp>,
    },
    RegretWarning {
        keyword: String,
        message: String,
        token: Uuid,
    },
    Cancelled {
        message: String,
    },
}

pub fn regret_warning_message(keyword: &str) -> String {
    format!(
        "You reported regret for a similar purchase before (\"{}\"). Are you sure you want to continue?",
        keyword
    )
}

#[derive(Clone)]
pub struct TransactionCommitWorkflow {
    store: Arc<dyn LedgerStore>,
    interpreter: CommandInterpreter,
    matcher: RegretMatcher,
    adjuster: RoundUpAdjuster,
    pending: Arc<PendingDecisions>,
}

impl TransactionCommitWorkflow {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        interpreter: CommandInterpreter,
        adjuster: RoundUpAdjuster,
        pending: Arc<PendingDecisions>,
    ) -> Self {
        Self {
            matcher: RegretMatcher::new(store.clone()),
            store,
            interpreter,
            adjuster,
            pending,
        }
    }

    pub async fn submit(
        &self,
        user: &User,
        submission: Submission,
    ) -> Result<CommitOutcome, CommitError> {
        match submission {
            Submission::Command {
                command,
                confirm_regret,
            } => self.submit_command(user, &command, confirm_regret).await,
            Submission::Decision {
                token,
                confirm_regret,
            } => {
                let decision = self.pending.take(token, user.id).await?;
                if !confirm_regret {
                    tracing::info!(user_id = %user.id, "Regretted purchase cancelled");
                    return Ok(CommitOutcome::Cancelled {
                        message: CANCELLED_MESSAGE.to_string(),
                    });
                }
                self.commit(user, &decision.command, &decision.intent).await
            }
        }
    }

    async fn submit_command(
        &self,
        user: &User,
        command: &str,
        confirm_regret: Option<bool>,
    ) -> Result<CommitOutcome, CommitError> {
        let intent = self.interpreter.interpret(command).await?;
        let keyword = self.interpreter.extract_keyword(command).await?;

        let prior = self
            .matcher
            .find_regretted(user.id, intent.category, &keyword)
            .await?;

        if let Some(prior) = prior {
            match confirm_regret {
                None => {
                    let token = self.pending.park(user.id, command, intent, &keyword).await;
                    tracing::info!(
                        user_id = %user.id,
                        prior_transaction = %prior.id,
                        "Regret warning raised for '{}'",
                        keyword
                    );
                    return Ok(CommitOutcome::RegretWarning {
                        message: regret_warning_message(&keyword),
                        keyword,
                        token,
                    });
                }
                Some(false) => {
                    return Ok(CommitOutcome::Cancelled {
                        message: CANCELLED_MESSAGE.to_string(),
                    });
                }
                Some(true) => {}
            }
        }

        self.commit(user, command, &intent).await
    }

    async fn commit(
        &self,
        user: &User,
        command: &str,
        intent: &ParsedIntent,
    ) -> Result<CommitOutcome, CommitError> {
        let mut tx = Transaction::new(
            user.id,
            intent.amount,
            intent.kind,
            intent.category,
            command,
            intent.payment_method,
        );

        let mut added = None;
        if user.round_up_enabled && intent.kind == TransactionType::Expense {
            let adjustment = self.adjuster.adjust(intent.amount).await;
            tx.amount = adjustment.adjusted;
            added = Some(adjustment.added());
        }

        let (transaction, round_up) = self.store.commit_transaction(tx, added).await?;
        tracing::info!(
            user_id = %user.id,
            transaction_id = %transaction.id,
            "Committed {} of {} in {}",
            transaction.kind.as_str(),
            transaction.amount,
            transaction.category
        );
        Ok(CommitOutcome::Committed {
            transaction,
            round_up,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Category, InMemoryLedgerStore, PaymentMethod, TransactionQuery};
    use crate::llm::testing::{gateway, ScriptedClient};
    use crate::llm::LlmError;
    use chrono::Utc;
    use std::time::Duration;

    /// Answers the three prompts the workflow sends.
    fn scripted(intent_json: &'static str, keyword: &'static str) -> Arc<ScriptedClient> {
        ScriptedClient::new(move |prompt| {
            if prompt.contains("main product or item name") {
                Ok(keyword.to_string())
            } else if prompt.contains("roundedAmount") {
                Err(LlmError::server_error(500, "no rounding today".to_string()))
            } else {
                Ok(intent_json.to_string())
            }
        })
    }

    fn user(round_up_enabled: bool) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Riya".to_string(),
            email: "riya@example.com".to_string(),
            password_hash: String::new(),
            monthly_income: 50000.0,
            round_up_enabled,
            created_at: Utc::now(),
        }
    }

    fn workflow(
        store: Arc<InMemoryLedgerStore>,
        client: Arc<ScriptedClient>,
    ) -> TransactionCommitWorkflow {
        let gw = gateway(client);
        TransactionCommitWorkflow::new(
            store,
            CommandInterpreter::new(gw.clone()),
            RoundUpAdjuster::new(gw, 10.0),
            Arc::new(PendingDecisions::new(Duration::from_secs(60))),
        )
    }

    async fn flag_regret(store: &InMemoryLedgerStore, user: &User, description: &str) {
        let mut tx = Transaction::new(
            user.id,
            2500.0,
            TransactionType::Expense,
            Category::Shopping,
            description,
            PaymentMethod::CreditCard,
        );
        tx.regret_feedback = true;
        tx.regret_notes = "stopped using it".to_string();
        store.insert_transaction(tx).await.unwrap();
    }

    async fn count(store: &InMemoryLedgerStore, user: &User) -> usize {
        store
            .count_transactions(&TransactionQuery::for_user(user.id))
            .await
            .unwrap()
    }

    fn command(text: &str, confirm_regret: Option<bool>) -> Submission {
        Submission::Command {
            command: text.to_string(),
            confirm_regret,
        }
    }

    const CHOCOLATE: &str =
        r#"{"amount": 500, "category": "Shopping", "paymentMethod": "cash", "type": "expense"}"#;
    const FITBIT: &str = r#"{"amount": 3000, "category": "Shopping", "type": "expense"}"#;

    #[tokio::test]
    async fn commits_without_regret_history() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let wf = workflow(store.clone(), scripted(CHOCOLATE, "chocolate"));
        let user = user(false);

        let outcome = wf
            .submit(&user, command("I spent 500 for buying chocolate with cash", None))
            .await
            .unwrap();
        match outcome {
            CommitOutcome::Committed {
                transaction,
                round_up,
            } => {
                assert_eq!(transaction.amount, 500.0);
                assert_eq!(transaction.kind, TransactionType::Expense);
                assert_eq!(transaction.category, Category::Shopping);
                assert_eq!(transaction.payment_method, PaymentMethod::Cash);
                assert_eq!(transaction.description, "I spent 500 for buying chocolate with cash");
                assert!(!transaction.regret_feedback);
                assert!(transaction.regret_notes.is_empty());
                assert!(round_up.is_none());
            }
            other => panic!("expected commit, got {:?}", other),
        }
        assert!(store.list_round_ups(user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn regret_gate_warns_repeatedly_then_honours_answer() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let wf = workflow(store.clone(), scripted(FITBIT, "Fitbit"));
        let user = user(false);
        flag_regret(&store, &user, "Bought a Fitbit Charge").await;
        let text = "I want to buy a new Fitbit for 3000";

        for _ in 0..2 {
            match wf.submit(&user, command(text, None)).await.unwrap() {
                CommitOutcome::RegretWarning { message, keyword, .. } => {
                    assert!(message.contains("Fitbit"));
                    assert_eq!(keyword, "Fitbit");
                }
                other => panic!("expected warning, got {:?}", other),
            }
        }
        assert_eq!(count(&store, &user).await, 1);

        let cancelled = wf.submit(&user, command(text, Some(false))).await.unwrap();
        assert!(matches!(cancelled, CommitOutcome::Cancelled { .. }));
        assert_eq!(count(&store, &user).await, 1);

        let committed = wf.submit(&user, command(text, Some(true))).await.unwrap();
        assert!(matches!(committed, CommitOutcome::Committed { .. }));
        assert_eq!(count(&store, &user).await, 2);
    }

    #[tokio::test]
    async fn decision_token_confirms_without_reparsing() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let client = scripted(FITBIT, "Fitbit");
        let wf = workflow(store.clone(), client.clone());
        let user = user(false);
        flag_regret(&store, &user, "fitbit").await;

        let token = match wf
            .submit(&user, command("buy a Fitbit for 3000", None))
            .await
            .unwrap()
        {
            CommitOutcome::RegretWarning { token, .. } => token,
            other => panic!("expected warning, got {:?}", other),
        };
        let calls_after_warning = client.calls();

        let outcome = wf
            .submit(
                &user,
                Submission::Decision {
                    token,
                    confirm_regret: true,
                },
            )
            .await
            .unwrap();
        match outcome {
            CommitOutcome::Committed { transaction, .. } => {
                assert_eq!(transaction.amount, 3000.0);
                assert_eq!(transaction.description, "buy a Fitbit for 3000");
            }
            other => panic!("expected commit, got {:?}", other),
        }
        assert_eq!(client.calls(), calls_after_warning);

        let reused = wf
            .submit(
                &user,
                Submission::Decision {
                    token,
                    confirm_regret: true,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(reused, CommitError::Decision(DecisionError::Unknown)));
    }

    #[tokio::test]
    async fn round_up_recorded_for_enabled_expense() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let json = r#"{"amount": 42.3, "category": "Food", "paymentMethod": "debit-card"}"#;
        let wf = workflow(store.clone(), scripted(json, "pizza"));
        let user = user(true);

        let outcome = wf.submit(&user, command("pizza for 42.30", None)).await.unwrap();
        let (transaction, round_up) = match outcome {
            CommitOutcome::Committed {
                transaction,
                round_up,
            } => (transaction, round_up.expect("round-up record")),
            other => panic!("expected commit, got {:?}", other),
        };
        assert_eq!(transaction.amount, 50.0);
        assert_eq!(round_up.added_amount, 7.7);
        assert_eq!(round_up.transaction_id, transaction.id);
        assert_eq!(store.total_round_ups(user.id).await.unwrap(), 7.7);
    }

    #[tokio::test]
    async fn income_is_never_rounded() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let json = r#"{"amount": 1234, "category": "Salary", "type": "income"}"#;
        let wf = workflow(store.clone(), scripted(json, "salary"));
        let user = user(true);

        let outcome = wf.submit(&user, command("got paid 1234", None)).await.unwrap();
        match outcome {
            CommitOutcome::Committed {
                transaction,
                round_up,
            } => {
                assert_eq!(transaction.amount, 1234.0);
                assert!(round_up.is_none());
            }
            other => panic!("expected commit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn invalid_category_persists_nothing() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let json = r#"{"amount": 10, "category": "Snacks"}"#;
        let wf = workflow(store.clone(), scripted(json, "chips"));
        let user = user(false);

        let err = wf.submit(&user, command("chips 10", None)).await.unwrap_err();
        assert!(matches!(
            err,
            CommitError::Interpret(InterpretError::InvalidAiResponse(_))
        ));
        assert_eq!(count(&store, &user).await, 0);
    }
}
