//! Text-completion gateway.
//!
//! A trait-based abstraction over completion providers, with Gemini as the
//! primary implementation. [`CompletionGateway`] wraps any [`LlmClient`] in a
//! bounded retry envelope; every AI-derived feature goes through it.

mod error;
mod gemini;

pub use error::{classify_http_status, GatewayError, LlmError, LlmErrorKind, RetryConfig};
pub use gemini::GeminiClient;

use async_trait::async_trait;
use std::sync::Arc;

/// Trait for text-completion clients. One call is one upstream attempt.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a prompt and return the raw reply text.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Retrying front door to the completion service.
#[derive(Clone)]
pub struct CompletionGateway {
    client: Arc<dyn LlmClient>,
    retry: RetryConfig,
}

impl CompletionGateway {
    pub fn new(client: Arc<dyn LlmClient>, retry: RetryConfig) -> Self {
        Self { client, retry }
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Send a prompt, retrying any failure up to `max_attempts` times with a
    /// linearly increasing delay between attempts.
    pub async fn complete(&self, prompt: &str) -> Result<String, GatewayError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.client.complete(prompt).await {
                Ok(text) => {
                    if attempt > 1 {
                        tracing::info!("Completion succeeded on attempt {}", attempt);
                    }
                    return Ok(text);
                }
                Err(error) if attempt < max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    tracing::warn!(
                        "Completion attempt {}/{} failed with {}, retrying in {:?}: {}",
                        attempt,
                        max_attempts,
                        error.kind,
                        delay,
                        error.message
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => {
                    tracing::error!(
                        "Completion failed after {} attempts: {}",
                        attempt,
                        error
                    );
                    return Err(GatewayError::Exhausted {
                        attempts: attempt,
                        last: error,
                    });
                }
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{gateway, ScriptedClient};
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn returns_first_successful_reply() {
        let client = ScriptedClient::new(|_| Ok("hello".to_string()));
        let gw = gateway(client.clone());
        assert_eq!(gw.complete("hi").await.unwrap(), "hello");
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let client = ScriptedClient::new(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(LlmError::network_error("reset".to_string()))
            } else {
                Ok("third time lucky".to_string())
            }
        });
        let gw = gateway(client.clone());
        assert_eq!(gw.complete("hi").await.unwrap(), "third time lucky");
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn exhausts_after_fixed_attempts_and_keeps_last_error() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let client = ScriptedClient::new(move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Err(LlmError::client_error(400, format!("attempt {}", n)))
        });
        let gw = gateway(client.clone());
        let err = gw.complete("hi").await.unwrap_err();
        assert_eq!(client.calls(), 3);
        match err {
            GatewayError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert_eq!(last.message, "attempt 3");
            }
        }
    }
}
