//! The completion gateway: anything that turns a list of turns into the next
//! assistant reply.
//!
//! [`CompletionGateway`] is object-safe so sessions can hold an
//! `Arc<dyn CompletionGateway>`. [`OpenRouterClient`] is the bundled HTTP
//! implementation; [`FnGateway`] wraps a closure for scripted or offline use.
//! Every call made by the session and the summarizer goes through a
//! [`CallPolicy`], which bounds it with a timeout and retries transient
//! failures.

use std::time::Duration;

use futures::future::BoxFuture;
use tracing::warn;

use crate::api::retry::{RetryConfig, is_transient};
use crate::error::GatewayError;
use crate::{OpenRouterClient, Turn};

/// Produces the next assistant turn's text for a sequence of turns.
pub trait CompletionGateway: Send + Sync {
    fn generate<'a>(&'a self, turns: &'a [Turn]) -> BoxFuture<'a, Result<String, GatewayError>>;
}

impl CompletionGateway for OpenRouterClient {
    fn generate<'a>(&'a self, turns: &'a [Turn]) -> BoxFuture<'a, Result<String, GatewayError>> {
        Box::pin(self.chat(turns))
    }
}

/// A gateway backed by a synchronous closure.
///
/// # Example
///
/// ```
/// use chat_pruner::api::gateway::FnGateway;
///
/// let echo = FnGateway::new(|turns| {
///     Ok(format!("you said: {}", turns.last().map_or("", |t| t.content())))
/// });
/// ```
pub struct FnGateway<F>(F)
where
    F: Fn(&[Turn]) -> Result<String, GatewayError> + Send + Sync;

impl<F> FnGateway<F>
where
    F: Fn(&[Turn]) -> Result<String, GatewayError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> CompletionGateway for FnGateway<F>
where
    F: Fn(&[Turn]) -> Result<String, GatewayError> + Send + Sync,
{
    fn generate<'a>(&'a self, turns: &'a [Turn]) -> BoxFuture<'a, Result<String, GatewayError>> {
        let result = (self.0)(turns);
        Box::pin(async move { result })
    }
}

/// Timeout and retry applied to a single logical gateway call.
#[derive(Debug, Clone)]
pub struct CallPolicy {
    /// Upper bound for one attempt. An elapsed attempt is a
    /// [`GatewayError::Timeout`] and counts as transient.
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            retry: RetryConfig::default(),
        }
    }
}

impl CallPolicy {
    pub async fn call(
        &self,
        gateway: &dyn CompletionGateway,
        turns: &[Turn],
    ) -> Result<String, GatewayError> {
        let mut attempt = 0;
        loop {
            let result = match tokio::time::timeout(self.timeout, gateway.generate(turns)).await {
                Ok(result) => result,
                Err(_) => Err(GatewayError::Timeout(self.timeout)),
            };

            match result {
                Ok(text) => return Ok(text),
                Err(e) if attempt < self.retry.max_retries && is_transient(&e) => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    attempt += 1;
                    warn!(
                        "Gateway call failed ({e}), retrying in {:.1}s (attempt {}/{})",
                        delay.as_secs_f64(),
                        attempt,
                        self.retry.max_retries
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
