//! Configuration for a [`ConversationSession`](super::session::ConversationSession).
//!
//! # Examples
//!
//! Defaults: prune past 20 turns and 250 bytes, truncation fallback, 120 s
//! gateway timeout, no retries:
//!
//! ```
//! use chat_pruner::agent::config::SessionConfig;
//!
//! let config = SessionConfig::default();
//! assert_eq!(config.trigger.trigger_size, 20);
//! ```
//!
//! Customized with builder methods:
//!
//! ```
//! use std::time::Duration;
//! use chat_pruner::agent::config::SessionConfig;
//! use chat_pruner::context::{PruneTrigger, SummaryFallback};
//!
//! let config = SessionConfig::new("You are terse.")
//!     .with_trigger(PruneTrigger::new(40, 16 * 1024))
//!     .with_fallback(SummaryFallback::Defer)
//!     .with_timeout(Duration::from_secs(30))
//!     .with_retries(2);
//! assert_eq!(config.call.retry.max_retries, 2);
//! ```

use std::time::Duration;

use crate::api::gateway::CallPolicy;
use crate::api::retry::RetryConfig;
use crate::context::pruning::{PruneTrigger, PruningPolicy};
use crate::context::summarizer::{Summarizer, SummarizerConfig, SummaryFallback};

/// Default system instruction for new conversations.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a helpful assistant. Once this conversation grows past a certain size, \
its older half is replaced by a summary you wrote yourself, placed right after \
this message. Treat that summary as the earlier conversation. There is no need \
to mention the summarizing unless you are asked about it.";

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Instruction placed in the system turn of new conversations.
    pub system_prompt: String,
    /// When compression is attempted.
    pub trigger: PruneTrigger,
    /// How summaries are requested and what happens when that fails.
    pub summarizer: SummarizerConfig,
    /// Timeout and retry for every gateway call (replies and summaries).
    pub call: CallPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            trigger: PruneTrigger::default(),
            summarizer: SummarizerConfig::default(),
            call: CallPolicy::default(),
        }
    }
}

impl SessionConfig {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_trigger(mut self, trigger: PruneTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn with_fallback(mut self, fallback: SummaryFallback) -> Self {
        self.summarizer.fallback = fallback;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.call.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.call.retry = RetryConfig::with_retries(retries);
        self
    }

    /// The pruning policy described by this config.
    pub fn pruning_policy(&self) -> PruningPolicy {
        PruningPolicy::new(self.trigger, Summarizer::new(self.summarizer.clone()))
    }
}
