//! Condensing a span of turns into a single summary text.
//!
//! The primary strategy asks the model itself: the span is sent as a one-shot
//! request with an instruction turn appended, separate from the live
//! transcript. When that call fails, the configured [`SummaryFallback`]
//! decides whether a deterministic truncation summary is used instead or the
//! compression is deferred to a later turn.

use tracing::{debug, warn};

use crate::api::gateway::{CallPolicy, CompletionGateway};
use crate::{Role, Turn};

/// Instruction appended to the span when asking the model for a summary.
pub const SUMMARIZATION_PROMPT: &str = "\
Summarize the conversation above in a single paragraph.
This summary replaces the older half of the conversation history, so give \
recent messages more weight than older ones.
If an earlier summary states how many times the history has been pruned, \
increment that count and state it; otherwise state that this is prune number 1.
Keep it under roughly 300 words. Be dense and concrete and skip filler words.";

/// Characters kept from each non-assistant turn by the fallback summary.
pub const FALLBACK_FRAGMENT_CHARS: usize = 50;

/// What to do when the model cannot produce a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SummaryFallback {
    /// Build a truncation summary locally so pruning still makes progress.
    #[default]
    Truncate,
    /// Skip compression this cycle and try again on a later turn.
    Defer,
}

/// Configuration for [`Summarizer`].
#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    /// Instruction turn appended to the span.
    pub prompt: String,
    pub fallback: SummaryFallback,
    /// Characters kept per turn by the truncation fallback.
    pub fragment_chars: usize,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            prompt: SUMMARIZATION_PROMPT.to_string(),
            fallback: SummaryFallback::default(),
            fragment_chars: FALLBACK_FRAGMENT_CHARS,
        }
    }
}

/// Where a summary's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummarySource {
    Model,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub text: String,
    pub source: SummarySource,
}

#[derive(Debug, Clone, Default)]
pub struct Summarizer {
    pub config: SummarizerConfig,
}

impl Summarizer {
    pub fn new(config: SummarizerConfig) -> Self {
        Self { config }
    }

    /// The one-shot request: the span followed by the instruction turn.
    pub fn build_request(&self, span: &[Turn]) -> Vec<Turn> {
        let mut request = Vec::with_capacity(span.len() + 1);
        request.extend_from_slice(span);
        request.push(Turn::user(self.config.prompt.as_str()));
        request
    }

    /// Summarize `span`, or `None` when it is empty or when the model failed
    /// and the fallback is [`SummaryFallback::Defer`].
    pub async fn summarize(
        &self,
        gateway: &dyn CompletionGateway,
        policy: &CallPolicy,
        span: &[Turn],
    ) -> Option<Summary> {
        if span.is_empty() {
            return None;
        }

        let request = self.build_request(span);
        match policy.call(gateway, &request).await {
            Ok(text) => {
                debug!("Summarized {} turns into {} chars", span.len(), text.len());
                Some(Summary {
                    text,
                    source: SummarySource::Model,
                })
            }
            Err(e) => match self.config.fallback {
                SummaryFallback::Truncate => {
                    warn!("Summarization failed: {e}. Using truncation fallback.");
                    Some(Summary {
                        text: fallback_summary(span, self.config.fragment_chars),
                        source: SummarySource::Fallback,
                    })
                }
                SummaryFallback::Defer => {
                    warn!("Summarization failed: {e}. Deferring compaction.");
                    None
                }
            },
        }
    }
}

/// Deterministic summary: the first `fragment_chars` characters of every
/// non-assistant turn, joined by single spaces.
pub fn fallback_summary(span: &[Turn], fragment_chars: usize) -> String {
    span.iter()
        .filter(|t| t.role() != Role::Assistant)
        .map(|t| t.content().chars().take(fragment_chars).collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::gateway::FnGateway;
    use crate::error::GatewayError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn span() -> Vec<Turn> {
        vec![
            Turn::user("How do I reverse a linked list in place without extra memory?"),
            Turn::assistant("Walk the list keeping prev, current and next pointers."),
            Turn::user("And recursively?"),
        ]
    }

    fn failing() -> FnGateway<impl Fn(&[Turn]) -> Result<String, GatewayError> + Send + Sync> {
        FnGateway::new(|_| Err(GatewayError::Network("unreachable".into())))
    }

    #[test]
    fn request_appends_instruction_turn() {
        let summarizer = Summarizer::default();
        let request = summarizer.build_request(&span());
        assert_eq!(request.len(), 4);
        assert_eq!(&request[..3], span().as_slice());
        assert_eq!(request[3].role(), Role::User);
        assert!(request[3].content().contains("Summarize"));
    }

    #[test]
    fn fallback_takes_prefix_of_non_assistant_turns() {
        let text = fallback_summary(&span(), 50);
        assert_eq!(
            text,
            "How do I reverse a linked list in place without ex And recursively?"
        );
        assert!(!text.contains("prev"));
    }

    #[test]
    fn fallback_length_is_bounded() {
        let turns = vec![
            Turn::user("x".repeat(500)),
            Turn::system("y".repeat(80)),
            Turn::assistant("z".repeat(500)),
            Turn::user("short"),
        ];
        let text = fallback_summary(&turns, 50);
        let non_assistant = 3;
        assert!(text.chars().count() <= 50 * non_assistant + (non_assistant - 1));
    }

    #[test]
    fn fallback_respects_char_boundaries() {
        let turns = vec![Turn::user("é".repeat(60))];
        let text = fallback_summary(&turns, 50);
        assert_eq!(text.chars().count(), 50);
    }

    #[test]
    fn fallback_of_assistant_only_span_is_empty_string() {
        let turns = vec![Turn::assistant("only me")];
        assert_eq!(fallback_summary(&turns, 50), "");
    }

    #[tokio::test]
    async fn model_summary_is_used_when_available() {
        let seen = AtomicUsize::new(0);
        let gateway = FnGateway::new(|turns| {
            seen.store(turns.len(), Ordering::SeqCst);
            Ok("dense summary".into())
        });
        let summary = Summarizer::default()
            .summarize(&gateway, &CallPolicy::default(), &span())
            .await
            .unwrap();
        assert_eq!(summary.text, "dense summary");
        assert_eq!(summary.source, SummarySource::Model);
        assert_eq!(seen.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn failure_uses_truncation_by_default() {
        let summary = Summarizer::default()
            .summarize(&failing(), &CallPolicy::default(), &span())
            .await
            .unwrap();
        assert_eq!(summary.source, SummarySource::Fallback);
        assert_eq!(summary.text, fallback_summary(&span(), 50));
    }

    #[tokio::test]
    async fn failure_with_defer_yields_none() {
        let summarizer = Summarizer::new(SummarizerConfig {
            fallback: SummaryFallback::Defer,
            ..Default::default()
        });
        let result = summarizer
            .summarize(&failing(), &CallPolicy::default(), &span())
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn empty_span_short_circuits() {
        let calls = AtomicUsize::new(0);
        let gateway = FnGateway::new(|_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok("unused".into())
        });
        let result = Summarizer::default()
            .summarize(&gateway, &CallPolicy::default(), &[])
            .await;
        assert!(result.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
