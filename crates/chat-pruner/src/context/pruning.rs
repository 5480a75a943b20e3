//! When and how a transcript is compressed.
//!
//! Compression is gated twice. The turn count must exceed
//! [`PruneTrigger::trigger_size`], and then the persisted size in bytes must
//! exceed [`PruneTrigger::limit`]. A conversation with many short turns
//! therefore keeps its full context.
//!
//! When both gates pass, with `half = len / 2`:
//!
//! ```text
//! before:  [sys, t1 .. t(half-1), t(half) .. t(len-1)]
//!                └──── head ────┘ └────── tail ──────┘
//! after:   [sys, summary(head), t(half) .. t(len-1)]
//! ```

use tracing::{debug, info};

use crate::api::gateway::{CallPolicy, CompletionGateway};
use crate::context::summarizer::{Summarizer, SummarySource};
use crate::transcript::Transcript;

/// Thresholds gating compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PruneTrigger {
    /// Compression is only considered when the transcript has more turns
    /// than this.
    pub trigger_size: usize,
    /// Serialized size in bytes above which compression happens.
    pub limit: u64,
}

impl Default for PruneTrigger {
    fn default() -> Self {
        Self {
            trigger_size: 20,
            limit: 250,
        }
    }
}

impl PruneTrigger {
    pub fn new(trigger_size: usize, limit: u64) -> Self {
        Self {
            trigger_size,
            limit,
        }
    }
}

/// Result of one [`PruningPolicy::maybe_compress`] evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PruneOutcome {
    /// Not enough turns to consider compression.
    BelowTurnThreshold { turns: usize },
    /// Enough turns, but the persisted size is within the limit.
    BelowSizeLimit { size: u64 },
    /// The head range was empty.
    NothingToCompress,
    /// No summary could be produced; the transcript is unchanged.
    Deferred { size: u64 },
    Compressed {
        /// Number of turns replaced by the summary turn.
        replaced: usize,
        size_before: u64,
        source: SummarySource,
    },
}

impl PruneOutcome {
    pub fn is_compressed(&self) -> bool {
        matches!(self, PruneOutcome::Compressed { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct PruningPolicy {
    pub trigger: PruneTrigger,
    pub summarizer: Summarizer,
}

impl PruningPolicy {
    pub fn new(trigger: PruneTrigger, summarizer: Summarizer) -> Self {
        Self {
            trigger,
            summarizer,
        }
    }

    /// Index of the first turn kept verbatim.
    pub fn split_point(len: usize) -> usize {
        len / 2
    }

    /// Compress `transcript` in place if both thresholds are exceeded.
    ///
    /// `measure_size` is only invoked once the turn threshold is passed; it
    /// should report the size of the transcript as persisted.
    pub async fn maybe_compress(
        &self,
        transcript: &mut Transcript,
        measure_size: impl FnOnce(&Transcript) -> u64,
        gateway: &dyn CompletionGateway,
        policy: &CallPolicy,
    ) -> PruneOutcome {
        let len = transcript.len();
        if len <= self.trigger.trigger_size {
            return PruneOutcome::BelowTurnThreshold { turns: len };
        }

        let size = measure_size(transcript);
        if size <= self.trigger.limit {
            debug!(
                "Transcript has {len} turns but only {size} bytes (limit {}); not pruning",
                self.trigger.limit
            );
            return PruneOutcome::BelowSizeLimit { size };
        }

        let half = Self::split_point(len);
        let head = transcript.head(half);
        if head.is_empty() {
            return PruneOutcome::NothingToCompress;
        }

        let Some(summary) = self.summarizer.summarize(gateway, policy, head).await else {
            return PruneOutcome::Deferred { size };
        };

        let replaced = transcript.splice_summary(half, summary.text);
        info!(
            "Pruned transcript: {replaced} turns summarized ({:?}), {len} -> {} turns, was {size} bytes",
            summary.source,
            transcript.len()
        );
        PruneOutcome::Compressed {
            replaced,
            size_before: size,
            source: summary.source,
        }
    }
}
