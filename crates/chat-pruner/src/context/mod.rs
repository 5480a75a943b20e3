//! Keeping the transcript bounded: the pruning policy and the summarizer.
//!
//! 1. **[`pruning`]**: [`PruningPolicy`] decides whether compression is due
//!    (turn count, then persisted byte size) and splices a summary turn in
//!    place of the oldest half of the history. The system turn is never
//!    touched.
//!
//! 2. **[`summarizer`]**: [`Summarizer`] asks the model for a dense summary of
//!    a span of turns, with a deterministic truncation fallback when the model
//!    is unavailable.

pub mod pruning;
pub mod summarizer;

pub use pruning::{PruneOutcome, PruneTrigger, PruningPolicy};
pub use summarizer::{Summarizer, SummarizerConfig, Summary, SummaryFallback, SummarySource};
