//! Convenience re-exports for common `chat-pruner` types.
//!
//! ```ignore
//! use chat_pruner::prelude::*;
//! ```
//!
//! Pulls in the client, transcript types, session runtime, stores, and the
//! pruning policy. The raw summarizer and retry helpers stay in their modules.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::error::{GatewayError, SessionError, StoreError};
pub use crate::transcript::Transcript;
pub use crate::{ClientOptions, OpenRouterClient, Role, Turn};

// ── Gateway ─────────────────────────────────────────────────────────
pub use crate::api::{CallPolicy, CompletionGateway, FnGateway, RetryConfig};

// ── Agent runtime ───────────────────────────────────────────────────
pub use crate::agent::{
    ConversationSession, EventHandler, FnEventHandler, LoggingHandler, NoopHandler,
    SessionConfig, SessionContext, SessionEvent, SessionHub,
};

// ── Context management ──────────────────────────────────────────────
pub use crate::context::{PruneOutcome, PruneTrigger, SummaryFallback};

// ── Storage ─────────────────────────────────────────────────────────
pub use crate::store::{FileStore, MemoryStore, TranscriptStore};
