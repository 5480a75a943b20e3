//! Conversation runtime: sessions, the id-keyed hub, and their supporting
//! modules.
//!
//! - [`session::ConversationSession`] runs one conversation's prune → append
//!   → reply → persist cycle. Start here.
//! - [`hub::SessionHub`] maps conversation ids to sessions and rejects
//!   overlapping submits on the same id.
//! - [`config::SessionConfig`] holds the system prompt, pruning trigger,
//!   summary fallback, and call policy.
//! - [`events`] has the [`EventHandler`] trait and [`SessionEvent`] enum for
//!   observing sessions, with [`LoggingHandler`] as the default.

pub mod config;
pub mod events;
pub mod hub;
pub mod session;

pub use config::{DEFAULT_SYSTEM_PROMPT, SessionConfig};
pub use events::{EventHandler, FnEventHandler, LoggingHandler, NoopHandler, SessionEvent};
pub use hub::SessionHub;
pub use session::{ConversationSession, SessionContext, fresh_conversation_id};
