//! Events and handlers for [`ConversationSession`](super::session::ConversationSession).
//!
//! The session reports what it decided (loading, pruning, persistence,
//! replies) through [`SessionEvent`] values. Failures that the session
//! recovers from on its own, such as a failed save or an unreadable stored
//! transcript, are only visible here.
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or fire-and-forget sessions |
//! | [`LoggingHandler`] | Structured logging via `tracing` (the default) |
//! | [`FnEventHandler`] | Quick closures for simple callbacks |
//! | Custom `impl EventHandler` | Metrics, UI updates |

use tracing::{debug, info, warn};

use crate::context::pruning::PruneOutcome;
use crate::error::{GatewayError, StoreError};

#[derive(Debug)]
pub enum SessionEvent<'a> {
    /// The session is ready. `resumed` is true when the transcript was
    /// loaded from the store.
    Opened { turns: usize, resumed: bool },
    /// The stored transcript could not be loaded; the session starts fresh.
    LoadFailed { error: &'a StoreError },
    /// The pruning policy ran before a user turn.
    PruneEvaluated { outcome: &'a PruneOutcome },
    /// The assistant replied.
    Replied { chars: usize, turns: usize },
    /// The reply call failed; the user turn is kept.
    GatewayFailed { error: &'a GatewayError },
    /// Persisting the transcript failed; the in-memory state is kept.
    SaveFailed { error: &'a StoreError },
}

pub trait EventHandler: Send + Sync {
    fn on_event(&self, conversation_id: &str, event: &SessionEvent<'_>) {
        let _ = (conversation_id, event);
    }
}

pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
///
/// # Example
///
/// ```ignore
/// let handler = FnEventHandler::new(|id, event| {
///     if let SessionEvent::SaveFailed { error } = event {
///         eprintln!("{id}: {error}");
///     }
/// });
/// ```
pub struct FnEventHandler<F>(F)
where
    F: Fn(&str, &SessionEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&str, &SessionEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&str, &SessionEvent<'_>) + Send + Sync,
{
    fn on_event(&self, conversation_id: &str, event: &SessionEvent<'_>) {
        (self.0)(conversation_id, event)
    }
}

/// An event handler that logs events via `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, id: &str, event: &SessionEvent<'_>) {
        match event {
            SessionEvent::Opened { turns, resumed } => {
                if *resumed {
                    info!("[{id}] resumed conversation with {turns} turns");
                } else {
                    info!("[{id}] started new conversation");
                }
            }
            SessionEvent::LoadFailed { error } => {
                warn!("[{id}] could not load conversation ({error}); starting fresh");
            }
            SessionEvent::PruneEvaluated { outcome } => match outcome {
                PruneOutcome::BelowTurnThreshold { turns } => {
                    debug!("[{id}] {turns} turns, pruning not needed");
                }
                PruneOutcome::BelowSizeLimit { size } => {
                    debug!("[{id}] size only {size} bytes, pruning not needed");
                }
                PruneOutcome::NothingToCompress => {
                    debug!("[{id}] nothing to compress");
                }
                PruneOutcome::Deferred { size } => {
                    warn!("[{id}] pruning deferred at {size} bytes: no summary available");
                }
                PruneOutcome::Compressed {
                    replaced,
                    size_before,
                    source,
                } => {
                    info!(
                        "[{id}] compressed {replaced} turns ({source:?} summary), was {size_before} bytes"
                    );
                }
            },
            SessionEvent::Replied { chars, turns } => {
                debug!("[{id}] reply of {chars} chars, transcript now {turns} turns");
            }
            SessionEvent::GatewayFailed { error } => {
                warn!("[{id}] completion failed: {error}");
            }
            SessionEvent::SaveFailed { error } => {
                warn!("[{id}] failed to save conversation: {error}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn fn_handler_receives_events() {
        let seen = Mutex::new(Vec::new());
        let handler = FnEventHandler::new(|id, event| {
            seen.lock().unwrap().push(format!("{id}:{event:?}"));
        });

        handler.on_event("c1", &SessionEvent::Opened {
            turns: 1,
            resumed: false,
        });
        let outcome = PruneOutcome::NothingToCompress;
        handler.on_event("c1", &SessionEvent::PruneEvaluated { outcome: &outcome });

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].starts_with("c1:Opened"));
        assert!(seen[1].contains("NothingToCompress"));
    }

    #[test]
    fn logging_and_noop_handlers_accept_every_event() {
        let store_err = StoreError::NotFound("x".into());
        let gateway_err = GatewayError::EmptyResult;
        let outcome = PruneOutcome::Deferred { size: 10 };
        let events = [
            SessionEvent::Opened {
                turns: 3,
                resumed: true,
            },
            SessionEvent::LoadFailed { error: &store_err },
            SessionEvent::PruneEvaluated { outcome: &outcome },
            SessionEvent::Replied { chars: 5, turns: 3 },
            SessionEvent::GatewayFailed {
                error: &gateway_err,
            },
            SessionEvent::SaveFailed { error: &store_err },
        ];
        for event in &events {
            LoggingHandler.on_event("c", event);
            NoopHandler.on_event("c", event);
        }
    }
}
