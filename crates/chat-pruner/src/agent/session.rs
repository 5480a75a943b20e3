//! One conversation: its transcript, and the prune → append → reply → persist
//! cycle.
//!
//! A [`ConversationSession`] owns its [`Transcript`] and holds the injected
//! gateway and store through a [`SessionContext`]. `submit` takes `&mut self`,
//! so one session can never run two submits at once; callers that share
//! sessions across tasks go through [`SessionHub`](super::hub::SessionHub).

use std::sync::Arc;

use tracing::debug;

use crate::agent::config::SessionConfig;
use crate::agent::events::{EventHandler, LoggingHandler, SessionEvent};
use crate::api::gateway::CompletionGateway;
use crate::context::pruning::{PruneOutcome, PruningPolicy};
use crate::error::{SessionError, StoreError};
use crate::store::TranscriptStore;
use crate::transcript::Transcript;

/// Everything a session needs besides its own transcript. Cheap to clone.
#[derive(Clone)]
pub struct SessionContext {
    pub config: SessionConfig,
    pub gateway: Arc<dyn CompletionGateway>,
    pub store: Arc<dyn TranscriptStore>,
    pub handler: Arc<dyn EventHandler>,
}

impl SessionContext {
    /// Build a context that logs events through [`LoggingHandler`].
    pub fn new(
        config: SessionConfig,
        gateway: Arc<dyn CompletionGateway>,
        store: Arc<dyn TranscriptStore>,
    ) -> Self {
        Self {
            config,
            gateway,
            store,
            handler: Arc::new(LoggingHandler),
        }
    }

    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handler = handler;
        self
    }
}

/// A timestamp-derived id that has no stored transcript yet.
pub fn fresh_conversation_id(store: &dyn TranscriptStore) -> String {
    let base = chrono::Local::now()
        .format("conversation_%Y%m%d_%H%M%S")
        .to_string();
    let mut id = base.clone();
    let mut n = 1;
    while store.stored_size(&id).is_ok() {
        n += 1;
        id = format!("{base}_{n}");
    }
    id
}

pub struct ConversationSession {
    id: String,
    transcript: Transcript,
    policy: PruningPolicy,
    ctx: SessionContext,
}

impl ConversationSession {
    /// Open a conversation.
    ///
    /// - `None` starts a new conversation under a fresh id and saves it.
    /// - `Some(id)` loads the stored transcript. A missing one starts fresh
    ///   under that id and is saved right away. An unreadable or corrupt one
    ///   also starts fresh, but nothing is written until the next submit.
    pub fn open(ctx: SessionContext, id: Option<&str>) -> Self {
        let policy = ctx.config.pruning_policy();
        let fresh = || Transcript::new(ctx.config.system_prompt.as_str());

        let (id, transcript, resumed, save_now) = match id {
            None => (fresh_conversation_id(ctx.store.as_ref()), fresh(), false, true),
            Some(id) => match ctx.store.load(id) {
                Ok(transcript) => (id.to_string(), transcript, true, false),
                Err(StoreError::NotFound(_)) => (id.to_string(), fresh(), false, true),
                Err(error) => {
                    ctx.handler
                        .on_event(id, &SessionEvent::LoadFailed { error: &error });
                    (id.to_string(), fresh(), false, false)
                }
            },
        };

        let session = Self {
            id,
            transcript,
            policy,
            ctx,
        };
        session.emit(&SessionEvent::Opened {
            turns: session.transcript.len(),
            resumed,
        });
        if save_now {
            session.persist();
        }
        session
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Send one user message and return the assistant's reply.
    ///
    /// Empty or whitespace-only text is rejected before anything else
    /// happens. When the reply call fails, the user turn stays in the
    /// transcript and is persisted.
    pub async fn submit(&mut self, text: &str) -> Result<String, SessionError> {
        if text.trim().is_empty() {
            return Err(SessionError::EmptyInput);
        }

        self.prune().await;

        self.transcript.push_user(text);

        let reply = self
            .ctx
            .config
            .call
            .call(self.ctx.gateway.as_ref(), self.transcript.turns())
            .await;

        match reply {
            Ok(reply) => {
                self.transcript.push_assistant(reply.as_str());
                self.emit(&SessionEvent::Replied {
                    chars: reply.chars().count(),
                    turns: self.transcript.len(),
                });
                self.persist();
                Ok(reply)
            }
            Err(error) => {
                self.emit(&SessionEvent::GatewayFailed { error: &error });
                self.persist();
                Err(SessionError::Gateway(error))
            }
        }
    }

    /// Run the pruning policy against the current transcript and persist if
    /// it compressed anything.
    pub async fn prune(&mut self) -> PruneOutcome {
        let store = self.ctx.store.as_ref();
        let id = self.id.as_str();
        let measure = |transcript: &Transcript| match store.stored_size(id) {
            Ok(size) => size,
            Err(e) => {
                debug!("[{id}] stored size unavailable ({e}); measuring in memory");
                transcript.serialized_len()
            }
        };

        let outcome = self
            .policy
            .maybe_compress(
                &mut self.transcript,
                measure,
                self.ctx.gateway.as_ref(),
                &self.ctx.config.call,
            )
            .await;

        self.emit(&SessionEvent::PruneEvaluated { outcome: &outcome });
        if outcome.is_compressed() {
            self.persist();
        }
        outcome
    }

    /// Save the whole transcript. Returns `false` (and reports
    /// [`SessionEvent::SaveFailed`]) on error; the in-memory transcript is
    /// unaffected either way.
    pub fn persist(&self) -> bool {
        match self.ctx.store.save(&self.id, &self.transcript) {
            Ok(()) => true,
            Err(error) => {
                self.emit(&SessionEvent::SaveFailed { error: &error });
                false
            }
        }
    }

    fn emit(&self, event: &SessionEvent<'_>) {
        self.ctx.handler.on_event(&self.id, event);
    }
}
