//! Id-keyed access to conversations, one submit at a time per id.
//!
//! [`SessionHub`] is what a request layer sits on: `submit(id, text)`. Each
//! conversation lives behind its own async mutex. A submit that arrives while
//! another one for the same id is still running is rejected with
//! [`SessionError::Busy`] rather than queued; different ids never block each
//! other.
//!
//! Sessions are opened lazily and kept until [`SessionHub::close`] drops them.
//! Opening reads and writes the store, so it runs on the blocking pool.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::agent::session::{ConversationSession, SessionContext};
use crate::error::SessionError;
use crate::transcript::Transcript;

type SharedSession = Arc<Mutex<ConversationSession>>;

pub struct SessionHub {
    context: SessionContext,
    sessions: Mutex<HashMap<String, SharedSession>>,
}

impl SessionHub {
    pub fn new(context: SessionContext) -> Self {
        Self {
            context,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Open a conversation and return its id. `None` creates a new one.
    pub async fn open(&self, id: Option<&str>) -> Result<String, SessionError> {
        match id {
            Some(id) => {
                self.context.store.validate_id(id)?;
                let mut sessions = self.sessions.lock().await;
                if !sessions.contains_key(id) {
                    let session = self.open_session(Some(id)).await?;
                    sessions.insert(id.to_string(), session);
                }
                Ok(id.to_string())
            }
            None => {
                let mut sessions = self.sessions.lock().await;
                let session = self.open_session(None).await?;
                let id = session.lock().await.id().to_string();
                sessions.insert(id.clone(), session);
                Ok(id)
            }
        }
    }

    /// Send a user message to conversation `id`, opening it if needed.
    ///
    /// Blank text and ids the store cannot hold are rejected before the
    /// conversation is opened.
    pub async fn submit(&self, id: &str, text: &str) -> Result<String, SessionError> {
        if text.trim().is_empty() {
            return Err(SessionError::EmptyInput);
        }
        self.context.store.validate_id(id)?;

        let mut session = self.claim(id).await?;
        session.submit(text).await
    }

    /// Snapshot of a conversation's transcript, if it is open in this hub.
    /// Waits for an in-flight submit on that id to finish.
    pub async fn transcript(&self, id: &str) -> Option<Transcript> {
        let session = self.sessions.lock().await.get(id).cloned()?;
        let session = session.lock().await;
        Some(session.transcript().clone())
    }

    /// Drop conversation `id` from the hub. Its stored transcript is kept and
    /// the next submit reopens it. Returns `false` if it was not open.
    pub async fn close(&self, id: &str) -> Result<bool, SessionError> {
        let mut sessions = self.sessions.lock().await;
        let Some(session) = sessions.get(id) else {
            return Ok(false);
        };
        if session.try_lock().is_err() {
            return Err(SessionError::Busy(id.to_string()));
        }
        sessions.remove(id);
        Ok(true)
    }

    /// Number of conversations open in this hub.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Lock the session for `id`, opening it first if needed. The guard is
    /// taken while the map is locked so `close` never drops a session that is
    /// about to run.
    async fn claim(&self, id: &str) -> Result<OwnedMutexGuard<ConversationSession>, SessionError> {
        let mut sessions = self.sessions.lock().await;
        let session = match sessions.get(id).cloned() {
            Some(session) => session,
            None => {
                let session = self.open_session(Some(id)).await?;
                sessions.insert(id.to_string(), session.clone());
                session
            }
        };
        session
            .try_lock_owned()
            .map_err(|_| SessionError::Busy(id.to_string()))
    }

    async fn open_session(&self, id: Option<&str>) -> Result<SharedSession, SessionError> {
        let ctx = self.context.clone();
        let owned = id.map(str::to_string);
        let session = tokio::task::spawn_blocking(move || {
            ConversationSession::open(ctx, owned.as_deref())
        })
        .await
        .map_err(|e| SessionError::Open {
            id: id.unwrap_or("<new>").to_string(),
            reason: e.to_string(),
        })?;
        Ok(Arc::new(Mutex::new(session)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Turn;
    use crate::agent::config::SessionConfig;
    use crate::agent::events::NoopHandler;
    use crate::api::gateway::{CompletionGateway, FnGateway};
    use crate::error::{GatewayError, StoreError};
    use crate::store::{FileStore, MemoryStore, TranscriptStore};
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Blocks each call until released.
    #[derive(Default)]
    struct GatedGateway {
        entered: Notify,
        release: Notify,
    }

    impl CompletionGateway for GatedGateway {
        fn generate<'a>(
            &'a self,
            _turns: &'a [Turn],
        ) -> BoxFuture<'a, Result<String, GatewayError>> {
            Box::pin(async move {
                self.entered.notify_one();
                self.release.notified().await;
                Ok("done".to_string())
            })
        }
    }

    fn hub_with(gateway: Arc<dyn CompletionGateway>, store: Arc<MemoryStore>) -> SessionHub {
        SessionHub::new(
            SessionContext::new(SessionConfig::new("sys"), gateway, store)
                .with_event_handler(Arc::new(NoopHandler)),
        )
    }

    #[tokio::test]
    async fn overlapping_submit_is_rejected_as_busy() {
        let gate = Arc::new(GatedGateway::default());
        let hub = Arc::new(hub_with(gate.clone(), Arc::new(MemoryStore::new())));
        let id = hub.open(None).await.unwrap();

        let first = {
            let hub = hub.clone();
            let id = id.clone();
            tokio::spawn(async move { hub.submit(&id, "first").await })
        };
        gate.entered.notified().await;

        let err = hub.submit(&id, "second").await.unwrap_err();
        assert!(matches!(err, SessionError::Busy(ref busy) if *busy == id));
        let err = hub.close(&id).await.unwrap_err();
        assert!(matches!(err, SessionError::Busy(_)));

        gate.release.notify_one();
        assert_eq!(first.await.unwrap().unwrap(), "done");

        let transcript = hub.transcript(&id).await.unwrap();
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript.turns()[1], Turn::user("first"));
    }

    #[tokio::test]
    async fn unknown_id_is_opened_lazily_from_store() {
        let store = Arc::new(MemoryStore::new());
        let mut stored = Transcript::new("stored system");
        stored.push_user("earlier");
        stored.push_assistant("reply");
        store.save("existing", &stored).unwrap();

        let gateway: Arc<dyn CompletionGateway> =
            Arc::new(FnGateway::new(|turns: &[Turn]| Ok(format!("{} turns", turns.len()))));
        let hub = hub_with(gateway, store.clone());
        assert!(hub.is_empty().await);

        let reply = hub.submit("existing", "again").await.unwrap();
        assert_eq!(reply, "4 turns");
        assert_eq!(hub.len().await, 1);
        assert_eq!(store.load("existing").unwrap().len(), 5);
    }

    #[tokio::test]
    async fn conversations_are_independent() {
        let gateway: Arc<dyn CompletionGateway> =
            Arc::new(FnGateway::new(|_| Ok("ok".to_string())));
        let hub = hub_with(gateway, Arc::new(MemoryStore::new()));

        hub.submit("a", "one").await.unwrap();
        hub.submit("a", "two").await.unwrap();
        hub.submit("b", "one").await.unwrap();

        assert_eq!(hub.transcript("a").await.unwrap().len(), 5);
        assert_eq!(hub.transcript("b").await.unwrap().len(), 3);
        assert!(hub.transcript("c").await.is_none());
    }

    #[tokio::test]
    async fn blank_submit_to_new_id_touches_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let gateway: Arc<dyn CompletionGateway> = Arc::new(FnGateway::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok("ok".to_string())
        }));
        let store = Arc::new(MemoryStore::new());
        let hub = hub_with(gateway, store.clone());

        for text in ["", "   ", "\n"] {
            let err = hub.submit("brand-new", text).await.unwrap_err();
            assert!(matches!(err, SessionError::EmptyInput));
        }
        assert!(hub.is_empty().await);
        assert!(matches!(
            store.stored_size("brand-new"),
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn ids_the_store_rejects_are_refused_up_front() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let gateway: Arc<dyn CompletionGateway> = Arc::new(FnGateway::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok("ok".to_string())
        }));
        let hub = SessionHub::new(
            SessionContext::new(
                SessionConfig::new("sys"),
                gateway,
                Arc::new(FileStore::new(dir.path()).unwrap()),
            )
            .with_event_handler(Arc::new(NoopHandler)),
        );

        for id in ["../escape", "a/b", "c.json", ""] {
            let err = hub.submit(id, "hi").await.unwrap_err();
            assert!(
                matches!(err, SessionError::Store(StoreError::InvalidId(_))),
                "id {id:?} should be refused"
            );
        }
        assert!(matches!(
            hub.open(Some("../escape")).await,
            Err(SessionError::Store(StoreError::InvalidId(_)))
        ));
        assert!(hub.is_empty().await);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn closed_conversation_reopens_from_store() {
        let gateway: Arc<dyn CompletionGateway> =
            Arc::new(FnGateway::new(|turns: &[Turn]| Ok(format!("{} turns", turns.len()))));
        let hub = hub_with(gateway, Arc::new(MemoryStore::new()));

        hub.submit("c", "one").await.unwrap();
        assert!(hub.close("c").await.unwrap());
        assert!(!hub.close("c").await.unwrap());
        assert!(hub.is_empty().await);
        assert!(hub.transcript("c").await.is_none());

        assert_eq!(hub.submit("c", "two").await.unwrap(), "4 turns");
        assert_eq!(hub.transcript("c").await.unwrap().len(), 5);
    }
}
