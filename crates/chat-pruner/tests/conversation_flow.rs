//! End-to-end conversation flow against a file store in a temp directory.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chat_pruner::agent::{ConversationSession, NoopHandler, SessionConfig, SessionContext};
use chat_pruner::api::{CompletionGateway, FnGateway};
use chat_pruner::context::{PruneOutcome, PruneTrigger, SummaryFallback};
use chat_pruner::error::GatewayError;
use chat_pruner::store::{FileStore, TranscriptStore};
use chat_pruner::{Role, Turn};

/// Replies "reply N"; a request ending in the summary instruction gets
/// "SUMMARY".
fn scripted_gateway(calls: Arc<AtomicUsize>) -> Arc<dyn CompletionGateway> {
    Arc::new(FnGateway::new(move |turns: &[Turn]| {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        if turns[0].role() == Role::System {
            Ok(format!("reply {n}"))
        } else {
            Ok("SUMMARY".to_string())
        }
    }))
}

fn context(
    dir: &std::path::Path,
    config: SessionConfig,
    gateway: Arc<dyn CompletionGateway>,
) -> (SessionContext, Arc<FileStore>) {
    let store = Arc::new(FileStore::new(dir).unwrap());
    let ctx = SessionContext::new(config, gateway, store.clone())
        .with_event_handler(Arc::new(NoopHandler));
    (ctx, store)
}

#[tokio::test]
async fn submits_grow_transcript_by_two_and_persist() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let (ctx, store) = context(
        dir.path(),
        SessionConfig::new("be brief"),
        scripted_gateway(calls),
    );

    let mut session = ConversationSession::open(ctx, Some("flow"));
    assert_eq!(session.transcript().len(), 1);
    assert!(dir.path().join("flow.json").exists());

    for i in 0..5 {
        let before = session.transcript().len();
        let reply = session.submit(&format!("message {i}")).await.unwrap();
        assert_eq!(reply, format!("reply {i}"));
        assert_eq!(session.transcript().len(), before + 2);
        assert_eq!(session.transcript().last().content(), reply);
    }

    let stored = store.load("flow").unwrap();
    assert_eq!(stored.turns(), session.transcript().turns());
    assert_eq!(stored.turns()[0], Turn::system("be brief"));
}

#[tokio::test]
async fn failed_reply_keeps_user_turn_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let gateway: Arc<dyn CompletionGateway> =
        Arc::new(FnGateway::new(|_| Err(GatewayError::Network("down".into()))));
    let (ctx, store) = context(dir.path(), SessionConfig::new("sys"), gateway);

    let mut session = ConversationSession::open(ctx, Some("offline"));
    assert!(session.submit("anyone there?").await.is_err());
    assert_eq!(session.transcript().len(), 2);

    let stored = store.load("offline").unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored.last(), &Turn::user("anyone there?"));
}

#[tokio::test]
async fn reopening_resumes_and_compresses_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let config = SessionConfig::new("sys").with_trigger(PruneTrigger::new(6, 100));

    {
        let (ctx, _) = context(dir.path(), config.clone(), scripted_gateway(calls.clone()));
        let mut session = ConversationSession::open(ctx, Some("long"));
        session.submit("first question").await.unwrap();
        session.submit("second question").await.unwrap();
        assert_eq!(session.transcript().len(), 5);
    }

    let (ctx, store) = context(dir.path(), config, scripted_gateway(calls.clone()));
    let mut session = ConversationSession::open(ctx, Some("long"));
    assert_eq!(session.transcript().len(), 5);

    // 5 turns: under the trigger.
    session.submit("third question").await.unwrap();
    assert_eq!(session.transcript().len(), 7);

    // 7 turns and well over 100 bytes on disk: the head [1, 3) is replaced.
    let outcome = session.prune().await;
    assert!(matches!(outcome, PruneOutcome::Compressed { replaced: 2, .. }));
    let turns = session.transcript().turns();
    assert_eq!(turns.len(), 6);
    assert_eq!(turns[0], Turn::system("sys"));
    assert_eq!(turns[1], Turn::assistant("SUMMARY"));
    assert_eq!(turns[2], Turn::user("second question"));

    assert_eq!(store.load("long").unwrap().turns(), turns);
}

#[tokio::test]
async fn deferred_summary_leaves_history_intact() {
    let dir = tempfile::tempdir().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let gateway: Arc<dyn CompletionGateway> = {
        let seen = seen.clone();
        Arc::new(FnGateway::new(move |turns: &[Turn]| {
            seen.lock().unwrap().push(turns.len());
            if turns[0].role() == Role::System {
                Ok("ok".to_string())
            } else {
                Err(GatewayError::EmptyResult)
            }
        }))
    };
    let config = SessionConfig::new("sys")
        .with_trigger(PruneTrigger::new(2, 10))
        .with_fallback(SummaryFallback::Defer);
    let (ctx, _) = context(dir.path(), config, gateway);

    let mut session = ConversationSession::open(ctx, None);
    assert!(session.id().starts_with("conversation_"));
    session.submit("hello there").await.unwrap();
    // 3 turns: the head [1, 1) is empty, nothing to summarize.
    session.submit("and again").await.unwrap();
    // 5 turns: the head [1, 2) is sent to the summarizer, which fails.
    session.submit("one more").await.unwrap();

    let transcript = session.transcript();
    assert_eq!(transcript.len(), 7);
    assert_eq!(transcript.turns()[1], Turn::user("hello there"));
    assert_eq!(*seen.lock().unwrap(), vec![2, 4, 2, 6]);
}
