//! End-to-end pipeline tests: segments in, action requests out.

use async_trait::async_trait;
use earshot::collab::{
    ActionExecutor, ContactRecord, MemoryStorage, SpeakerRecord, StaticContacts, Summarizer,
};
use earshot::pipeline::coordinator::{Collaborators, Pipeline};
use earshot::pipeline::messages::{ActionRequest, IntentKind, RequestSource, Segment};
use earshot::EarshotConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

struct RecordingExecutor {
    tx: mpsc::UnboundedSender<ActionRequest>,
}

#[async_trait]
impl ActionExecutor for RecordingExecutor {
    async fn execute(&self, request: ActionRequest) -> anyhow::Result<()> {
        self.tx.send(request).map_err(|e| anyhow::anyhow!("{e}"))
    }
}

struct RecordingSummarizer {
    tx: mpsc::UnboundedSender<usize>,
}

#[async_trait]
impl Summarizer for RecordingSummarizer {
    async fn summarize(&self, _session_key: &str, segments: Vec<Segment>) -> anyhow::Result<()> {
        self.tx.send(segments.len()).map_err(|e| anyhow::anyhow!("{e}"))
    }
}

fn fast_config() -> EarshotConfig {
    let mut config = EarshotConfig::default();
    config.session.silence_timeout_ms = 40;
    config.session.command_timeout_ms = 100;
    config.session.extension_poll_ms = 20;
    config.session.continuation_window_ms = 500;
    config
}

fn contacts() -> Arc<StaticContacts> {
    Arc::new(StaticContacts::new(vec![ContactRecord {
        name: "Sarah".to_owned(),
        aliases: Vec::new(),
        email: Some("sarah@example.com".to_owned()),
        phone: Some("+15559870000".to_owned()),
        is_owner: false,
    }]))
}

struct Harness {
    pipeline: Pipeline,
    storage: Arc<MemoryStorage>,
    requests: mpsc::UnboundedReceiver<ActionRequest>,
}

fn harness(config: EarshotConfig) -> Harness {
    let storage = Arc::new(MemoryStorage::new());
    let (tx, requests) = mpsc::unbounded_channel();
    let pipeline = Pipeline::new(
        config,
        Collaborators {
            storage: storage.clone(),
            contacts: contacts(),
            executor: Arc::new(RecordingExecutor { tx }),
            reasoner: None,
            index: None,
            summarizer: None,
        },
    );
    Harness {
        pipeline,
        storage,
        requests,
    }
}

async fn recv(
    rx: &mut mpsc::UnboundedReceiver<ActionRequest>,
    timeout_ms: u64,
) -> Option<ActionRequest> {
    tokio::time::timeout(Duration::from_millis(timeout_ms), rx.recv())
        .await
        .ok()
        .flatten()
}

#[tokio::test]
async fn wake_plus_reminder_emits_exactly_one_request() {
    let mut h = harness(fast_config());

    h.pipeline.ingest(
        "s1",
        vec![Segment::new("hey jarvis", "SPEAKER_00").from_primary_user()],
    );
    tokio::time::sleep(Duration::from_millis(60)).await;
    h.pipeline.ingest(
        "s1",
        vec![
            Segment::new("remind me in thirty minutes to call mom", "SPEAKER_00")
                .from_primary_user(),
        ],
    );

    let request = recv(&mut h.requests, 3_000).await.expect("one request");
    assert_eq!(request.intent, IntentKind::Reminder);
    assert_eq!(request.source, RequestSource::Tier1);
    assert_eq!(request.param("task"), Some("call mom"));
    assert_eq!(request.param("when"), Some("thirty minutes"));
    assert_eq!(
        request.params.get("when_seconds").and_then(|v| v.as_u64()),
        Some(1_800)
    );

    // Exactly one flush, exactly one request.
    assert!(recv(&mut h.requests, 300).await.is_none());
    // Both segments were persisted regardless of classification.
    assert_eq!(h.storage.utterances().len(), 2);
    // The classified action was saved too.
    assert_eq!(h.storage.actions().len(), 1);
}

#[tokio::test]
async fn continuation_followup_is_still_command_context() {
    let mut h = harness(fast_config());

    h.pipeline.ingest(
        "s1",
        vec![Segment::new("jarvis remind me to stretch", "SPEAKER_00").from_primary_user()],
    );
    let first = recv(&mut h.requests, 3_000).await.expect("wake command");
    assert_eq!(first.intent, IntentKind::Reminder);

    // Follow-up without a fresh wake phrase, inside the window.
    h.pipeline.ingest(
        "s1",
        vec![Segment::new("actually make it in an hour", "SPEAKER_00").from_primary_user()],
    );
    let second = recv(&mut h.requests, 3_000).await.expect("continuation");
    assert!(second.raw_text.contains("actually make it in an hour"));
}

#[tokio::test]
async fn speech_without_wake_phrase_is_stored_but_not_dispatched() {
    let mut h = harness(fast_config());

    h.pipeline.ingest(
        "s1",
        vec![Segment::new("the weather is nice today", "SPEAKER_00")],
    );

    assert!(recv(&mut h.requests, 400).await.is_none());
    assert_eq!(h.storage.utterances().len(), 1);
    assert!(h.storage.actions().is_empty());
}

#[tokio::test]
async fn empty_segments_are_dropped_silently() {
    let mut h = harness(fast_config());
    h.pipeline.ingest("s1", vec![Segment::new("   ", "SPEAKER_00")]);

    assert!(recv(&mut h.requests, 300).await.is_none());
    assert_eq!(h.pipeline.sessions().pending_sessions(), 0);
    assert!(h.storage.utterances().is_empty());
}

#[tokio::test]
async fn sessions_flush_independently() {
    let mut h = harness(fast_config());

    h.pipeline.ingest(
        "alpha",
        vec![Segment::new("jarvis remind me to call mom", "SPEAKER_00").from_primary_user()],
    );
    h.pipeline.ingest(
        "beta",
        vec![Segment::new("jarvis what is the weather", "SPEAKER_01").from_primary_user()],
    );

    let first = recv(&mut h.requests, 3_000).await.expect("first");
    let second = recv(&mut h.requests, 3_000).await.expect("second");
    let mut intents = vec![first.intent, second.intent];
    intents.sort_by_key(|i| i.as_str());
    assert_eq!(intents, vec![IntentKind::Reminder, IntentKind::Search]);
}

#[tokio::test]
async fn expired_conversation_hands_off_to_summarizer() {
    let mut config = fast_config();
    config.conversation.end_timeout_ms = 150;

    let storage = Arc::new(MemoryStorage::new());
    storage.add_speaker(SpeakerRecord {
        id: "SPEAKER_00".to_owned(),
        name: Some("David".to_owned()),
        is_owner: false,
        approved: false,
    });

    let (req_tx, _requests) = mpsc::unbounded_channel();
    let (sum_tx, mut summaries) = mpsc::unbounded_channel();
    let pipeline = Pipeline::new(
        config,
        Collaborators {
            storage,
            contacts: contacts(),
            executor: Arc::new(RecordingExecutor { tx: req_tx }),
            reasoner: None,
            index: None,
            summarizer: Some(Arc::new(RecordingSummarizer { tx: sum_tx })),
        },
    );

    pipeline.ingest("s1", vec![Segment::new("we should sync on the launch", "SPEAKER_00")]);
    pipeline.ingest("s1", vec![Segment::new("agreed, tomorrow works", "SPEAKER_01")]);

    let count = tokio::time::timeout(Duration::from_millis(2_000), summaries.recv())
        .await
        .expect("summarizer called")
        .expect("channel open");
    assert_eq!(count, 2);
    assert_eq!(pipeline.conversations().active_windows(), 0);
}
