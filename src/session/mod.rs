//! Per-session segment accumulation and flush scheduling.
//!
//! Tracks a buffer of transcript segments per session key, flushes after
//! a silence timeout, extends the wait when a wake phrase implies a
//! command is still being spoken, and manages the continuation window
//! that lets follow-up speech count as command context without a fresh
//! wake phrase.
//!
//! Every new segment cancels-and-replaces the pending flush timer. The
//! replacement is modelled with a monotonically incrementing epoch token:
//! a timer task captures the token at spawn time and may only proceed if
//! the session still carries that token when the timer fires, so timer
//! cancellation and firing can never race into a double flush. Popping
//! the session out of the registry is the commit point: a popped session
//! cannot be flushed twice, and failures in downstream processing can no
//! longer corrupt buffer state.

pub mod audio;

use crate::config::SessionConfig;
use crate::pipeline::messages::{Segment, SegmentBatch};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// A flushed batch plus the scheduler's command-context verdict.
#[derive(Debug)]
pub struct FlushEvent {
    /// The popped segments, in arrival order.
    pub batch: SegmentBatch,
    /// Whether the buffered text contained a configured wake phrase.
    pub wake_phrase_present: bool,
    /// Whether this flush is command context: a wake phrase was present,
    /// or the flush landed inside the continuation window of a previous
    /// wake flush.
    pub command_context: bool,
}

/// Downstream consumer of flushed batches.
#[async_trait]
pub trait FlushHandler: Send + Sync {
    /// Process one flushed batch. Errors are logged by the scheduler and
    /// isolated to the flush that produced them.
    async fn on_flush(&self, event: FlushEvent) -> anyhow::Result<()>;
}

struct SessionState {
    segments: Vec<Segment>,
    /// Cancel-and-replace token; only the timer holding the current
    /// value may flush.
    epoch: u64,
    first_arrival: Instant,
    last_activity: Instant,
    /// Set while a wake-phrase extension loop owns the pending flush.
    extending: bool,
    /// Set when the hard buffer cap is crossed during an extension.
    cap_exceeded: bool,
}

#[derive(Default)]
struct RegistryInner {
    sessions: HashMap<String, SessionState>,
    last_wake_flush: HashMap<String, Instant>,
}

/// Per-session flush scheduler. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<Mutex<RegistryInner>>,
    config: SessionConfig,
    /// Lowercased wake phrases.
    wake_phrases: Vec<String>,
    handler: Arc<dyn FlushHandler>,
}

impl SessionRegistry {
    /// Create a registry that delivers flushes to the given handler.
    pub fn new(config: SessionConfig, handler: Arc<dyn FlushHandler>) -> Self {
        let wake_phrases = config
            .wake_phrases
            .iter()
            .map(|w| w.to_lowercase())
            .collect();
        Self {
            inner: Arc::new(Mutex::new(RegistryInner::default())),
            config,
            wake_phrases,
            handler,
        }
    }

    /// Append segments to a session's buffer and re-arm its flush timer.
    ///
    /// Must be called from within a tokio runtime. If the session's
    /// accumulated age crosses the hard buffer cap, the flush is forced
    /// immediately regardless of the silence timer.
    pub fn add_segments(&self, key: &str, segments: Vec<Segment>) {
        let now = Instant::now();
        let (token, forced) = {
            let mut inner = self.lock();
            let state = inner
                .sessions
                .entry(key.to_owned())
                .or_insert_with(|| SessionState {
                    segments: Vec::new(),
                    epoch: 0,
                    first_arrival: now,
                    last_activity: now,
                    extending: false,
                    cap_exceeded: false,
                });
            state.segments.extend(segments);
            state.last_activity = now;

            let over_cap = now.duration_since(state.first_arrival)
                >= Duration::from_millis(self.config.max_buffer_duration_ms);

            if state.extending {
                // The extension loop owns the pending flush; it sees the
                // new segment count and resets its own wait.
                if over_cap {
                    state.cap_exceeded = true;
                }
                return;
            }

            state.epoch += 1;
            (state.epoch, over_cap)
        };

        let registry = self.clone();
        let key = key.to_owned();
        tokio::spawn(async move {
            registry.run_flush_timer(key, token, forced).await;
        });
    }

    /// Returns `true` if the session is inside the continuation window of
    /// a previous wake-triggered flush.
    #[must_use]
    pub fn in_continuation_window(&self, key: &str) -> bool {
        let window = Duration::from_millis(self.config.continuation_window_ms);
        self.lock()
            .last_wake_flush
            .get(key)
            .is_some_and(|at| at.elapsed() < window)
    }

    /// Number of sessions with buffered segments.
    #[must_use]
    pub fn pending_sessions(&self) -> usize {
        self.lock().sessions.len()
    }

    /// Number of segments currently buffered for a session.
    #[must_use]
    pub fn buffered_segments(&self, key: &str) -> usize {
        self.lock()
            .sessions
            .get(key)
            .map_or(0, |s| s.segments.len())
    }

    fn contains_wake_phrase(&self, text_lower: &str) -> bool {
        self.wake_phrases.iter().any(|w| text_lower.contains(w))
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    async fn run_flush_timer(self, key: String, token: u64, forced: bool) {
        if !forced {
            tokio::time::sleep(Duration::from_millis(self.config.silence_timeout_ms)).await;
        }

        // Re-check ownership after the sleep: a newer arrival replaces
        // this timer by bumping the epoch.
        let extend = {
            let mut inner = self.lock();
            let Some(state) = inner.sessions.get_mut(&key) else {
                return;
            };
            if state.epoch != token {
                return;
            }
            let wake = !forced && {
                let text = buffered_text_lower(&state.segments);
                self.contains_wake_phrase(&text)
            };
            if wake {
                // Take ownership: arrivals from here on feed the
                // extension loop instead of re-arming the timer.
                state.extending = true;
            }
            wake
        };

        if extend {
            debug!(session = %key, "wake phrase in buffer, waiting for full command");
            self.run_extension_loop(&key).await;
        }

        self.flush(&key, token, extend).await;
    }

    /// Wait out the command timeout, resetting whenever new segments
    /// arrive, so a full trailing command is captured rather than
    /// truncated at the first pause after the wake phrase.
    async fn run_extension_loop(&self, key: &str) {
        let command_timeout = Duration::from_millis(self.config.command_timeout_ms);
        let poll = Duration::from_millis(self.config.extension_poll_ms.max(1));

        let mut waited = Duration::ZERO;
        let mut last_count = self.buffered_segments(key);
        while waited < command_timeout {
            tokio::time::sleep(poll).await;
            waited += poll;
            let (count, capped) = {
                let inner = self.lock();
                match inner.sessions.get(key) {
                    Some(state) => (state.segments.len(), state.cap_exceeded),
                    None => return,
                }
            };
            if capped {
                debug!(session = %key, "buffer cap hit during command wait, flushing");
                return;
            }
            if count > last_count {
                debug!(session = %key, "new segment during command wait, resetting");
                last_count = count;
                waited = Duration::ZERO;
            }
        }
    }

    /// Execute the flush. Removal from the registry is the commit point;
    /// after it, no other timer can flush this accumulation and handler
    /// failures cannot corrupt buffer state.
    async fn flush(&self, key: &str, token: u64, owned: bool) {
        let (event, idle) = {
            let mut inner = self.lock();
            let eligible = inner
                .sessions
                .get(key)
                .is_some_and(|s| owned || s.epoch == token);
            if !eligible {
                return;
            }
            let Some(state) = inner.sessions.remove(key) else {
                return;
            };
            if state.segments.is_empty() {
                return;
            }
            let idle = state.last_activity.elapsed();

            let text = buffered_text_lower(&state.segments);
            let wake_phrase_present = self.contains_wake_phrase(&text);
            let window = Duration::from_millis(self.config.continuation_window_ms);
            let in_window = inner
                .last_wake_flush
                .get(key)
                .is_some_and(|at| at.elapsed() < window);
            let command_context = wake_phrase_present || in_window;
            if command_context {
                inner.last_wake_flush.insert(key.to_owned(), Instant::now());
            }

            (
                FlushEvent {
                    batch: SegmentBatch::new(key, state.segments),
                    wake_phrase_present,
                    command_context,
                },
                idle,
            )
        };

        info!(
            session = %key,
            segments = event.batch.segments.len(),
            command = event.command_context,
            "flushing session after {}ms idle",
            idle.as_millis()
        );
        if let Err(e) = self.handler.on_flush(event).await {
            error!(session = %key, "flush processing failed: {e}");
        }
    }
}

fn buffered_text_lower(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use tokio::sync::mpsc;

    struct ChannelHandler {
        tx: mpsc::UnboundedSender<FlushEvent>,
    }

    #[async_trait]
    impl FlushHandler for ChannelHandler {
        async fn on_flush(&self, event: FlushEvent) -> anyhow::Result<()> {
            self.tx.send(event).map_err(|e| anyhow::anyhow!("{e}"))
        }
    }

    fn test_config() -> SessionConfig {
        SessionConfig {
            silence_timeout_ms: 40,
            command_timeout_ms: 120,
            extension_poll_ms: 20,
            continuation_window_ms: 300,
            max_buffer_duration_ms: 30_000,
            wake_phrases: vec!["jarvis".to_owned()],
        }
    }

    fn registry(config: SessionConfig) -> (SessionRegistry, mpsc::UnboundedReceiver<FlushEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            SessionRegistry::new(config, Arc::new(ChannelHandler { tx })),
            rx,
        )
    }

    async fn recv(
        rx: &mut mpsc::UnboundedReceiver<FlushEvent>,
        timeout_ms: u64,
    ) -> Option<FlushEvent> {
        tokio::time::timeout(Duration::from_millis(timeout_ms), rx.recv())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test]
    async fn flushes_once_after_silence() {
        let (registry, mut rx) = registry(test_config());
        registry.add_segments("s1", vec![Segment::new("first", "SPEAKER_00")]);
        registry.add_segments("s1", vec![Segment::new("second", "SPEAKER_00")]);

        let event = recv(&mut rx, 500).await.expect("one flush");
        assert_eq!(event.batch.segments.len(), 2);
        assert_eq!(event.batch.segments[0].text, "first");
        assert_eq!(event.batch.segments[1].text, "second");
        assert!(!event.command_context);

        // No second flush for the same accumulation.
        assert!(recv(&mut rx, 150).await.is_none());
        assert_eq!(registry.pending_sessions(), 0);
    }

    #[tokio::test]
    async fn rapid_segments_defer_the_flush() {
        let mut config = test_config();
        config.silence_timeout_ms = 120;
        let (registry, mut rx) = registry(config);
        for i in 0..5 {
            registry.add_segments("s1", vec![Segment::new(format!("part {i}"), "SPEAKER_00")]);
            tokio::time::sleep(Duration::from_millis(20)).await;
            // Much faster than the silence timeout: nothing flushed yet.
            assert!(rx.try_recv().is_err(), "flushed while input was active");
        }

        let event = recv(&mut rx, 500).await.expect("flush after input pauses");
        assert_eq!(event.batch.segments.len(), 5);
    }

    #[tokio::test]
    async fn wake_phrase_extends_and_captures_trailing_command() {
        let (registry, mut rx) = registry(test_config());
        registry.add_segments(
            "s1",
            vec![Segment::new("hey jarvis", "SPEAKER_00").from_primary_user()],
        );

        // Arrives after the silence timeout (40ms) but inside the
        // extension window.
        tokio::time::sleep(Duration::from_millis(70)).await;
        registry.add_segments(
            "s1",
            vec![Segment::new("remind me to call mom", "SPEAKER_00").from_primary_user()],
        );

        let event = recv(&mut rx, 1_000).await.expect("extended flush");
        assert_eq!(event.batch.segments.len(), 2);
        assert!(event.wake_phrase_present);
        assert!(event.command_context);

        assert!(recv(&mut rx, 150).await.is_none(), "double flush");
    }

    #[tokio::test]
    async fn continuation_window_marks_followup_as_command() {
        let (registry, mut rx) = registry(test_config());
        registry.add_segments(
            "s1",
            vec![Segment::new("jarvis remind me to stretch", "SPEAKER_00")],
        );
        let first = recv(&mut rx, 1_000).await.expect("wake flush");
        assert!(first.command_context);

        // Follow-up without a wake phrase, inside the 300ms window.
        registry.add_segments(
            "s1",
            vec![Segment::new("actually make it in an hour", "SPEAKER_00")],
        );
        let second = recv(&mut rx, 1_000).await.expect("continuation flush");
        assert!(!second.wake_phrase_present);
        assert!(second.command_context);
    }

    #[tokio::test]
    async fn continuation_window_expires() {
        let mut config = test_config();
        config.continuation_window_ms = 60;
        config.command_timeout_ms = 40;
        let (registry, mut rx) = registry(config);

        registry.add_segments("s1", vec![Segment::new("jarvis note this", "SPEAKER_00")]);
        let first = recv(&mut rx, 1_000).await.expect("wake flush");
        assert!(first.command_context);

        tokio::time::sleep(Duration::from_millis(120)).await;
        registry.add_segments("s1", vec![Segment::new("unrelated chatter", "SPEAKER_00")]);
        let second = recv(&mut rx, 1_000).await.expect("plain flush");
        assert!(!second.command_context);
    }

    #[tokio::test]
    async fn buffer_cap_forces_immediate_flush() {
        let mut config = test_config();
        config.silence_timeout_ms = 5_000;
        config.max_buffer_duration_ms = 50;
        let (registry, mut rx) = registry(config);

        registry.add_segments("s1", vec![Segment::new("never", "SPEAKER_00")]);
        tokio::time::sleep(Duration::from_millis(70)).await;
        registry.add_segments("s1", vec![Segment::new("silent", "SPEAKER_00")]);

        // Forced flush fires well before the 5s silence timeout.
        let event = recv(&mut rx, 500).await.expect("cap flush");
        assert_eq!(event.batch.segments.len(), 2);
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let (registry, mut rx) = registry(test_config());
        registry.add_segments("a", vec![Segment::new("for a", "SPEAKER_00")]);
        registry.add_segments("b", vec![Segment::new("for b", "SPEAKER_01")]);

        let first = recv(&mut rx, 500).await.expect("first flush");
        let second = recv(&mut rx, 500).await.expect("second flush");
        let mut keys = vec![first.batch.session_key, second.batch.session_key];
        keys.sort();
        assert_eq!(keys, vec!["a".to_owned(), "b".to_owned()]);
    }

    #[tokio::test]
    async fn empty_buffer_never_flushes() {
        let (registry, mut rx) = registry(test_config());
        registry.add_segments("s1", Vec::new());
        assert!(recv(&mut rx, 150).await.is_none());
    }
}
