//! Raw audio chunk buffering with sequence-numbered reassembly.
//!
//! Upstream devices may deliver PCM16 chunks out of order. Chunks are
//! keyed by sequence number per session and reassembled in strict numeric
//! order at flush time. A silence timer triggers the flush; a hard
//! duration cap bounds memory for a session that never goes silent.

use crate::config::AudioConfig;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Consumer of a completed audio buffer (typically a transcription hop).
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Receive the reassembled audio for a session. Failures are logged
    /// by the buffer manager and isolated to this session.
    async fn on_audio(&self, session_id: &str, audio: Vec<u8>) -> anyhow::Result<()>;
}

struct AudioSession {
    /// Sequence number → chunk bytes. BTreeMap keeps flush-order strict.
    chunks: BTreeMap<u64, Vec<u8>>,
    created_at: Instant,
    epoch: u64,
    /// One-way latch: once flushed, the session accepts no more chunks;
    /// a late arrival starts a fresh session.
    flushed: bool,
}

impl AudioSession {
    fn new() -> Self {
        Self {
            chunks: BTreeMap::new(),
            created_at: Instant::now(),
            epoch: 0,
            flushed: false,
        }
    }

    fn total_bytes(&self) -> usize {
        self.chunks.values().map(Vec::len).sum()
    }
}

/// Buffers audio chunks by session ID and hands reassembled audio to the
/// sink after silence or when the duration cap is hit.
#[derive(Clone)]
pub struct AudioBufferManager {
    inner: Arc<Mutex<HashMap<String, AudioSession>>>,
    config: AudioConfig,
    sink: Arc<dyn AudioSink>,
}

impl AudioBufferManager {
    /// Create a buffer manager that delivers completed audio to the sink.
    pub fn new(config: AudioConfig, sink: Arc<dyn AudioSink>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            config,
            sink,
        }
    }

    /// Add a chunk and reset the session's silence timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn add_chunk(&self, session_id: &str, sequence: u64, bytes: Vec<u8>) {
        let (token, forced) = {
            let mut inner = self.lock();
            let session = inner
                .entry(session_id.to_owned())
                .or_insert_with(AudioSession::new);
            if session.flushed {
                // Session already completed; a late chunk starts fresh.
                *session = AudioSession::new();
            }
            session.chunks.insert(sequence, bytes);
            session.epoch += 1;

            let duration_secs =
                session.total_bytes() as f64 / self.config.bytes_per_second() as f64;
            let over_cap = duration_secs >= self.config.max_buffer_secs as f64;
            if over_cap {
                warn!(
                    session = %session_id,
                    "audio buffer hit cap ({duration_secs:.1}s), flushing now"
                );
            }
            (session.epoch, over_cap)
        };

        let manager = self.clone();
        let session_id = session_id.to_owned();
        tokio::spawn(async move {
            if !forced {
                tokio::time::sleep(Duration::from_millis(manager.config.silence_timeout_ms)).await;
            }
            manager.flush(&session_id, token).await;
        });
    }

    /// Number of sessions currently buffering.
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.lock().len()
    }

    /// Buffered byte count and age for a session, if it exists.
    #[must_use]
    pub fn session_info(&self, session_id: &str) -> Option<(usize, Duration)> {
        self.lock()
            .get(session_id)
            .map(|s| (s.total_bytes(), s.created_at.elapsed()))
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, AudioSession>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    async fn flush(&self, session_id: &str, token: u64) {
        let combined = {
            let mut inner = self.lock();
            let eligible = inner
                .get(session_id)
                .is_some_and(|s| !s.flushed && s.epoch == token);
            if !eligible {
                return;
            }
            let Some(mut session) = inner.remove(session_id) else {
                return;
            };
            session.flushed = true;

            // Reassemble in strict sequence order.
            let mut combined = Vec::with_capacity(session.total_bytes());
            for chunk in session.chunks.values() {
                combined.extend_from_slice(chunk);
            }
            combined
        };

        if combined.is_empty() {
            return;
        }

        let duration_secs = combined.len() as f64 / self.config.bytes_per_second() as f64;
        info!(
            session = %session_id,
            bytes = combined.len(),
            "flushing audio buffer ({duration_secs:.1}s)"
        );
        if let Err(e) = self.sink.on_audio(session_id, combined).await {
            error!(session = %session_id, "audio completion failed: {e}");
        }
    }
}
