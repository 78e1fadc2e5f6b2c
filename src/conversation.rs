//! Conversation windows: discourse-level context per session.
//!
//! A conversation window is a longer-lived accumulation than the command
//! flush buffer: it survives many flushes and only ends after an extended
//! silence, at which point its segments are handed to the summarization
//! collaborator, never to the classifier. The window also owns the
//! rolling recently-mentioned-entity list that pronoun resolution reads.

use crate::collab::Summarizer;
use crate::config::ConversationConfig;
use crate::entity::ExtractedEntity;
use crate::pipeline::messages::Segment;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, error, info};

struct WindowState {
    /// Conversation identifier handed to storage records.
    id: String,
    segments: Vec<Segment>,
    /// Cancel-and-replace token for the end-of-conversation timer.
    epoch: u64,
    /// Recently mentioned entities, oldest first, bounded.
    recent_entities: VecDeque<ExtractedEntity>,
}

impl WindowState {
    fn new() -> Self {
        Self {
            id: Utc::now().format("%Y-%m-%d_%H-%M-%S").to_string(),
            segments: Vec::new(),
            epoch: 0,
            recent_entities: VecDeque::new(),
        }
    }
}

/// Per-session conversation window registry. Cheap to clone; clones
/// share state.
#[derive(Clone)]
pub struct ConversationRegistry {
    inner: Arc<Mutex<HashMap<String, WindowState>>>,
    config: ConversationConfig,
    summarizer: Option<Arc<dyn Summarizer>>,
}

impl ConversationRegistry {
    /// Create a registry. The summarizer receives expired windows.
    pub fn new(config: ConversationConfig, summarizer: Option<Arc<dyn Summarizer>>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            config,
            summarizer,
        }
    }

    /// Record new activity for a session and re-arm its end timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn observe(&self, key: &str, segments: &[Segment]) {
        let token = {
            let mut inner = self.lock();
            let window = inner.entry(key.to_owned()).or_insert_with(WindowState::new);
            window.segments.extend(segments.iter().cloned());
            window.epoch += 1;
            window.epoch
        };

        let registry = self.clone();
        let key = key.to_owned();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(registry.config.end_timeout_ms)).await;
            registry.expire(&key, token).await;
        });
    }

    /// The active conversation ID for a session, if a window exists.
    #[must_use]
    pub fn conversation_id(&self, key: &str) -> Option<String> {
        self.lock().get(key).map(|w| w.id.clone())
    }

    /// The last `count` segment texts joined into one context string.
    #[must_use]
    pub fn context_text(&self, key: &str, count: usize) -> String {
        let inner = self.lock();
        let Some(window) = inner.get(key) else {
            return String::new();
        };
        let skip = window.segments.len().saturating_sub(count);
        window.segments[skip..]
            .iter()
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Remember entities mentioned in this conversation, keeping only the
    /// most recent window of them.
    pub fn note_entities(&self, key: &str, entities: &[ExtractedEntity]) {
        if entities.is_empty() {
            return;
        }
        let limit = self.config.recent_entity_window.max(1);
        let mut inner = self.lock();
        let window = inner.entry(key.to_owned()).or_insert_with(WindowState::new);
        for entity in entities {
            window.recent_entities.push_back(entity.clone());
        }
        while window.recent_entities.len() > limit {
            window.recent_entities.pop_front();
        }
    }

    /// The rolling recently-mentioned-entity window, oldest first.
    #[must_use]
    pub fn recent_entities(&self, key: &str) -> Vec<ExtractedEntity> {
        self.lock()
            .get(key)
            .map(|w| w.recent_entities.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of live conversation windows.
    #[must_use]
    pub fn active_windows(&self) -> usize {
        self.lock().len()
    }

    /// Total segments accumulated in a session's window.
    #[must_use]
    pub fn window_segments(&self, key: &str) -> usize {
        self.lock().get(key).map_or(0, |w| w.segments.len())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, WindowState>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    async fn expire(&self, key: &str, token: u64) {
        let window = {
            let mut inner = self.lock();
            let eligible = inner.get(key).is_some_and(|w| w.epoch == token);
            if !eligible {
                return;
            }
            match inner.remove(key) {
                Some(window) => window,
                None => return,
            }
        };

        if window.segments.is_empty() {
            return;
        }
        info!(
            session = %key,
            conversation = %window.id,
            segments = window.segments.len(),
            "conversation ended, handing off to summarization"
        );
        let Some(summarizer) = &self.summarizer else {
            debug!("no summarizer wired, dropping conversation window");
            return;
        };
        if let Err(e) = summarizer.summarize(key, window.segments).await {
            error!(session = %key, "summarization hand-off failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::entity::EntityKind;
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    struct ChannelSummarizer {
        tx: mpsc::UnboundedSender<(String, usize)>,
    }

    #[async_trait]
    impl Summarizer for ChannelSummarizer {
        async fn summarize(
            &self,
            session_key: &str,
            segments: Vec<Segment>,
        ) -> anyhow::Result<()> {
            self.tx
                .send((session_key.to_owned(), segments.len()))
                .map_err(|e| anyhow::anyhow!("{e}"))
        }
    }

    fn test_config() -> ConversationConfig {
        ConversationConfig {
            end_timeout_ms: 60,
            context_segments: 5,
            reasoner_context_segments: 3,
            recent_entity_window: 3,
        }
    }

    #[tokio::test]
    async fn window_outlives_command_flushes_then_expires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let registry = ConversationRegistry::new(
            test_config(),
            Some(Arc::new(ChannelSummarizer { tx })),
        );

        registry.observe("s1", &[Segment::new("first burst", "SPEAKER_00")]);
        tokio::time::sleep(Duration::from_millis(30)).await;
        // Activity inside the end timeout keeps the window alive.
        registry.observe("s1", &[Segment::new("second burst", "SPEAKER_00")]);
        assert_eq!(registry.active_windows(), 1);

        let (key, count) =
            tokio::time::timeout(Duration::from_millis(500), rx.recv())
                .await
                .unwrap()
                .unwrap();
        assert_eq!(key, "s1");
        assert_eq!(count, 2);
        assert_eq!(registry.active_windows(), 0);
    }

    #[tokio::test]
    async fn expiry_is_single_shot() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let registry = ConversationRegistry::new(
            test_config(),
            Some(Arc::new(ChannelSummarizer { tx })),
        );
        registry.observe("s1", &[Segment::new("only burst", "SPEAKER_00")]);

        assert!(
            tokio::time::timeout(Duration::from_millis(500), rx.recv())
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            tokio::time::timeout(Duration::from_millis(120), rx.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn context_text_returns_trailing_segments() {
        let registry = ConversationRegistry::new(test_config(), None);
        for text in ["one", "two", "three", "four"] {
            registry.observe("s1", &[Segment::new(text, "SPEAKER_00")]);
        }
        assert_eq!(registry.context_text("s1", 2), "three four");
        assert_eq!(registry.context_text("missing", 2), "");
    }

    #[tokio::test]
    async fn recent_entities_are_bounded() {
        let registry = ConversationRegistry::new(test_config(), None);
        let entities: Vec<ExtractedEntity> = (0..5)
            .map(|i| ExtractedEntity::new(EntityKind::Person, format!("Person {i}"), 0.9))
            .collect();
        registry.note_entities("s1", &entities);

        let recent = registry.recent_entities("s1");
        // Window of 3 keeps only the most recent.
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].surface_form, "Person 2");
        assert_eq!(recent[2].surface_form, "Person 4");
    }

    #[tokio::test]
    async fn conversation_id_is_stable_within_window() {
        let registry = ConversationRegistry::new(test_config(), None);
        registry.observe("s1", &[Segment::new("a", "SPEAKER_00")]);
        let first = registry.conversation_id("s1").unwrap();
        registry.observe("s1", &[Segment::new("b", "SPEAKER_00")]);
        assert_eq!(registry.conversation_id("s1").unwrap(), first);
    }
}
