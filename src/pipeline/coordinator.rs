//! Pipeline coordinator.
//!
//! Owns the full flow: segments arrive keyed by session, fan out into the
//! conversation window and the flush scheduler, and each flushed batch
//! runs storage writes → authorization → wake/continuation gating →
//! wake-phrase stripping → entity recording → two-tier classification →
//! hand-off to the execution collaborator. Every failure is isolated to
//! the flush that produced it; no session can stall another.

use crate::auth::{AuthDecision, AuthorizationGate};
use crate::collab::{
    ActionExecutor, ContactBook, ConversationRecord, EntityMention, Reasoner, SemanticIndex,
    Storage, Summarizer, Transcriber, UtteranceRecord,
};
use crate::config::EarshotConfig;
use crate::conversation::ConversationRegistry;
use crate::entity::relationships::build_relationships;
use crate::entity::resolve::{EntityResolver, ResolveContext};
use crate::entity::{ExtractedEntity, Resolution, extract_fast};
use crate::intent::{ClassifyContext, IntentClassifier};
use crate::pipeline::messages::{ActionRequest, Segment};
use crate::session::audio::AudioSink;
use crate::session::{FlushEvent, FlushHandler, SessionRegistry};
use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// External collaborators wired into a pipeline.
pub struct Collaborators {
    /// Persistence.
    pub storage: Arc<dyn Storage>,
    /// Address-book lookups for tier-1 recipients.
    pub contacts: Arc<dyn ContactBook>,
    /// Carries out emitted action requests.
    pub executor: Arc<dyn ActionExecutor>,
    /// Tier-2 classification, when available.
    pub reasoner: Option<Arc<dyn Reasoner>>,
    /// Semantic search over conversation history, when available.
    pub index: Option<Arc<dyn SemanticIndex>>,
    /// Receives expired conversation windows.
    pub summarizer: Option<Arc<dyn Summarizer>>,
}

/// The assembled speech-to-action pipeline.
pub struct Pipeline {
    core: Arc<PipelineCore>,
    sessions: SessionRegistry,
}

struct PipelineCore {
    config: EarshotConfig,
    storage: Arc<dyn Storage>,
    contacts: Arc<dyn ContactBook>,
    executor: Arc<dyn ActionExecutor>,
    index: Option<Arc<dyn SemanticIndex>>,
    conversations: ConversationRegistry,
    classifier: IntentClassifier,
    resolver: EntityResolver,
    gate: AuthorizationGate,
    /// Per-phrase strip patterns, compiled once.
    wake_strips: Vec<Regex>,
}

impl Pipeline {
    /// Assemble a pipeline from configuration and collaborators.
    pub fn new(config: EarshotConfig, collab: Collaborators) -> Self {
        let conversations =
            ConversationRegistry::new(config.conversation.clone(), collab.summarizer.clone());
        let classifier = IntentClassifier::new(
            config.classifier.clone(),
            collab.contacts.clone(),
            collab.reasoner.clone(),
            collab.index.clone(),
            Some(collab.storage.clone()),
        );
        let resolver = EntityResolver::new(&config.resolver);
        let gate = AuthorizationGate::new(collab.storage.clone());
        let wake_strips = config
            .session
            .wake_phrases
            .iter()
            .filter_map(|phrase| wake_strip_pattern(phrase))
            .collect();

        let core = Arc::new(PipelineCore {
            config: config.clone(),
            storage: collab.storage,
            contacts: collab.contacts,
            executor: collab.executor,
            index: collab.index,
            conversations,
            classifier,
            resolver,
            gate,
            wake_strips,
        });
        let sessions = SessionRegistry::new(config.session, core.clone());
        Self { core, sessions }
    }

    /// Ingest a batch of segments for a session.
    ///
    /// Empty/unparseable segments are dropped silently. Each surviving
    /// segment fans out into both the conversation window and the flush
    /// scheduler. Must be called from within a tokio runtime.
    pub fn ingest(&self, key: &str, segments: Vec<Segment>) {
        let segments: Vec<Segment> = segments.into_iter().filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return;
        }
        self.core.conversations.observe(key, &segments);
        self.sessions.add_segments(key, segments);
    }

    /// The flush scheduler, for observability and tests.
    #[must_use]
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// The conversation window registry, for observability and tests.
    #[must_use]
    pub fn conversations(&self) -> &ConversationRegistry {
        &self.core.conversations
    }
}

/// Bridges the raw-audio path into the pipeline: reassembled audio from
/// an [`AudioBufferManager`](crate::session::audio::AudioBufferManager)
/// is transcribed by the STT collaborator and the resulting segments
/// ingested like any other batch.
pub struct TranscribingSink {
    transcriber: Arc<dyn Transcriber>,
    pipeline: Arc<Pipeline>,
}

impl TranscribingSink {
    /// Create a sink feeding the given pipeline.
    pub fn new(transcriber: Arc<dyn Transcriber>, pipeline: Arc<Pipeline>) -> Self {
        Self {
            transcriber,
            pipeline,
        }
    }
}

#[async_trait]
impl AudioSink for TranscribingSink {
    async fn on_audio(&self, session_id: &str, audio: Vec<u8>) -> anyhow::Result<()> {
        let segments = self.transcriber.transcribe(session_id, audio).await?;
        debug!(
            session = %session_id,
            segments = segments.len(),
            "transcribed audio buffer"
        );
        self.pipeline.ingest(session_id, segments);
        Ok(())
    }
}

#[async_trait]
impl FlushHandler for PipelineCore {
    async fn on_flush(&self, event: FlushEvent) -> anyhow::Result<()> {
        self.process_flush(event).await;
        Ok(())
    }
}

impl PipelineCore {
    async fn process_flush(&self, event: FlushEvent) {
        let key = event.batch.session_key.clone();
        let full_text = event.batch.primary_text();
        if full_text.is_empty() {
            return;
        }
        info!(
            session = %key,
            segments = event.batch.segments.len(),
            "processing flush: {}",
            snippet(&full_text, 120)
        );

        let conversation_id = self
            .conversations
            .conversation_id(&key)
            .unwrap_or_else(|| Utc::now().format("%Y-%m-%d_%H-%M-%S").to_string());

        self.record_batch(&event, &conversation_id);

        if self.gate.check(&event.batch) == AuthDecision::Denied {
            return;
        }

        if !event.command_context {
            debug!(session = %key, "no wake phrase, stored only");
            return;
        }
        if event.wake_phrase_present {
            info!(session = %key, "wake phrase detected, classifying command");
        } else {
            info!(session = %key, "continuation window, treating as command context");
        }

        let command_text = self.strip_wake_phrase(&full_text);

        // Ground the flush's entities before classification so recency
        // and relationship context include this very utterance.
        let speakers = self.storage.speakers().unwrap_or_else(|e| {
            warn!("speaker lookup failed: {e}");
            Vec::new()
        });
        let contact_list = self.contacts.all();
        let recent = self.conversations.recent_entities(&key);
        let entities: Vec<ExtractedEntity> = {
            let cx = ResolveContext {
                speakers: &speakers,
                contacts: &contact_list,
                conversation_id: Some(&conversation_id),
                storage: Some(self.storage.as_ref()),
                recent: &recent,
                index: self.index.as_deref(),
            };
            extract_fast(&full_text)
                .into_iter()
                .map(|e| self.resolver.resolve(e, &cx))
                .collect()
        };
        for entity in &entities {
            let mention = EntityMention {
                conversation_id: conversation_id.clone(),
                name: entity.display_name().to_owned(),
                kind: entity.kind.to_string(),
                at: Utc::now(),
            };
            if let Err(e) = self.storage.record_entity_mention(mention) {
                warn!("entity mention write failed: {e}");
            }
        }
        build_relationships(self.storage.as_ref(), &entities, Some(&conversation_id));
        self.conversations.note_entities(&key, &entities);

        let classify_cx = ClassifyContext {
            context_text: self
                .conversations
                .context_text(&key, self.config.conversation.context_segments),
            reasoner_context: self
                .conversations
                .context_text(&key, self.config.conversation.reasoner_context_segments),
        };
        let mut request = self.classifier.classify(&command_text, &classify_cx).await;

        // Referent slots that are still bare names go through the
        // resolver; a needs_human verdict escalates the whole request.
        let recent = self.conversations.recent_entities(&key);
        let cx = ResolveContext {
            speakers: &speakers,
            contacts: &contact_list,
            conversation_id: Some(&conversation_id),
            storage: Some(self.storage.as_ref()),
            recent: &recent,
            index: self.index.as_deref(),
        };
        self.resolve_referent_params(&mut request, &cx);

        info!(
            session = %key,
            intent = %request.intent,
            source = ?request.source,
            human = request.human_required,
            "dispatching action request"
        );
        if let Err(e) = self.executor.execute(request).await {
            error!(session = %key, "action execution failed: {e}");
        }
    }

    /// Best-effort storage writes for a flushed batch.
    fn record_batch(&self, event: &FlushEvent, conversation_id: &str) {
        for segment in &event.batch.segments {
            let utterance = UtteranceRecord {
                session_key: event.batch.session_key.clone(),
                conversation_id: conversation_id.to_owned(),
                speaker_id: segment.speaker_id.clone(),
                text: segment.text.clone(),
                at: segment.arrival_time,
            };
            if let Err(e) = self.storage.append_utterance(utterance) {
                warn!("utterance write failed: {e}");
            }
        }

        let started_at = event
            .batch
            .segments
            .first()
            .map_or_else(Utc::now, |s| s.arrival_time);
        let record = ConversationRecord {
            id: conversation_id.to_owned(),
            started_at,
            duration_secs: event.batch.duration_secs(),
            segment_count: event.batch.segments.len(),
            word_count: event.batch.word_count(),
            speakers: event.batch.speaker_ids().into_iter().collect(),
            transcript: event.batch.transcript(),
        };
        if let Err(e) = self.storage.upsert_conversation(record) {
            warn!("conversation write failed: {e}");
        }
    }

    fn strip_wake_phrase(&self, text: &str) -> String {
        strip_wake_phrase(text, &self.wake_strips)
    }

    fn resolve_referent_params(&self, request: &mut ActionRequest, cx: &ResolveContext<'_>) {
        for key in ["to", "with"] {
            let Some(value) = request.param(key).map(str::to_owned) else {
                continue;
            };
            // Addresses and numbers are already concrete.
            if value.is_empty() || value.contains('@') || value.chars().any(|c| c.is_ascii_digit())
            {
                continue;
            }
            let resolved = self.resolver.resolve_surface(&value, cx);
            match resolved.resolution {
                Resolution::Auto | Resolution::Soft => {
                    if let Some(name) = resolved.resolved_name {
                        request.params.insert(
                            format!("{key}_resolved"),
                            serde_json::Value::String(name),
                        );
                    }
                }
                Resolution::NeedsHuman => {
                    request.human_required = true;
                }
                Resolution::Unresolved => {}
            }
        }
    }
}

/// Take everything after the first wake-phrase occurrence as the
/// command, tolerating a leading "hey" and punctuation. Falls back to
/// the full text when stripping leaves nothing.
fn strip_wake_phrase(text: &str, strips: &[Regex]) -> String {
    let earliest = strips
        .iter()
        .filter_map(|re| re.find(text))
        .min_by_key(|m| m.start());
    let Some(m) = earliest else {
        return text.to_owned();
    };
    let after = text[m.end()..].trim_matches(|c: char| ".,!? ".contains(c));
    if after.is_empty() {
        text.to_owned()
    } else {
        after.to_owned()
    }
}

fn wake_strip_pattern(phrase: &str) -> Option<Regex> {
    let escaped = regex::escape(phrase.trim());
    if escaped.is_empty() {
        return None;
    }
    match Regex::new(&format!(r"(?i)(?:hey[,.]?\s*)?{escaped}[,.\s]*")) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!("invalid wake phrase {phrase:?}: {e}");
            None
        }
    }
}

fn snippet(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
