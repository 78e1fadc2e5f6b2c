//! Collaborator contracts for the earshot pipeline.
//!
//! The core deliberately does not own speech-to-text, persistence, the
//! reasoning/execution agent, or vector search. Each is an injected trait
//! so a test double can stand in, and so transport concerns (HTTP, IPC,
//! SQL) stay out of the pipeline. Storage and lookups are synchronous;
//! the storage collaborator is assumed fast; its failures are logged by
//! callers and never block the pipeline.

use crate::pipeline::messages::{ActionRequest, Segment};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

// ── Storage records ─────────────────────────────────────────────────

/// A diarized speaker known to the storage layer.
#[derive(Debug, Clone)]
pub struct SpeakerRecord {
    /// Raw speaker identifier (e.g. `SPEAKER_00`).
    pub id: String,
    /// Human name, once mapped.
    pub name: Option<String>,
    /// Whether this speaker is the device owner.
    pub is_owner: bool,
    /// Whether this speaker may issue commands when an allowlist is active.
    pub approved: bool,
}

/// An address-book contact.
#[derive(Debug, Clone, Default)]
pub struct ContactRecord {
    /// Canonical contact name.
    pub name: String,
    /// Alternate spoken forms of the name.
    pub aliases: Vec<String>,
    /// Email address, if known.
    pub email: Option<String>,
    /// Phone number, if known.
    pub phone: Option<String>,
    /// Whether this contact is the device owner.
    pub is_owner: bool,
}

/// One utterance appended to the conversation log.
#[derive(Debug, Clone)]
pub struct UtteranceRecord {
    /// Session the utterance belongs to.
    pub session_key: String,
    /// Conversation the utterance belongs to.
    pub conversation_id: String,
    /// Speaker identifier.
    pub speaker_id: String,
    /// Utterance text.
    pub text: String,
    /// Arrival time.
    pub at: DateTime<Utc>,
}

/// Conversation-level rollup, upserted at each flush.
#[derive(Debug, Clone)]
pub struct ConversationRecord {
    /// Conversation identifier.
    pub id: String,
    /// When the conversation started.
    pub started_at: DateTime<Utc>,
    /// Span in seconds from the first segment to the last.
    pub duration_secs: f64,
    /// Segments seen so far.
    pub segment_count: usize,
    /// Words seen so far.
    pub word_count: usize,
    /// Distinct speakers seen so far.
    pub speakers: Vec<String>,
    /// Speaker-tagged transcript.
    pub transcript: String,
}

/// An entity mention recorded against a conversation.
#[derive(Debug, Clone)]
pub struct EntityMention {
    /// Conversation the mention occurred in.
    pub conversation_id: String,
    /// Entity name (resolved form when available).
    pub name: String,
    /// Entity kind label (person, org, project, ...).
    pub kind: String,
    /// When the mention was recorded.
    pub at: DateTime<Utc>,
}

/// A weighted edge in the relationship graph.
#[derive(Debug, Clone)]
pub struct RelationshipRecord {
    /// Source entity name.
    pub source: String,
    /// Target entity name.
    pub target: String,
    /// Edge type (`mentioned_with`, `works_on`, `client_of`, ...).
    pub relation: String,
    /// How often the edge has been observed.
    pub weight: u32,
    /// Where the edge was last observed (e.g. `conversation:<id>`).
    pub evidence: Option<String>,
}

/// A security event recorded when a batch is denied.
#[derive(Debug, Clone)]
pub struct SecurityEvent {
    /// Speaker that triggered the event.
    pub speaker_id: String,
    /// Short text snippet for audit context.
    pub snippet: String,
    /// Machine-readable reason (`unauthorized_speaker`).
    pub reason: String,
    /// Free-form detail.
    pub detail: String,
    /// When the event occurred.
    pub at: DateTime<Utc>,
}

/// A snippet returned from semantic search over conversation history.
#[derive(Debug, Clone)]
pub struct ContextSnippet {
    /// Snippet text.
    pub text: String,
    /// Similarity score, higher is closer.
    pub score: f32,
}

// ── Collaborator traits ─────────────────────────────────────────────

/// Persistence collaborator. Synchronous by contract; failures are
/// logged by callers and never block the pipeline.
pub trait Storage: Send + Sync {
    /// Append one utterance to the conversation log.
    fn append_utterance(&self, utterance: UtteranceRecord) -> anyhow::Result<()>;

    /// Insert or update a conversation rollup.
    fn upsert_conversation(&self, conversation: ConversationRecord) -> anyhow::Result<()>;

    /// Record an entity mention.
    fn record_entity_mention(&self, mention: EntityMention) -> anyhow::Result<()>;

    /// Create or bump a relationship edge.
    fn bump_relationship(
        &self,
        source: &str,
        target: &str,
        relation: &str,
        evidence: Option<&str>,
    ) -> anyhow::Result<()>;

    /// Record a security event.
    fn log_security_event(&self, event: SecurityEvent) -> anyhow::Result<()>;

    /// Persist a classified action request.
    fn save_action(&self, request: &ActionRequest) -> anyhow::Result<()>;

    /// All known speakers.
    fn speakers(&self) -> anyhow::Result<Vec<SpeakerRecord>>;

    /// Speaker IDs allowed to issue commands. An empty list means no
    /// allowlist is configured and every speaker is permitted.
    fn authorized_speakers(&self) -> anyhow::Result<Vec<String>>;

    /// Entity mentions recorded against a conversation.
    fn entity_mentions(&self, conversation_id: &str) -> anyhow::Result<Vec<EntityMention>>;

    /// Relationship edges touching the given entity.
    fn relationships_for(&self, entity: &str) -> anyhow::Result<Vec<RelationshipRecord>>;
}

/// Address-book lookup collaborator with alias matching.
pub trait ContactBook: Send + Sync {
    /// Look up a contact by name or alias, case-insensitively.
    fn lookup(&self, name: &str) -> Option<ContactRecord>;

    /// The device owner's contact, if one is marked.
    fn owner(&self) -> Option<ContactRecord>;

    /// All known contacts.
    fn all(&self) -> Vec<ContactRecord>;
}

/// Semantic search over conversation history.
pub trait SemanticIndex: Send + Sync {
    /// Return the closest snippets for a query.
    fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<ContextSnippet>>;
}

/// External reasoning collaborator used for tier-2 classification.
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Send a prompt and return the raw text response.
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Execution collaborator that carries out classified action requests.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Execute an action request. Delivery and confirmation are the
    /// collaborator's concern; the pipeline only emits.
    async fn execute(&self, request: ActionRequest) -> anyhow::Result<()>;
}

/// Summarization collaborator that receives expired conversation windows.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize a finished conversation.
    async fn summarize(&self, session_key: &str, segments: Vec<Segment>) -> anyhow::Result<()>;
}

/// Speech-to-text collaborator for the raw-audio ingest path.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe PCM16 audio into speaker-tagged segments.
    async fn transcribe(&self, session_id: &str, audio: Vec<u8>) -> anyhow::Result<Vec<Segment>>;
}

// ── In-memory defaults ──────────────────────────────────────────────

#[derive(Default)]
struct MemoryStorageInner {
    utterances: Vec<UtteranceRecord>,
    conversations: HashMap<String, ConversationRecord>,
    mentions: Vec<EntityMention>,
    relationships: Vec<RelationshipRecord>,
    security_events: Vec<SecurityEvent>,
    actions: Vec<ActionRequest>,
    speakers: Vec<SpeakerRecord>,
}

/// In-memory [`Storage`] implementation. The default wiring for tests
/// and for embedders that bring their own persistence later.
#[derive(Default)]
pub struct MemoryStorage {
    inner: Mutex<MemoryStorageInner>,
}

impl MemoryStorage {
    /// Create an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a speaker.
    pub fn add_speaker(&self, speaker: SpeakerRecord) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.speakers.push(speaker);
        }
    }

    /// Recorded security events, oldest first.
    #[must_use]
    pub fn security_events(&self) -> Vec<SecurityEvent> {
        self.inner
            .lock()
            .map(|inner| inner.security_events.clone())
            .unwrap_or_default()
    }

    /// Persisted action requests, oldest first.
    #[must_use]
    pub fn actions(&self) -> Vec<ActionRequest> {
        self.inner
            .lock()
            .map(|inner| inner.actions.clone())
            .unwrap_or_default()
    }

    /// Appended utterances, oldest first.
    #[must_use]
    pub fn utterances(&self) -> Vec<UtteranceRecord> {
        self.inner
            .lock()
            .map(|inner| inner.utterances.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> anyhow::Result<std::sync::MutexGuard<'_, MemoryStorageInner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow::anyhow!("memory storage lock poisoned"))
    }
}

impl Storage for MemoryStorage {
    fn append_utterance(&self, utterance: UtteranceRecord) -> anyhow::Result<()> {
        self.lock()?.utterances.push(utterance);
        Ok(())
    }

    fn upsert_conversation(&self, conversation: ConversationRecord) -> anyhow::Result<()> {
        self.lock()?
            .conversations
            .insert(conversation.id.clone(), conversation);
        Ok(())
    }

    fn record_entity_mention(&self, mention: EntityMention) -> anyhow::Result<()> {
        self.lock()?.mentions.push(mention);
        Ok(())
    }

    fn bump_relationship(
        &self,
        source: &str,
        target: &str,
        relation: &str,
        evidence: Option<&str>,
    ) -> anyhow::Result<()> {
        let mut inner = self.lock()?;
        if let Some(existing) = inner.relationships.iter_mut().find(|r| {
            r.relation == relation
                && ((r.source == source && r.target == target)
                    || (r.source == target && r.target == source))
        }) {
            existing.weight += 1;
            existing.evidence = evidence.map(str::to_owned);
        } else {
            inner.relationships.push(RelationshipRecord {
                source: source.to_owned(),
                target: target.to_owned(),
                relation: relation.to_owned(),
                weight: 1,
                evidence: evidence.map(str::to_owned),
            });
        }
        Ok(())
    }

    fn log_security_event(&self, event: SecurityEvent) -> anyhow::Result<()> {
        self.lock()?.security_events.push(event);
        Ok(())
    }

    fn save_action(&self, request: &ActionRequest) -> anyhow::Result<()> {
        self.lock()?.actions.push(request.clone());
        Ok(())
    }

    fn speakers(&self) -> anyhow::Result<Vec<SpeakerRecord>> {
        Ok(self.lock()?.speakers.clone())
    }

    fn authorized_speakers(&self) -> anyhow::Result<Vec<String>> {
        Ok(self
            .lock()?
            .speakers
            .iter()
            .filter(|s| s.is_owner || s.approved)
            .map(|s| s.id.clone())
            .collect())
    }

    fn entity_mentions(&self, conversation_id: &str) -> anyhow::Result<Vec<EntityMention>> {
        Ok(self
            .lock()?
            .mentions
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect())
    }

    fn relationships_for(&self, entity: &str) -> anyhow::Result<Vec<RelationshipRecord>> {
        Ok(self
            .lock()?
            .relationships
            .iter()
            .filter(|r| r.source == entity || r.target == entity)
            .cloned()
            .collect())
    }
}

/// Static [`ContactBook`] backed by a fixed contact list.
#[derive(Default)]
pub struct StaticContacts {
    contacts: Vec<ContactRecord>,
}

impl StaticContacts {
    /// Create a contact book from a fixed list.
    #[must_use]
    pub fn new(contacts: Vec<ContactRecord>) -> Self {
        Self { contacts }
    }
}

impl ContactBook for StaticContacts {
    fn lookup(&self, name: &str) -> Option<ContactRecord> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.contacts
            .iter()
            .find(|c| {
                c.name.to_lowercase() == needle
                    || c.aliases.iter().any(|a| a.to_lowercase() == needle)
            })
            .cloned()
    }

    fn owner(&self) -> Option<ContactRecord> {
        self.contacts.iter().find(|c| c.is_owner).cloned()
    }

    fn all(&self) -> Vec<ContactRecord> {
        self.contacts.clone()
    }
}
