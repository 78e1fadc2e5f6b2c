//! Message types passed between pipeline stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A single timestamped, speaker-tagged speech segment from the listening
/// device. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    /// Transcribed text.
    pub text: String,
    /// Offset of the segment start within its utterance, in seconds.
    pub start: f64,
    /// Offset of the segment end within its utterance, in seconds.
    pub end: f64,
    /// Diarized speaker identifier (e.g. `SPEAKER_00`).
    pub speaker_id: String,
    /// Whether the upstream device attributed this segment to the owner.
    pub is_primary_user: bool,
    /// Wall-clock time the segment arrived at this process.
    pub arrival_time: DateTime<Utc>,
}

impl Segment {
    /// Create a segment with the given text and speaker, stamped now.
    pub fn new(text: impl Into<String>, speaker_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            start: 0.0,
            end: 0.0,
            speaker_id: speaker_id.into(),
            is_primary_user: false,
            arrival_time: Utc::now(),
        }
    }

    /// Set the in-utterance start/end offsets.
    #[must_use]
    pub fn with_offsets(mut self, start: f64, end: f64) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// Mark this segment as spoken by the device owner.
    #[must_use]
    pub fn from_primary_user(mut self) -> Self {
        self.is_primary_user = true;
        self
    }

    /// Returns `true` if the segment carries no usable text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// An ordered batch of segments popped from a session at flush time.
#[derive(Debug, Clone)]
pub struct SegmentBatch {
    /// The session key the batch was accumulated under.
    pub session_key: String,
    /// Segments in arrival order.
    pub segments: Vec<Segment>,
}

impl SegmentBatch {
    /// Create a batch for the given session key.
    pub fn new(session_key: impl Into<String>, segments: Vec<Segment>) -> Self {
        Self {
            session_key: session_key.into(),
            segments,
        }
    }

    /// All segment texts joined with single spaces.
    #[must_use]
    pub fn full_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Text of primary-user segments only, falling back to all segments
    /// when the device attributed nothing to the owner.
    #[must_use]
    pub fn primary_text(&self) -> String {
        let user_only = self
            .segments
            .iter()
            .filter(|s| s.is_primary_user)
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if user_only.is_empty() {
            self.full_text()
        } else {
            user_only
        }
    }

    /// Speaker-tagged transcript, one `[speaker] text` line per segment.
    #[must_use]
    pub fn transcript(&self) -> String {
        self.segments
            .iter()
            .map(|s| format!("[{}] {}", s.speaker_id, s.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Distinct speaker IDs present in the batch, sorted.
    #[must_use]
    pub fn speaker_ids(&self) -> BTreeSet<String> {
        self.segments
            .iter()
            .map(|s| s.speaker_id.clone())
            .collect()
    }

    /// Returns `true` if any segment was attributed to the device owner.
    #[must_use]
    pub fn has_primary_user(&self) -> bool {
        self.segments.iter().any(|s| s.is_primary_user)
    }

    /// Total word count across all segments.
    #[must_use]
    pub fn word_count(&self) -> usize {
        self.segments
            .iter()
            .map(|s| s.text.split_whitespace().count())
            .sum()
    }

    /// Span in seconds from the first segment's start to the last's end.
    #[must_use]
    pub fn duration_secs(&self) -> f64 {
        match (self.segments.first(), self.segments.last()) {
            (Some(first), Some(last)) if self.segments.len() > 1 => {
                (last.end - first.start).max(0.0)
            }
            _ => 0.0,
        }
    }

    /// Returns `true` if the batch holds no segments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// The intent category assigned to a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    /// Send an email.
    Email,
    /// Send a text message.
    Text,
    /// Set a reminder.
    Reminder,
    /// Search / look something up.
    Search,
    /// Save a note.
    Note,
    /// Order or buy something.
    Order,
    /// Create a calendar entry.
    Calendar,
    /// Could not be classified; raw text is passed through.
    Unknown,
}

impl IntentKind {
    /// Stable lowercase label, matching the wire form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Text => "text",
            Self::Reminder => "reminder",
            Self::Search => "search",
            Self::Note => "note",
            Self::Order => "order",
            Self::Calendar => "calendar",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a wire label back into an intent kind.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "email" => Self::Email,
            "text" => Self::Text,
            "reminder" => Self::Reminder,
            "search" => Self::Search,
            "note" => Self::Note,
            "order" => Self::Order,
            "calendar" => Self::Calendar,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for IntentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which classifier tier produced an action request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestSource {
    /// Deterministic pattern rules.
    Tier1,
    /// External reasoner fallback.
    Tier2,
}

/// A well-formed, classified command ready for the execution collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Unique request ID.
    pub id: String,
    /// Classified intent category.
    pub intent: IntentKind,
    /// Intent-specific parameters (recipient, body, task, when, ...).
    pub params: serde_json::Map<String, serde_json::Value>,
    /// The command text the classification was derived from.
    pub raw_text: String,
    /// Classification confidence in [0, 1].
    pub confidence: f32,
    /// Which tier produced the classification.
    pub source: RequestSource,
    /// Whether a human should confirm before execution.
    pub human_required: bool,
}

impl ActionRequest {
    /// Create a tier-1 request with full confidence.
    pub fn tier1(intent: IntentKind, raw_text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            intent,
            params: serde_json::Map::new(),
            raw_text: raw_text.into(),
            confidence: 1.0,
            source: RequestSource::Tier1,
            human_required: false,
        }
    }

    /// Create a tier-2 request with the given confidence (clamped to [0, 1]).
    pub fn tier2(intent: IntentKind, raw_text: impl Into<String>, confidence: f32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            intent,
            params: serde_json::Map::new(),
            raw_text: raw_text.into(),
            confidence: confidence.clamp(0.0, 1.0),
            source: RequestSource::Tier2,
            human_required: false,
        }
    }

    /// Create an unclassified passthrough for text no tier could place.
    pub fn passthrough(raw_text: impl Into<String>, source: RequestSource) -> Self {
        let raw_text = raw_text.into();
        let mut request = Self {
            id: uuid::Uuid::new_v4().to_string(),
            intent: IntentKind::Unknown,
            params: serde_json::Map::new(),
            raw_text: raw_text.clone(),
            confidence: 0.0,
            source,
            human_required: false,
        };
        request
            .params
            .insert("text".to_owned(), serde_json::Value::String(raw_text));
        request
    }

    /// Attach a string parameter.
    #[must_use]
    pub fn with_param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params
            .insert(key.to_owned(), serde_json::Value::String(value.into()));
        self
    }

    /// Attach an arbitrary JSON parameter.
    #[must_use]
    pub fn with_json_param(mut self, key: &str, value: serde_json::Value) -> Self {
        self.params.insert(key.to_owned(), value);
        self
    }

    /// Fetch a string parameter by key.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.as_str())
    }
}
