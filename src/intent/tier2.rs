//! Tier-2 classification via the external reasoner.
//!
//! Builds the structured prompt, parses the JSON the reasoner returns,
//! and defines the TTL cache entry used to avoid duplicate calls for
//! repeated ambiguous phrasing. The actual transport lives behind the
//! [`Reasoner`](crate::collab::Reasoner) trait; this module stays pure so
//! both halves are unit-testable without a live collaborator.

use crate::pipeline::messages::{ActionRequest, IntentKind};
use serde::Deserialize;
use std::time::Instant;
use tracing::warn;

/// Ambiguous references that warrant semantic context in the prompt.
pub const AMBIGUOUS_REFS: &[&str] = &[
    "the client",
    "the team",
    "that meeting",
    "that person",
    "them",
    "him",
    "her",
];

/// Returns `true` when the text contains a reference worth grounding
/// with semantic search before asking the reasoner.
#[must_use]
pub fn has_ambiguous_reference(text: &str) -> bool {
    let lower = text.to_lowercase();
    AMBIGUOUS_REFS.iter().any(|r| lower.contains(r))
}

/// Build the tier-2 classification prompt.
#[must_use]
pub fn build_prompt(text: &str, context_text: &str, semantic_context: Option<&str>) -> String {
    let semantic_block = semantic_context
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            let truncated: String = s.chars().take(1_000).collect();
            format!("\nRelevant conversation history:\n{truncated}\n")
        })
        .unwrap_or_default();

    format!(
        r#"Parse this voice command into a structured action.
Command: "{text}"
Recent context: "{context_text}"
{semantic_block}
Respond with JSON only:
{{"intent": "email|text|reminder|search|order|calendar|note|unknown", "params": {{}}, "confidence": 0.0-1.0, "human_required": false}}

For params, include relevant fields:
- email: to, subject, body
- text: to, message
- reminder: task, when, when_seconds (if duration mentioned)
- search: query
- order: item, store
- calendar: event, with, when
- note: content"#
    )
}

/// The reasoner's parsed verdict.
#[derive(Debug, Clone, Deserialize)]
pub struct Tier2Outcome {
    /// Intent label.
    #[serde(default = "default_intent")]
    pub intent: String,
    /// Intent-specific parameters.
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
    /// Reasoner confidence.
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    /// Whether the reasoner itself wants a human in the loop.
    #[serde(default)]
    pub human_required: bool,
}

fn default_intent() -> String {
    "unknown".to_owned()
}

fn default_confidence() -> f32 {
    0.5
}

impl Tier2Outcome {
    /// Convert into an [`ActionRequest`] carrying the tier-2 source tag.
    #[must_use]
    pub fn into_request(self, raw_text: &str) -> ActionRequest {
        let mut request =
            ActionRequest::tier2(IntentKind::from_label(&self.intent), raw_text, self.confidence);
        request.params = self.params;
        request.human_required = self.human_required;
        request
    }
}

/// Parse a raw reasoner response into an outcome.
///
/// Accepts markdown-fenced or prose-wrapped JSON and returns `None` on
/// anything unparseable; tier 2 is best-effort and degrades to a
/// passthrough rather than failing.
#[must_use]
pub fn parse_response(raw: &str) -> Option<Tier2Outcome> {
    let json_str = extract_json_block(raw);
    if json_str.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<Tier2Outcome>(json_str) {
        Ok(mut outcome) => {
            outcome.confidence = outcome.confidence.clamp(0.0, 1.0);
            Some(outcome)
        }
        Err(e) => {
            warn!("tier-2 response parse failed: {e}");
            None
        }
    }
}

/// Extract the JSON body from a potentially markdown-fenced response.
fn extract_json_block(raw: &str) -> &str {
    let trimmed = raw.trim();

    if let Some(start) = trimmed.find("```json") {
        let after_fence = &trimmed[start + 7..];
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim();
        }
    }
    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim();
        }
    }
    if let Some(start) = trimmed.find('{')
        && let Some(end) = trimmed.rfind('}')
        && end > start
    {
        return &trimmed[start..=end];
    }

    trimmed
}

/// A cached tier-2 outcome, keyed by normalized input text.
#[derive(Debug, Clone)]
pub struct CachedOutcome {
    /// The parsed outcome.
    pub outcome: Tier2Outcome,
    /// When it was cached.
    pub at: Instant,
}

/// Normalize text into a cache key.
#[must_use]
pub fn cache_key(text: &str) -> String {
    text.trim().to_lowercase()
}
