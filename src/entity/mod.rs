//! Entity extraction types and the regex fast pass.
//!
//! The fast pass is rule-based and cheap enough to run on every flushed
//! batch: emails, phone numbers, URLs, @mentions, date phrases, titled
//! person names, company-suffixed orgs, known product names, and generic
//! capitalized phrases as low-confidence person candidates. Resolution
//! against known speakers/contacts lives in [`resolve`].

pub mod relationships;
pub mod resolve;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// The kind of entity a surface form refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A person's name.
    Person,
    /// An organization or company.
    Org,
    /// A named project.
    Project,
    /// A known product.
    Product,
    /// An email address.
    Email,
    /// A phone number.
    Phone,
    /// A URL.
    Url,
    /// An @mention handle.
    Mention,
    /// A date phrase.
    Date,
    /// A place.
    Location,
    /// A named event.
    Event,
    /// Unclassified.
    Unknown,
}

impl EntityKind {
    /// Stable lowercase label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Org => "org",
            Self::Project => "project",
            Self::Product => "product",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Url => "url",
            Self::Mention => "mention",
            Self::Date => "date",
            Self::Location => "location",
            Self::Event => "event",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The confidence bucket assigned to a resolution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Confident enough to act on without confirmation.
    Auto,
    /// Resolved, but uncertainty should be surfaced downstream.
    Soft,
    /// Too uncertain; a human must disambiguate.
    NeedsHuman,
    /// No strategy produced a referent.
    Unresolved,
}

/// An entity surfaced from conversation text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedEntity {
    /// What kind of entity this is.
    pub kind: EntityKind,
    /// The text as spoken.
    pub surface_form: String,
    /// Extraction/resolution confidence in [0, 1].
    pub confidence: f32,
    /// Surrounding text for audit context.
    pub context: String,
    /// Identifier of the resolved referent, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_id: Option<String>,
    /// Canonical name of the resolved referent, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_name: Option<String>,
    /// Which confidence bucket the resolution landed in.
    pub resolution: Resolution,
}

impl ExtractedEntity {
    /// Create an unresolved entity with clamped confidence.
    pub fn new(kind: EntityKind, surface_form: impl Into<String>, confidence: f32) -> Self {
        Self {
            kind,
            surface_form: surface_form.into(),
            confidence: confidence.clamp(0.0, 1.0),
            context: String::new(),
            resolved_id: None,
            resolved_name: None,
            resolution: Resolution::Unresolved,
        }
    }

    /// Attach surrounding context text.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// The best known name: resolved form when available, surface otherwise.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.resolved_name.as_deref().unwrap_or(&self.surface_form)
    }

    /// Returns `true` once a referent has been attached.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved_name.is_some()
    }
}

// ── Fast pass ───────────────────────────────────────────────────────

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[\w.+-]+@[\w-]+\.[\w.]+\b").expect("email regex"));
static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:\+?1[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b").expect("phone regex")
});
static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").expect("url regex"));
static MENTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"@(\w+)").expect("mention regex"));
static RELATIVE_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(today|tomorrow|yesterday)\b").expect("relative date regex"));
static WEEKDAY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(next|this|last)\s+(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b")
        .expect("weekday regex")
});
static MONTH_DAY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|jun(?:e)?|jul(?:y)?|aug(?:ust)?|sep(?:tember)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\s+\d{1,2}(?:st|nd|rd|th)?\b",
    )
    .expect("month-day regex")
});
static NUMERIC_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{1,2}/\d{1,2}(?:/\d{2,4})?\b").expect("numeric date regex"));
static TITLED_PERSON_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:Mr\.?|Mrs\.?|Ms\.?|Dr\.?)\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)*)")
        .expect("titled person regex")
});
static ORG_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Z][a-zA-Z]+(?:\s+[A-Z][a-zA-Z]+)*\s+(?:Inc\.?|Corp\.?|LLC|Ltd\.?|Co\.?))(?:\b|$)")
        .expect("org suffix regex")
});
static CAPITALIZED_PHRASE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Z][a-z]+(?:\s+[A-Z][a-z]+)+)\b").expect("capitalized phrase regex")
});

/// Product/tech names that would otherwise be mistaken for people.
const KNOWN_PRODUCTS: &[&str] = &[
    "apple watch",
    "apple tv",
    "apple music",
    "apple pay",
    "google maps",
    "google drive",
    "google cloud",
    "google home",
    "amazon echo",
    "amazon alexa",
    "mac mini",
    "mac pro",
    "microsoft teams",
    "visual studio",
    "open ai",
    "chat gpt",
];

/// Characters of surrounding text captured on each side of a match.
const CONTEXT_PAD: usize = 20;

/// Slice `text` around a byte range, padded by [`CONTEXT_PAD`] characters
/// on each side, respecting char boundaries.
fn context_window(text: &str, start: usize, end: usize) -> String {
    let mut lo = start;
    for _ in 0..CONTEXT_PAD {
        if lo == 0 {
            break;
        }
        lo -= 1;
        while lo > 0 && !text.is_char_boundary(lo) {
            lo -= 1;
        }
    }
    let mut hi = end;
    for _ in 0..CONTEXT_PAD {
        if hi >= text.len() {
            break;
        }
        hi += 1;
        while hi < text.len() && !text.is_char_boundary(hi) {
            hi += 1;
        }
    }
    text[lo..hi.min(text.len())].to_owned()
}

fn push_entity(
    entities: &mut Vec<ExtractedEntity>,
    text: &str,
    kind: EntityKind,
    surface: &str,
    confidence: f32,
    start: usize,
    end: usize,
) {
    entities.push(
        ExtractedEntity::new(kind, surface, confidence)
            .with_context(context_window(text, start, end)),
    );
}

/// Rule-based entity extraction over a single text.
#[must_use]
pub fn extract_fast(text: &str) -> Vec<ExtractedEntity> {
    let mut entities = Vec::new();

    for m in EMAIL_RE.find_iter(text) {
        push_entity(
            &mut entities,
            text,
            EntityKind::Email,
            m.as_str(),
            0.95,
            m.start(),
            m.end(),
        );
    }
    for m in PHONE_RE.find_iter(text) {
        push_entity(
            &mut entities,
            text,
            EntityKind::Phone,
            m.as_str(),
            0.9,
            m.start(),
            m.end(),
        );
    }
    for m in URL_RE.find_iter(text) {
        push_entity(
            &mut entities,
            text,
            EntityKind::Url,
            m.as_str(),
            0.95,
            m.start(),
            m.end(),
        );
    }
    for caps in MENTION_RE.captures_iter(text) {
        if let (Some(whole), Some(handle)) = (caps.get(0), caps.get(1)) {
            push_entity(
                &mut entities,
                text,
                EntityKind::Mention,
                handle.as_str(),
                0.85,
                whole.start(),
                whole.end(),
            );
        }
    }

    for (pattern, confidence) in [
        (&*RELATIVE_DATE_RE, 0.9),
        (&*WEEKDAY_RE, 0.85),
        (&*MONTH_DAY_RE, 0.85),
        (&*NUMERIC_DATE_RE, 0.7),
    ] {
        for m in pattern.find_iter(text) {
            push_entity(
                &mut entities,
                text,
                EntityKind::Date,
                m.as_str(),
                confidence,
                m.start(),
                m.end(),
            );
        }
    }

    for caps in TITLED_PERSON_RE.captures_iter(text) {
        if let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) {
            push_entity(
                &mut entities,
                text,
                EntityKind::Person,
                name.as_str(),
                0.85,
                whole.start(),
                whole.end(),
            );
        }
    }
    for caps in ORG_SUFFIX_RE.captures_iter(text) {
        if let Some(m) = caps.get(1) {
            push_entity(
                &mut entities,
                text,
                EntityKind::Org,
                m.as_str(),
                0.8,
                m.start(),
                m.end(),
            );
        }
    }

    // Generic capitalized phrases last, skipping anything already
    // captured by a stronger rule.
    let seen: Vec<String> = entities.iter().map(|e| e.surface_form.clone()).collect();
    for caps in CAPITALIZED_PHRASE_RE.captures_iter(text) {
        if let Some(m) = caps.get(1) {
            let name = m.as_str();
            if seen.iter().any(|s| s == name || s.contains(name)) {
                continue;
            }
            let (kind, confidence) = if KNOWN_PRODUCTS.contains(&name.to_lowercase().as_str()) {
                (EntityKind::Product, 0.7)
            } else {
                (EntityKind::Person, 0.6)
            };
            push_entity(&mut entities, text, kind, name, confidence, m.start(), m.end());
        }
    }

    entities
}
