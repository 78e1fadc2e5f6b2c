//! Multi-strategy entity resolution.
//!
//! A strictly ordered chain: exact → fuzzy → contextual graph → recency →
//! semantic fallback. Each strategy is an independent, pure function of
//! the surface form and a resolution context; the chain stops at the
//! first strategy that produces a referent. Confidence buckets are then
//! applied uniformly: ≥ 0.8 auto, ≥ 0.5 soft, below that needs_human,
//! and no match at all stays unresolved.

use crate::collab::{ContactRecord, SemanticIndex, SpeakerRecord, Storage};
use crate::config::ResolverConfig;
use crate::entity::{EntityKind, ExtractedEntity, Resolution, extract_fast};
use tracing::debug;

/// Auto-resolve threshold.
pub const CONF_AUTO: f32 = 0.8;
/// Soft-resolve threshold; below this a human is needed.
pub const CONF_SOFT: f32 = 0.5;

/// Pronouns and indefinite references eligible for recency resolution.
const PRONOUNS: &[&str] = &[
    "he",
    "she",
    "they",
    "them",
    "him",
    "her",
    "it",
    "the client",
    "the team",
];

/// Everything a strategy may consult.
pub struct ResolveContext<'a> {
    /// Known speakers.
    pub speakers: &'a [SpeakerRecord],
    /// Known contacts.
    pub contacts: &'a [ContactRecord],
    /// The active conversation, for contextual graph lookups.
    pub conversation_id: Option<&'a str>,
    /// Storage collaborator for mention/relationship queries.
    pub storage: Option<&'a dyn Storage>,
    /// Rolling window of recently mentioned entities, oldest first.
    pub recent: &'a [ExtractedEntity],
    /// Semantic search collaborator for the fallback strategy.
    pub index: Option<&'a dyn SemanticIndex>,
}

/// A referent produced by one strategy.
#[derive(Debug, Clone)]
pub struct ResolvedReferent {
    /// Referent identifier, when the pool carries one.
    pub id: Option<String>,
    /// Canonical referent name.
    pub name: String,
    /// Confidence this strategy assigns.
    pub confidence: f32,
}

/// One link in the resolution chain.
pub trait ResolveStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Attempt to resolve the surface form. `current_confidence` is the
    /// entity's confidence going in; strategies may floor against it.
    fn resolve(
        &self,
        surface: &str,
        current_confidence: f32,
        cx: &ResolveContext<'_>,
    ) -> Option<ResolvedReferent>;
}

// ── String similarity ───────────────────────────────────────────────

/// Ratcliff/Obershelp similarity in [0, 1]: twice the total matched
/// characters over the combined length, with matches found by recursive
/// longest-common-substring splitting.
#[must_use]
pub fn similarity_ratio(a: &str, b: &str) -> f32 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let matched = matching_chars(&a, &b);
    (2.0 * matched as f32) / (a.len() + b.len()) as f32
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (start_a, start_b, len) = longest_common_run(a, b);
    if len == 0 {
        return 0;
    }
    len + matching_chars(&a[..start_a], &b[..start_b])
        + matching_chars(&a[start_a + len..], &b[start_b + len..])
}

fn longest_common_run(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    // lengths[j] = length of common run ending at a[i], b[j].
    let mut lengths = vec![0usize; b.len() + 1];
    for i in 0..a.len() {
        let mut prev = 0;
        for j in 0..b.len() {
            let current = lengths[j + 1];
            if a[i] == b[j] {
                let run = prev + 1;
                lengths[j + 1] = run;
                if run > best.2 {
                    best = (i + 1 - run, j + 1 - run, run);
                }
            } else {
                lengths[j + 1] = 0;
            }
            prev = current;
        }
    }
    best
}

// ── Strategies ──────────────────────────────────────────────────────

/// Case-insensitive exact match against speakers and contacts.
pub struct ExactMatch;

impl ResolveStrategy for ExactMatch {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn resolve(
        &self,
        surface: &str,
        current_confidence: f32,
        cx: &ResolveContext<'_>,
    ) -> Option<ResolvedReferent> {
        let needle = surface.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        for speaker in cx.speakers {
            if let Some(name) = &speaker.name
                && name.to_lowercase() == needle
            {
                return Some(ResolvedReferent {
                    id: Some(speaker.id.clone()),
                    name: name.clone(),
                    confidence: current_confidence.max(0.9),
                });
            }
        }
        for contact in cx.contacts {
            if contact.name.to_lowercase() == needle
                || contact.aliases.iter().any(|a| a.to_lowercase() == needle)
            {
                return Some(ResolvedReferent {
                    id: None,
                    name: contact.name.clone(),
                    confidence: current_confidence.max(0.9),
                });
            }
        }
        None
    }
}

/// Fuzzy string-similarity match against speakers and contacts.
pub struct FuzzyMatch {
    /// Minimum similarity for a candidate to count.
    pub threshold: f32,
}

impl ResolveStrategy for FuzzyMatch {
    fn name(&self) -> &'static str {
        "fuzzy"
    }

    fn resolve(
        &self,
        surface: &str,
        _current_confidence: f32,
        cx: &ResolveContext<'_>,
    ) -> Option<ResolvedReferent> {
        let needle = surface.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        let mut best: Option<ResolvedReferent> = None;
        let mut best_score = 0.0f32;

        let mut consider = |id: Option<String>, name: &str| {
            let score = similarity_ratio(&needle, &name.to_lowercase());
            if score >= self.threshold && score > best_score {
                best_score = score;
                best = Some(ResolvedReferent {
                    id,
                    name: name.to_owned(),
                    confidence: score,
                });
            }
        };

        for speaker in cx.speakers {
            if let Some(name) = &speaker.name {
                consider(Some(speaker.id.clone()), name);
            }
        }
        for contact in cx.contacts {
            consider(None, &contact.name);
        }
        best
    }
}

/// Relationship-graph lookup for indefinite references.
///
/// For "the client" / "the team", follows edges of the expected type from
/// entities already mentioned in the active conversation.
pub struct ContextualMatch;

impl ContextualMatch {
    fn expected_edge(surface: &str) -> Option<(&'static str, f32)> {
        match surface {
            "the client" => Some(("client_of", 0.7)),
            "the team" => Some(("works_on", 0.65)),
            _ => None,
        }
    }
}

impl ResolveStrategy for ContextualMatch {
    fn name(&self) -> &'static str {
        "contextual"
    }

    fn resolve(
        &self,
        surface: &str,
        _current_confidence: f32,
        cx: &ResolveContext<'_>,
    ) -> Option<ResolvedReferent> {
        let (relation, confidence) = Self::expected_edge(surface.trim().to_lowercase().as_str())?;
        let conversation_id = cx.conversation_id?;
        let storage = cx.storage?;

        let mentions = storage.entity_mentions(conversation_id).ok()?;
        for mention in mentions {
            let Ok(edges) = storage.relationships_for(&mention.name) else {
                continue;
            };
            for edge in edges {
                if edge.relation != relation {
                    continue;
                }
                let referent = if edge.source == mention.name {
                    edge.target
                } else {
                    edge.source
                };
                return Some(ResolvedReferent {
                    id: Some(referent.clone()),
                    name: referent,
                    confidence,
                });
            }
        }
        None
    }
}

/// Most-recently-mentioned-person resolution for pronouns.
///
/// Carries no gender signal: "she", "he", and "they" all pick the most
/// recent person-kind entity in the rolling window. A known heuristic
/// limitation, surfaced through the soft confidence bucket.
pub struct RecencyMatch;

impl ResolveStrategy for RecencyMatch {
    fn name(&self) -> &'static str {
        "recency"
    }

    fn resolve(
        &self,
        surface: &str,
        _current_confidence: f32,
        cx: &ResolveContext<'_>,
    ) -> Option<ResolvedReferent> {
        let needle = surface.trim().to_lowercase();
        if !PRONOUNS.contains(&needle.as_str()) {
            return None;
        }
        cx.recent
            .iter()
            .rev()
            .find(|e| e.kind == EntityKind::Person && e.is_resolved())
            .map(|person| ResolvedReferent {
                id: person.resolved_id.clone(),
                name: person.display_name().to_owned(),
                confidence: 0.65,
            })
    }
}

/// Semantic-search fallback: extract sub-entities from the closest
/// conversation snippets and take the first person/org/project hit.
pub struct SemanticFallback {
    /// How many snippets to inspect.
    pub limit: usize,
}

impl ResolveStrategy for SemanticFallback {
    fn name(&self) -> &'static str {
        "semantic"
    }

    fn resolve(
        &self,
        surface: &str,
        _current_confidence: f32,
        cx: &ResolveContext<'_>,
    ) -> Option<ResolvedReferent> {
        let index = cx.index?;
        let snippets = index.search(surface, self.limit).ok()?;
        for snippet in snippets {
            for sub in extract_fast(&snippet.text) {
                if matches!(
                    sub.kind,
                    EntityKind::Person | EntityKind::Org | EntityKind::Project
                ) {
                    return Some(ResolvedReferent {
                        id: None,
                        name: sub.surface_form,
                        confidence: 0.55,
                    });
                }
            }
        }
        None
    }
}

// ── Chain ───────────────────────────────────────────────────────────

/// The ordered resolution chain.
pub struct EntityResolver {
    strategies: Vec<Box<dyn ResolveStrategy>>,
}

impl EntityResolver {
    /// Build the standard chain from configuration.
    #[must_use]
    pub fn new(config: &ResolverConfig) -> Self {
        Self {
            strategies: vec![
                Box::new(ExactMatch),
                Box::new(FuzzyMatch {
                    threshold: config.fuzzy_threshold,
                }),
                Box::new(ContextualMatch),
                Box::new(RecencyMatch),
                Box::new(SemanticFallback {
                    limit: config.semantic_limit,
                }),
            ],
        }
    }

    /// Build a chain from explicit strategies, mainly for tests.
    #[must_use]
    pub fn with_strategies(strategies: Vec<Box<dyn ResolveStrategy>>) -> Self {
        Self { strategies }
    }

    /// Run the chain over an entity, stopping at the first referent.
    ///
    /// The resolution bucket is assigned exactly once per attempt: a
    /// later, weaker strategy can never downgrade an earlier match.
    #[must_use]
    pub fn resolve(&self, mut entity: ExtractedEntity, cx: &ResolveContext<'_>) -> ExtractedEntity {
        for strategy in &self.strategies {
            if let Some(referent) =
                strategy.resolve(&entity.surface_form, entity.confidence, cx)
            {
                debug!(
                    strategy = strategy.name(),
                    surface = %entity.surface_form,
                    referent = %referent.name,
                    "entity resolved"
                );
                entity.resolved_id = referent.id;
                entity.resolved_name = Some(referent.name);
                entity.confidence = referent.confidence.clamp(0.0, 1.0);
                entity.resolution = bucket_for(entity.confidence);
                return entity;
            }
        }

        entity.resolution = if entity.confidence < CONF_SOFT {
            Resolution::NeedsHuman
        } else {
            Resolution::Unresolved
        };
        entity
    }

    /// Resolve a bare surface form with no prior extraction confidence.
    #[must_use]
    pub fn resolve_surface(&self, surface: &str, cx: &ResolveContext<'_>) -> ExtractedEntity {
        self.resolve(ExtractedEntity::new(EntityKind::Unknown, surface, 0.5), cx)
    }
}

/// Uniform confidence buckets for a successful resolution.
fn bucket_for(confidence: f32) -> Resolution {
    if confidence >= CONF_AUTO {
        Resolution::Auto
    } else if confidence >= CONF_SOFT {
        Resolution::Soft
    } else {
        Resolution::NeedsHuman
    }
}
