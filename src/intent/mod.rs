//! Two-tier intent classification.
//!
//! Tier 1 runs the deterministic pattern rules; tier 2 delegates to the
//! external reasoner with a bounded timeout and a TTL cache keyed by
//! normalized input. When the reasoner is unavailable, times out, or
//! returns nothing usable, classification degrades to an unclassified
//! passthrough; a slow or absent collaborator never becomes an error.

pub mod recipient;
pub mod rules;
pub mod tier2;

use crate::collab::{ContactBook, Reasoner, SemanticIndex, Storage};
use crate::config::ClassifierConfig;
use crate::pipeline::messages::{ActionRequest, RequestSource};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use self::tier2::{CachedOutcome, Tier2Outcome};
use tracing::{debug, info, warn};

/// Conversation context handed to a classification call.
#[derive(Debug, Clone, Default)]
pub struct ClassifyContext {
    /// Trailing context for tier-1 body/content fallbacks.
    pub context_text: String,
    /// Shorter trailing context quoted to the reasoner.
    pub reasoner_context: String,
}

/// The two-tier classifier.
pub struct IntentClassifier {
    config: ClassifierConfig,
    contacts: Arc<dyn ContactBook>,
    reasoner: Option<Arc<dyn Reasoner>>,
    index: Option<Arc<dyn SemanticIndex>>,
    storage: Option<Arc<dyn Storage>>,
    cache: Mutex<HashMap<String, CachedOutcome>>,
}

impl IntentClassifier {
    /// Create a classifier. `reasoner` enables tier 2; `index` enriches
    /// ambiguous references; `storage` receives classified actions.
    pub fn new(
        config: ClassifierConfig,
        contacts: Arc<dyn ContactBook>,
        reasoner: Option<Arc<dyn Reasoner>>,
        index: Option<Arc<dyn SemanticIndex>>,
        storage: Option<Arc<dyn Storage>>,
    ) -> Self {
        Self {
            config,
            contacts,
            reasoner,
            index,
            storage,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Classify a command text into an action request.
    ///
    /// Never fails: the worst outcome is an unclassified passthrough.
    pub async fn classify(&self, text: &str, cx: &ClassifyContext) -> ActionRequest {
        if let Some(request) =
            rules::classify_tier1(text, &cx.context_text, self.contacts.as_ref())
        {
            debug!(intent = %request.intent, "tier-1 rule matched");
            self.persist(&request);
            return request;
        }

        if !self.config.tier2_enabled || self.reasoner.is_none() {
            return ActionRequest::passthrough(text, RequestSource::Tier1);
        }

        match self.try_tier2(text, cx).await {
            Some(outcome) => {
                let mut request = outcome.into_request(text);
                if request.confidence < self.config.low_confidence {
                    request.human_required = true;
                }
                if request.intent == crate::pipeline::messages::IntentKind::Unknown
                    && !request.human_required
                {
                    // The reasoner had nothing actionable either.
                    return ActionRequest::passthrough(text, RequestSource::Tier2);
                }
                info!(
                    intent = %request.intent,
                    confidence = request.confidence,
                    "tier-2 classified"
                );
                self.persist(&request);
                request
            }
            None => ActionRequest::passthrough(text, RequestSource::Tier2),
        }
    }

    /// Number of live cache entries, for observability and tests.
    #[must_use]
    pub fn cached_outcomes(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    async fn try_tier2(&self, text: &str, cx: &ClassifyContext) -> Option<Tier2Outcome> {
        let reasoner = self.reasoner.as_ref()?;
        let key = tier2::cache_key(text);
        let ttl = Duration::from_millis(self.config.cache_ttl_ms);

        if let Ok(cache) = self.cache.lock()
            && let Some(entry) = cache.get(&key)
            && entry.at.elapsed() < ttl
        {
            debug!("tier-2 cache hit");
            return Some(entry.outcome.clone());
        }

        // Ambiguous references get grounded with semantic context first.
        let semantic_context = if tier2::has_ambiguous_reference(text) {
            self.index.as_ref().and_then(|index| {
                match index.search(text, 3) {
                    Ok(snippets) => {
                        let joined = snippets
                            .iter()
                            .map(|s| s.text.as_str())
                            .collect::<Vec<_>>()
                            .join("\n");
                        (!joined.is_empty()).then_some(joined)
                    }
                    Err(e) => {
                        warn!("semantic context lookup failed: {e}");
                        None
                    }
                }
            })
        } else {
            None
        };

        let prompt = tier2::build_prompt(text, &cx.reasoner_context, semantic_context.as_deref());
        let deadline = Duration::from_millis(self.config.reasoner_timeout_ms);
        let response = match tokio::time::timeout(deadline, reasoner.complete(&prompt)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!("tier-2 reasoner call failed: {e}");
                return None;
            }
            Err(_) => {
                warn!("tier-2 reasoner call timed out after {deadline:?}");
                return None;
            }
        };

        let outcome = tier2::parse_response(&response)?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.retain(|_, entry| entry.at.elapsed() < ttl);
            cache.insert(
                key,
                CachedOutcome {
                    outcome: outcome.clone(),
                    at: std::time::Instant::now(),
                },
            );
        }
        Some(outcome)
    }

    /// Best-effort persistence of a classified request.
    fn persist(&self, request: &ActionRequest) {
        if let Some(storage) = &self.storage
            && let Err(e) = storage.save_action(request)
        {
            warn!("action persist failed: {e}");
        }
    }
}
