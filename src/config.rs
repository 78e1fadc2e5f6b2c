//! Configuration types for the speech-to-action pipeline.

use crate::error::{EarshotError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration for the earshot pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EarshotConfig {
    /// Segment accumulation and flush scheduling settings.
    pub session: SessionConfig,
    /// Raw audio chunk buffering settings.
    pub audio: AudioConfig,
    /// Conversation window (discourse-level context) settings.
    pub conversation: ConversationConfig,
    /// Two-tier intent classifier settings.
    pub classifier: ClassifierConfig,
    /// Entity resolver settings.
    pub resolver: ResolverConfig,
}

/// Session buffer and flush scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Milliseconds of silence before a session's buffer is flushed.
    pub silence_timeout_ms: u64,
    /// Extra wait in ms when a wake phrase is in the buffer, so a full
    /// trailing command is captured rather than truncated at the first pause.
    pub command_timeout_ms: u64,
    /// Poll interval in ms for the wake-phrase extension loop.
    pub extension_poll_ms: u64,
    /// Grace period in ms after a wake-triggered flush during which
    /// subsequent speech is still treated as command context.
    pub continuation_window_ms: u64,
    /// Hard cap in ms on how long a session may accumulate before a forced
    /// flush. Bounds memory for a stream that never goes silent.
    pub max_buffer_duration_ms: u64,
    /// Wake phrases that mark the start of an addressed command.
    ///
    /// Matched case-insensitively as substrings of the buffered text.
    pub wake_phrases: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            silence_timeout_ms: 2_000,
            command_timeout_ms: 2_000,
            extension_poll_ms: 1_000,
            continuation_window_ms: 10_000,
            max_buffer_duration_ms: 30_000,
            wake_phrases: vec!["jarvis".to_owned()],
        }
    }
}

/// Raw audio chunk buffering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Expected sample rate in Hz of incoming PCM16 chunks.
    pub sample_rate: u32,
    /// Milliseconds of no new chunks before the buffered audio is handed
    /// to transcription.
    pub silence_timeout_ms: u64,
    /// Max seconds of audio per session before a forced flush.
    pub max_buffer_secs: u64,
}

impl AudioConfig {
    /// Bytes of PCM16 mono audio per second at the configured sample rate.
    #[must_use]
    pub fn bytes_per_second(&self) -> usize {
        self.sample_rate as usize * 2
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            silence_timeout_ms: 3_000,
            max_buffer_secs: 30,
        }
    }
}

/// Conversation window configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Milliseconds of silence after which the conversation is considered
    /// over and handed to summarization.
    pub end_timeout_ms: u64,
    /// How many trailing segments form the classifier's context text.
    pub context_segments: usize,
    /// How many trailing segments are quoted to the tier-2 reasoner.
    pub reasoner_context_segments: usize,
    /// Size of the rolling recently-mentioned-entity window used by
    /// pronoun resolution.
    pub recent_entity_window: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            end_timeout_ms: 20_000,
            context_segments: 5,
            reasoner_context_segments: 3,
            recent_entity_window: 20,
        }
    }
}

/// Two-tier intent classifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Whether tier-2 (external reasoner) fallback is enabled.
    pub tier2_enabled: bool,
    /// Deadline in ms for a single reasoner call.
    pub reasoner_timeout_ms: u64,
    /// TTL in ms for cached tier-2 outcomes, keyed by normalized text.
    pub cache_ttl_ms: u64,
    /// Below this confidence the classifier forces `human_required`,
    /// regardless of the reasoner's own flag.
    pub low_confidence: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            tier2_enabled: true,
            reasoner_timeout_ms: 15_000,
            cache_ttl_ms: 300_000,
            low_confidence: 0.3,
        }
    }
}

/// Entity resolver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Minimum string similarity for the fuzzy-match strategy.
    pub fuzzy_threshold: f32,
    /// How many semantic-search snippets the fallback strategy inspects.
    pub semantic_limit: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.85,
            semantic_limit: 3,
        }
    }
}

impl EarshotConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| EarshotError::Config(format!("cannot parse {}: {e}", path.display())))
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error only if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Persist configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = toml::to_string_pretty(self)
            .map_err(|e| EarshotError::Config(format!("cannot serialize config: {e}")))?;
        std::fs::write(path, raw)?;
        Ok(())
    }
}
