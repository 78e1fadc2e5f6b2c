//! Speaker authorization gate.
//!
//! Filters flushed batches through an optional speaker allowlist before
//! any classification happens. With no allowlist configured every batch
//! is permitted; once one exists, a batch passes only when an allowlisted
//! speaker is present or a segment carries the device-owner flag. Denial
//! is a policy outcome, not an error: it is logged as a security event
//! and the batch simply stops here.

use crate::collab::{SecurityEvent, Storage};
use crate::pipeline::messages::SegmentBatch;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Max characters of batch text captured in a security event.
const SNIPPET_LEN: usize = 200;

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    /// The batch may proceed to classification.
    Allowed,
    /// The batch was blocked; a security event was recorded per speaker.
    Denied,
}

/// Allowlist-based batch gate.
pub struct AuthorizationGate {
    storage: Arc<dyn Storage>,
}

impl AuthorizationGate {
    /// Create a gate backed by the given storage collaborator.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Check a flushed batch against the allowlist.
    ///
    /// Storage failures while reading the allowlist are logged and treated
    /// as "no allowlist configured"; storage problems must not silence
    /// the device.
    pub fn check(&self, batch: &SegmentBatch) -> AuthDecision {
        let allowlist = match self.storage.authorized_speakers() {
            Ok(list) => list,
            Err(e) => {
                warn!("allowlist read failed, permitting batch: {e}");
                return AuthDecision::Allowed;
            }
        };

        if allowlist.is_empty() {
            return AuthDecision::Allowed;
        }

        let speakers = batch.speaker_ids();
        if speakers.iter().any(|s| allowlist.contains(s)) {
            return AuthDecision::Allowed;
        }

        // Device-owner bypass: the upstream is_primary_user flag wins even
        // when the diarized speaker ID is not in the allowlist.
        if batch.has_primary_user() {
            return AuthDecision::Allowed;
        }

        let snippet: String = batch.full_text().chars().take(SNIPPET_LEN).collect();
        let detail = format!("speakers {speakers:?} not in allowlist");
        for speaker in &speakers {
            let event = SecurityEvent {
                speaker_id: speaker.clone(),
                snippet: snippet.clone(),
                reason: "unauthorized_speaker".to_owned(),
                detail: detail.clone(),
                at: Utc::now(),
            };
            if let Err(e) = self.storage.log_security_event(event) {
                warn!("security event write failed: {e}");
            }
        }
        info!(
            session = %batch.session_key,
            "batch denied: speakers {speakers:?} not authorized"
        );
        AuthDecision::Denied
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::collab::{MemoryStorage, SpeakerRecord};
    use crate::pipeline::messages::Segment;

    fn storage_with_allowlist() -> Arc<MemoryStorage> {
        let storage = MemoryStorage::new();
        storage.add_speaker(SpeakerRecord {
            id: "SPEAKER_00".to_owned(),
            name: Some("David".to_owned()),
            is_owner: true,
            approved: false,
        });
        Arc::new(storage)
    }

    fn batch_from(speaker: &str, primary: bool) -> SegmentBatch {
        let mut segment = Segment::new("order five hundred widgets", speaker);
        if primary {
            segment = segment.from_primary_user();
        }
        SegmentBatch::new("s1", vec![segment])
    }

    #[test]
    fn no_allowlist_allows_everyone() {
        let storage = Arc::new(MemoryStorage::new());
        let gate = AuthorizationGate::new(storage.clone());
        assert_eq!(
            gate.check(&batch_from("SPEAKER_07", false)),
            AuthDecision::Allowed
        );
        assert!(storage.security_events().is_empty());
    }

    #[test]
    fn allowlisted_speaker_passes() {
        let storage = storage_with_allowlist();
        let gate = AuthorizationGate::new(storage.clone());
        assert_eq!(
            gate.check(&batch_from("SPEAKER_00", false)),
            AuthDecision::Allowed
        );
    }

    #[test]
    fn unknown_speaker_denied_with_one_event() {
        let storage = storage_with_allowlist();
        let gate = AuthorizationGate::new(storage.clone());
        assert_eq!(
            gate.check(&batch_from("SPEAKER_01", false)),
            AuthDecision::Denied
        );
        let events = storage.security_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].speaker_id, "SPEAKER_01");
        assert_eq!(events[0].reason, "unauthorized_speaker");
        assert!(events[0].snippet.contains("widgets"));
    }

    #[test]
    fn primary_user_flag_bypasses_allowlist() {
        let storage = storage_with_allowlist();
        let gate = AuthorizationGate::new(storage.clone());
        assert_eq!(
            gate.check(&batch_from("SPEAKER_09", true)),
            AuthDecision::Allowed
        );
        assert!(storage.security_events().is_empty());
    }

    #[test]
    fn one_event_per_distinct_speaker() {
        let storage = storage_with_allowlist();
        let gate = AuthorizationGate::new(storage.clone());
        let batch = SegmentBatch::new(
            "s1",
            vec![
                Segment::new("first", "SPEAKER_01"),
                Segment::new("second", "SPEAKER_02"),
                Segment::new("third", "SPEAKER_01"),
            ],
        );
        assert_eq!(gate.check(&batch), AuthDecision::Denied);
        assert_eq!(storage.security_events().len(), 2);
    }

    #[test]
    fn snippet_is_bounded() {
        let storage = storage_with_allowlist();
        let gate = AuthorizationGate::new(storage.clone());
        let long = "a ".repeat(500);
        let batch = SegmentBatch::new("s1", vec![Segment::new(long, "SPEAKER_01")]);
        gate.check(&batch);
        let events = storage.security_events();
        assert!(events[0].snippet.chars().count() <= SNIPPET_LEN);
    }
}
