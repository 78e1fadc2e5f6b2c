//! Relationship edges from co-occurring entities.
//!
//! When a flushed batch mentions several entities together, the
//! co-occurrence becomes graph evidence: person×person edges are
//! `mentioned_with`, person×org and person×project edges are `works_on`.
//! The contextual resolution strategy later walks these edges to ground
//! indefinite references like "the client".

use crate::collab::Storage;
use crate::entity::{EntityKind, ExtractedEntity};
use tracing::warn;

/// Record co-occurrence edges for one batch of entities.
///
/// Storage failures are logged and swallowed; relationship building is
/// best-effort enrichment, never a pipeline gate.
pub fn build_relationships(
    storage: &dyn Storage,
    entities: &[ExtractedEntity],
    conversation_id: Option<&str>,
) {
    if entities.len() < 2 {
        return;
    }

    let persons: Vec<&ExtractedEntity> = entities
        .iter()
        .filter(|e| e.kind == EntityKind::Person)
        .collect();
    let orgs: Vec<&ExtractedEntity> = entities
        .iter()
        .filter(|e| e.kind == EntityKind::Org)
        .collect();
    let projects: Vec<&ExtractedEntity> = entities
        .iter()
        .filter(|e| e.kind == EntityKind::Project)
        .collect();

    let evidence = conversation_id.map(|id| format!("conversation:{id}"));
    let evidence = evidence.as_deref();

    let mut bump = |source: &str, target: &str, relation: &str| {
        if source == target {
            return;
        }
        if let Err(e) = storage.bump_relationship(source, target, relation, evidence) {
            warn!("relationship write failed ({source} -{relation}- {target}): {e}");
        }
    };

    for (i, a) in persons.iter().enumerate() {
        for b in persons.iter().skip(i + 1) {
            bump(a.display_name(), b.display_name(), "mentioned_with");
        }
    }
    for person in &persons {
        for org in &orgs {
            bump(person.display_name(), org.display_name(), "works_on");
        }
        for project in &projects {
            bump(person.display_name(), project.display_name(), "works_on");
        }
    }
}
