//! Identity entity

use super::profile::PersonaProfile;
use super::relationship::{Relationship, RelationshipUpdate};
use std::collections::HashMap;
use std::sync::Arc;

/// A persona plus its mutable, privately owned relationship map.
///
/// An `Identity` is moved into the agent that represents it and handed back
/// when the agent stops, so the relationship map always has exactly one writer.
#[derive(Debug, Clone)]
pub struct Identity {
    profile: Arc<PersonaProfile>,
    relationships: HashMap<String, Relationship>,
}

impl Identity {
    pub fn new(profile: Arc<PersonaProfile>) -> Self {
        Self {
            profile,
            relationships: HashMap::new(),
        }
    }

    pub fn with_relationships(mut self, relationships: HashMap<String, Relationship>) -> Self {
        self.relationships = relationships;
        self
    }

    pub fn profile(&self) -> &Arc<PersonaProfile> {
        &self.profile
    }

    pub fn persona_id(&self) -> &str {
        &self.profile.persona_id
    }

    pub fn display_name(&self) -> &str {
        &self.profile.display_name
    }

    /// Read-only view of the relationship map keyed by peer persona id
    pub fn relationships(&self) -> &HashMap<String, Relationship> {
        &self.relationships
    }

    /// Current relationship toward a peer, neutral if none has formed yet
    pub fn relationship_with(&self, peer_id: &str) -> Relationship {
        self.relationships
            .get(peer_id)
            .cloned()
            .unwrap_or_else(|| Relationship::neutral(peer_id))
    }

    /// Fold an update into the entry for `peer_id`, creating it lazily.
    pub fn apply_update(&mut self, peer_id: &str, update: RelationshipUpdate) {
        self.relationships
            .entry(peer_id.to_string())
            .or_insert_with(|| Relationship::neutral(peer_id))
            .apply(update);
    }
}
