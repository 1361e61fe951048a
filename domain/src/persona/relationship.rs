//! Relationship value objects

use serde::{Deserialize, Serialize};

/// Lower bound of the affinity scale (hate)
pub const MIN_AFFINITY: i32 = -100;
/// Upper bound of the affinity scale (love)
pub const MAX_AFFINITY: i32 = 100;

/// One persona's private view of one peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub target_persona_id: String,
    /// -100 (hate) ..= 100 (love), 0 is neutral
    pub affinity: i32,
    pub impression: String,
}

impl Relationship {
    /// A fresh, neutral relationship toward `target_persona_id`
    pub fn neutral(target_persona_id: impl Into<String>) -> Self {
        Self {
            target_persona_id: target_persona_id.into(),
            affinity: 0,
            impression: String::new(),
        }
    }

    /// Fold an update into this relationship, clamping affinity to the scale.
    pub fn apply(&mut self, update: RelationshipUpdate) {
        self.affinity = update.affinity.clamp(MIN_AFFINITY, MAX_AFFINITY);
        self.impression = update.impression;
    }
}

/// Result of re-evaluating a relationship after hearing a peer speak.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipUpdate {
    pub affinity: i32,
    pub impression: String,
}
