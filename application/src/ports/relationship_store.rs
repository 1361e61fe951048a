//! Relationship persistence port

use parlor_domain::Relationship;
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised by relationship persistence
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed relationship data in {path}: {reason}")]
    Malformed { path: String, reason: String },

    #[error("Failed to serialize relationships for {persona_id}: {reason}")]
    Serialize { persona_id: String, reason: String },
}

/// Loads and saves one identity's relationship map.
pub trait RelationshipStore: Send + Sync {
    /// Load the map for `persona_id`. A missing record yields an empty map.
    fn load(&self, persona_id: &str) -> Result<HashMap<String, Relationship>, StoreError>;

    /// Persist the map for `persona_id`. An empty map is not written.
    fn save(
        &self,
        persona_id: &str,
        relationships: &HashMap<String, Relationship>,
    ) -> Result<(), StoreError>;
}

/// No-op store for tests and when persistence is disabled.
pub struct NoRelationshipStore;

impl RelationshipStore for NoRelationshipStore {
    fn load(&self, _persona_id: &str) -> Result<HashMap<String, Relationship>, StoreError> {
        Ok(HashMap::new())
    }

    fn save(
        &self,
        _persona_id: &str,
        _relationships: &HashMap<String, Relationship>,
    ) -> Result<(), StoreError> {
        Ok(())
    }
}
