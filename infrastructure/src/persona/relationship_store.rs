//! File-backed relationship store
//!
//! One TOML document per persona at `<data_dir>/relationships/<persona_id>.toml`.

use parlor_application::{RelationshipStore, StoreError};
use parlor_domain::Relationship;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Default, Serialize, Deserialize)]
struct RelationshipFile {
    #[serde(default)]
    relationships: Vec<Relationship>,
}

/// Stores each persona's relationships as a TOML file
pub struct FileRelationshipStore {
    dir: PathBuf,
}

impl FileRelationshipStore {
    /// Store rooted at `data_dir`; files live in its `relationships/` child.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: data_dir.as_ref().join("relationships"),
        }
    }

    pub fn path_for(&self, persona_id: &str) -> PathBuf {
        self.dir.join(format!("{}.toml", persona_id))
    }
}

impl RelationshipStore for FileRelationshipStore {
    fn load(&self, persona_id: &str) -> Result<HashMap<String, Relationship>, StoreError> {
        let path = self.path_for(persona_id);
        if !path.exists() {
            return Ok(HashMap::new());
        }

        let content = std::fs::read_to_string(&path).map_err(|e| StoreError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        let file: RelationshipFile = toml::from_str(&content).map_err(|e| StoreError::Malformed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        debug!("Loaded {} relationship(s) for {}", file.relationships.len(), persona_id);
        Ok(file
            .relationships
            .into_iter()
            .map(|r| (r.target_persona_id.clone(), r))
            .collect())
    }

    fn save(
        &self,
        persona_id: &str,
        relationships: &HashMap<String, Relationship>,
    ) -> Result<(), StoreError> {
        if relationships.is_empty() {
            return Ok(());
        }

        let mut sorted: Vec<Relationship> = relationships.values().cloned().collect();
        sorted.sort_by(|a, b| a.target_persona_id.cmp(&b.target_persona_id));

        let content = toml::to_string_pretty(&RelationshipFile {
            relationships: sorted,
        })
        .map_err(|e| StoreError::Serialize {
            persona_id: persona_id.to_string(),
            reason: e.to_string(),
        })?;

        std::fs::create_dir_all(&self.dir).map_err(|e| StoreError::Io {
            path: self.dir.display().to_string(),
            source: e,
        })?;

        let path = self.path_for(persona_id);
        std::fs::write(&path, content).map_err(|e| StoreError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        debug!("Saved relationships for {} to {}", persona_id, path.display());
        Ok(())
    }
}
