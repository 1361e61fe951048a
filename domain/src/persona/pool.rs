//! Persona pool: the catalog participants are drawn from

use super::profile::PersonaProfile;
use crate::core::error::DomainError;
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::sync::Arc;

/// All personas known to the application.
#[derive(Debug, Clone, Default)]
pub struct PersonaPool {
    personas: Vec<Arc<PersonaProfile>>,
}

impl PersonaPool {
    /// Build a pool, rejecting empty or duplicate persona ids.
    pub fn new(personas: Vec<PersonaProfile>) -> Result<Self, DomainError> {
        let mut seen = HashSet::new();
        for p in &personas {
            if p.persona_id.trim().is_empty() {
                return Err(DomainError::InvalidPersona(format!(
                    "persona '{}' has an empty id",
                    p.display_name
                )));
            }
            if !seen.insert(p.persona_id.clone()) {
                return Err(DomainError::DuplicatePersona(p.persona_id.clone()));
            }
        }
        Ok(Self {
            personas: personas.into_iter().map(Arc::new).collect(),
        })
    }

    pub fn all(&self) -> &[Arc<PersonaProfile>] {
        &self.personas
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }

    pub fn get(&self, persona_id: &str) -> Result<Arc<PersonaProfile>, DomainError> {
        self.personas
            .iter()
            .find(|p| p.persona_id == persona_id)
            .cloned()
            .ok_or_else(|| DomainError::PersonaNotFound(persona_id.to_string()))
    }

    /// Look up an explicit list of personas, keeping the given order.
    ///
    /// Every id must be known and may appear only once.
    pub fn select<S: AsRef<str>>(
        &self,
        persona_ids: &[S],
    ) -> Result<Vec<Arc<PersonaProfile>>, DomainError> {
        let mut seen = HashSet::new();
        persona_ids
            .iter()
            .map(|id| {
                let id = id.as_ref();
                if !seen.insert(id) {
                    return Err(DomainError::DuplicatePersona(id.to_string()));
                }
                self.get(id)
            })
            .collect()
    }

    /// Pick `n` distinct personas in random order.
    ///
    /// `n == 0` or `n` larger than the pool selects everyone.
    pub fn random<R: Rng + ?Sized>(
        &self,
        n: usize,
        rng: &mut R,
    ) -> Result<Vec<Arc<PersonaProfile>>, DomainError> {
        if self.personas.is_empty() {
            return Err(DomainError::NoPersonas);
        }
        let n = if n == 0 || n > self.personas.len() {
            self.personas.len()
        } else {
            n
        };
        Ok(self
            .personas
            .choose_multiple(rng, n)
            .cloned()
            .collect())
    }
}
