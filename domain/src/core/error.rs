//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomainError {
    #[error("No personas available")]
    NoPersonas,

    #[error("Persona with id '{0}' not found")]
    PersonaNotFound(String),

    #[error("Duplicate persona id '{0}'")]
    DuplicatePersona(String),

    #[error("Invalid persona: {0}")]
    InvalidPersona(String),
}

impl DomainError {
    /// Check if this error is caused by a lookup miss
    pub fn is_not_found(&self) -> bool {
        matches!(self, DomainError::PersonaNotFound(_))
    }
}
