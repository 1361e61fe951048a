//! Built-in persona catalog
//!
//! The catalog ships inside the binary as TOML and is parsed at startup.

use parlor_domain::{DomainError, PersonaPool, PersonaProfile};
use serde::Deserialize;

const EMBEDDED_PERSONAS: &str = include_str!("../../assets/personas.toml");

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    personas: Vec<PersonaProfile>,
}

/// Parse a catalog document into a pool.
pub fn parse_catalog(toml_str: &str) -> Result<PersonaPool, DomainError> {
    let file: CatalogFile =
        toml::from_str(toml_str).map_err(|e| DomainError::InvalidPersona(e.to_string()))?;
    if file.personas.is_empty() {
        return Err(DomainError::NoPersonas);
    }
    PersonaPool::new(file.personas)
}

/// The pool compiled into the binary
pub fn builtin_pool() -> Result<PersonaPool, DomainError> {
    parse_catalog(EMBEDDED_PERSONAS)
}
