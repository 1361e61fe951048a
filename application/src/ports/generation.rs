//! Generation backend port
//!
//! Defines the interface for producing in-character text and relationship
//! re-evaluations from a language model.

use async_trait::async_trait;
use parlor_domain::{Message, PersonaProfile, Relationship, RelationshipUpdate, Topic};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during generation backend calls
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Backend returned an empty response")]
    EmptyResponse,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Timeout")]
    Timeout,
}

/// Input for producing one utterance
#[derive(Debug, Clone)]
pub struct GenerateInput {
    pub agent_id: String,
    pub persona: Arc<PersonaProfile>,
    /// Snapshot of the speaker's rolling window, oldest first
    pub recent_messages: Vec<Arc<Message>>,
    pub current_turn: u32,
    pub max_turns: u32,
    pub topics: Arc<Vec<Topic>>,
    /// Read-only snapshot of the speaker's relationships, keyed by peer id
    pub relationships: HashMap<String, Relationship>,
}

/// Input for re-evaluating how `persona` feels about `target`
#[derive(Debug, Clone)]
pub struct UpdateRelationshipInput {
    pub persona: Arc<PersonaProfile>,
    pub target: Arc<PersonaProfile>,
    /// Conversation up to and including the target's latest message
    pub recent_messages: Vec<Arc<Message>>,
    pub current: Relationship,
}

/// Language generation backend
///
/// Both calls are possibly slow, possibly failing remote requests. The core
/// never retries them.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate the next utterance for a persona
    async fn generate(&self, input: &GenerateInput) -> Result<String, GenerationError>;

    /// Evaluate the listener's updated feelings after hearing the target speak
    async fn update_relationship(
        &self,
        input: &UpdateRelationshipInput,
    ) -> Result<RelationshipUpdate, GenerationError>;
}
