//! Application layer for parlor
//!
//! This crate contains the coordination core (bus, turn arbiter, supervisor),
//! the agent loop, use cases, port definitions and conversation parameters.
//! It depends only on the domain layer.

pub mod config;
pub mod coordination;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::ConversationParams;
pub use coordination::{
    bus::{Bus, BusError, Subscription},
    supervisor::{ShutdownReason, Supervisor, SupervisorState},
    turn::{TurnArbiter, TurnError, TurnFloor, TurnProvider},
};
pub use ports::{
    generation::{GenerateInput, GenerationBackend, GenerationError, UpdateRelationshipInput},
    relationship_store::{NoRelationshipStore, RelationshipStore, StoreError},
    renderer::{RenderError, Renderer},
    topic_source::{TopicSource, TopicSourceError},
};
pub use use_cases::agent::{Agent, AgentDeps, AgentHandle, TalkOutcome};
pub use use_cases::run_conversation::{
    RunConversationError, RunConversationInput, RunConversationOutput, RunConversationUseCase,
};
