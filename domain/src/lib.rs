//! Domain layer for parlor
//!
//! This crate contains the entities and value objects of a simulated
//! multi-party conversation. It has no dependencies on infrastructure or
//! presentation concerns.
//!
//! # Core Concepts
//!
//! - **Message**: an immutable fact published to every participant
//! - **Identity**: a persona plus its private relationships toward peers
//! - **Topic**: an optional conversation starter

pub mod conversation;
pub mod core;
pub mod persona;
pub mod prompt;
pub mod topic;

// Re-export commonly used types
pub use conversation::{Message, MessageKind, RollingWindow};
pub use core::{error::DomainError, string};
pub use persona::{Identity, PersonaPool, PersonaProfile, Relationship, RelationshipUpdate};
pub use prompt::{ActorPromptContext, PromptTemplate};
pub use topic::Topic;
