//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure and presentation adapters
//! must implement. The coordination core only ever talks to collaborators
//! through these traits.

pub mod generation;
pub mod relationship_store;
pub mod renderer;
pub mod topic_source;
