//! Prompt domain
//!
//! Templates for the two requests a participant makes: speaking in character
//! and re-evaluating how it feels about a peer.

mod template;

pub use template::{ActorPromptContext, PromptTemplate};
