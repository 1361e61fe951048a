//! Use cases
//!
//! The agent decision loop and the conversation lifecycle built on top of it.

pub mod agent;
pub mod run_conversation;
