//! Application configuration
//!
//! Runtime parameters consumed by the conversation use case, independent of
//! where they were read from (CLI flags, config files or defaults).

mod conversation_params;

pub use conversation_params::ConversationParams;
