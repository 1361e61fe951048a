//! Conversation domain
//!
//! Messages published on the bus and the bounded window each participant
//! keeps of what it has recently heard.

pub mod message;
pub mod window;

pub use message::{Message, MessageKind};
pub use window::RollingWindow;
