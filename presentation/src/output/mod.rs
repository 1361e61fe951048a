//! Conversation renderers

pub mod console;
pub mod markdown;

pub use console::{ConsoleLine, ConsoleRenderer};
pub use markdown::MarkdownRenderer;
