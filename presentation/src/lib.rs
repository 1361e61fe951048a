//! Presentation layer for parlor
//!
//! This crate contains the CLI definition and the renderers that present a
//! conversation to people: a live console view and a markdown post.

pub mod cli;
pub mod output;

// Re-export commonly used types
pub use cli::commands::{Cli, RendererKind};
pub use output::{ConsoleRenderer, MarkdownRenderer};
