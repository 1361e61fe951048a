//! Infrastructure layer for parlor
//!
//! This crate contains adapters that implement the ports defined in the
//! application layer.
//!
//! # Adapters
//!
//! - [`gemini`]: Vertex AI Gemini generation backend
//! - [`feed`]: RSS / Atom topic source
//! - [`persona`]: embedded persona catalog and file-backed relationship store
//! - [`logging`]: JSONL transcript renderer
//! - [`config`]: configuration file loading

pub mod config;
pub mod feed;
pub mod gemini;
pub mod logging;
pub mod persona;

// Re-export commonly used types
pub use config::{ConfigLoader, ConfigValidationError, FileConfig};
pub use feed::RssTopicSource;
pub use gemini::{GeminiError, GeminiSettings, TokenSource, VertexGeminiBackend};
pub use logging::JsonlTranscriptRenderer;
pub use persona::{FileRelationshipStore, builtin_pool};
