//! Vertex AI Gemini adapter
//!
//! Implements [`GenerationBackend`](parlor_application::GenerationBackend)
//! over the Vertex AI REST API.

pub mod auth;
pub mod backend;
pub mod error;
pub mod protocol;

pub use auth::TokenSource;
pub use backend::{GeminiSettings, VertexGeminiBackend};
pub use error::GeminiError;
