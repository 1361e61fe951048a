//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! Every section is optional; missing keys fall back to the defaults below.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigValidationError {
    #[error("max_turns must be greater than 0")]
    InvalidMaxTurns,

    #[error("window_capacity must be greater than 0")]
    InvalidWindowCapacity,

    #[error("bus_capacity must be greater than 0")]
    InvalidBusCapacity,

    #[error("timeout_seconds cannot be 0")]
    InvalidTimeout,

    #[error("model name cannot be empty")]
    EmptyModelName,

    #[error("unknown renderer: {0}")]
    UnknownRenderer(String),
}

/// Renderer names accepted in `[output].renderers`
pub const KNOWN_RENDERERS: &[&str] = &["console", "markdown", "jsonl"];

/// Raw conversation configuration from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConversationConfig {
    /// Non-system messages before shutdown
    pub max_turns: u32,
    /// Number of randomly chosen participants
    pub participants: usize,
    /// Explicit persona ids (overrides `participants` when non-empty)
    pub personas: Vec<String>,
    /// Agent decision timer period
    pub tick_interval_ms: u64,
    /// Messages each agent remembers
    pub window_capacity: usize,
    /// Queue size of each bus subscription
    pub bus_capacity: usize,
}

impl Default for FileConversationConfig {
    fn default() -> Self {
        Self {
            max_turns: 20,
            participants: 3,
            personas: Vec::new(),
            tick_interval_ms: 1000,
            window_capacity: 10,
            bus_capacity: 16,
        }
    }
}

/// Raw generation backend configuration from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileBackendConfig {
    pub model: String,
    /// Sampling temperature for utterances
    pub temperature: f32,
    /// Sampling temperature for relationship evaluation
    pub relationship_temperature: f32,
    pub max_output_tokens: u32,
    /// Timeout in seconds for API calls
    pub timeout_seconds: Option<u64>,
    /// Language personas are asked to speak in
    pub language: String,
}

impl Default for FileBackendConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash-lite".to_string(),
            temperature: 0.3,
            relationship_temperature: 0.1,
            max_output_tokens: 200,
            timeout_seconds: None,
            language: "English".to_string(),
        }
    }
}

/// Raw topic feed configuration from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileTopicsConfig {
    /// RSS or Atom feed to seed the conversation from
    pub rss_url: Option<String>,
    /// Number of newest entries to use
    pub rss_limit: usize,
}

impl Default for FileTopicsConfig {
    fn default() -> Self {
        Self {
            rss_url: None,
            rss_limit: 1,
        }
    }
}

/// Raw output configuration from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOutputConfig {
    /// Enabled renderers (console, markdown, jsonl)
    pub renderers: Vec<String>,
    /// Directory for markdown posts
    pub markdown_dir: String,
    /// Directory for relationship records and transcripts
    pub data_dir: String,
    /// Per-character delay of the console typewriter effect
    pub typing_delay_ms: u64,
}

impl Default for FileOutputConfig {
    fn default() -> Self {
        Self {
            renderers: vec!["console".to_string(), "markdown".to_string()],
            markdown_dir: "./pages/content/posts".to_string(),
            data_dir: "./data".to_string(),
            typing_delay_ms: 50,
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub conversation: FileConversationConfig,
    pub backend: FileBackendConfig,
    pub topics: FileTopicsConfig,
    pub output: FileOutputConfig,
}

impl FileConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.conversation.max_turns == 0 {
            return Err(ConfigValidationError::InvalidMaxTurns);
        }
        if self.conversation.window_capacity == 0 {
            return Err(ConfigValidationError::InvalidWindowCapacity);
        }
        if self.conversation.bus_capacity == 0 {
            return Err(ConfigValidationError::InvalidBusCapacity);
        }

        if let Some(0) = self.backend.timeout_seconds {
            return Err(ConfigValidationError::InvalidTimeout);
        }
        if self.backend.model.trim().is_empty() {
            return Err(ConfigValidationError::EmptyModelName);
        }

        if let Some(unknown) = self
            .output
            .renderers
            .iter()
            .find(|r| !KNOWN_RENDERERS.contains(&r.as_str()))
        {
            return Err(ConfigValidationError::UnknownRenderer(unknown.clone()));
        }

        Ok(())
    }
}
