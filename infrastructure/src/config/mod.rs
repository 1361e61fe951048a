//! Configuration file loading for parlor
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `--config <path>` specified file
//! 2. Project root: `./parlor.toml` or `./.parlor.toml`
//! 3. Global: `$XDG_CONFIG_HOME/parlor/config.toml`
//! 4. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigValidationError, FileBackendConfig, FileConfig, FileConversationConfig,
    FileOutputConfig, FileTopicsConfig, KNOWN_RENDERERS,
};
pub use loader::ConfigLoader;
