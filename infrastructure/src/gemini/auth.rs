//! Access tokens for Vertex AI
//!
//! Either a fixed token from the environment or one minted by the `gcloud`
//! CLI. Minted tokens are cached and refreshed before Google's one-hour
//! expiry.

use super::error::{GeminiError, Result};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Environment variable holding a pre-issued token
pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_ACCESS_TOKEN";

const GCLOUD_TOKEN_TTL: Duration = Duration::from_secs(45 * 60);

/// Source of bearer tokens
pub enum TokenSource {
    Static(String),
    Gcloud {
        cached: Mutex<Option<(String, Instant)>>,
    },
}

impl TokenSource {
    /// Use `GOOGLE_ACCESS_TOKEN` when set, otherwise `gcloud`.
    pub fn from_env() -> Self {
        match std::env::var(ACCESS_TOKEN_ENV) {
            Ok(token) if !token.trim().is_empty() => Self::Static(token.trim().to_string()),
            _ => Self::gcloud(),
        }
    }

    pub fn gcloud() -> Self {
        Self::Gcloud {
            cached: Mutex::new(None),
        }
    }

    pub async fn token(&self) -> Result<String> {
        match self {
            Self::Static(token) => Ok(token.clone()),
            Self::Gcloud { cached } => {
                let mut cached = cached.lock().await;
                if let Some((token, minted)) = cached.as_ref() {
                    if minted.elapsed() < GCLOUD_TOKEN_TTL {
                        return Ok(token.clone());
                    }
                }
                let token = print_access_token().await?;
                *cached = Some((token.clone(), Instant::now()));
                Ok(token)
            }
        }
    }
}

async fn print_access_token() -> Result<String> {
    debug!("Requesting access token from gcloud");

    let output = Command::new("gcloud")
        .arg("auth")
        .arg("print-access-token")
        .output()
        .await
        .map_err(|e| GeminiError::Auth(format!("Failed to execute gcloud: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(GeminiError::Auth(format!(
            "gcloud auth print-access-token failed: {}",
            stderr.trim()
        )));
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(GeminiError::Auth("gcloud returned an empty token".to_string()));
    }
    Ok(token)
}
