//! Error types for the Gemini adapter

use parlor_application::GenerationError;
use thiserror::Error;

/// Result type alias for Gemini operations
pub type Result<T> = std::result::Result<T, GeminiError>;

/// Errors that can occur when talking to the Vertex AI Gemini endpoint
#[derive(Error, Debug)]
pub enum GeminiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to parse response: {error}\nRaw response: {raw}")]
    ParseError { error: String, raw: String },

    #[error("Response contained no text")]
    EmptyResponse,

    #[error("Failed to obtain access token: {0}")]
    Auth(String),

    #[error("Request timeout")]
    Timeout,
}

impl From<GeminiError> for GenerationError {
    fn from(err: GeminiError) -> Self {
        match err {
            GeminiError::Http(e) if e.is_timeout() => GenerationError::Timeout,
            GeminiError::Timeout => GenerationError::Timeout,
            GeminiError::EmptyResponse => GenerationError::EmptyResponse,
            GeminiError::Auth(reason) => GenerationError::Authentication(reason),
            GeminiError::Status { status: 401 | 403, body } => {
                GenerationError::Authentication(body)
            }
            other @ (GeminiError::ParseError { .. } | GeminiError::Serialization(_)) => {
                GenerationError::InvalidResponse(other.to_string())
            }
            other => GenerationError::RequestFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_to_generation_error() {
        assert!(matches!(
            GenerationError::from(GeminiError::EmptyResponse),
            GenerationError::EmptyResponse
        ));
        assert!(matches!(
            GenerationError::from(GeminiError::Timeout),
            GenerationError::Timeout
        ));
        assert!(matches!(
            GenerationError::from(GeminiError::Status {
                status: 403,
                body: "denied".to_string()
            }),
            GenerationError::Authentication(b) if b == "denied"
        ));
        assert!(matches!(
            GenerationError::from(GeminiError::Status {
                status: 429,
                body: "slow down".to_string()
            }),
            GenerationError::RequestFailed(m) if m.contains("429")
        ));
        assert!(matches!(
            GenerationError::from(GeminiError::ParseError {
                error: "bad".to_string(),
                raw: "{".to_string()
            }),
            GenerationError::InvalidResponse(_)
        ));
    }
}
