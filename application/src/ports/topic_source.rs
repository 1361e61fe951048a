//! Topic source port

use async_trait::async_trait;
use parlor_domain::Topic;
use thiserror::Error;

/// Errors raised while fetching topics
#[derive(Error, Debug)]
pub enum TopicSourceError {
    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Failed to parse feed: {0}")]
    Parse(String),
}

/// Produces an ordered list of conversation starters.
///
/// An empty list is valid and means a free-form conversation.
#[async_trait]
pub trait TopicSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<Topic>, TopicSourceError>;
}
