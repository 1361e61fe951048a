//! Topic value object

use serde::{Deserialize, Serialize};

/// A conversation starter, independent of where it was sourced from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Topic {
    pub title: String,
    /// Short plain-text summary
    pub summary: String,
    pub source_url: String,
}

impl Topic {
    pub fn new(
        title: impl Into<String>,
        summary: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            summary: summary.into(),
            source_url: source_url.into(),
        }
    }
}
