//! Persona profile value object

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Static configuration of one conversational character.
///
/// Profiles never change after the catalog is loaded; they are shared as
/// `Arc<PersonaProfile>` between the owning agent and every message it sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaProfile {
    pub persona_id: String,
    pub display_name: String,
    pub gender: String,
    /// Primary personality, one sentence
    pub tagline: String,
    /// Speech style guidance
    pub style_tag: String,
    pub catchphrases: Vec<String>,
    /// Target utterance length in characters
    pub default_max_chars: u32,
    pub speak_prob: f64,
    /// Minimum pause between two utterances of this persona
    pub min_gap_seconds: u64,
}

impl Default for PersonaProfile {
    fn default() -> Self {
        Self {
            persona_id: String::new(),
            display_name: String::new(),
            gender: "unspecified".to_string(),
            tagline: String::new(),
            style_tag: String::new(),
            catchphrases: Vec::new(),
            default_max_chars: 80,
            speak_prob: 1.0,
            min_gap_seconds: 10,
        }
    }
}

impl PersonaProfile {
    pub fn new(persona_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            persona_id: persona_id.into(),
            display_name: display_name.into(),
            ..Default::default()
        }
    }

    pub fn with_tagline(mut self, tagline: impl Into<String>) -> Self {
        self.tagline = tagline.into();
        self
    }

    pub fn with_min_gap_seconds(mut self, seconds: u64) -> Self {
        self.min_gap_seconds = seconds;
        self
    }

    pub fn min_gap(&self) -> Duration {
        Duration::from_secs(self.min_gap_seconds)
    }
}
