//! Message entity

use crate::persona::PersonaProfile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// What a message represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Announcements from the host; never counted as a turn
    System,
    /// A participant speaking
    Utterance,
    /// A participant failed to produce an utterance
    Error,
    End,
    TurnChanged,
    Log,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::System => "system",
            MessageKind::Utterance => "utterance",
            MessageKind::Error => "error",
            MessageKind::End => "end",
            MessageKind::TurnChanged => "turn_changed",
            MessageKind::Log => "log",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An immutable fact published on the bus.
///
/// Fields are private: once built, a message can only be read. The bus shares
/// it between subscribers as `Arc<Message>`.
#[derive(Debug, Clone)]
pub struct Message {
    kind: MessageKind,
    from: Option<Arc<PersonaProfile>>,
    text: String,
    at: DateTime<Utc>,
    meta: BTreeMap<String, String>,
}

impl Message {
    fn build(kind: MessageKind, from: Option<Arc<PersonaProfile>>, text: String) -> Self {
        Self {
            kind,
            from,
            text,
            at: Utc::now(),
            meta: BTreeMap::new(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::build(MessageKind::System, None, text.into())
    }

    pub fn utterance(from: Arc<PersonaProfile>, text: impl Into<String>) -> Self {
        Self::build(MessageKind::Utterance, Some(from), text.into())
    }

    pub fn error(from: Arc<PersonaProfile>, text: impl Into<String>) -> Self {
        Self::build(MessageKind::Error, Some(from), text.into())
    }

    pub fn log(text: impl Into<String>) -> Self {
        Self::build(MessageKind::Log, None, text.into())
    }

    /// Attach a side-channel entry (e.g. the initial topic)
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Override the creation time
    pub fn with_timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.at = at;
        self
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn from(&self) -> Option<&Arc<PersonaProfile>> {
        self.from.as_ref()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }

    pub fn meta(&self) -> &BTreeMap<String, String> {
        &self.meta
    }

    pub fn is_system(&self) -> bool {
        self.kind == MessageKind::System
    }

    pub fn is_error(&self) -> bool {
        self.kind == MessageKind::Error
    }

    /// Persona id of the speaker, if any
    pub fn speaker_id(&self) -> Option<&str> {
        self.from.as_deref().map(|p| p.persona_id.as_str())
    }

    /// Display name of the speaker, if any
    pub fn speaker_name(&self) -> Option<&str> {
        self.from.as_deref().map(|p| p.display_name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_message_has_no_speaker() {
        let m = Message::system("welcome");
        assert!(m.is_system());
        assert_eq!(m.kind(), MessageKind::System);
        assert!(m.from().is_none());
        assert_eq!(m.speaker_id(), None);
    }

    #[test]
    fn test_utterance_carries_speaker() {
        let sage = Arc::new(PersonaProfile::new("sage", "Sage"));
        let m = Message::utterance(Arc::clone(&sage), "hello").with_meta("topic", "weather");
        assert_eq!(m.kind(), MessageKind::Utterance);
        assert_eq!(m.speaker_id(), Some("sage"));
        assert_eq!(m.speaker_name(), Some("Sage"));
        assert_eq!(m.meta().get("topic").map(String::as_str), Some("weather"));
        assert!(!m.is_system());
    }

    #[test]
    fn test_kind_strings() {
        assert_eq!(MessageKind::TurnChanged.to_string(), "turn_changed");
        assert_eq!(MessageKind::Error.as_str(), "error");
    }
}
