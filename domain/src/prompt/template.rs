//! Prompt templates for in-character generation

use crate::conversation::{Message, MessageKind};
use crate::persona::{PersonaProfile, Relationship};
use crate::topic::Topic;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Everything the actor prompt is built from
pub struct ActorPromptContext<'a> {
    pub persona: &'a PersonaProfile,
    pub recent_messages: &'a [Arc<Message>],
    pub topics: &'a [Topic],
    pub current_turn: u32,
    pub max_turns: u32,
    /// Keyed by peer persona id
    pub relationships: &'a HashMap<String, Relationship>,
    /// Language the character must reply in
    pub language: &'a str,
}

/// Templates for generating prompts
pub struct PromptTemplate;

impl PromptTemplate {
    /// System instruction for speaking in character
    pub fn actor_system(ctx: &ActorPromptContext<'_>) -> String {
        let persona = ctx.persona;
        let mut p = String::new();

        p.push_str("You are an actor playing a character in an improvisational play.\n");
        p.push_str(&format!(
            "Your character's name is {}.\n",
            persona.display_name
        ));
        p.push_str("Your single, most important goal is to stay in character at all times.\n\n");

        p.push_str("## Character Profile\n");
        p.push_str(&format!(
            "Primary Personality (Tagline): {}\n",
            persona.tagline
        ));
        p.push_str(&format!(
            "Gender Influence: Your gender is {}. Let this subtly influence your speech, but your primary personality is defined by your tagline. Avoid strong, common stereotypes.\n\n",
            persona.gender
        ));

        p.push_str("## Speech & Style Guide\n");
        p.push_str(&format!("General Style: {}\n", persona.style_tag));
        if !persona.catchphrases.is_empty() {
            p.push_str(&format!(
                "Catchphrases: Use these occasionally for flavor, but do not force them: {}\n",
                persona.catchphrases.join(", ")
            ));
        }
        p.push('\n');

        if !ctx.topics.is_empty() {
            p.push_str("## Today's Conversation Starters\n");
            p.push_str("Use the following topics as a loose basis for your conversation. You can refer to them, combine them, or ignore them if the conversation flows naturally elsewhere.\n");
            for (i, t) in ctx.topics.iter().enumerate() {
                p.push_str(&format!(
                    "Topic #{}: {}\nSummary: {}\nURL: {}\n---\n",
                    i + 1,
                    t.title,
                    t.summary,
                    t.source_url
                ));
            }
            p.push('\n');
        }

        if ctx.max_turns > 0 {
            p.push_str("## Situational Context\n");
            p.push_str(&format!(
                "This is turn {} of a {} turn conversation.\n\n",
                ctx.current_turn, ctx.max_turns
            ));
        }

        let known = Self::relationships_by_name(ctx.recent_messages, ctx.relationships);
        if !known.is_empty() {
            p.push_str("## Your Relationships with Others\n");
            p.push_str("This is your current emotional state towards the other participants. Use this to subtly influence your tone.\n");
            p.push_str("A high positive affinity means you are friendly and warm. A negative affinity means you might be cold, sarcastic, or dismissive towards that person.\n\n");
            for (name, rel) in known {
                p.push_str(&format!("### Towards {}:\n", name));
                p.push_str(&format!("- Affinity: {}\n", rel.affinity));
                p.push_str(&format!(
                    "- Your private impression of them: \"{}\"\n\n",
                    rel.impression
                ));
            }
        }

        p.push_str("## Technical Output Specification\n");
        p.push_str("Follow these rules STRICTLY. This is mandatory.\n");
        p.push_str("1.  **The Golden Rule:** Your reply must be the character's dialogue text ONLY.\n");
        p.push_str(&format!(
            "2.  **How to Follow Rule #1:** A common mistake is to start your reply with a prefix like `({}):`. This is forbidden. Your reply MUST begin *directly* with the first word of your dialogue.\n",
            persona.display_name
        ));
        p.push_str(&format!("3.  **Language:** Reply in {} ONLY.\n", ctx.language));
        p.push_str(&format!(
            "4.  **Conciseness:** Keep it concise (around {} characters).\n",
            persona.default_max_chars
        ));
        p.push_str("5.  **Single Utterance:** Provide exactly ONE utterance. Do not write a script with multiple lines or other characters' dialogue.\n");

        p
    }

    /// System instruction for re-evaluating the relationship toward `target`
    pub fn relationship_system(
        viewer: &PersonaProfile,
        target: &PersonaProfile,
        current: &Relationship,
        language: &str,
    ) -> String {
        let mut p = String::new();

        p.push_str("You are a psychological analyst. Your task is to analyze a conversation from the perspective of one character and determine how their impression of another character has changed.\n\n");
        p.push_str("## Your Point of View (Persona)\n");
        p.push_str(&format!(
            "You must adopt the personality of **{}**.\n",
            viewer.display_name
        ));
        p.push_str(&format!(
            "Their core personality is: '{}'.\n\n",
            viewer.tagline
        ));
        p.push_str("## Target of Analysis (TargetPersona)\n");
        p.push_str(&format!(
            "You are analyzing your feelings towards **{}**.\n\n",
            target.display_name
        ));
        p.push_str("## Current Relationship\n");
        p.push_str(&format!(
            "This is your current relationship with {}, *before* the latest message in the conversation.\n",
            target.display_name
        ));
        p.push_str(&format!(
            "- Current Affinity Score: {} (from -100 for hate to 100 for love, 0 is neutral)\n",
            current.affinity
        ));
        p.push_str(&format!(
            "- Current Impression Summary: \"{}\"\n\n",
            current.impression
        ));
        p.push_str("## Your Task\n");
        p.push_str(&format!(
            "Read the provided conversation history. Based on the **last message** from **{}** and the overall context, update your affinity score and impression summary for them.\n\n",
            target.display_name
        ));
        p.push_str("## Output Specification\n");
        p.push_str("Your response must be a valid JSON object conforming to the specified schema.\n");
        p.push_str("### Key: `affinity`\n");
        p.push_str("- Type: integer\n");
        p.push_str("- Description: Your updated affinity score for the speaker (-100 to 100).\n");
        p.push_str("### Key: `impression`\n");
        p.push_str("- Type: string\n");
        p.push_str("- **CRITICAL RULE:** The impression must be an abstract summary of the **speaker's personality, thinking style, or emotional state** revealed in their statement. **DO NOT** mention the specific topic of conversation. Focus on *how* they think or feel, not *what* they talked about.\n");
        p.push_str(&format!("- Language: {}\n", language));

        p
    }

    /// How an utterance appears in the transcript sent to the model
    pub fn transcript_line(message: &Message) -> Option<String> {
        match message.kind() {
            MessageKind::System => Some(message.text().to_string()),
            MessageKind::Utterance => Some(format!(
                "{}({})",
                message.text(),
                message.speaker_name().unwrap_or_default()
            )),
            _ => None,
        }
    }

    /// Stop sequences that keep the model from writing other characters' lines
    pub fn stop_sequences(persona: &PersonaProfile) -> Vec<String> {
        vec![format!("({})", persona.display_name), "()".to_string()]
    }

    /// Relationships toward peers whose names are visible in the window,
    /// sorted by display name.
    fn relationships_by_name<'a>(
        recent: &'a [Arc<Message>],
        relationships: &'a HashMap<String, Relationship>,
    ) -> Vec<(&'a str, &'a Relationship)> {
        let mut names: HashMap<&str, &str> = HashMap::new();
        for m in recent {
            if let Some(from) = m.from() {
                if !from.persona_id.is_empty() {
                    names.insert(from.persona_id.as_str(), from.display_name.as_str());
                }
            }
        }

        let sorted: BTreeMap<&str, &Relationship> = relationships
            .iter()
            .filter_map(|(id, rel)| names.get(id.as_str()).map(|name| (*name, rel)))
            .collect();
        sorted.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sage() -> PersonaProfile {
        let mut p = PersonaProfile::new("sage", "Sage").with_tagline("Calm observer");
        p.catchphrases = vec!["Indeed.".to_string()];
        p
    }

    #[test]
    fn test_actor_system_includes_profile_and_turns() {
        let persona = sage();
        let relationships = HashMap::new();
        let ctx = ActorPromptContext {
            persona: &persona,
            recent_messages: &[],
            topics: &[Topic::new("Rain", "It rained", "https://example.com/rain")],
            current_turn: 3,
            max_turns: 20,
            relationships: &relationships,
            language: "English",
        };
        let prompt = PromptTemplate::actor_system(&ctx);
        assert!(prompt.contains("Your character's name is Sage."));
        assert!(prompt.contains("Calm observer"));
        assert!(prompt.contains("Indeed."));
        assert!(prompt.contains("Topic #1: Rain"));
        assert!(prompt.contains("This is turn 3 of a 20 turn conversation."));
        assert!(prompt.contains("Reply in English ONLY."));
        assert!(!prompt.contains("Your Relationships with Others"));
    }

    #[test]
    fn test_actor_system_skips_unseen_peers() {
        let persona = sage();
        let bard = Arc::new(PersonaProfile::new("bard", "Bard"));
        let recent = vec![Arc::new(Message::utterance(bard, "la la"))];
        let mut relationships = HashMap::new();
        relationships.insert("bard".to_string(), Relationship::neutral("bard"));
        relationships.insert("ghost".to_string(), Relationship::neutral("ghost"));

        let ctx = ActorPromptContext {
            persona: &persona,
            recent_messages: &recent,
            topics: &[],
            current_turn: 0,
            max_turns: 0,
            relationships: &relationships,
            language: "English",
        };
        let prompt = PromptTemplate::actor_system(&ctx);
        assert!(prompt.contains("### Towards Bard:"));
        assert!(!prompt.contains("ghost"));
        assert!(!prompt.contains("Situational Context"));
    }

    #[test]
    fn test_transcript_line() {
        let bard = Arc::new(PersonaProfile::new("bard", "Bard"));
        let said = Message::utterance(Arc::clone(&bard), "hello");
        assert_eq!(
            PromptTemplate::transcript_line(&said).as_deref(),
            Some("hello(Bard)")
        );
        let sys = Message::system("welcome");
        assert_eq!(PromptTemplate::transcript_line(&sys).as_deref(), Some("welcome"));
        let err = Message::error(bard, "boom");
        assert!(PromptTemplate::transcript_line(&err).is_none());
    }

    #[test]
    fn test_relationship_system_mentions_both_sides() {
        let viewer = sage();
        let target = PersonaProfile::new("bard", "Bard");
        let mut current = Relationship::neutral("bard");
        current.affinity = 15;
        let prompt = PromptTemplate::relationship_system(&viewer, &target, &current, "English");
        assert!(prompt.contains("**Sage**"));
        assert!(prompt.contains("towards **Bard**"));
        assert!(prompt.contains("Current Affinity Score: 15"));
    }
}
