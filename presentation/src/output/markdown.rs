//! Markdown renderer
//!
//! Collects the whole conversation and writes it as a blog post once the bus
//! closes. Runs that ended in an error, or that produced almost nothing, are
//! not written. `finalize` appends each participant's final relationships.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use parlor_application::{Bus, RenderError, Renderer};
use parlor_domain::{Identity, Message, MessageKind, PersonaProfile, Topic};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Posts are stamped in Japan Standard Time
const JST_OFFSET_SECS: i32 = 9 * 3600;

const DEFAULT_TITLE: &str = "Parlor Log";

/// Current time in UTC+9
pub fn jst_now() -> DateTime<FixedOffset> {
    let jst = FixedOffset::east_opt(JST_OFFSET_SECS).unwrap_or_else(|| Utc.fix());
    Utc::now().with_timezone(&jst)
}

/// Writes the conversation as a markdown post with TOML front matter
pub struct MarkdownRenderer {
    output_dir: PathBuf,
    topics: Vec<Topic>,
    started: DateTime<FixedOffset>,
    path: PathBuf,
}

impl MarkdownRenderer {
    pub fn new(output_dir: impl Into<PathBuf>, topics: Vec<Topic>) -> Self {
        Self::at(output_dir, topics, jst_now())
    }

    /// Renderer whose post is stamped with `started`
    pub fn at(
        output_dir: impl Into<PathBuf>,
        topics: Vec<Topic>,
        started: DateTime<FixedOffset>,
    ) -> Self {
        let output_dir = output_dir.into();
        let path = output_dir.join(format!("{}.md", started.format("%Y%m%d-%H%M%S")));
        Self {
            output_dir,
            topics,
            started,
            path,
        }
    }

    /// Where the post is (or would be) written
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> RenderError {
        RenderError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    fn write_post(&self, inbox: &[Arc<Message>]) -> Result<(), RenderError> {
        if inbox.iter().any(|m| m.kind() == MessageKind::Error) {
            info!("Error message detected, skipping markdown generation");
            return Ok(());
        }
        if inbox.len() < 2 {
            info!("Too few messages, skipping markdown generation");
            return Ok(());
        }

        let document = render_post(inbox, &self.topics, self.started);

        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| self.io_error(&self.output_dir, e))?;
        std::fs::write(&self.path, document).map_err(|e| self.io_error(&self.path, e))?;

        info!("Markdown file generated: {}", self.path.display());
        Ok(())
    }
}

/// Full post: front matter, announcement, cast, transcript and topic links.
pub fn render_post(
    inbox: &[Arc<Message>],
    topics: &[Topic],
    date: DateTime<FixedOffset>,
) -> String {
    let title = topics
        .first()
        .map(|t| t.title.as_str())
        .unwrap_or(DEFAULT_TITLE);

    let mut cast: BTreeMap<&str, &PersonaProfile> = BTreeMap::new();
    let mut transcript = String::new();
    let mut announcement = None;

    for message in inbox {
        match message.kind() {
            MessageKind::Utterance => {
                if let Some(from) = message.from() {
                    cast.entry(from.display_name.as_str()).or_insert(from);
                    let _ = write!(transcript, "**{}**: {}\n\n", from.display_name, message.text());
                }
            }
            MessageKind::System => announcement = Some(message.text()),
            _ => {}
        }
    }

    let mut body = String::new();

    if let Some(text) = announcement {
        let _ = write!(body, "> {}\n\n---\n\n", text);
    }

    body.push_str("## Participants\n\n");
    for (name, profile) in &cast {
        let _ = writeln!(body, "- **{}:** {}", name, profile.tagline);
    }
    body.push_str("\n---\n\n");

    body.push_str("## Today's Conversation\n\n");
    body.push_str(&transcript);

    if !topics.is_empty() {
        body.push_str("---\n\n## Today's Topics\n\n");
        for t in topics {
            let _ = writeln!(body, "- [{}]({})", t.title, t.source_url);
        }
        body.push('\n');
    }

    let tags: Vec<&str> = cast.keys().copied().collect();
    format!(
        "+++\ntitle = {}\ndate = {}\ntags = {}\n+++\n\n{}\n",
        quoted(title),
        quoted(&date.to_rfc3339_opts(chrono::SecondsFormat::Secs, false)),
        serde_json::to_string(&tags).unwrap_or_else(|_| "[]".to_string()),
        body
    )
}

/// TOML basic string
fn quoted(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s.replace('"', "'")))
}

/// Each participant's final view of the others, sorted by display name.
pub fn render_epilogue(identities: &[Identity]) -> String {
    let names: HashMap<&str, &str> = identities
        .iter()
        .map(|i| (i.persona_id(), i.display_name()))
        .collect();

    let mut viewers: Vec<&Identity> = identities.iter().collect();
    viewers.sort_by(|a, b| a.display_name().cmp(b.display_name()));

    let mut out = String::from("\n---\n\n## Final Relationships\n\n");
    for viewer in viewers {
        let _ = writeln!(out, "### {}'s view", viewer.display_name());

        if viewer.relationships().is_empty() {
            out.push_str("- (no relationships formed)\n");
        } else {
            let mut known: Vec<(&str, &parlor_domain::Relationship)> = viewer
                .relationships()
                .iter()
                .filter_map(|(id, rel)| names.get(id.as_str()).map(|name| (*name, rel)))
                .collect();
            known.sort_by(|a, b| a.0.cmp(b.0));

            for (name, rel) in known {
                let _ = writeln!(
                    out,
                    "- **Toward {}:** affinity `{}` (impression: {})",
                    name, rel.affinity, rel.impression
                );
            }
        }
        out.push('\n');
    }
    out
}

impl Renderer for MarkdownRenderer {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn attach(self: Arc<Self>, bus: &Bus) -> JoinHandle<()> {
        let mut subscription = bus.subscribe();
        tokio::spawn(async move {
            let mut inbox = Vec::new();
            while let Some(message) = subscription.recv().await {
                inbox.push(message);
            }

            if let Err(e) = self.write_post(&inbox) {
                warn!("Failed to render markdown: {}", e);
            }
        })
    }

    fn finalize(&self, identities: &[Identity]) -> Result<(), RenderError> {
        if !self.path.exists() {
            warn!(
                "Markdown file does not exist, cannot append epilogue: {}",
                self.path.display()
            );
            return Ok(());
        }

        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(&self.path, e))?;
        file.write_all(render_epilogue(identities).as_bytes())
            .map_err(|e| self.io_error(&self.path, e))?;

        info!("Epilogue appended to {}", self.path.display());
        Ok(())
    }
}
