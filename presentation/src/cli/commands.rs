//! CLI command definitions

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Where the conversation is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RendererKind {
    /// Live transcript on stdout with a typewriter effect
    Console,
    /// A blog post written when the conversation ends
    Markdown,
    /// One JSON object per message
    Jsonl,
}

impl RendererKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RendererKind::Console => "console",
            RendererKind::Markdown => "markdown",
            RendererKind::Jsonl => "jsonl",
        }
    }

    /// Parse a renderer name as written in the config file
    pub fn from_name(name: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(name, true).ok()
    }
}

/// CLI arguments for parlor
///
/// Flags left unset fall back to the configuration file, then to defaults.
#[derive(Parser, Debug)]
#[command(name = "parlor")]
#[command(author, version, about = "Simulated multi-party conversation between AI personas")]
#[command(long_about = r#"
Parlor seats a handful of AI personas around a table and lets them talk.

Each persona decides on its own when to speak, a single floor makes sure only
one of them talks at a time, and the run ends after a fixed number of turns.
Personas remember how they feel about each other between runs.

Required environment:
  PROJECT_ID            Google Cloud project for Vertex AI
  LOCATION              Vertex AI region (e.g. us-central1)
  GOOGLE_ACCESS_TOKEN   Optional; otherwise `gcloud auth print-access-token` is used

Configuration files are loaded from (in priority order):
1. --config <path>     Explicit config file
2. ./parlor.toml       Project-level config
3. ~/.config/parlor/config.toml   Global config

Example:
  parlor --turns 12 --participants 4
  parlor --persona mira --persona gus --rss-url https://example.com/feed.xml
"#)]
pub struct Cli {
    /// Number of turns before the conversation ends [default: 20]
    #[arg(short, long, value_name = "N")]
    pub turns: Option<u32>,

    /// Number of randomly chosen participants [default: 3]
    #[arg(short = 'n', long, value_name = "N")]
    pub participants: Option<usize>,

    /// Persona to seat (can be specified multiple times; overrides --participants)
    #[arg(short, long = "persona", value_name = "ID")]
    pub personas: Vec<String>,

    /// Renderer to enable (can be specified multiple times) [default: console, markdown]
    #[arg(short, long = "renderer", value_enum, value_name = "KIND")]
    pub renderers: Vec<RendererKind>,

    /// RSS or Atom feed providing conversation topics
    #[arg(long, value_name = "URL")]
    pub rss_url: Option<String>,

    /// Number of feed entries to use as topics [default: 1]
    #[arg(long, value_name = "N")]
    pub rss_limit: Option<usize>,

    /// Directory for markdown posts [default: ./pages/content/posts]
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Directory for relationship records and transcripts [default: ./data]
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Gemini model name [default: gemini-2.5-flash-lite]
    #[arg(short, long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Delay between characters on the console, in milliseconds [default: 50]
    #[arg(long, value_name = "MS")]
    pub typing_delay_ms: Option<u64>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_unset() {
        let cli = Cli::try_parse_from(["parlor"]).unwrap();
        assert_eq!(cli.turns, None);
        assert!(cli.personas.is_empty());
        assert!(cli.renderers.is_empty());
        assert_eq!(cli.verbose, 0);
        assert!(!cli.no_config);
    }

    #[test]
    fn test_repeatable_flags() {
        let cli = Cli::try_parse_from([
            "parlor", "--persona", "mira", "-p", "gus", "-r", "console", "--renderer", "jsonl",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.personas, vec!["mira", "gus"]);
        assert_eq!(cli.renderers, vec![RendererKind::Console, RendererKind::Jsonl]);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_numeric_flags() {
        let cli = Cli::try_parse_from([
            "parlor",
            "--turns",
            "12",
            "-n",
            "4",
            "--rss-limit",
            "3",
            "--typing-delay-ms",
            "0",
        ])
        .unwrap();
        assert_eq!(cli.turns, Some(12));
        assert_eq!(cli.participants, Some(4));
        assert_eq!(cli.rss_limit, Some(3));
        assert_eq!(cli.typing_delay_ms, Some(0));
    }

    #[test]
    fn test_unknown_renderer_rejected() {
        assert!(Cli::try_parse_from(["parlor", "--renderer", "pdf"]).is_err());
    }

    #[test]
    fn test_renderer_from_name() {
        assert_eq!(RendererKind::from_name("markdown"), Some(RendererKind::Markdown));
        assert_eq!(RendererKind::from_name("JSONL"), Some(RendererKind::Jsonl));
        assert_eq!(RendererKind::from_name("pdf"), None);
        assert_eq!(RendererKind::Console.as_str(), "console");
    }
}
