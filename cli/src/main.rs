//! CLI entrypoint for parlor
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use parlor_application::{
    ConversationParams, RelationshipStore, Renderer, RunConversationInput, RunConversationUseCase,
    TopicSource,
};
use parlor_domain::{Identity, PersonaPool, PersonaProfile, Topic};
use parlor_infrastructure::{
    ConfigLoader, FileConfig, FileRelationshipStore, GeminiSettings, JsonlTranscriptRenderer,
    RssTopicSource, VertexGeminiBackend, builtin_pool,
};
use parlor_presentation::output::markdown::jst_now;
use parlor_presentation::{Cli, ConsoleRenderer, MarkdownRenderer, RendererKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Settings for one run after merging CLI flags over the config file
#[derive(Debug, Clone, PartialEq)]
struct RunSettings {
    max_turns: u32,
    participants: usize,
    personas: Vec<String>,
    renderers: Vec<RendererKind>,
    rss_url: Option<String>,
    rss_limit: usize,
    markdown_dir: PathBuf,
    data_dir: PathBuf,
    model: String,
    typing_delay: Duration,
    tick_interval: Duration,
    window_capacity: usize,
    bus_capacity: usize,
}

impl RunSettings {
    /// CLI flags win over file values, which win over defaults.
    fn resolve(cli: &Cli, file: &FileConfig) -> Result<Self> {
        let renderers = if cli.renderers.is_empty() {
            file.output
                .renderers
                .iter()
                .map(|name| {
                    RendererKind::from_name(name).ok_or_else(|| anyhow!("unknown renderer: {}", name))
                })
                .collect::<Result<Vec<_>>>()?
        } else {
            cli.renderers.clone()
        };

        let personas = if cli.personas.is_empty() {
            file.conversation.personas.clone()
        } else {
            cli.personas.clone()
        };

        let max_turns = cli.turns.unwrap_or(file.conversation.max_turns);
        if max_turns == 0 {
            bail!("--turns must be greater than 0");
        }

        Ok(Self {
            max_turns,
            participants: cli.participants.unwrap_or(file.conversation.participants),
            personas,
            renderers,
            rss_url: cli.rss_url.clone().or_else(|| file.topics.rss_url.clone()),
            rss_limit: cli.rss_limit.unwrap_or(file.topics.rss_limit),
            markdown_dir: cli
                .output
                .clone()
                .unwrap_or_else(|| PathBuf::from(&file.output.markdown_dir)),
            data_dir: cli
                .data_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(&file.output.data_dir)),
            model: cli.model.clone().unwrap_or_else(|| file.backend.model.clone()),
            typing_delay: Duration::from_millis(
                cli.typing_delay_ms.unwrap_or(file.output.typing_delay_ms),
            ),
            tick_interval: Duration::from_millis(file.conversation.tick_interval_ms.max(1)),
            window_capacity: file.conversation.window_capacity,
            bus_capacity: file.conversation.bus_capacity,
        })
    }

    fn params(&self) -> ConversationParams {
        ConversationParams {
            window_capacity: self.window_capacity,
            bus_capacity: self.bus_capacity,
            ..ConversationParams::default()
        }
        .with_max_turns(self.max_turns)
        .with_tick_interval(self.tick_interval)
    }
}

/// Install the tracing subscriber: stderr always, plus an optional log file.
fn init_logging(verbose: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| anyhow!("invalid log file path: {}", path.display()))?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;

            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false).boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Resolve when the process is asked to terminate.
async fn termination_requested() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn select_participants(pool: &PersonaPool, settings: &RunSettings) -> Result<Vec<Arc<PersonaProfile>>> {
    if settings.personas.is_empty() {
        return Ok(pool.random(settings.participants, &mut rand::thread_rng())?);
    }

    Ok(pool.select(&settings.personas)?)
}

fn load_identities(
    profiles: Vec<Arc<PersonaProfile>>,
    store: &dyn RelationshipStore,
) -> Vec<Identity> {
    profiles
        .into_iter()
        .map(|profile| {
            let relationships = store.load(&profile.persona_id).unwrap_or_else(|e| {
                warn!("Starting {} without saved relationships: {}", profile.persona_id, e);
                Default::default()
            });
            Identity::new(profile).with_relationships(relationships)
        })
        .collect()
}

fn build_renderers(settings: &RunSettings, topics: &[Topic]) -> Result<Vec<Arc<dyn Renderer>>> {
    let mut renderers: Vec<Arc<dyn Renderer>> = Vec::new();
    for kind in &settings.renderers {
        match kind {
            RendererKind::Console => {
                renderers.push(Arc::new(ConsoleRenderer::new(settings.typing_delay)));
            }
            RendererKind::Markdown => {
                renderers.push(Arc::new(MarkdownRenderer::new(
                    &settings.markdown_dir,
                    topics.to_vec(),
                )));
            }
            RendererKind::Jsonl => {
                let path = settings
                    .data_dir
                    .join("transcripts")
                    .join(format!("{}.jsonl", jst_now().format("%Y%m%d-%H%M%S")));
                renderers.push(Arc::new(JsonlTranscriptRenderer::new(&path)?));
            }
        }
    }
    Ok(renderers)
}

fn required_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => bail!("set {} environment variable", name),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = init_logging(cli.verbose, cli.log_file.as_deref())?;

    if cli.show_config {
        ConfigLoader::print_config_sources(cli.config.as_deref());
        return Ok(());
    }

    let file_config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref())
            .map_err(|e| anyhow!("failed to load configuration: {}", e))?
    };
    file_config.validate()?;

    let settings = RunSettings::resolve(&cli, &file_config)?;
    info!("Starting parlor");

    let project_id = required_env("PROJECT_ID")?;
    let location = required_env("LOCATION")?;

    let shutdown = CancellationToken::new();
    {
        let token = shutdown.clone();
        tokio::spawn(async move {
            termination_requested().await;
            info!("Termination requested");
            token.cancel();
        });
    }

    // === Topics ===
    let topics = match &settings.rss_url {
        Some(url) => {
            info!("Fetching topics from {}", url);
            let topics = RssTopicSource::new(url.clone(), settings.rss_limit)
                .fetch()
                .await
                .context("failed to fetch topics")?;
            for t in &topics {
                info!("Topic fetched: {}", t.title);
            }
            topics
        }
        None => Vec::new(),
    };

    // === Participants ===
    let pool = builtin_pool().context("failed to load persona catalog")?;
    let store = Arc::new(FileRelationshipStore::new(&settings.data_dir));
    let identities = load_identities(select_participants(&pool, &settings)?, store.as_ref());

    // === Dependency Injection ===
    let mut gemini = GeminiSettings::new(project_id, location)
        .with_model(&settings.model)
        .with_language(&file_config.backend.language);
    gemini.temperature = file_config.backend.temperature;
    gemini.relationship_temperature = file_config.backend.relationship_temperature;
    gemini.max_output_tokens = file_config.backend.max_output_tokens;
    if let Some(seconds) = file_config.backend.timeout_seconds {
        gemini = gemini.with_timeout(Duration::from_secs(seconds));
    }
    let backend = Arc::new(VertexGeminiBackend::new(gemini)?);

    let mut use_case = RunConversationUseCase::new(backend).with_store(store);
    for renderer in build_renderers(&settings, &topics)? {
        use_case = use_case.with_renderer(renderer);
    }

    let input = RunConversationInput::new(identities, topics).with_params(settings.params());
    let output = use_case.execute(input, shutdown).await?;

    match &output.reason {
        Some(reason) => info!("Conversation ended: {}", reason),
        None => info!("Conversation interrupted"),
    }
    info!(
        "{} turns, {} participants, {} dropped deliveries",
        output.turns,
        output.identities.len(),
        output.dropped
    );
    info!("All components shut down gracefully");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlor_domain::DomainError;

    fn parse(args: &[&str]) -> Cli {
        let mut full = vec!["parlor"];
        full.extend_from_slice(args);
        Cli::try_parse_from(full).unwrap()
    }

    #[test]
    fn test_defaults_from_file_config() {
        let settings = RunSettings::resolve(&parse(&[]), &FileConfig::default()).unwrap();
        assert_eq!(settings.max_turns, 20);
        assert_eq!(settings.participants, 3);
        assert_eq!(
            settings.renderers,
            vec![RendererKind::Console, RendererKind::Markdown]
        );
        assert_eq!(settings.markdown_dir, PathBuf::from("./pages/content/posts"));
        assert_eq!(settings.typing_delay, Duration::from_millis(50));
        assert_eq!(settings.model, "gemini-2.5-flash-lite");
        assert_eq!(settings.rss_url, None);
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut file = FileConfig::default();
        file.conversation.max_turns = 8;
        file.conversation.personas = vec!["gus".to_string()];
        file.topics.rss_url = Some("https://example.com/a.xml".to_string());

        let cli = parse(&[
            "--turns", "5", "--persona", "mira", "--renderer", "jsonl", "--rss-url",
            "https://example.com/b.xml",
        ]);
        let settings = RunSettings::resolve(&cli, &file).unwrap();
        assert_eq!(settings.max_turns, 5);
        assert_eq!(settings.personas, vec!["mira"]);
        assert_eq!(settings.renderers, vec![RendererKind::Jsonl]);
        assert_eq!(settings.rss_url.as_deref(), Some("https://example.com/b.xml"));
    }

    #[test]
    fn test_file_values_used_when_flags_absent() {
        let mut file = FileConfig::default();
        file.conversation.personas = vec!["gus".to_string()];
        file.output.renderers = vec!["jsonl".to_string()];
        file.conversation.tick_interval_ms = 250;

        let settings = RunSettings::resolve(&parse(&[]), &file).unwrap();
        assert_eq!(settings.personas, vec!["gus"]);
        assert_eq!(settings.renderers, vec![RendererKind::Jsonl]);

        let params = settings.params();
        assert_eq!(params.tick_interval, Duration::from_millis(250));
        assert_eq!(params.max_turns, 20);
    }

    #[test]
    fn test_zero_turns_rejected() {
        assert!(RunSettings::resolve(&parse(&["--turns", "0"]), &FileConfig::default()).is_err());
    }

    #[test]
    fn test_select_explicit_personas() {
        let pool = builtin_pool().unwrap();
        let mut settings = RunSettings::resolve(&parse(&[]), &FileConfig::default()).unwrap();

        settings.personas = vec!["mira".to_string(), "gus".to_string()];
        let chosen = select_participants(&pool, &settings).unwrap();
        let ids: Vec<&str> = chosen.iter().map(|p| p.persona_id.as_str()).collect();
        assert_eq!(ids, vec!["mira", "gus"]);

        settings.personas = vec!["nobody".to_string()];
        assert!(select_participants(&pool, &settings).is_err());
    }

    #[test]
    fn test_repeated_persona_flag_rejected() {
        let pool = builtin_pool().unwrap();
        let settings = RunSettings::resolve(
            &parse(&["--persona", "mira", "--persona", "mira"]),
            &FileConfig::default(),
        )
        .unwrap();

        let err = select_participants(&pool, &settings).unwrap_err();
        assert_eq!(
            err.downcast_ref::<DomainError>(),
            Some(&DomainError::DuplicatePersona("mira".to_string()))
        );
    }

    #[test]
    fn test_repeated_persona_in_config_rejected() {
        let pool = builtin_pool().unwrap();
        let mut file = FileConfig::default();
        file.conversation.personas = vec!["gus".to_string(), "ada".to_string(), "gus".to_string()];
        let settings = RunSettings::resolve(&parse(&[]), &file).unwrap();

        assert!(select_participants(&pool, &settings).is_err());
    }

    #[test]
    fn test_select_random_personas() {
        let pool = builtin_pool().unwrap();
        let settings = RunSettings::resolve(&parse(&["-n", "2"]), &FileConfig::default()).unwrap();
        assert_eq!(select_participants(&pool, &settings).unwrap().len(), 2);
    }
}
