//! kirinuki CLI
//!
//! Commands:
//! - kirinuki analyze <URL> [-k KEYWORD] [--chat-file FILE] [--with-series]
//! - kirinuki fetch <URL> [-o FILE] [--chat-file FILE]
//! - kirinuki config [--init]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kirinuki::analytics::{analyze_total_and_keyword, format_report, AnalysisReport};
use kirinuki::api::innertube::ReplayChatSource;
use kirinuki::api::youtube::YoutubeDataApi;
use kirinuki::config::{AppConfig, ConfigManager};
use kirinuki::fetch::source::ChatSource;
use kirinuki::fetch::ChatFetchCoordinator;
use kirinuki::io::{write_events, NdjsonChatSource};
use kirinuki::models::{ChatEvent, FetchProgress};
use kirinuki::utils;
use serde::Serialize;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "kirinuki")]
#[command(about = "Find chat-activity spikes in YouTube stream replays")]
#[command(version)]
struct Cli {
    /// Path to config.toml (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the chat and report spikes as JSON
    Analyze {
        /// Video URL or id
        url: String,

        /// Also detect spikes of messages containing this keyword
        #[arg(short, long)]
        keyword: Option<String>,

        /// Read events from an NDJSON file instead of YouTube
        #[arg(long, value_name = "FILE")]
        chat_file: Option<PathBuf>,

        /// Include the rate series in the report
        #[arg(long)]
        with_series: bool,
    },

    /// Fetch the chat and write it as NDJSON
    Fetch {
        /// Video URL or id
        url: String,

        /// Output file (stdout when omitted)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Read events from an NDJSON file instead of YouTube
        #[arg(long, value_name = "FILE")]
        chat_file: Option<PathBuf>,
    },

    /// Show the effective configuration
    Config {
        /// Write a default config file if none exists
        #[arg(long)]
        init: bool,
    },
}

#[derive(Serialize)]
struct CliReport {
    url: String,
    events: usize,
    total: AnalysisReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    keyword: Option<KeywordReport>,
}

#[derive(Serialize)]
struct KeywordReport {
    keyword: String,
    #[serde(flatten)]
    report: AnalysisReport,
}

fn config_manager(path: Option<PathBuf>) -> Result<ConfigManager> {
    match path {
        Some(path) => Ok(ConfigManager::with_path(path)),
        None => ConfigManager::new(),
    }
}

fn log_progress(progress: FetchProgress) {
    tracing::info!("📥 Fetching chat: {}", utils::describe_progress(&progress));
}

async fn fetch_events(
    config: &AppConfig,
    url: &str,
    chat_file: Option<PathBuf>,
) -> Result<Vec<ChatEvent>> {
    let durations = Arc::new(
        YoutubeDataApi::from_config(&config.youtube)
            .context("Failed to build the YouTube Data API client")?,
    );

    let source: Arc<dyn ChatSource> = match &chat_file {
        Some(path) => Arc::new(NdjsonChatSource::new(path.clone())),
        None => Arc::new(
            ReplayChatSource::from_config(&config.chat)
                .context("Failed to build the chat replay client")?,
        ),
    };
    // Saved files are read whole; segmenting only applies to YouTube.
    let youtube = chat_file.is_none().then_some(&config.youtube);

    let coordinator = ChatFetchCoordinator::new(source, durations);
    let events = coordinator
        .fetch(url, &config.chat, youtube, Some(&log_progress))
        .await?;
    tracing::info!("✅ Fetched {} chat events", events.len());
    Ok(events)
}

async fn run_analyze(
    config: &AppConfig,
    url: String,
    keyword: Option<String>,
    chat_file: Option<PathBuf>,
    with_series: bool,
) -> Result<()> {
    let events = fetch_events(config, &url, chat_file).await?;
    let outcome =
        analyze_total_and_keyword(&events, keyword.as_deref(), &config.cps, &config.spike);

    let finish = |report: AnalysisReport| {
        if with_series {
            report
        } else {
            report.without_series()
        }
    };

    let report = CliReport {
        events: events.len(),
        total: finish(format_report(&url, &outcome.total)),
        keyword: outcome.keyword.map(|result| KeywordReport {
            keyword: keyword.unwrap_or_default().trim().to_string(),
            report: finish(format_report(&url, &result)),
        }),
        url,
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_fetch(
    config: &AppConfig,
    url: String,
    output: Option<PathBuf>,
    chat_file: Option<PathBuf>,
) -> Result<()> {
    let events = fetch_events(config, &url, chat_file).await?;

    match output {
        Some(path) => {
            let file = File::create(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_events(file, &events)?;
            tracing::info!("💾 Wrote {} events to {}", events.len(), path.display());
        }
        None => write_events(std::io::stdout().lock(), &events)?,
    }
    Ok(())
}

fn run_config(manager: &ConfigManager, init: bool) -> Result<()> {
    if init {
        if manager.config_exists() {
            tracing::info!("⚙️ Config already exists: {}", manager.config_path().display());
        } else {
            manager.save_config(&AppConfig::default())?;
            tracing::info!("⚙️ Wrote default config: {}", manager.config_path().display());
        }
    }

    let config = manager.load_config()?;
    print!(
        "{}",
        toml::to_string_pretty(&config).context("Failed to serialize config")?
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    utils::init_logging(&cli.log_level)?;

    let manager = config_manager(cli.config)?;
    tracing::debug!("⚙️ Using config file: {}", manager.config_path().display());

    match cli.command {
        Commands::Config { init } => run_config(&manager, init),
        Commands::Analyze {
            url,
            keyword,
            chat_file,
            with_series,
        } => {
            let config = manager.load_config()?;
            run_analyze(&config, url, keyword, chat_file, with_series).await
        }
        Commands::Fetch {
            url,
            output,
            chat_file,
        } => {
            let config = manager.load_config()?;
            run_fetch(&config, url, output, chat_file).await
        }
    }
}
