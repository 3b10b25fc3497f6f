use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use suggestion_service::{Context, EngineConfig, Item, SuggestionEngine};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "suggestion-service",
    about = "Deal a StickerHand from a library snapshot",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the hand for a library snapshot
    Suggest {
        /// JSON array of library items
        #[arg(short, long)]
        library: PathBuf,

        /// JSON context (defaults to the browse surface)
        #[arg(short, long)]
        context: Option<PathBuf>,

        /// Evaluation time as RFC 3339 (defaults to now)
        #[arg(long)]
        now: Option<String>,

        /// Print identifiers only
        #[arg(long)]
        ids_only: bool,
    },

    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let config = EngineConfig::from_env().context("Failed to load config")?;

    match cli.command {
        Commands::Suggest {
            library,
            context,
            now,
            ids_only,
        } => {
            let items: Vec<Item> = read_json(&library)?;
            let context: Context = match context {
                Some(path) => read_json(&path)?,
                None => Context::browse(),
            };
            let now = match now {
                Some(raw) => DateTime::parse_from_rfc3339(&raw)
                    .with_context(|| format!("Invalid --now timestamp: {}", raw))?
                    .with_timezone(&Utc),
                None => Utc::now(),
            };

            info!(
                library = %library.display(),
                items = items.len(),
                "Loaded library snapshot"
            );

            let engine = SuggestionEngine::try_new(config)?;
            let suggestion = engine.suggest_with_stats(&items, &context, now);

            let output = if ids_only {
                serde_json::to_string_pretty(&suggestion.ids())?
            } else {
                serde_json::to_string_pretty(&suggestion)?
            };
            println!("{}", output);
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}
