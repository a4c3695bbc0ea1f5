//! fg-screen - command-line front end for payment screening
//!
//! Scores single transactions through the request coordinator (recording
//! them in session history), validates and bulk-scores CSV batches, and
//! recalls or clears the session history.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use fg_common::api::ScreeningRequest;
use fg_common::config::{CliOverrides, ConfigResolver, ScreenConfig};
use fg_common::events::ScreeningStatus;
use fg_screen::{batch, FileStorage, HistoryStore, HttpScoringClient, RequestCoordinator, ScoringService};
use tracing::info;

/// Command-line arguments for fg-screen
#[derive(Parser, Debug)]
#[command(name = "fg-screen")]
#[command(about = "Payment fraud and sanctions screening client")]
#[command(version)]
struct Cli {
    /// Scoring backend base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Session storage directory
    #[arg(long, global = true)]
    session_dir: Option<PathBuf>,

    /// Maximum number of history entries
    #[arg(long, global = true)]
    history_capacity: Option<usize>,

    /// Config file (defaults to <config_dir>/fraudguard/config.toml)
    #[arg(long, global = true, env = "FG_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Abort superseded scoring calls instead of letting them finish
    #[arg(long, global = true)]
    abort_superseded: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check backend health
    Health,
    /// Score one transaction
    Score(ScoreArgs),
    /// Validate a CSV file and score it in one batch call
    Batch {
        /// CSV file with a header row
        file: PathBuf,
        /// Only validate, do not call the backend
        #[arg(long)]
        dry_run: bool,
    },
    /// Show, recall or clear session history
    History {
        /// Remove all entries
        #[arg(long, conflicts_with = "show")]
        clear: bool,
        /// Display one past screening by id
        #[arg(long)]
        show: Option<String>,
    },
}

#[derive(Args, Debug)]
struct ScoreArgs {
    #[arg(long)]
    amount: f64,
    #[arg(long)]
    sender_name: String,
    #[arg(long)]
    card_id: String,
    #[arg(long)]
    sender_country: Option<String>,
    #[arg(long)]
    product_code: Option<String>,
    /// Extra model feature, NAME=VALUE (repeatable)
    #[arg(long = "feature", value_parser = parse_feature)]
    features: Vec<(String, f64)>,
}

fn parse_feature(raw: &str) -> std::result::Result<(String, f64), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got {:?}", raw))?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("feature {} value {:?} is not a number", name, value))?;
    Ok((name.trim().to_string(), value))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let resolver = match &cli.config {
        Some(path) => ConfigResolver::with_config_file(path),
        None => ConfigResolver::new(),
    };
    let overrides = CliOverrides {
        api_url: cli.api_url.clone(),
        history_capacity: cli.history_capacity,
        session_dir: cli.session_dir.clone(),
        abort_superseded: cli.abort_superseded.then_some(true),
        log_level: cli.log_level.clone(),
    };
    let config = resolver.resolve(&overrides).context("Invalid configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        "Starting fg-screen v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Scoring backend: {}", config.api_url);

    let client = Arc::new(HttpScoringClient::from_config(&config)?);

    match cli.command {
        Command::Health => {
            let health = client.health().await?;
            print_json(&health)?;
            if !health.is_ready() {
                bail!("Backend is not ready");
            }
        }
        Command::Score(args) => score(&config, client, args).await?,
        Command::Batch { file, dry_run } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let records = batch::parse(&raw)?;
            if dry_run {
                print_json(&records)?;
            } else {
                let outcome = batch::score_batch(client.as_ref(), records).await?;
                print_json(&outcome)?;
            }
        }
        Command::History { clear, show } => {
            let coordinator = open_coordinator(&config, client)?;
            if clear {
                coordinator.clear_history().await;
                println!("History cleared");
            } else if let Some(id) = show {
                if !coordinator.select_history_by_id(&id).await {
                    bail!("No history entry with id {}", id);
                }
                print_json(&coordinator.view().await)?;
            } else {
                print_json(&coordinator.history().await)?;
            }
        }
    }

    Ok(())
}

async fn score(config: &ScreenConfig, client: Arc<HttpScoringClient>, args: ScoreArgs) -> Result<()> {
    let coordinator = open_coordinator(config, client)?;

    let mut request = ScreeningRequest::new(args.amount, args.sender_name, args.card_id);
    if let Some(country) = args.sender_country {
        request = request.with_sender_country(country);
    }
    if let Some(code) = args.product_code {
        request = request.with_product_code(code);
    }
    for (name, value) in args.features {
        request = request.with_feature(name, value);
    }

    let handle = coordinator.submit(request).await?;
    handle.await.context("Scoring task failed")?;

    let view = coordinator.view().await;
    print_json(&view)?;
    if view.status == ScreeningStatus::Error {
        return Err(anyhow!(view.error_message.unwrap_or_else(|| "Scoring failed".to_string())));
    }
    Ok(())
}

fn open_coordinator(config: &ScreenConfig, client: Arc<HttpScoringClient>) -> Result<RequestCoordinator> {
    let storage = FileStorage::open(&config.session_dir)
        .with_context(|| format!("Failed to open session dir {}", config.session_dir.display()))?;
    let history = HistoryStore::load_with_capacity(Arc::new(storage), config.history_capacity);
    Ok(RequestCoordinator::new(client, history).with_abort_superseded(config.abort_superseded))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
