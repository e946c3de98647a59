mod notify;
mod replay;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use notify::LogNotifier;
use replay::CsvReplayFeed;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use stealth_trade_core::{Candidate, ConfigLoader, EngineConfig, TradeStore};
use stealth_trade_data::{InMemoryTradeStore, SqliteTradeStore};
use stealth_trade_gateway::{PaperGateway, RetryPolicy, RetryingGateway};
use stealth_trade_manager::{ManagerDeps, ManagerHandle, TradeManager};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stealth-trade", about = "Risk-gated equities trading engine")]
struct Cli {
    /// Configuration profile overlay (config/Config.<profile>.toml)
    #[arg(long, env = "STEALTH_PROFILE")]
    profile: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a price file against the paper gateway
    Run {
        /// CSV of price frames: step,symbol,price
        #[arg(long)]
        prices: PathBuf,

        /// JSONL of scheduled candidates ({"step": N, ...candidate fields})
        #[arg(long)]
        signals: Option<PathBuf>,

        /// SQLite database URL; in-memory store when omitted
        #[arg(long, env = "STEALTH_DATABASE_URL")]
        database: Option<String>,
    },
    /// Print the resolved configuration and exit
    ShowConfig,
}

/// A candidate due at a given replay step.
#[derive(Debug, Deserialize)]
struct ScheduledCandidate {
    step: usize,
    #[serde(flatten)]
    candidate: Candidate,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = match &cli.profile {
        Some(profile) => ConfigLoader::load_with_profile(profile)?,
        None => ConfigLoader::load()?,
    };

    match cli.command {
        Commands::Run {
            prices,
            signals,
            database,
        } => run_replay(config, &prices, signals.as_deref(), database.as_deref()).await,
        Commands::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn run_replay(
    config: EngineConfig,
    prices: &std::path::Path,
    signals: Option<&std::path::Path>,
    database: Option<&str>,
) -> Result<()> {
    let feed = Arc::new(CsvReplayFeed::load(prices)?);
    let scheduled = match signals {
        Some(path) => load_signals(path)?,
        None => Vec::new(),
    };
    tracing::info!(signals = scheduled.len(), "replay starting");

    let gateway = RetryingGateway::new(
        PaperGateway::new(0.00025, 5.0),
        RetryPolicy::from(&config.gateway),
    );

    let store: Arc<dyn TradeStore> = match database {
        Some(url) => Arc::new(
            SqliteTradeStore::new(url)
                .await
                .with_context(|| format!("opening trade store {url}"))?,
        ),
        None => Arc::new(InMemoryTradeStore::new()),
    };

    let handle = TradeManager::spawn(
        config,
        ManagerDeps {
            gateway: Arc::new(gateway),
            feed: feed.clone(),
            store: store.clone(),
            notifier: Arc::new(LogNotifier),
        },
    );

    tokio::select! {
        result = replay_loop(&handle, &feed, scheduled) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received, shutting down");
        }
    }

    let trades = store.load_trades().await?;
    let status = handle.status().await?;
    tracing::info!(
        trades = trades.len(),
        equity = %status.equity,
        open_positions = status.open_positions,
        "replay finished"
    );
    handle.shutdown().await?;
    Ok(())
}

async fn replay_loop(
    handle: &ManagerHandle,
    feed: &CsvReplayFeed,
    scheduled: Vec<ScheduledCandidate>,
) -> Result<()> {
    let mut step = 0usize;
    loop {
        for entry in scheduled.iter().filter(|s| s.step == step) {
            let result = handle.process_signal(entry.candidate.clone()).await?;
            tracing::info!(symbol = %entry.candidate.symbol, ?result, "signal processed");
        }

        let updates = handle.refresh_now().await?;
        for update in &updates {
            tracing::debug!(symbol = %update.symbol, outcome = ?update.outcome, "refresh");
        }

        if !feed.advance() {
            break;
        }
        step += 1;
    }
    Ok(())
}

fn load_signals(path: &std::path::Path) -> Result<Vec<ScheduledCandidate>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading signals file {}", path.display()))?;
    let mut scheduled = Vec::new();
    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let entry: ScheduledCandidate = serde_json::from_str(line)
            .with_context(|| format!("parsing signal on line {}", idx + 1))?;
        scheduled.push(entry);
    }
    Ok(scheduled)
}
