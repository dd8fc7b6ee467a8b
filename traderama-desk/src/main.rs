//! Traderama Simulation Desk
//!
//! Runs the simulated live trading engine from the command line.
//!
//! Commands:
//! - `run`: start the engine, tick until the duration elapses or Ctrl+C
//! - `inspect`: print the last persisted engine snapshot

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};

use traderama_core::{
    Actor, EngineConfig, EngineEvent, EventTopic, JsonFileStore, MemoryStore, Role, SimulatedBroker,
    StateStore, TradingDesk,
};

#[derive(Parser)]
#[command(
    name = "traderama-sim",
    about = "Traderama simulated live trading engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine until the duration elapses or Ctrl+C.
    Run {
        /// Path to a JSON engine config. Defaults are used when absent.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Persist engine state to this JSON file and resume from it.
        #[arg(long)]
        state_file: Option<PathBuf>,

        /// RNG seed for a reproducible session.
        #[arg(long)]
        seed: Option<u64>,

        /// Override the tick interval in milliseconds.
        #[arg(long)]
        tick_ms: Option<u64>,

        /// Stop after this many seconds.
        #[arg(long, default_value_t = 60)]
        duration_secs: u64,

        /// Trader id used for engine control.
        #[arg(long, default_value = "desk-operator")]
        user: String,

        /// Leave the broker disconnected (start will be refused).
        #[arg(long, default_value_t = false)]
        disconnected: bool,

        /// Trigger an emergency stop instead of a normal stop at the end.
        #[arg(long, default_value_t = false)]
        emergency: bool,
    },
    /// Print the last persisted engine snapshot.
    Inspect {
        /// State file written by `run --state-file`.
        #[arg(long)]
        state_file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            state_file,
            seed,
            tick_ms,
            duration_secs,
            user,
            disconnected,
            emergency,
        } => {
            let mut config = load_config(config.as_deref())?;
            if seed.is_some() {
                config.seed = seed;
            }
            if let Some(ms) = tick_ms {
                config.tick_interval_ms = ms;
            }
            let options = RunOptions {
                state_file,
                duration: Duration::from_secs(duration_secs),
                actor: Actor::new(user, Role::Trader),
                connected: !disconnected,
                emergency,
            };
            run_session(config, options).await
        }
        Commands::Inspect { state_file } => inspect(&state_file).await,
    }
}

struct RunOptions {
    state_file: Option<PathBuf>,
    duration: Duration,
    actor: Actor,
    connected: bool,
    emergency: bool,
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

async fn run_session(config: EngineConfig, options: RunOptions) -> Result<()> {
    info!("🚀 Starting Traderama simulation desk");

    let broker = Arc::new(SimulatedBroker::connected());
    broker.set_connected(options.connected);

    let store: Arc<dyn StateStore> = match &options.state_file {
        Some(path) => Arc::new(JsonFileStore::new(path)),
        None => Arc::new(MemoryStore::new()),
    };

    let desk = TradingDesk::open(config, broker, store).await?;
    let engine = desk.engine();

    let _trades = engine.events().subscribe_all(EventTopic::Trades, |event| match event {
        EngineEvent::TradeOpened { trade } => info!(
            "📈 Opened #{} {} {} x{} @ {:.2}",
            trade.id, trade.side, trade.symbol, trade.size, trade.entry_price
        ),
        EngineEvent::TradeClosed { trade } => info!(
            "📉 Closed #{} {} ({:?}) pnl {:.2} fee {:.2}",
            trade.id, trade.symbol, trade.close_reason, trade.pnl, trade.fee
        ),
        _ => {}
    });
    let _alerts = engine.events().subscribe_all(EventTopic::Risk, |event| {
        if let EngineEvent::RiskLevelChanged { from, to, score } = event {
            warn!("⚠️ Risk level {} -> {} (score {:.2})", from, to, score);
        }
    });

    if let Err(e) = engine.start(&options.actor).await {
        desk.close().await?;
        bail!("engine did not start: {}", e);
    }
    info!("📊 Engine running. Press Ctrl+C to stop.");

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("🛑 Shutdown signal received...");
        }
        _ = tokio::time::sleep(options.duration) => {
            info!("⏰ Session duration reached...");
        }
    }

    if options.emergency {
        engine.emergency_stop(&options.actor).await?;
    } else {
        engine.stop(&options.actor).await?;
    }
    desk.close().await?;

    // Print final statistics
    let status = engine.status();
    let risk = engine.risk();
    info!("📊 Final Statistics:");
    info!("  Account Equity: ${:.2}", status.account_equity);
    info!("  Total P&L: ${:.2} (today ${:.2})", status.total_pnl, status.daily_pnl);
    info!("  Fees Paid: ${:.2}", status.fees);
    info!("  Closed Trades: {}", status.total_trades);
    info!("  Win Rate: {:.1}%", status.win_rate);
    info!("  Drawdown: {:.2}%", status.drawdown);
    info!("  Risk Level: {}", risk.risk_level);

    info!("✅ Simulation desk shutdown complete");
    Ok(())
}

async fn inspect(path: &Path) -> Result<()> {
    let store = JsonFileStore::new(path);
    let snapshot = store
        .load()
        .await?
        .with_context(|| format!("no engine state at {}", path.display()))?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
