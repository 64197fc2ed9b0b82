use clap::Parser;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use validbot::db::PostgresStore;
use validbot::persistence::{MemoryStore, StoreHandle};
use validbot::{
    Direction, Result, SignalSubmission, TradeTracker, ValidationConfig, ValidationReport,
};

/// Live signal validation engine: paper-trades incoming signals against
/// real price ticks and scores each strategy type on its live results.
#[derive(Parser, Debug)]
#[command(name = "validbot")]
struct Args {
    /// Postgres URL; falls back to DATABASE_URL, in-memory when unset
    #[arg(long)]
    database_url: Option<String>,

    /// JSON array of signal submissions to admit at startup
    #[arg(long)]
    signals: Option<PathBuf>,

    /// JSON-lines price ticks, one {"instrument": price, ...} map per line
    #[arg(long)]
    ticks: Option<PathBuf>,

    /// Seconds to wait between replayed ticks
    #[arg(long, default_value_t = 0)]
    tick_interval_secs: u64,

    /// Run the built-in demo scenario
    #[arg(long)]
    demo: bool,
}

fn setup_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let args = Args::parse();
    let config = ValidationConfig::from_env();

    tracing::info!("Live validation protocol starting");
    tracing::info!(
        "  Confidence threshold: {:.0}% | Max concurrent: {} | Ceiling: {}h",
        config.confidence_threshold,
        config.max_concurrent_validations,
        config.max_validation_duration_hours
    );

    let database_url = args
        .database_url
        .clone()
        .or_else(|| std::env::var("DATABASE_URL").ok());

    let (store_handle, store_rx) = StoreHandle::channel();

    // The tracker is the single writer; everything else goes through this lock
    let tracker = match &database_url {
        Some(url) => {
            let store = PostgresStore::new(url).await?;
            let completed = store.load_closed_trades().await?;
            tokio::spawn(store.run(store_rx));
            TradeTracker::with_completed(config, completed)
        }
        None => {
            tracing::info!("No database configured, persisting in memory only");
            let _writer = MemoryStore::new().spawn_writer(store_rx);
            TradeTracker::new(config)
        }
    };

    let tracker = Arc::new(Mutex::new(tracker));
    {
        let mut guard = tracker.lock().expect("tracker lock poisoned");
        guard.attach_store(store_handle);
    }

    if args.demo || (args.signals.is_none() && args.ticks.is_none()) {
        run_demo(&tracker);
    } else {
        if let Some(path) = &args.signals {
            submit_signals_file(&tracker, path)?;
        }
        if let Some(path) = &args.ticks {
            replay_ticks_file(&tracker, path, args.tick_interval_secs).await?;
        }
    }

    let report = {
        let guard = tracker.lock().expect("tracker lock poisoned");
        ValidationReport::from_tracker(&guard)
    };
    report.print_dashboard();

    // Let the store writer drain before exiting
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    Ok(())
}

/// Admit every submission in a JSON array file
fn submit_signals_file(tracker: &Arc<Mutex<TradeTracker>>, path: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(path)?;
    let submissions: Vec<SignalSubmission> = serde_json::from_str(&raw)?;

    let mut guard = tracker.lock().expect("tracker lock poisoned");
    for submission in submissions {
        match guard.receive_signal(submission) {
            Ok(signal_id) => tracing::info!(%signal_id, "Signal admitted"),
            Err(rejection) => tracing::warn!("Signal rejected: {rejection}"),
        }
    }

    Ok(())
}

/// Replay a JSON-lines tick file against the tracker
async fn replay_ticks_file(
    tracker: &Arc<Mutex<TradeTracker>>,
    path: &Path,
    interval_secs: u64,
) -> Result<()> {
    let raw = std::fs::read_to_string(path)?;

    for line in raw.lines().filter(|l| !l.trim().is_empty()) {
        let prices: HashMap<String, f64> = serde_json::from_str(line)?;

        let closed = {
            let mut guard = tracker.lock().expect("tracker lock poisoned");
            guard.apply_price_tick(&prices)
        };
        if !closed.is_empty() {
            tracing::info!("Tick closed {} trade(s)", closed.len());
        }

        if interval_secs > 0 {
            tokio::time::sleep(std::time::Duration::from_secs(interval_secs)).await;
        }
    }

    Ok(())
}

/// Built-in scenario: three incoming signals, a few ticks, two closures
fn run_demo(tracker: &Arc<Mutex<TradeTracker>>) {
    tracing::info!("[DEMO] Simulating signal reception");

    let signals = vec![
        SignalSubmission {
            strategy_type: "carry_trade".to_string(),
            instrument: "BTC".to_string(),
            direction: Direction::Short,
            confidence: 75.0,
            entry_price: 45000.0,
            position_size: 1000.0,
            stop_loss: Some(46000.0),
            take_profit: Some(44000.0),
            max_duration_hours: None,
        },
        SignalSubmission {
            strategy_type: "liquidity_hunting".to_string(),
            instrument: "SOL".to_string(),
            direction: Direction::Long,
            confidence: 65.0,
            entry_price: 65.0,
            position_size: 800.0,
            stop_loss: Some(62.0),
            take_profit: Some(70.0),
            max_duration_hours: None,
        },
        // Confidence 55 sits below the default threshold and gets rejected
        SignalSubmission {
            strategy_type: "microstructure".to_string(),
            instrument: "ETH".to_string(),
            direction: Direction::Long,
            confidence: 55.0,
            entry_price: 2400.0,
            position_size: 600.0,
            stop_loss: Some(2350.0),
            take_profit: Some(2450.0),
            max_duration_hours: None,
        },
    ];

    let ticks: Vec<Vec<(&str, f64)>> = vec![
        vec![("BTC", 44800.0), ("SOL", 66.0), ("ETH", 2410.0)],
        vec![("BTC", 44700.0), ("SOL", 67.0), ("ETH", 2420.0)],
        vec![("BTC", 45200.0), ("SOL", 64.0), ("ETH", 2395.0)],
        // BTC spikes through its stop, SOL reaches its target
        vec![("BTC", 46500.0), ("SOL", 71.0)],
    ];

    let mut guard = tracker.lock().expect("tracker lock poisoned");

    for submission in signals {
        if let Err(rejection) = guard.receive_signal(submission) {
            tracing::warn!("[DEMO] Signal rejected: {rejection}");
        }
    }

    tracing::info!("[DEMO] Simulating market price updates");
    for (i, tick) in ticks.iter().enumerate() {
        let prices: HashMap<String, f64> =
            tick.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        let closed = guard.apply_price_tick(&prices);
        tracing::info!("[DEMO] Price update {}: {} closure(s)", i + 1, closed.len());
    }
}
