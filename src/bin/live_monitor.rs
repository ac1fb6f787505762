use anyhow::{Context, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, instrument};

use curve_scout::algo::SnapshotEngine;
use curve_scout::client::RpcClient;
use curve_scout::config::{Config, LiveConfig};
use curve_scout::core::{LaunchEvent, SignalAction};
use curve_scout::ingest::EventMonitor;
use curve_scout::strategy::{DecisionEngine, Strategy};
use curve_scout::util::display::print_signal;
use curve_scout::util::logging::init_tracing;

type SharedEngine = Arc<Mutex<DecisionEngine>>;

/// Observe one launch until the engine skips or sells, or the tick budget runs out
#[instrument(skip_all, fields(mint = %launch.mint))]
async fn watch_launch(launch: LaunchEvent, snapshots: Arc<SnapshotEngine>, engine: SharedEngine, live: LiveConfig) {
    println!("\nNEW TOKEN: {}", launch.mint);
    let poll_interval = Duration::from_millis(live.poll_interval_ms);

    for _ in 0..live.max_iterations {
        if let Some(snapshot) = snapshots.snapshot(&launch.mint, &launch.bonding_curve).await {
            let signal = {
                let mut engine = engine.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                engine.analyze(&snapshot)
            };

            print_signal(&snapshot, &signal);
            if let (SignalAction::Buy, Some(size)) = (signal.action, signal.suggested_amount) {
                println!("   Size: {} SOL", size);
            }

            if matches!(signal.action, SignalAction::Skip | SignalAction::Sell) {
                break;
            }
        }

        sleep(poll_interval).await;
    }

    println!("{}", "─".repeat(50));
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let _log_guard = init_tracing("logs", "live-monitor.log")?;

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path))?;

    let rpc = Arc::new(
        RpcClient::new(&config.rpc.url, Duration::from_millis(config.rpc.request_timeout_ms))
            .context("building RPC client")?,
    );
    let snapshots = Arc::new(SnapshotEngine::new(rpc.clone(), &config.snapshot));
    let engine: SharedEngine = Arc::new(Mutex::new(DecisionEngine::from_config(&config.strategy)));

    {
        let engine = engine.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        info!("Live monitor running {}", engine.name());
    }

    let (monitor, mut launches) = EventMonitor::new(config.monitor.clone(), rpc);
    tokio::spawn(async move {
        if let Err(e) = monitor.run().await {
            error!("Event monitor stopped: {:#}", e);
        }
    });

    let cleanup_snapshots = Arc::clone(&snapshots);
    let cleanup_engine = Arc::clone(&engine);
    let cleanup_every = Duration::from_millis(config.snapshot.cleanup_interval_ms.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cleanup_every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            cleanup_engine
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .cleanup();
            let removed = cleanup_snapshots.cleanup_history();
            info!("Periodic cleanup done, {} instruments forgotten", removed);
        }
    });

    while let Some(launch) = launches.recv().await {
        tokio::spawn(watch_launch(
            launch,
            Arc::clone(&snapshots),
            Arc::clone(&engine),
            config.live.clone(),
        ));
    }

    info!("Launch stream closed");
    Ok(())
}
