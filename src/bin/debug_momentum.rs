use anyhow::{Context, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{error, info};

use curve_scout::algo::SnapshotEngine;
use curve_scout::client::RpcClient;
use curve_scout::config::{Config, DebugConfig};
use curve_scout::core::{LaunchEvent, SignalAction};
use curve_scout::ingest::EventMonitor;
use curve_scout::strategy::{DecisionEngine, Strategy, StrategyKind};
use curve_scout::util::logging::init_tracing;

/// Trace the momentum engine tick by tick; reports the sell reason, if any
async fn trace_launch(
    launch: LaunchEvent,
    snapshots: Arc<SnapshotEngine>,
    engine: Arc<Mutex<DecisionEngine>>,
    debug: DebugConfig,
    sold: mpsc::UnboundedSender<String>,
) {
    println!("\nTOKEN: {}", launch.mint);
    let poll_interval = Duration::from_millis(debug.poll_interval_ms);

    for _ in 0..debug.max_iterations {
        let Some(snapshot) = snapshots.snapshot(&launch.mint, &launch.bonding_curve).await else {
            sleep(poll_interval).await;
            continue;
        };

        let signal = engine
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .analyze(&snapshot);

        match signal.action {
            SignalAction::Skip => {
                println!("SKIP: {}\n", signal.reason);
                return;
            }
            SignalAction::Buy => println!("BUY: {}", signal.reason),
            SignalAction::Hold => println!("v={:.8} | {}", snapshot.momentum.price_velocity, signal.reason),
            SignalAction::Sell => {
                println!("SELL: {}\n", signal.reason);
                let _ = sold.send(launch.mint.clone());
                return;
            }
        }

        sleep(poll_interval).await;
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let _log_guard = init_tracing("logs", "debug-momentum.log")?;

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path))?;

    let rpc = Arc::new(
        RpcClient::new(&config.rpc.url, Duration::from_millis(config.rpc.request_timeout_ms))
            .context("building RPC client")?,
    );
    let snapshots = Arc::new(SnapshotEngine::new(rpc.clone(), &config.snapshot));
    let engine = Arc::new(Mutex::new(DecisionEngine::new(StrategyKind::Momentum, &config.strategy)));
    info!(
        "Tracing {} every {}ms",
        StrategyKind::Momentum,
        config.debug.poll_interval_ms
    );

    let (monitor, mut launches) = EventMonitor::new(config.monitor.clone(), rpc);
    tokio::spawn(async move {
        if let Err(e) = monitor.run().await {
            error!("Event monitor stopped: {:#}", e);
        }
    });

    let (sold_tx, mut sold_rx) = mpsc::unbounded_channel();

    loop {
        tokio::select! {
            launch = launches.recv() => {
                let Some(launch) = launch else {
                    info!("Launch stream closed");
                    return Ok(());
                };
                tokio::spawn(trace_launch(
                    launch,
                    Arc::clone(&snapshots),
                    Arc::clone(&engine),
                    config.debug.clone(),
                    sold_tx.clone(),
                ));
            }
            Some(mint) = sold_rx.recv() => {
                info!(mint = %mint, "First exit observed, stopping");
                return Ok(());
            }
        }
    }
}
