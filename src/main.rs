use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use curve_scout::algo::SnapshotEngine;
use curve_scout::backtest::{render_report, BacktestOrchestrator};
use curve_scout::client::RpcClient;
use curve_scout::config::Config;
use curve_scout::ingest::EventMonitor;
use curve_scout::strategy::StrategyKind;
use curve_scout::util::logging::init_tracing;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let _log_guard = init_tracing("logs", "curve-scout.log")?;

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path))?;

    let kind = StrategyKind::from_name(&config.strategy.name);
    info!("Curve Scout backtest");
    info!("Analyzing {}...", kind);
    info!(
        "Target: {} trades | Max concurrent: {}",
        config.backtest.target_trades, config.backtest.max_concurrent
    );

    let rpc = Arc::new(
        RpcClient::new(&config.rpc.url, Duration::from_millis(config.rpc.request_timeout_ms))
            .context("building RPC client")?,
    );

    let snapshots = Arc::new(SnapshotEngine::new(rpc.clone(), &config.snapshot));
    let (monitor, launches) = EventMonitor::new(config.monitor.clone(), rpc);

    tokio::spawn(async move {
        if let Err(e) = monitor.run().await {
            error!("Event monitor stopped: {:#}", e);
        }
    });

    let cleanup_snapshots = Arc::clone(&snapshots);
    let cleanup_every = Duration::from_millis(config.snapshot.cleanup_interval_ms.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cleanup_every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            cleanup_snapshots.cleanup_history();
        }
    });

    let orchestrator = Arc::new(BacktestOrchestrator::new(
        config.backtest.clone(),
        kind,
        config.strategy.clone(),
        snapshots,
    ));

    let report = orchestrator.run(launches).await;
    println!("{}", render_report(&report));

    info!("Backtest complete with {} trades", report.trades.len());
    drop(_log_guard);
    std::process::exit(0);
}
