/// Backtest orchestrator
///
/// Admits launches up to a concurrency limit, runs one polling loop per
/// admitted instrument and finishes once the target trade count is reached
/// with no loop left running.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{debug, info, instrument};

use crate::algo::snapshot_engine::SnapshotEngine;
use crate::backtest::report::BacktestReport;
use crate::config::{BacktestConfig, StrategyConfig};
use crate::core::{LaunchEvent, MarketSnapshot, SignalAction, Trade};
use crate::strategy::{pnl_percent, DecisionEngine, Strategy, StrategyKind};
use crate::util::display::{print_buy_notice, print_sell_notice};

/// Published after every change to the shared run state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunProgress {
    pub trades: usize,
    pub active: usize,
}

impl RunProgress {
    pub fn is_complete(&self, target_trades: usize) -> bool {
        self.trades >= target_trades && self.active == 0
    }
}

#[derive(Debug, Default)]
struct RunState {
    active: HashSet<String>,
    buy_count: usize,
    trades: Vec<Trade>,
}

impl RunState {
    fn progress(&self) -> RunProgress {
        RunProgress {
            trades: self.trades.len(),
            active: self.active.len(),
        }
    }
}

/// Releases the instrument slot however the loop ends
struct SlotGuard {
    orchestrator: Arc<BacktestOrchestrator>,
    mint: String,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.orchestrator.release(&self.mint);
    }
}

pub struct BacktestOrchestrator {
    config: BacktestConfig,
    kind: StrategyKind,
    strategy_config: StrategyConfig,
    snapshots: Arc<SnapshotEngine>,
    state: Mutex<RunState>,
    progress: watch::Sender<RunProgress>,
}

impl BacktestOrchestrator {
    pub fn new(
        config: BacktestConfig,
        kind: StrategyKind,
        strategy_config: StrategyConfig,
        snapshots: Arc<SnapshotEngine>,
    ) -> Self {
        let (progress, _) = watch::channel(RunProgress::default());
        Self {
            config,
            kind,
            strategy_config,
            snapshots,
            state: Mutex::new(RunState::default()),
            progress,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn kind(&self) -> StrategyKind {
        self.kind
    }

    pub fn target_trades(&self) -> usize {
        self.config.target_trades
    }

    pub fn active_count(&self) -> usize {
        self.lock_state().active.len()
    }

    pub fn trades(&self) -> Vec<Trade> {
        self.lock_state().trades.clone()
    }

    pub fn progress(&self) -> RunProgress {
        *self.progress.borrow()
    }

    fn target_reached(&self) -> bool {
        self.lock_state().trades.len() >= self.config.target_trades
    }

    /// Admission is decided in one critical section; returns whether a loop was started
    pub fn handle_launch(self: &Arc<Self>, event: LaunchEvent) -> bool {
        {
            let mut state = self.lock_state();
            if state.trades.len() >= self.config.target_trades {
                debug!(mint = %event.mint, "Target reached, ignoring launch");
                return false;
            }
            if state.active.contains(&event.mint) {
                debug!(mint = %event.mint, "Instrument already monitored");
                return false;
            }
            if state.active.len() >= self.config.max_concurrent {
                debug!(mint = %event.mint, active = state.active.len(), "Concurrency limit reached");
                return false;
            }
            state.active.insert(event.mint.clone());
            self.progress.send_replace(state.progress());
        }

        info!(mint = %event.mint, "Monitoring new launch");
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            orchestrator.monitor_instrument(event).await;
        });
        true
    }

    fn release(&self, mint: &str) {
        let progress = {
            let mut state = self.lock_state();
            state.active.remove(mint);
            state.progress()
        };
        self.progress.send_replace(progress);

        if progress.is_complete(self.config.target_trades) {
            info!(trades = progress.trades, "Backtest target reached");
        }
    }

    fn record_buy(&self) -> usize {
        let mut state = self.lock_state();
        state.buy_count += 1;
        state.buy_count
    }

    fn record_trade(&self, trade: Trade) -> usize {
        let progress = {
            let mut state = self.lock_state();
            state.trades.push(trade);
            state.progress()
        };
        self.progress.send_replace(progress);
        progress.trades
    }

    #[instrument(skip(self), fields(mint = %event.mint))]
    async fn monitor_instrument(self: Arc<Self>, event: LaunchEvent) {
        let _slot = SlotGuard {
            orchestrator: Arc::clone(&self),
            mint: event.mint.clone(),
        };

        let mut engine = DecisionEngine::new(self.kind, &self.strategy_config);
        let mut entry: Option<MarketSnapshot> = None;
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let retry_delay = Duration::from_millis(self.config.retry_delay_ms);

        for _ in 0..self.config.max_iterations {
            if self.target_reached() {
                return;
            }

            let Some(snapshot) = self.snapshots.snapshot(&event.mint, &event.bonding_curve).await else {
                sleep(retry_delay).await;
                continue;
            };

            let signal = engine.analyze(&snapshot);
            match signal.action {
                SignalAction::Buy => {
                    let buy_number = self.record_buy();
                    print_buy_notice(buy_number, &snapshot);
                    entry = Some(snapshot);
                }
                SignalAction::Sell => {
                    if let Some(entry) = entry.take() {
                        let trade = close_trade(&entry, &snapshot, signal.reason);
                        let completed = self.record_trade(trade.clone());
                        print_sell_notice(&trade, completed, self.config.target_trades);
                    }
                    return;
                }
                SignalAction::Skip => {
                    debug!("Skipped: {}", signal.reason);
                    return;
                }
                SignalAction::Hold => {}
            }

            sleep(poll_interval).await;
        }

        debug!("Iteration cap reached without exit");
    }

    /// Resolves once the target is reached and no loop is active
    pub async fn wait_for_completion(&self) {
        let target = self.config.target_trades;
        let mut progress = self.progress.subscribe();
        let _ = progress.wait_for(|p| p.is_complete(target)).await;
    }

    async fn wait_until_idle(&self) {
        let mut progress = self.progress.subscribe();
        let _ = progress.wait_for(|p| p.active == 0).await;
    }

    /// Feed launches in arrival order until the run completes
    pub async fn run(self: &Arc<Self>, mut launches: mpsc::UnboundedReceiver<LaunchEvent>) -> BacktestReport {
        info!(
            strategy = %self.kind,
            target = self.config.target_trades,
            max_concurrent = self.config.max_concurrent,
            "Backtest started"
        );

        let mut progress = self.progress.subscribe();
        let target = self.config.target_trades;

        loop {
            tokio::select! {
                _ = progress.wait_for(|p| p.is_complete(target)) => break,
                launch = launches.recv() => match launch {
                    Some(event) => {
                        self.handle_launch(event);
                    }
                    None => {
                        info!("Launch stream closed, waiting for active loops");
                        self.wait_until_idle().await;
                        break;
                    }
                },
            }
        }

        self.report()
    }

    pub fn report(&self) -> BacktestReport {
        BacktestReport::build(
            self.kind.to_string(),
            self.config.target_trades,
            self.trades(),
            &self.config.investment_amounts,
        )
    }
}

fn close_trade(entry: &MarketSnapshot, exit: &MarketSnapshot, exit_reason: String) -> Trade {
    Trade {
        mint: exit.mint.clone(),
        buy_price: entry.price_in_sol,
        sell_price: exit.price_in_sol,
        buy_time: entry.timestamp,
        sell_time: exit.timestamp,
        duration_ms: (exit.timestamp - entry.timestamp).num_milliseconds(),
        pnl: exit.price_in_sol - entry.price_in_sol,
        pnl_percent: pnl_percent(entry.price_in_sol, exit.price_in_sol),
        exit_reason,
        sol_in_curve: entry.sol_in_curve,
        bonding_progress: entry.bonding_progress,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::rpc::{AccountSource, RpcError};
    use crate::config::SnapshotConfig;
    use crate::core::INITIAL_REAL_TOKEN_RESERVES;
    use crate::ingest::curve_decoder::tests::curve_bytes;
    use crate::strategy::FixedHoldParams;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::time::timeout;

    /// Curve whose price falls a little on every fetch
    struct FallingCurve {
        calls: AtomicU64,
    }

    #[async_trait]
    impl AccountSource for FallingCurve {
        async fn fetch_account_data(&self, _address: &str) -> Result<Option<Vec<u8>>, RpcError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(curve_bytes(
                1_000_000_000_000_000,
                30_000_000_000 - n * 10_000_000,
                INITIAL_REAL_TOKEN_RESERVES,
                10_000_000_000,
                1_000_000_000_000_000,
            )))
        }
    }

    fn orchestrator(target_trades: usize, max_concurrent: usize) -> Arc<BacktestOrchestrator> {
        let accounts = Arc::new(FallingCurve { calls: AtomicU64::new(0) });
        let snapshots = Arc::new(SnapshotEngine::new(accounts, &SnapshotConfig::default()));
        let config = BacktestConfig {
            target_trades,
            max_concurrent,
            max_iterations: 20,
            poll_interval_ms: 5,
            retry_delay_ms: 5,
            investment_amounts: vec![100.0],
        };
        let strategy = StrategyConfig {
            name: "fixed_hold".to_string(),
            fixed_hold: FixedHoldParams {
                hold_duration_ms: 0,
                ..FixedHoldParams::default()
            },
            ..StrategyConfig::default()
        };
        Arc::new(BacktestOrchestrator::new(config, StrategyKind::FixedHold, strategy, snapshots))
    }

    fn launch(mint: &str) -> LaunchEvent {
        LaunchEvent {
            mint: mint.to_string(),
            bonding_curve: format!("{}-curve", mint),
            timestamp: Utc::now(),
        }
    }

    async fn wait_idle(orchestrator: &BacktestOrchestrator) {
        timeout(Duration::from_secs(5), orchestrator.wait_until_idle())
            .await
            .expect("loop did not finish");
    }

    #[tokio::test]
    async fn test_concurrency_limit_and_completion() {
        let orch = orchestrator(2, 1);

        assert!(orch.handle_launch(launch("a")));
        assert!(!orch.handle_launch(launch("b")));
        assert!(!orch.handle_launch(launch("a")));
        assert_eq!(orch.active_count(), 1);

        wait_idle(&orch).await;
        assert_eq!(orch.trades().len(), 1);
        assert!(!orch.progress().is_complete(2));

        // Slot is free again
        assert!(orch.handle_launch(launch("b")));
        timeout(Duration::from_secs(5), orch.wait_for_completion())
            .await
            .expect("run never completed");

        let trades = orch.trades();
        assert_eq!(trades.len(), 2);
        assert_eq!(orch.active_count(), 0);
        assert!(trades.iter().all(|t| t.pnl_percent < 0.0));
        assert!(trades[0].exit_reason.contains("cut loss"));

        assert!(!orch.handle_launch(launch("c")));
    }

    #[tokio::test]
    async fn test_run_completes_with_open_stream() {
        let orch = orchestrator(1, 5);
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(launch("a")).unwrap();

        let report = timeout(Duration::from_secs(5), orch.run(rx))
            .await
            .expect("run hung");
        assert_eq!(report.trades.len(), 1);
        assert_eq!(report.stats.losses, 1);
        assert_eq!(report.investments.len(), 1);
        assert_eq!(report.strategy, "FixedHoldStrategy");
        drop(tx);
    }

    #[tokio::test]
    async fn test_run_finishes_when_stream_closes() {
        let orch = orchestrator(3, 1);
        let (tx, rx) = mpsc::unbounded_channel();
        for mint in ["a", "b", "c"] {
            tx.send(launch(mint)).unwrap();
        }
        drop(tx);

        let report = timeout(Duration::from_secs(5), orch.run(rx))
            .await
            .expect("run hung");

        // b and c arrived while a held the only slot
        assert_eq!(report.trades.len(), 1);
        assert_eq!(report.trades[0].mint, "a");
        assert_eq!(orch.active_count(), 0);
    }

    #[test]
    fn test_close_trade() {
        let t0 = Utc::now();
        let entry = crate::strategy::tests::snap("m", t0, 0, 2.0, 10.0, 5.0);
        let exit = crate::strategy::tests::snap("m", t0, 4_000, 2.5, 12.0, 6.0);
        let trade = close_trade(&entry, &exit, "Take profit".to_string());

        assert_eq!(trade.duration_ms, 4_000);
        assert!((trade.pnl_percent - 25.0).abs() < 1e-9);
        assert!((trade.pnl - 0.5).abs() < 1e-9);
        assert_eq!(trade.sol_in_curve, 10.0);
        assert_eq!(trade.bonding_progress, 5.0);
    }
}
