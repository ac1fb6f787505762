/// Per-instrument polling and momentum derivation

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::client::rpc::AccountSource;
use crate::config::SnapshotConfig;
use crate::core::{CurveState, MarketSnapshot, Momentum};
use crate::ingest::curve_decoder::decode_curve_state;
use crate::util::time_series::{HistoryPoint, SlidingWindow};

fn seconds_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    (later - earlier).num_milliseconds() as f64 / 1000.0
}

/// Velocity, acceleration and inflow from the trailing points (oldest first)
pub fn calculate_momentum(history: &[HistoryPoint]) -> Momentum {
    if history.len() < 2 {
        return Momentum::default();
    }

    let latest = history[history.len() - 1];
    let prev = history[history.len() - 2];

    let dt = seconds_between(prev.timestamp, latest.timestamp);
    if dt <= 0.0 {
        return Momentum::default();
    }

    let price_velocity = (latest.price_in_sol - prev.price_in_sol) / dt;
    let sol_inflow_velocity = (latest.sol_in_curve - prev.sol_in_curve) / dt;

    let mut price_acceleration = 0.0;
    if history.len() >= 3 {
        let prev2 = history[history.len() - 3];
        let dt2 = seconds_between(prev2.timestamp, prev.timestamp);
        if dt2 > 0.0 {
            let prev_velocity = (prev.price_in_sol - prev2.price_in_sol) / dt2;
            price_acceleration = (price_velocity - prev_velocity) / dt;
        }
    }

    Momentum {
        price_velocity,
        price_acceleration,
        sol_inflow_velocity,
    }
}

/// Turns bonding-curve polls into snapshots carrying momentum metrics
pub struct SnapshotEngine {
    accounts: Arc<dyn AccountSource>,
    history: DashMap<String, SlidingWindow>,
    velocity_window: ChronoDuration,
    retention: ChronoDuration,
}

impl SnapshotEngine {
    pub fn new(accounts: Arc<dyn AccountSource>, config: &SnapshotConfig) -> Self {
        Self {
            accounts,
            history: DashMap::new(),
            velocity_window: ChronoDuration::milliseconds(config.velocity_window_ms),
            retention: ChronoDuration::milliseconds(config.retention_ms),
        }
    }

    /// Poll the curve account once. `None` means "not ready this tick".
    pub async fn snapshot(&self, mint: &str, bonding_curve: &str) -> Option<MarketSnapshot> {
        let data = match self.accounts.fetch_account_data(bonding_curve).await {
            Ok(Some(data)) => data,
            Ok(None) => {
                debug!(mint, "Curve account not available yet");
                return None;
            }
            Err(e) => {
                warn!(error = %e, mint, "Account fetch failed");
                return None;
            }
        };

        match decode_curve_state(&data) {
            Ok(state) => Some(self.record(mint, bonding_curve, &state, Utc::now())),
            Err(e) => {
                debug!(error = %e, mint, "Curve not decodable yet");
                None
            }
        }
    }

    /// Append an observation taken at `at` and build the snapshot for it
    pub fn record(&self, mint: &str, bonding_curve: &str, state: &CurveState, at: DateTime<Utc>) -> MarketSnapshot {
        let mut window = self
            .history
            .entry(mint.to_string())
            .or_insert_with(|| SlidingWindow::new(self.retention));

        window.add_point(HistoryPoint {
            price_in_sol: state.price_in_sol,
            sol_in_curve: state.sol_in_curve(),
            timestamp: at,
        });

        let recent = window.recent(self.velocity_window, at);
        drop(window);

        let momentum = calculate_momentum(&recent);
        MarketSnapshot::from_curve(mint, bonding_curve, state, momentum, at)
    }

    /// Periodic sweep over instruments that are no longer polled
    pub fn cleanup_history(&self) -> usize {
        self.cleanup_history_at(Utc::now())
    }

    /// Drop points past retention and forget empty instruments; returns how many were forgotten
    pub fn cleanup_history_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.history.len();
        self.history.retain(|_, window| {
            window.cleanup_old_events(now);
            !window.is_empty()
        });
        let removed = before.saturating_sub(self.history.len());
        if removed > 0 {
            debug!("Snapshot history cleanup removed {} instruments", removed);
        }
        removed
    }

    pub fn history_len(&self, mint: &str) -> usize {
        self.history.get(mint).map(|w| w.len()).unwrap_or(0)
    }

    pub fn tracked_instruments(&self) -> usize {
        self.history.len()
    }
}
