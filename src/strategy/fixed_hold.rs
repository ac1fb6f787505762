/// Fixed-hold strategy
///
/// Entry: minimum SOL in the curve and maximum bonding progress.
/// Exit: nothing happens until the hold duration has passed. After that,
/// any loss is cut and a gain at or above the take-profit level is taken.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use super::{pnl_percent, Strategy};
use crate::core::{MarketSnapshot, TradeSignal};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FixedHoldParams {
    pub min_sol_in_curve: f64,
    pub max_bonding_progress: f64,
    pub hold_duration_ms: i64,
    pub take_profit_percent: f64,
    pub suggested_amount_sol: f64,
    pub stale_after_ms: i64,
}

impl Default for FixedHoldParams {
    fn default() -> Self {
        Self {
            min_sol_in_curve: 3.0,
            max_bonding_progress: 50.0,
            hold_duration_ms: 30_000,
            take_profit_percent: 30.0,
            suggested_amount_sol: 0.1,
            stale_after_ms: 300_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Position {
    buy_price: f64,
    buy_time: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct FixedHoldStrategy {
    params: FixedHoldParams,
    positions: HashMap<String, Position>,
}

impl FixedHoldStrategy {
    pub fn new(params: FixedHoldParams) -> Self {
        Self {
            params,
            positions: HashMap::new(),
        }
    }

    fn evaluate_entry(&mut self, snapshot: &MarketSnapshot) -> TradeSignal {
        if snapshot.sol_in_curve < self.params.min_sol_in_curve {
            return TradeSignal::skip(format!("Low liquidity ({:.2} SOL)", snapshot.sol_in_curve));
        }

        if snapshot.bonding_progress > self.params.max_bonding_progress {
            return TradeSignal::skip(format!("Too late ({:.1}% bonding)", snapshot.bonding_progress));
        }

        self.positions.insert(
            snapshot.mint.clone(),
            Position {
                buy_price: snapshot.price_in_sol,
                buy_time: snapshot.timestamp,
            },
        );

        TradeSignal::buy(
            format!(
                "Passed filters ({:.2} SOL, {:.1}% bonding)",
                snapshot.sol_in_curve, snapshot.bonding_progress
            ),
            self.params.suggested_amount_sol,
        )
    }
}

impl Strategy for FixedHoldStrategy {
    fn analyze(&mut self, snapshot: &MarketSnapshot) -> TradeSignal {
        let Some(position) = self.positions.get(&snapshot.mint).cloned() else {
            return self.evaluate_entry(snapshot);
        };

        let elapsed_ms = (snapshot.timestamp - position.buy_time).num_milliseconds();
        let hold_ms = self.params.hold_duration_ms;

        if elapsed_ms < hold_ms {
            let remaining = (hold_ms - elapsed_ms) as f64 / 1000.0;
            return TradeSignal::hold(format!("Holding... {:.0}s remaining", remaining));
        }

        let pnl = pnl_percent(position.buy_price, snapshot.price_in_sol);

        if pnl < 0.0 {
            self.positions.remove(&snapshot.mint);
            return TradeSignal::sell(format!(
                "Price down {:.1}% after {}s - cut loss",
                pnl,
                hold_ms / 1000
            ));
        }

        if pnl >= self.params.take_profit_percent {
            self.positions.remove(&snapshot.mint);
            return TradeSignal::sell(format!("Take profit at +{:.1}%", pnl));
        }

        TradeSignal::hold(format!(
            "Up {:.1}%, waiting for {:.0}%+ or reversal",
            pnl, self.params.take_profit_percent
        ))
    }

    fn cleanup_at(&mut self, now: DateTime<Utc>) {
        let cutoff = now - ChronoDuration::milliseconds(self.params.stale_after_ms);
        let before = self.positions.len();
        self.positions.retain(|_, position| position.buy_time >= cutoff);
        debug!("Fixed-hold cleanup dropped {} positions", before - self.positions.len());
    }

    fn tracked_count(&self) -> usize {
        self.positions.len()
    }

    fn name(&self) -> &'static str {
        "FixedHoldStrategy"
    }
}
