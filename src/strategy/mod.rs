//! Decision engines turning snapshots into advisory trade signals.
//!
//! Every engine owns its per-instrument position state. A BUY is only
//! emitted for a mint without state and every SELL removes it.

pub mod fixed_hold;
pub mod momentum;

use chrono::{DateTime, Utc};
use std::fmt;
use tracing::warn;

use crate::config::StrategyConfig;
use crate::core::{MarketSnapshot, TradeSignal};

pub use fixed_hold::{FixedHoldParams, FixedHoldStrategy};
pub use momentum::{MomentumParams, MomentumStrategy};

/// Capability shared by every decision engine
pub trait Strategy: Send {
    /// Classify one snapshot; mutates the state for `snapshot.mint`
    fn analyze(&mut self, snapshot: &MarketSnapshot) -> TradeSignal;

    /// Drop positions opened before the staleness horizon
    fn cleanup_at(&mut self, now: DateTime<Utc>);

    /// Number of instruments with open position state
    fn tracked_count(&self) -> usize;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    FixedHold,
    Momentum,
}

impl StrategyKind {
    /// Map a configured name to a kind; unknown names fall back to fixed-hold
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "naive" | "fixed" | "fixed_hold" | "fixed-hold" => StrategyKind::FixedHold,
            "momentum" => StrategyKind::Momentum,
            other => {
                warn!("Unknown strategy \"{}\", using fixed-hold", other);
                StrategyKind::FixedHold
            }
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::FixedHold => write!(f, "FixedHoldStrategy"),
            StrategyKind::Momentum => write!(f, "MomentumStrategy"),
        }
    }
}

/// Closed set of decision engines selected at construction
#[derive(Debug, Clone)]
pub enum DecisionEngine {
    FixedHold(FixedHoldStrategy),
    Momentum(MomentumStrategy),
}

impl DecisionEngine {
    pub fn new(kind: StrategyKind, config: &StrategyConfig) -> Self {
        match kind {
            StrategyKind::FixedHold => DecisionEngine::FixedHold(FixedHoldStrategy::new(config.fixed_hold.clone())),
            StrategyKind::Momentum => {
                DecisionEngine::Momentum(MomentumStrategy::new(config.momentum.clone(), config.log_skips))
            }
        }
    }

    /// Build from the configured strategy name
    pub fn from_config(config: &StrategyConfig) -> Self {
        Self::new(StrategyKind::from_name(&config.name), config)
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            DecisionEngine::FixedHold(_) => StrategyKind::FixedHold,
            DecisionEngine::Momentum(_) => StrategyKind::Momentum,
        }
    }

    /// Housekeeping against the wall clock
    pub fn cleanup(&mut self) {
        self.cleanup_at(Utc::now());
    }

    fn inner(&self) -> &dyn Strategy {
        match self {
            DecisionEngine::FixedHold(s) => s,
            DecisionEngine::Momentum(s) => s,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Strategy {
        match self {
            DecisionEngine::FixedHold(s) => s,
            DecisionEngine::Momentum(s) => s,
        }
    }
}

impl Strategy for DecisionEngine {
    fn analyze(&mut self, snapshot: &MarketSnapshot) -> TradeSignal {
        self.inner_mut().analyze(snapshot)
    }

    fn cleanup_at(&mut self, now: DateTime<Utc>) {
        self.inner_mut().cleanup_at(now)
    }

    fn tracked_count(&self) -> usize {
        self.inner().tracked_count()
    }

    fn name(&self) -> &'static str {
        self.inner().name()
    }
}

/// Percent change from entry; zero when the entry price is unusable
pub(crate) fn pnl_percent(entry_price: f64, current_price: f64) -> f64 {
    if entry_price <= 0.0 {
        return 0.0;
    }
    (current_price - entry_price) / entry_price * 100.0
}
