use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decoded bonding-curve account state, scaled to whole tokens and SOL
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveState {
    pub virtual_token_reserves: f64,
    pub virtual_sol_reserves: f64,
    pub real_token_reserves: f64,
    pub real_sol_reserves: f64,
    pub total_supply: f64,
    /// SOL per whole token
    pub price_in_sol: f64,
    pub market_cap_sol: f64,
    /// Share of the initial real token reserves already sold (0-100)
    pub bonding_progress: f64,
}

impl CurveState {
    /// SOL actually deposited in the curve
    pub fn sol_in_curve(&self) -> f64 {
        self.real_sol_reserves
    }
}

/// Finite-difference metrics over the recent history of one instrument
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Momentum {
    /// SOL per token per second
    pub price_velocity: f64,
    /// SOL per token per second squared
    pub price_acceleration: f64,
    /// SOL entering the curve per second
    pub sol_inflow_velocity: f64,
}

/// One point-in-time observation handed to a decision engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub mint: String,
    pub bonding_curve: String,
    pub timestamp: DateTime<Utc>,

    pub price_in_sol: f64,
    pub sol_in_curve: f64,
    pub bonding_progress: f64,
    pub market_cap_sol: f64,
    pub total_supply: f64,
    pub virtual_token_reserves: f64,
    pub virtual_sol_reserves: f64,
    pub real_token_reserves: f64,
    pub real_sol_reserves: f64,

    pub momentum: Momentum,
}

impl MarketSnapshot {
    pub fn from_curve(
        mint: &str,
        bonding_curve: &str,
        curve: &CurveState,
        momentum: Momentum,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            mint: mint.to_string(),
            bonding_curve: bonding_curve.to_string(),
            timestamp,
            price_in_sol: curve.price_in_sol,
            sol_in_curve: curve.sol_in_curve(),
            bonding_progress: curve.bonding_progress,
            market_cap_sol: curve.market_cap_sol,
            total_supply: curve.total_supply,
            virtual_token_reserves: curve.virtual_token_reserves,
            virtual_sol_reserves: curve.virtual_sol_reserves,
            real_token_reserves: curve.real_token_reserves,
            real_sol_reserves: curve.real_sol_reserves,
            momentum,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalAction {
    Buy,
    Hold,
    Sell,
    Skip,
}

impl fmt::Display for SignalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SignalAction::Buy => "BUY",
            SignalAction::Hold => "HOLD",
            SignalAction::Sell => "SELL",
            SignalAction::Skip => "SKIP",
        };
        write!(f, "{}", label)
    }
}

/// Advisory output of a decision engine for one snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub action: SignalAction,
    pub reason: String,
    /// Position size in SOL, only set on BUY
    pub suggested_amount: Option<f64>,
}

impl TradeSignal {
    pub fn buy(reason: impl Into<String>, amount: f64) -> Self {
        Self { action: SignalAction::Buy, reason: reason.into(), suggested_amount: Some(amount) }
    }

    pub fn hold(reason: impl Into<String>) -> Self {
        Self { action: SignalAction::Hold, reason: reason.into(), suggested_amount: None }
    }

    pub fn sell(reason: impl Into<String>) -> Self {
        Self { action: SignalAction::Sell, reason: reason.into(), suggested_amount: None }
    }

    pub fn skip(reason: impl Into<String>) -> Self {
        Self { action: SignalAction::Skip, reason: reason.into(), suggested_amount: None }
    }
}

/// Launch notification emitted by the event monitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchEvent {
    pub mint: String,
    pub bonding_curve: String,
    pub timestamp: DateTime<Utc>,
}

/// Every account resolved from a create transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchDetails {
    pub mint: String,
    pub mint_authority: Option<String>,
    pub bonding_curve: String,
    pub associated_bonding_curve: Option<String>,
    pub global: Option<String>,
    pub metadata: Option<String>,
    pub creator: Option<String>,
    pub signature: String,
    pub timestamp: DateTime<Utc>,
}

impl LaunchDetails {
    pub fn to_event(&self) -> LaunchEvent {
        LaunchEvent {
            mint: self.mint.clone(),
            bonding_curve: self.bonding_curve.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// A closed position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub mint: String,
    pub buy_price: f64,
    pub sell_price: f64,
    pub buy_time: DateTime<Utc>,
    pub sell_time: DateTime<Utc>,
    pub duration_ms: i64,
    pub pnl: f64,
    pub pnl_percent: f64,
    pub exit_reason: String,
    /// Liquidity at entry
    pub sol_in_curve: f64,
    /// Bonding progress at entry
    pub bonding_progress: f64,
}

impl Trade {
    pub fn is_win(&self) -> bool {
        self.pnl_percent >= 0.0
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_ms as f64 / 1000.0
    }
}
