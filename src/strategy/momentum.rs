use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use super::{pnl_percent, Strategy};
use crate::core::{MarketSnapshot, TradeSignal};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MomentumParams {
    pub min_sol_in_curve: f64,
    pub max_bonding_progress: f64,
    pub min_hold_ms: i64,
    pub max_hold_ms: i64,
    pub neg_ticks_required: u32,
    /// Exit once velocity falls below this fraction of the initial burst
    pub velocity_fade_threshold: f64,
    /// Trailing stop, in percentage points below peak PnL
    pub peak_drawdown_percent: f64,
    pub min_tick_interval_ms: i64,
    pub suggested_amount_sol: f64,
    pub stale_after_ms: i64,
}

impl Default for MomentumParams {
    fn default() -> Self {
        Self {
            min_sol_in_curve: 5.0,
            max_bonding_progress: 20.0,
            min_hold_ms: 5_000,
            max_hold_ms: 30_000,
            neg_ticks_required: 5,
            velocity_fade_threshold: 0.5,
            peak_drawdown_percent: 15.0,
            min_tick_interval_ms: 30,
            suggested_amount_sol: 0.1,
            stale_after_ms: 60_000,
        }
    }
}

/// Outcome of one tick against an open position
#[derive(Debug, Clone, PartialEq)]
enum Tick {
    Hold(String),
    Exit(String),
}

#[derive(Debug, Clone, PartialEq)]
struct TrackedPosition {
    buy_price: f64,
    buy_time: DateTime<Utc>,
    prev_price: f64,
    prev_sol: f64,
    prev_timestamp: DateTime<Utc>,
    /// First nonzero tick velocity; zero until observed
    initial_velocity: f64,
    peak_pnl: f64,
    neg_ticks: u32,
}

impl TrackedPosition {
    fn open(snapshot: &MarketSnapshot) -> Self {
        Self {
            buy_price: snapshot.price_in_sol,
            buy_time: snapshot.timestamp,
            prev_price: snapshot.price_in_sol,
            prev_sol: snapshot.sol_in_curve,
            prev_timestamp: snapshot.timestamp,
            initial_velocity: 0.0,
            peak_pnl: 0.0,
            neg_ticks: 0,
        }
    }
}

/// Rides the initial buying burst and exits as soon as it stalls
#[derive(Debug, Clone)]
pub struct MomentumStrategy {
    params: MomentumParams,
    log_skips: bool,
    positions: HashMap<String, TrackedPosition>,
}

impl MomentumStrategy {
    pub fn new(params: MomentumParams, log_skips: bool) -> Self {
        Self {
            params,
            log_skips,
            positions: HashMap::new(),
        }
    }

    fn skip(&self, snapshot: &MarketSnapshot, reason: String) -> TradeSignal {
        if self.log_skips {
            info!(mint = %snapshot.mint, "SKIP: {}", reason);
        }
        TradeSignal::skip(reason)
    }

    fn evaluate_entry(&mut self, snapshot: &MarketSnapshot) -> TradeSignal {
        if snapshot.sol_in_curve < self.params.min_sol_in_curve {
            return self.skip(snapshot, format!("Low liquidity ({:.2} SOL)", snapshot.sol_in_curve));
        }

        if snapshot.bonding_progress > self.params.max_bonding_progress {
            return self.skip(snapshot, format!("Late bonding ({:.1}%)", snapshot.bonding_progress));
        }

        self.positions
            .insert(snapshot.mint.clone(), TrackedPosition::open(snapshot));

        TradeSignal::buy(
            format!(
                "Basic filters passed ({:.2} SOL, {:.1}% bonding)",
                snapshot.sol_in_curve, snapshot.bonding_progress
            ),
            self.params.suggested_amount_sol,
        )
    }

    /// Update tick state and return the first matching exit, if any
    fn evaluate_tick(params: &MomentumParams, position: &mut TrackedPosition, snapshot: &MarketSnapshot) -> Tick {
        let now = snapshot.timestamp;
        let elapsed_ms = (now - position.buy_time).num_milliseconds();

        let dt_ms = (now - position.prev_timestamp)
            .num_milliseconds()
            .max(params.min_tick_interval_ms)
            .max(1);
        let seconds = dt_ms as f64 / 1000.0;

        let price_velocity = (snapshot.price_in_sol - position.prev_price) / seconds;
        let sol_velocity = (snapshot.sol_in_curve - position.prev_sol) / seconds;

        position.prev_timestamp = now;
        position.prev_price = snapshot.price_in_sol;
        position.prev_sol = snapshot.sol_in_curve;

        if position.initial_velocity == 0.0 {
            position.initial_velocity = price_velocity;
        }

        let pnl = pnl_percent(position.buy_price, snapshot.price_in_sol);
        position.peak_pnl = position.peak_pnl.max(pnl);

        if elapsed_ms < params.min_hold_ms {
            return Tick::Hold("Min hold window".to_string());
        }

        if price_velocity < 0.0 {
            position.neg_ticks += 1;
        } else {
            position.neg_ticks = 0;
        }

        if position.neg_ticks >= params.neg_ticks_required {
            return Tick::Exit(format!("Velocity negative for {} ticks", position.neg_ticks));
        }

        if position.initial_velocity > 0.0
            && price_velocity < position.initial_velocity * params.velocity_fade_threshold
        {
            return Tick::Exit(format!(
                "Momentum fading fast ({:.3e} vs initial {:.3e})",
                price_velocity, position.initial_velocity
            ));
        }

        if sol_velocity < 0.0 {
            return Tick::Exit(format!("SOL curve draining ({:.3} SOL/s)", sol_velocity));
        }

        if pnl < position.peak_pnl - params.peak_drawdown_percent {
            return Tick::Exit(format!(
                "PnL dropped from peak ({:.1}% vs peak {:.1}%)",
                pnl, position.peak_pnl
            ));
        }

        if elapsed_ms > params.max_hold_ms {
            return Tick::Exit(format!("Timed exit after {}s", params.max_hold_ms / 1000));
        }

        Tick::Hold(format!("Velocity ok ({:.3e})", price_velocity))
    }
}

impl Strategy for MomentumStrategy {
    fn analyze(&mut self, snapshot: &MarketSnapshot) -> TradeSignal {
        let Some(position) = self.positions.get_mut(&snapshot.mint) else {
            return self.evaluate_entry(snapshot);
        };

        match Self::evaluate_tick(&self.params, position, snapshot) {
            Tick::Hold(reason) => TradeSignal::hold(reason),
            Tick::Exit(reason) => {
                debug!(mint = %snapshot.mint, "Momentum exit: {}", reason);
                self.positions.remove(&snapshot.mint);
                TradeSignal::sell(reason)
            }
        }
    }

    fn cleanup_at(&mut self, now: DateTime<Utc>) {
        let horizon = ChronoDuration::milliseconds(self.params.stale_after_ms);
        self.positions.retain(|_, position| now - position.buy_time <= horizon);
    }

    fn tracked_count(&self) -> usize {
        self.positions.len()
    }

    fn name(&self) -> &'static str {
        "MomentumStrategy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SignalAction;
    use crate::strategy::tests::snap;

    fn strategy(min_hold_ms: i64, max_hold_ms: i64) -> MomentumStrategy {
        MomentumStrategy::new(
            MomentumParams {
                min_hold_ms,
                max_hold_ms,
                ..MomentumParams::default()
            },
            false,
        )
    }

    #[test]
    fn test_entry_filters() {
        let mut s = strategy(1_000, 30_000);
        let t0 = Utc::now();

        let thin = s.analyze(&snap("m", t0, 0, 1.0, 4.9, 5.0));
        assert_eq!(thin.action, SignalAction::Skip);
        assert!(thin.reason.starts_with("Low liquidity"));

        let late = s.analyze(&snap("m", t0, 0, 1.0, 10.0, 25.0));
        assert_eq!(late.action, SignalAction::Skip);
        assert!(late.reason.starts_with("Late bonding"));
        assert_eq!(s.tracked_count(), 0);

        let buy = s.analyze(&snap("m", t0, 0, 1.0, 10.0, 5.0));
        assert_eq!(buy.action, SignalAction::Buy);
        assert_eq!(buy.suggested_amount, Some(0.1));
        assert_eq!(s.tracked_count(), 1);
    }

    #[test]
    fn test_holds_inside_min_window() {
        let mut s = strategy(1_000, 30_000);
        let t0 = Utc::now();
        s.analyze(&snap("m", t0, 0, 1.0, 10.0, 5.0));

        // A crash inside the window is ignored
        let signal = s.analyze(&snap("m", t0, 500, 0.5, 2.0, 5.0));
        assert_eq!(signal.action, SignalAction::Hold);
        assert_eq!(signal.reason, "Min hold window");
    }

    #[test]
    fn test_tick_outcomes() {
        let params = MomentumParams {
            min_hold_ms: 1_000,
            ..MomentumParams::default()
        };
        let t0 = Utc::now();
        let mut position = TrackedPosition::open(&snap("m", t0, 0, 1.0, 10.0, 5.0));

        let tick = MomentumStrategy::evaluate_tick(&params, &mut position, &snap("m", t0, 500, 1.2, 10.0, 5.0));
        assert_eq!(tick, Tick::Hold("Min hold window".to_string()));
        assert!((position.initial_velocity - 0.4).abs() < 1e-9);
        assert!((position.peak_pnl - 20.0).abs() < 1e-9);

        let tick = MomentumStrategy::evaluate_tick(&params, &mut position, &snap("m", t0, 1_500, 1.1, 10.0, 5.0));
        assert!(matches!(tick, Tick::Exit(reason) if reason.starts_with("Momentum fading fast")));
    }

    #[test]
    fn test_sells_on_fifth_negative_tick_after_hold() {
        let mut s = strategy(1_000, 30_000);
        let t0 = Utc::now();
        assert_eq!(s.analyze(&snap("m", t0, 0, 1.0, 10.0, 5.0)).action, SignalAction::Buy);

        // Initial burst is negative so the fade check stays disarmed
        assert_eq!(s.analyze(&snap("m", t0, 100, 0.999, 10.0, 5.0)).action, SignalAction::Hold);

        let ticks = [(1_100, 0.998), (1_200, 0.997), (1_300, 0.996), (1_400, 0.995)];
        for (offset, price) in ticks {
            let signal = s.analyze(&snap("m", t0, offset, price, 10.0, 5.0));
            assert_eq!(signal.action, SignalAction::Hold, "sold early at {}ms", offset);
        }

        let signal = s.analyze(&snap("m", t0, 1_500, 0.994, 10.0, 5.0));
        assert_eq!(signal.action, SignalAction::Sell);
        assert_eq!(signal.reason, "Velocity negative for 5 ticks");
        assert_eq!(s.tracked_count(), 0);
    }

    #[test]
    fn test_positive_tick_resets_negative_counter() {
        let mut s = strategy(1_000, 30_000);
        let t0 = Utc::now();
        s.analyze(&snap("m", t0, 0, 1.0, 10.0, 5.0));
        s.analyze(&snap("m", t0, 100, 0.999, 10.0, 5.0));

        let ticks = [
            (1_100, 0.998),
            (1_200, 0.997),
            (1_300, 0.996),
            (1_400, 0.995),
            (1_500, 0.996),
            (1_600, 0.995),
        ];
        for (offset, price) in ticks {
            assert_eq!(s.analyze(&snap("m", t0, offset, price, 10.0, 5.0)).action, SignalAction::Hold);
        }
        assert_eq!(s.tracked_count(), 1);
    }

    #[test]
    fn test_liquidity_flip_sells_immediately() {
        let mut s = strategy(1_000, 30_000);
        let t0 = Utc::now();
        s.analyze(&snap("m", t0, 0, 1.0, 10.0, 5.0));
        s.analyze(&snap("m", t0, 500, 1.01, 11.0, 5.0));

        let steady = s.analyze(&snap("m", t0, 1_500, 1.03, 12.0, 5.0));
        assert_eq!(steady.action, SignalAction::Hold);
        assert!(steady.reason.starts_with("Velocity ok"));

        let signal = s.analyze(&snap("m", t0, 2_500, 1.05, 11.5, 5.0));
        assert_eq!(signal.action, SignalAction::Sell);
        assert!(signal.reason.starts_with("SOL curve draining"));
        assert_eq!(s.tracked_count(), 0);
    }

    #[test]
    fn test_fading_velocity_sells() {
        let mut s = strategy(1_000, 30_000);
        let t0 = Utc::now();
        s.analyze(&snap("m", t0, 0, 1.0, 10.0, 5.0));
        s.analyze(&snap("m", t0, 500, 1.1, 11.0, 5.0));

        let signal = s.analyze(&snap("m", t0, 1_500, 1.11, 12.0, 5.0));
        assert_eq!(signal.action, SignalAction::Sell);
        assert!(signal.reason.starts_with("Momentum fading fast"));
    }

    #[test]
    fn test_trailing_stop_from_peak() {
        let params = MomentumParams {
            min_hold_ms: 1_000,
            ..MomentumParams::default()
        };
        let mut s = MomentumStrategy::new(params, true);
        let t0 = Utc::now();
        s.analyze(&snap("m", t0, 0, 1.0, 10.0, 5.0));
        s.analyze(&snap("m", t0, 100, 0.99, 10.0, 5.0));
        s.analyze(&snap("m", t0, 500, 1.5, 11.0, 5.0));

        // One negative tick, liquidity flat, pnl 25% against a 50% peak
        let signal = s.analyze(&snap("m", t0, 1_500, 1.25, 11.0, 5.0));
        assert_eq!(signal.action, SignalAction::Sell);
        assert!(signal.reason.starts_with("PnL dropped from peak"));
    }

    #[test]
    fn test_hard_timeout() {
        let mut s = strategy(1_000, 2_000);
        let t0 = Utc::now();
        s.analyze(&snap("m", t0, 0, 1.0, 10.0, 5.0));

        for (offset, price, sol) in [(500, 1.01, 11.0), (1_000, 1.02, 12.0), (1_500, 1.03, 13.0), (2_000, 1.04, 14.0)] {
            let signal = s.analyze(&snap("m", t0, offset, price, sol, 5.0));
            assert_eq!(signal.action, SignalAction::Hold, "exited early at {}ms", offset);
        }

        let signal = s.analyze(&snap("m", t0, 2_500, 1.05, 15.0, 5.0));
        assert_eq!(signal.action, SignalAction::Sell);
        assert_eq!(signal.reason, "Timed exit after 2s");
    }

    #[test]
    fn test_dt_is_floored() {
        let mut s = strategy(0, 30_000);
        let t0 = Utc::now();
        s.analyze(&snap("m", t0, 0, 1.0, 10.0, 5.0));

        // Same-instant tick divides by the floor instead of zero
        let signal = s.analyze(&snap("m", t0, 0, 1.0, 10.0, 5.0));
        assert_eq!(signal.action, SignalAction::Hold);
        assert!(signal.reason.starts_with("Velocity ok"));
    }

    #[test]
    fn test_cleanup_drops_stale_positions() {
        let mut s = strategy(1_000, 30_000);
        let t0 = Utc::now();
        s.analyze(&snap("a", t0, 0, 1.0, 10.0, 5.0));
        s.analyze(&snap("b", t0, 30_000, 1.0, 10.0, 5.0));

        s.cleanup_at(t0 + ChronoDuration::milliseconds(70_000));
        assert_eq!(s.tracked_count(), 1);
        s.cleanup_at(t0 + ChronoDuration::milliseconds(100_000));
        assert_eq!(s.tracked_count(), 0);
    }
}
