/// Backtest performance statistics and console report

use std::fmt::Write as _;

use crate::core::Trade;

/// Percent-PnL buckets: lower bound exclusive, upper bound inclusive
pub const PNL_BUCKETS: [(f64, f64, &str); 7] = [
    (f64::NEG_INFINITY, -20.0, "< -20%"),
    (-20.0, -10.0, "-20% to -10%"),
    (-10.0, 0.0, "-10% to 0%"),
    (0.0, 10.0, "0% to +10%"),
    (10.0, 20.0, "+10% to +20%"),
    (20.0, 30.0, "+20% to +30%"),
    (30.0, f64::INFINITY, "> +30%"),
];

const HISTOGRAM_WIDTH: f64 = 30.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceStats {
    pub total: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub total_pnl_percent: f64,
    pub avg_pnl_percent: f64,
    pub median_pnl_percent: f64,
    pub avg_win_percent: f64,
    pub avg_loss_percent: f64,
    /// |avg win| / |avg loss|; `None` without losses
    pub risk_reward: Option<f64>,
    pub best_trade_percent: f64,
    pub worst_trade_percent: f64,
    pub avg_duration_secs: f64,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

impl PerformanceStats {
    pub fn from_trades(trades: &[Trade]) -> Self {
        if trades.is_empty() {
            return Self::default();
        }

        let pnls: Vec<f64> = trades.iter().map(|t| t.pnl_percent).collect();
        let win_pnls: Vec<f64> = pnls.iter().copied().filter(|p| *p >= 0.0).collect();
        let loss_pnls: Vec<f64> = pnls.iter().copied().filter(|p| *p < 0.0).collect();

        let avg_win_percent = mean(&win_pnls);
        let avg_loss_percent = mean(&loss_pnls);
        let risk_reward = if loss_pnls.is_empty() || avg_loss_percent == 0.0 {
            None
        } else {
            Some(avg_win_percent.abs() / avg_loss_percent.abs())
        };

        let durations: Vec<f64> = trades.iter().map(|t| t.duration_secs()).collect();

        Self {
            total: trades.len(),
            wins: win_pnls.len(),
            losses: loss_pnls.len(),
            win_rate: win_pnls.len() as f64 / trades.len() as f64 * 100.0,
            total_pnl_percent: pnls.iter().sum(),
            avg_pnl_percent: mean(&pnls),
            median_pnl_percent: median(&pnls),
            avg_win_percent,
            avg_loss_percent,
            risk_reward,
            best_trade_percent: pnls.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            worst_trade_percent: pnls.iter().copied().fold(f64::INFINITY, f64::min),
            avg_duration_secs: mean(&durations),
        }
    }
}

/// Outcome of replaying the trades with one starting balance
#[derive(Debug, Clone, PartialEq)]
pub struct InvestmentResult {
    pub amount: f64,
    pub total_profit: f64,
    pub final_balance: f64,
    pub roi_percent: f64,
    pub best_trade: f64,
    pub worst_trade: f64,
}

impl InvestmentResult {
    /// Equal position sizing: every trade risks `amount / target_trades`
    pub fn simulate(amount: f64, trades: &[Trade], target_trades: usize) -> Self {
        let trade_size = amount / target_trades.max(1) as f64;
        let mut balance = amount;
        let mut best_trade = 0.0_f64;
        let mut worst_trade = 0.0_f64;

        for trade in trades {
            let profit = trade_size * (trade.pnl_percent / 100.0);
            balance += profit;
            best_trade = best_trade.max(profit);
            worst_trade = worst_trade.min(profit);
        }

        let total_profit = balance - amount;
        let roi_percent = if amount > 0.0 { total_profit / amount * 100.0 } else { 0.0 };

        Self {
            amount,
            total_profit,
            final_balance: balance,
            roi_percent,
            best_trade,
            worst_trade,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DistributionBucket {
    pub label: &'static str,
    pub count: usize,
    pub percent: f64,
}

pub fn pnl_distribution(trades: &[Trade]) -> Vec<DistributionBucket> {
    PNL_BUCKETS
        .iter()
        .map(|(min, max, label)| {
            let count = trades
                .iter()
                .filter(|t| t.pnl_percent > *min && t.pnl_percent <= *max)
                .count();
            let percent = if trades.is_empty() {
                0.0
            } else {
                count as f64 / trades.len() as f64 * 100.0
            };
            DistributionBucket { label, count, percent }
        })
        .collect()
}

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct BacktestReport {
    pub strategy: String,
    pub target_trades: usize,
    pub trades: Vec<Trade>,
    pub stats: PerformanceStats,
    pub investments: Vec<InvestmentResult>,
    pub distribution: Vec<DistributionBucket>,
}

impl BacktestReport {
    pub fn build(strategy: impl Into<String>, target_trades: usize, trades: Vec<Trade>, investment_amounts: &[f64]) -> Self {
        let stats = PerformanceStats::from_trades(&trades);
        let investments = investment_amounts
            .iter()
            .map(|amount| InvestmentResult::simulate(*amount, &trades, target_trades))
            .collect();
        let distribution = pnl_distribution(&trades);

        Self {
            strategy: strategy.into(),
            target_trades,
            trades,
            stats,
            investments,
            distribution,
        }
    }
}

fn signed(value: f64) -> String {
    if value >= 0.0 {
        format!("+{:.2}", value)
    } else {
        format!("{:.2}", value)
    }
}

/// Fixed-format console report
pub fn render_report(report: &BacktestReport) -> String {
    let stats = &report.stats;
    let mut out = String::new();

    let _ = writeln!(out, "\n╔════════════════════════════════════════════════════════╗");
    let _ = writeln!(out, "║                   STRATEGY ANALYSIS                    ║");
    let _ = writeln!(out, "╚════════════════════════════════════════════════════════╝\n");
    let _ = writeln!(out, "Strategy: {}\n", report.strategy);

    let _ = writeln!(out, "OVERVIEW");
    let _ = writeln!(out, "   Total Trades:       {}", stats.total);
    let _ = writeln!(out, "   Wins / Losses:      {}W / {}L", stats.wins, stats.losses);
    let _ = writeln!(out, "   Win Rate:           {:.1}%", stats.win_rate);
    let _ = writeln!(out, "   Avg Duration:       {:.0}s\n", stats.avg_duration_secs);

    let _ = writeln!(out, "PERFORMANCE METRICS");
    let _ = writeln!(out, "   Total P&L:          {}%", signed(stats.total_pnl_percent));
    let _ = writeln!(out, "   Average P&L:        {:.2}%", stats.avg_pnl_percent);
    let _ = writeln!(out, "   Median P&L:         {:.2}%", stats.median_pnl_percent);
    let _ = writeln!(out, "   Average Win:        +{:.2}%", stats.avg_win_percent);
    let _ = writeln!(out, "   Average Loss:       {:.2}%", stats.avg_loss_percent);
    if stats.total > 0 {
        let _ = writeln!(out, "   Best Trade:         {}%", signed(stats.best_trade_percent));
        let _ = writeln!(out, "   Worst Trade:        {}%", signed(stats.worst_trade_percent));
    }
    match stats.risk_reward {
        Some(ratio) => {
            let _ = writeln!(out, "   Risk/Reward Ratio:  {:.2}\n", ratio);
        }
        None => {
            let _ = writeln!(out, "   Risk/Reward Ratio:  n/a\n");
        }
    }

    let _ = writeln!(out, "INVESTMENT SCENARIOS");
    for inv in &report.investments {
        let _ = writeln!(out, "\n   Initial Investment: ${}", inv.amount);
        let profit_sign = if inv.total_profit >= 0.0 { "+" } else { "-" };
        let _ = writeln!(out, "   Total Profit/Loss:  {}${:.2}", profit_sign, inv.total_profit.abs());
        let _ = writeln!(out, "   Final Balance:      ${:.2}", inv.final_balance);
        let _ = writeln!(out, "   ROI:                {}%", signed(inv.roi_percent));
        let _ = writeln!(out, "   Best Trade:         +${:.2}", inv.best_trade);
        let _ = writeln!(out, "   Worst Trade:        -${:.2}", inv.worst_trade.abs());
    }

    let _ = writeln!(out, "\n\nTRADE DETAILS");
    let _ = writeln!(
        out,
        "   #  | Token Address                                 | Result | P&L      | Duration | Reason"
    );
    let _ = writeln!(
        out,
        "   ---|-----------------------------------------------|--------|----------|----------|------------------"
    );
    for (i, trade) in report.trades.iter().enumerate() {
        let result = if trade.is_win() { "WIN " } else { "LOSS" };
        let pnl = format!("{}%", signed(trade.pnl_percent));
        let duration = format!("{:.0}s", trade.duration_secs());
        let reason: String = trade.exit_reason.chars().take(18).collect();
        let _ = writeln!(
            out,
            "   {:>2} | {:<45} | {}   | {:>8} | {:>8} | {}",
            i + 1,
            trade.mint,
            result,
            pnl,
            duration,
            reason
        );
    }

    let _ = writeln!(out, "\n\nSTATISTICAL DISTRIBUTION");
    for bucket in &report.distribution {
        let bar_len = if stats.total > 0 {
            (bucket.count as f64 / stats.total as f64 * HISTOGRAM_WIDTH).floor() as usize
        } else {
            0
        };
        let _ = writeln!(
            out,
            "   {:<15} | {:>2} ({:>5.1}%) {}",
            bucket.label,
            bucket.count,
            bucket.percent,
            "█".repeat(bar_len)
        );
    }

    let _ = writeln!(out, "\n════════════════════════════════════════════════════════\n");
    out
}
