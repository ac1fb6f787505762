/// Display utilities for terminal output

use chrono::Utc;
use colored::Colorize;

use crate::core::utils::shorten_pubkey;
use crate::core::{LaunchDetails, MarketSnapshot, SignalAction, Trade, TradeSignal};

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn optional(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

pub fn print_launch_details(details: &LaunchDetails) {
    println!("\n{} {}", "🆕", "NEW LAUNCH".bold().green());
    println!("{}", "=".repeat(70));
    println!("   Mint:                     {}", details.mint.bold());
    println!("   Bonding Curve:            {}", details.bonding_curve);
    println!("   Associated Bonding Curve: {}", optional(&details.associated_bonding_curve));
    println!("   Mint Authority:           {}", optional(&details.mint_authority));
    println!("   Global:                   {}", optional(&details.global));
    println!("   Metadata:                 {}", optional(&details.metadata));
    println!("   Creator:                  {}", optional(&details.creator));
    println!("   Signature:                {}", details.signature.dimmed());
    println!("   Solscan: https://solscan.io/tx/{}", details.signature);
    println!("{}", "=".repeat(70));
}

pub fn print_buy_notice(buy_number: usize, snapshot: &MarketSnapshot) {
    println!("[{}] {}", timestamp(), format!("BUY #{}", buy_number).green().bold());
    println!("  Token: {}", snapshot.mint);
    println!("  Price: {:.12} SOL", snapshot.price_in_sol);
    println!("  Curve: {:.2} SOL", snapshot.sol_in_curve);
    println!("  Bonding: {:.1}%\n", snapshot.bonding_progress);
}

pub fn print_sell_notice(trade: &Trade, completed: usize, target: usize) {
    let header = if trade.is_win() {
        format!("SELL - PROFIT ({}/{})", completed, target).green().bold()
    } else {
        format!("SELL - LOSS ({}/{})", completed, target).red().bold()
    };
    let sign = if trade.is_win() { "+" } else { "" };

    println!("[{}] {}", timestamp(), header);
    println!("  Token: {}", trade.mint);
    println!("  P&L: {}{:.2}%", sign, trade.pnl_percent);
    println!("  Duration: {:.0}s", trade.duration_secs());
    println!("  Reason: {}\n", trade.exit_reason);
}

/// One line per signal for the live monitor
pub fn print_signal(snapshot: &MarketSnapshot, signal: &TradeSignal) {
    let action = match signal.action {
        SignalAction::Buy => signal.action.to_string().green().bold(),
        SignalAction::Sell => signal.action.to_string().red().bold(),
        SignalAction::Hold => signal.action.to_string().yellow(),
        SignalAction::Skip => signal.action.to_string().dimmed(),
    };

    println!(
        "[{}] {} {:<6} {:.12} SOL | {:>7.2} SOL | {:>5.1}% | v={:+.3e} | {}",
        timestamp(),
        shorten_pubkey(&snapshot.mint),
        action,
        snapshot.price_in_sol,
        snapshot.sol_in_curve,
        snapshot.bonding_progress,
        snapshot.momentum.price_velocity,
        signal.reason
    );
}
