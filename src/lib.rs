// Core types and constants
pub mod core;

// Configuration
pub mod config;

// RPC and stream clients
pub mod client;

// Data ingestion: stream monitor, transaction resolution, curve decoding
pub mod ingest;

// Snapshot and momentum derivation
pub mod algo;

// Decision engines
pub mod strategy;

// Backtest orchestration and reporting
pub mod backtest;

pub mod util;

// Re-export commonly used types for convenience
pub use core::*;
pub use algo::SnapshotEngine;
pub use backtest::{BacktestOrchestrator, BacktestReport};
pub use ingest::EventMonitor;
pub use strategy::{DecisionEngine, Strategy, StrategyKind};
