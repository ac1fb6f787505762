/// Runtime configuration structures

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::core::utils::is_valid_address;
use crate::core::PUMP_FUN_PROGRAM;
use crate::strategy::{FixedHoldParams, MomentumParams};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub rpc: RpcConfig,
    pub monitor: MonitorConfig,
    pub snapshot: SnapshotConfig,
    pub backtest: BacktestConfig,
    pub live: LiveConfig,
    pub debug: DebugConfig,
    pub strategy: StrategyConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcConfig {
    pub url: String,
    /// Applies to every HTTP call, including transaction fetches
    pub request_timeout_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "https://api.mainnet-beta.solana.com".to_string(),
            request_timeout_ms: 8_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub ws_url: String,
    pub program_id: String,
    pub connect_timeout_ms: u64,
    pub reconnect_delay_ms: u64,
    pub heartbeat_interval_ms: u64,
    /// Print the full account set of every detected launch
    pub log_launches: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            ws_url: "wss://api.mainnet-beta.solana.com/".to_string(),
            program_id: PUMP_FUN_PROGRAM.to_string(),
            connect_timeout_ms: 30_000,
            reconnect_delay_ms: 1_000,
            heartbeat_interval_ms: 30_000,
            log_launches: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Points considered for velocity/acceleration
    pub velocity_window_ms: i64,
    /// Points kept per instrument before the sweep discards them
    pub retention_ms: i64,
    pub cleanup_interval_ms: u64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            velocity_window_ms: 10_000,
            retention_ms: 60_000,
            cleanup_interval_ms: 300_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub target_trades: usize,
    pub max_concurrent: usize,
    pub max_iterations: usize,
    pub poll_interval_ms: u64,
    pub retry_delay_ms: u64,
    pub investment_amounts: Vec<f64>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            target_trades: 5,
            max_concurrent: 5,
            max_iterations: 240,
            poll_interval_ms: 1_000,
            retry_delay_ms: 500,
            investment_amounts: vec![10.0, 20.0, 30.0, 40.0, 50.0, 100.0, 300.0, 500.0],
        }
    }
}

/// Per-launch observation loop of the live monitor
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LiveConfig {
    pub max_iterations: usize,
    pub poll_interval_ms: u64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            max_iterations: 120,
            poll_interval_ms: 500,
        }
    }
}

/// Single-token momentum trace run by `debug-momentum`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DebugConfig {
    pub max_iterations: usize,
    pub poll_interval_ms: u64,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            max_iterations: 60,
            poll_interval_ms: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// "naive"/"fixed_hold" or "momentum"
    pub name: String,
    pub log_skips: bool,
    pub fixed_hold: FixedHoldParams,
    pub momentum: MomentumParams,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            name: "momentum".to_string(),
            log_skips: false,
            fixed_hold: FixedHoldParams::default(),
            momentum: MomentumParams::default(),
        }
    }
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Load `path` if it exists, otherwise start from defaults. Endpoint
    /// environment overrides are applied either way.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            info!("Loading configuration from {}", path.display());
            Self::load_from_file(path)?
        } else {
            warn!("Config file {} not found, using defaults", path.display());
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        if !is_valid_address(&config.monitor.program_id) {
            warn!("Program id {} is not a valid address", config.monitor.program_id);
        }
        Ok(config)
    }

    /// `MAIN_RPC` and `MAIN_WSS` replace the configured endpoints
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(rpc) = lookup("MAIN_RPC").filter(|v| !v.is_empty()) {
            self.rpc.url = rpc;
        }
        if let Some(wss) = lookup("MAIN_WSS").filter(|v| !v.is_empty()) {
            self.monitor.ws_url = wss;
        }
    }
}
