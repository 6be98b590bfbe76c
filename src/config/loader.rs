//! Configuration Loader
//!
//! Loads and validates configuration from TOML files matching config.toml structure.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub solana: SolanaSection,
    pub venue: VenueSection,
    pub engine: EngineSection,
    pub wallets: WalletsSection,
    pub logging: LoggingSection,
}

/// Solana RPC configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct SolanaSection {
    /// RPC endpoint (use private RPC for production)
    pub rpc_url: String,
    /// Commitment level: "processed", "confirmed", "finalized"
    pub commitment: String,
    /// Seconds between signature polls per watched wallet
    pub poll_interval_secs: u64,
}

impl SolanaSection {
    /// Get RPC URL with environment variable override
    /// Checks SOLANA_RPC_URL env var first, falls back to config value
    pub fn get_rpc_url(&self) -> String {
        std::env::var("SOLANA_RPC_URL").unwrap_or_else(|_| self.rpc_url.clone())
    }
}

/// Venue (swap quoting API) configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct VenueSection {
    /// Trade-local endpoint URL
    pub api_url: String,
    /// Liquidity pool to route through ("pump", "raydium", "auto")
    pub pool: String,
    /// Priority fee attached to every trade, in SOL
    pub priority_fee: f64,
    /// HTTP request timeout in seconds
    pub timeout_secs: u64,
}

/// Replication engine configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    /// Slippage tolerance for replicated trades, in percent
    pub default_slippage: f64,
    /// Per-step amount deduction on venue rejection (0.0005 = 0.05%)
    pub deduction_step: f64,
    /// Cumulative deduction cap (0.005 = 0.5%)
    pub max_deduction: f64,
    /// Pause between swap retry attempts, in milliseconds
    pub retry_pause_ms: u64,
    /// Minimum effective sizing amount, in SOL
    pub dust_threshold: f64,
    /// Buy amount under the venue-default sizing policy, in SOL
    pub venue_default_amount: f64,
    /// Bounded event channel capacity
    pub event_queue_size: usize,
    /// Seconds between tracking-registry rebuild passes
    pub rebuild_interval_secs: u64,
    /// Seconds between TP/SL price sweeps
    pub price_check_interval_secs: u64,
    /// Directory for persisted records, positions and subscriptions
    pub data_dir: String,
}

/// Wallet custody configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct WalletsSection {
    /// Path to the follower key directory file (NEVER commit this file!)
    pub keys_path: String,
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.solana.rpc_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "rpc_url cannot be empty".to_string(),
            ));
        }

        match self.solana.commitment.as_str() {
            "processed" | "confirmed" | "finalized" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "commitment must be processed/confirmed/finalized, got {}",
                    other
                )));
            }
        }

        if self.solana.poll_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "poll_interval_secs must be > 0".to_string(),
            ));
        }

        if self.venue.api_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "api_url cannot be empty".to_string(),
            ));
        }

        if self.venue.priority_fee < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "priority_fee must be >= 0, got {}",
                self.venue.priority_fee
            )));
        }

        if self.engine.default_slippage <= 0.0 || self.engine.default_slippage > 100.0 {
            return Err(ConfigError::ValidationError(format!(
                "default_slippage must be in (0, 100], got {}",
                self.engine.default_slippage
            )));
        }

        if self.engine.deduction_step <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "deduction_step must be > 0, got {}",
                self.engine.deduction_step
            )));
        }

        if self.engine.max_deduction < self.engine.deduction_step {
            return Err(ConfigError::ValidationError(format!(
                "max_deduction {} must be >= deduction_step {}",
                self.engine.max_deduction, self.engine.deduction_step
            )));
        }

        if self.engine.venue_default_amount <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "venue_default_amount must be > 0, got {}",
                self.engine.venue_default_amount
            )));
        }

        if self.engine.event_queue_size == 0 {
            return Err(ConfigError::ValidationError(
                "event_queue_size must be > 0".to_string(),
            ));
        }

        if self.engine.data_dir.is_empty() {
            return Err(ConfigError::ValidationError(
                "data_dir cannot be empty".to_string(),
            ));
        }

        if self.wallets.keys_path.is_empty() {
            return Err(ConfigError::ValidationError(
                "keys_path cannot be empty".to_string(),
            ));
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "logging level must be trace/debug/info/warn/error, got {}",
                    other
                )));
            }
        }

        Ok(())
    }
}
