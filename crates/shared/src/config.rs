//! Application configuration management.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Scheduled reconciliation configuration.
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    /// Ledger rule configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Log output configuration.
    #[serde(default)]
    pub log: LogConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Scheduled reconciliation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileConfig {
    /// Whether the server runs the periodic drift check.
    #[serde(default)]
    pub enabled: bool,
    /// Seconds between runs.
    #[serde(default = "default_reconcile_interval")]
    pub interval_secs: u64,
    /// Repair drift automatically after each check.
    #[serde(default)]
    pub auto_fix: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_reconcile_interval(),
            auto_fix: false,
        }
    }
}

fn default_reconcile_interval() -> u64 {
    3600 // 1 hour
}

/// Ledger rule configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Largest debit/credit difference still treated as balanced.
    #[serde(default = "default_balance_tolerance")]
    pub balance_tolerance: Decimal,
    /// Deepest allowed chart-of-accounts nesting.
    #[serde(default = "default_max_hierarchy_depth")]
    pub max_hierarchy_depth: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            balance_tolerance: default_balance_tolerance(),
            max_hierarchy_depth: default_max_hierarchy_depth(),
        }
    }
}

fn default_balance_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

fn default_max_hierarchy_depth() -> u32 {
    5
}

/// Log output configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("LEDGERLINE").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
