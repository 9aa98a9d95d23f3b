//! # Engine Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     STOCKBOOK_DB_PATH=/var/lib/stockbook/stockbook.db                  │
//! │     STOCKBOOK_MAX_CONNECTIONS=8                                        │
//! │     STOCKBOOK_BUSY_TIMEOUT_MS=2000                                     │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/stockbook/stockbook.toml (Linux)                         │
//! │     ~/Library/Application Support/com.stockbook.stockbook/ (macOS)     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # stockbook.toml
//! [database]
//! path = "stockbook.db"
//! max_connections = 5
//! busy_timeout_ms = 5000
//!
//! [stock]
//! unit = "pcs"
//! minimum_stock = "0"
//! reorder_point = "5"
//! # maximum_stock = "500"
//!
//! [codes]
//! sale = "SAL"
//! purchase = "PUR"
//! replacement = "RPL"
//! ```
//!
//! Stock levels are decimal strings so fractional material quantities
//! (`"2.5"`) survive the round trip exactly.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use stockbook_core::{Quantity, StockDefaults};
use stockbook_db::DbConfig;

use crate::error::ConfigError;

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file path. `:memory:` for a throwaway database.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// How long a writer waits for the SQLite write lock.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("stockbook.db")
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_connect_timeout_secs() -> u64 {
    30
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

// =============================================================================
// Stock Settings
// =============================================================================

/// Policy for stock rows created on the first stock-affecting event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSettings {
    #[serde(default = "default_unit")]
    pub unit: String,

    #[serde(default = "default_zero")]
    pub minimum_stock: String,

    #[serde(default = "default_zero")]
    pub reorder_point: String,

    #[serde(default)]
    pub maximum_stock: Option<String>,
}

fn default_unit() -> String {
    "pcs".to_string()
}

fn default_zero() -> String {
    "0".to_string()
}

impl Default for StockSettings {
    fn default() -> Self {
        StockSettings {
            unit: default_unit(),
            minimum_stock: default_zero(),
            reorder_point: default_zero(),
            maximum_stock: None,
        }
    }
}

// =============================================================================
// Code Prefixes
// =============================================================================

/// Prefixes for the daily sequence codes (`SAL-20261017-0001`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSettings {
    #[serde(default = "default_sale_prefix")]
    pub sale: String,

    #[serde(default = "default_purchase_prefix")]
    pub purchase: String,

    #[serde(default = "default_replacement_prefix")]
    pub replacement: String,
}

fn default_sale_prefix() -> String {
    "SAL".to_string()
}

fn default_purchase_prefix() -> String {
    "PUR".to_string()
}

fn default_replacement_prefix() -> String {
    "RPL".to_string()
}

impl Default for CodeSettings {
    fn default() -> Self {
        CodeSettings {
            sale: default_sale_prefix(),
            purchase: default_purchase_prefix(),
            replacement: default_replacement_prefix(),
        }
    }
}

// =============================================================================
// Engine Config
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub stock: StockSettings,

    #[serde(default)]
    pub codes: CodeSettings,
}

impl EngineConfig {
    /// Loads configuration: defaults, then the TOML file if it exists, then
    /// environment overrides. The result is validated.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> Result<(), ConfigError> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ConfigError::SaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;

        info!(?path, "Engine config saved");
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path is empty".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid(
                "database.min_connections exceeds max_connections".into(),
            ));
        }
        if self.database.busy_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "database.busy_timeout_ms must be greater than 0".into(),
            ));
        }

        for (name, prefix) in [
            ("codes.sale", &self.codes.sale),
            ("codes.purchase", &self.codes.purchase),
            ("codes.replacement", &self.codes.replacement),
        ] {
            if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be non-empty and alphanumeric, got '{}'",
                    name, prefix
                )));
            }
        }

        self.stock_defaults().map(|_| ())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("STOCKBOOK_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(max) = std::env::var("STOCKBOOK_MAX_CONNECTIONS") {
            if let Ok(m) = max.parse::<u32>() {
                self.database.max_connections = m;
            }
        }

        if let Ok(timeout) = std::env::var("STOCKBOOK_BUSY_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse::<u64>() {
                self.database.busy_timeout_ms = ms;
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "stockbook", "stockbook")
            .map(|dirs| dirs.config_dir().join("stockbook.toml"))
    }

    // =========================================================================
    // Conversions
    // =========================================================================

    /// Pool settings for [`Database::new`](stockbook_db::Database::new).
    pub fn to_db_config(&self) -> DbConfig {
        if self.database.path.as_os_str() == ":memory:" {
            return DbConfig::in_memory();
        }

        DbConfig::new(self.database.path.clone())
            .max_connections(self.database.max_connections)
            .min_connections(self.database.min_connections)
            .connect_timeout(Duration::from_secs(self.database.connect_timeout_secs))
            .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
    }

    /// Defaults handed to lazily created stock rows.
    pub fn stock_defaults(&self) -> Result<StockDefaults, ConfigError> {
        let parse = |field: &str, value: &str| -> Result<Quantity, ConfigError> {
            let quantity: Quantity = value
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("stock.{}: {}", field, e)))?;
            if quantity.is_negative() {
                return Err(ConfigError::Invalid(format!(
                    "stock.{} must not be negative",
                    field
                )));
            }
            Ok(quantity)
        };

        if self.stock.unit.trim().is_empty() {
            return Err(ConfigError::Invalid("stock.unit is empty".into()));
        }

        Ok(StockDefaults {
            unit: self.stock.unit.clone(),
            minimum_stock: parse("minimum_stock", &self.stock.minimum_stock)?,
            reorder_point: parse("reorder_point", &self.stock.reorder_point)?,
            maximum_stock: self
                .stock
                .maximum_stock
                .as_deref()
                .map(|max| parse("maximum_stock", max))
                .transpose()?,
        })
    }

    /// Configuration for tests and the seed binary.
    pub fn in_memory() -> Self {
        let mut config = Self::default();
        config.database.path = PathBuf::from(":memory:");
        config
    }
}
