//! # Engine Configuration
//!
//! Tunables for the ledger engine: database, classifier, event bus, alerts.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     GALLEY_DB_PATH=/var/lib/galley/galley.db                           │
//! │     GALLEY_POPULARITY_FACTOR=0.7                                       │
//! │     GALLEY_MARGIN_BENCHMARK=median                                     │
//! │     GALLEY_HANDLER_TIMEOUT_MS=2000                                     │
//! │     GALLEY_FOOD_COST_ALERT_PCT=35                                      │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/ledger/engine.toml (Linux)                               │
//! │     ~/Library/Application Support/com.galley.ledger/engine.toml        │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/var/lib/galley/galley.db"
//! max_connections = 8
//! busy_timeout_ms = 30000
//!
//! [menu_engineering]
//! popularity_factor = 0.7
//! margin_benchmark = "weighted_mean"   # weighted_mean | median
//!
//! [events]
//! channel_capacity = 1024
//! handler_timeout_ms = 5000
//!
//! [alerts]
//! food_cost_threshold_pct = 35.0
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::pool::DbConfig;
use galley_core::menu::{ClassifierSettings, MarginBenchmark};
use galley_core::DEFAULT_POPULARITY_FACTOR;

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Database file. Falls back to the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// How long a writer waits for the database write lock.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,

    /// How long a caller waits for a pooled connection.
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    8
}
fn default_min_connections() -> u32 {
    1
}
fn default_busy_timeout() -> u64 {
    30_000
}
fn default_acquire_timeout() -> u64 {
    30
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            busy_timeout_ms: default_busy_timeout(),
            acquire_timeout_secs: default_acquire_timeout(),
        }
    }
}

// =============================================================================
// Menu Engineering Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuEngineeringSettings {
    /// A recipe is popular at `popularity >= factor × mean popularity`.
    #[serde(default = "default_popularity_factor")]
    pub popularity_factor: f64,

    #[serde(default)]
    pub margin_benchmark: MarginBenchmark,
}

fn default_popularity_factor() -> f64 {
    DEFAULT_POPULARITY_FACTOR
}

impl Default for MenuEngineeringSettings {
    fn default() -> Self {
        MenuEngineeringSettings {
            popularity_factor: default_popularity_factor(),
            margin_benchmark: MarginBenchmark::default(),
        }
    }
}

// =============================================================================
// Event Bus Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSettings {
    /// Broadcast buffer; slow subscribers past this many events lag.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Upper bound on one handler invocation.
    #[serde(default = "default_handler_timeout")]
    pub handler_timeout_ms: u64,
}

fn default_channel_capacity() -> usize {
    1024
}
fn default_handler_timeout() -> u64 {
    5_000
}

impl Default for EventSettings {
    fn default() -> Self {
        EventSettings {
            channel_capacity: default_channel_capacity(),
            handler_timeout_ms: default_handler_timeout(),
        }
    }
}

// =============================================================================
// Alert Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertSettings {
    /// Food-cost percentage (cost / sell price × 100) above which a recipe
    /// raises an alert.
    #[serde(default = "default_food_cost_threshold")]
    pub food_cost_threshold_pct: f64,
}

fn default_food_cost_threshold() -> f64 {
    35.0
}

impl Default for AlertSettings {
    fn default() -> Self {
        AlertSettings {
            food_cost_threshold_pct: default_food_cost_threshold(),
        }
    }
}

// =============================================================================
// Engine Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub menu_engineering: MenuEngineeringSettings,

    #[serde(default)]
    pub events: EventSettings,

    #[serde(default)]
    pub alerts: AlertSettings,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (engine.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> DbResult<Self> {
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
    pub fn save(&self, config_path: Option<PathBuf>) -> DbResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| DbError::Config("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Engine config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> DbResult<()> {
        let db = &self.database;
        if db.max_connections == 0 {
            return Err(DbError::Config("max_connections must be greater than 0".into()));
        }
        if db.min_connections > db.max_connections {
            return Err(DbError::Config(format!(
                "min_connections ({}) exceeds max_connections ({})",
                db.min_connections, db.max_connections
            )));
        }

        let factor = self.menu_engineering.popularity_factor;
        if !factor.is_finite() || factor <= 0.0 || factor > 1.0 {
            return Err(DbError::Config(format!(
                "popularity_factor must be in (0, 1], got {}",
                factor
            )));
        }

        if self.events.channel_capacity == 0 {
            return Err(DbError::Config("channel_capacity must be greater than 0".into()));
        }
        if self.events.handler_timeout_ms == 0 {
            return Err(DbError::Config("handler_timeout_ms must be greater than 0".into()));
        }

        let pct = self.alerts.food_cost_threshold_pct;
        if !pct.is_finite() || pct <= 0.0 || pct > 100.0 {
            return Err(DbError::Config(format!(
                "food_cost_threshold_pct must be in (0, 100], got {}",
                pct
            )));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from a key lookup (the process environment in
    /// production). Unparseable values are logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("GALLEY_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Some(raw) = lookup("GALLEY_POPULARITY_FACTOR") {
            match raw.parse::<f64>() {
                Ok(factor) => self.menu_engineering.popularity_factor = factor,
                Err(_) => warn!(value = %raw, "Invalid GALLEY_POPULARITY_FACTOR"),
            }
        }

        if let Some(raw) = lookup("GALLEY_MARGIN_BENCHMARK") {
            match raw.parse::<MarginBenchmark>() {
                Ok(benchmark) => self.menu_engineering.margin_benchmark = benchmark,
                Err(e) => warn!(value = %raw, "{}", e),
            }
        }

        if let Some(raw) = lookup("GALLEY_HANDLER_TIMEOUT_MS") {
            match raw.parse::<u64>() {
                Ok(ms) => self.events.handler_timeout_ms = ms,
                Err(_) => warn!(value = %raw, "Invalid GALLEY_HANDLER_TIMEOUT_MS"),
            }
        }

        if let Some(raw) = lookup("GALLEY_FOOD_COST_ALERT_PCT") {
            match raw.parse::<f64>() {
                Ok(pct) => self.alerts.food_cost_threshold_pct = pct,
                Err(_) => warn!(value = %raw, "Invalid GALLEY_FOOD_COST_ALERT_PCT"),
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "galley", "ledger").map(|dirs| dirs.config_dir().join("engine.toml"))
    }

    fn default_database_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "galley", "ledger").map(|dirs| dirs.data_dir().join("galley.db"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Pool configuration for [`crate::Database::new`].
    pub fn db_config(&self) -> DbResult<DbConfig> {
        let path = self
            .database
            .path
            .clone()
            .or_else(Self::default_database_path)
            .ok_or_else(|| DbError::Config("No database path available".into()))?;

        Ok(DbConfig::new(path)
            .max_connections(self.database.max_connections)
            .min_connections(self.database.min_connections)
            .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
            .connect_timeout(Duration::from_secs(self.database.acquire_timeout_secs)))
    }

    pub fn classifier_settings(&self) -> ClassifierSettings {
        ClassifierSettings {
            popularity_factor: self.menu_engineering.popularity_factor,
            margin_benchmark: self.menu_engineering.margin_benchmark,
        }
    }

    pub fn handler_timeout(&self) -> Duration {
        Duration::from_millis(self.events.handler_timeout_ms)
    }

    /// Food-cost threshold as a ratio (0.35 for 35 %).
    pub fn food_cost_threshold(&self) -> f64 {
        self.alerts.food_cost_threshold_pct / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.database.max_connections, 8);
        assert_eq!(config.menu_engineering.popularity_factor, 0.7);
        assert_eq!(config.menu_engineering.margin_benchmark, MarginBenchmark::WeightedMean);
        assert_eq!(config.alerts.food_cost_threshold_pct, 35.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();

        config.menu_engineering.popularity_factor = 0.0;
        assert!(config.validate().is_err());
        config.menu_engineering.popularity_factor = 1.5;
        assert!(config.validate().is_err());
        config.menu_engineering.popularity_factor = 0.5;
        assert!(config.validate().is_ok());

        config.database.min_connections = 10;
        assert!(config.validate().is_err());
        config.database.min_connections = 1;

        config.alerts.food_cost_threshold_pct = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("GALLEY_DB_PATH", "/tmp/galley-test.db"),
            ("GALLEY_POPULARITY_FACTOR", "0.8"),
            ("GALLEY_MARGIN_BENCHMARK", "median"),
            ("GALLEY_HANDLER_TIMEOUT_MS", "250"),
            ("GALLEY_FOOD_COST_ALERT_PCT", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.path, Some(PathBuf::from("/tmp/galley-test.db")));
        assert_eq!(config.menu_engineering.popularity_factor, 0.8);
        assert_eq!(config.menu_engineering.margin_benchmark, MarginBenchmark::Median);
        assert_eq!(config.handler_timeout(), Duration::from_millis(250));
        // Unparseable value leaves the default alone
        assert_eq!(config.alerts.food_cost_threshold_pct, 35.0);
    }

    #[test]
    fn test_toml_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");

        let mut config = EngineConfig::default();
        config.menu_engineering.margin_benchmark = MarginBenchmark::Median;
        config.alerts.food_cost_threshold_pct = 30.0;
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[menu_engineering]"));
        assert!(contents.contains("margin_benchmark = \"median\""));

        let loaded: EngineConfig = toml::from_str(&contents).unwrap();
        assert_eq!(loaded.menu_engineering.margin_benchmark, MarginBenchmark::Median);
        assert_eq!(loaded.alerts.food_cost_threshold_pct, 30.0);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: EngineConfig = toml::from_str("[alerts]\nfood_cost_threshold_pct = 28.5\n").unwrap();
        assert_eq!(config.alerts.food_cost_threshold_pct, 28.5);
        assert_eq!(config.events.channel_capacity, 1024);
        assert!((config.food_cost_threshold() - 0.285).abs() < 1e-12);
    }

    #[test]
    fn test_db_config_from_settings() {
        let mut config = EngineConfig::default();
        config.database.path = Some(PathBuf::from("/tmp/x.db"));
        config.database.busy_timeout_ms = 1500;

        let db = config.db_config().unwrap();
        assert_eq!(db.database_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(db.busy_timeout, Duration::from_millis(1500));
        assert_eq!(db.max_connections, 8);
    }
}
