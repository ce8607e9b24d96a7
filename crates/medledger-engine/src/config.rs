//! # Ledger Configuration
//!
//! Configuration management for the engine, database and notifications.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     MEDLEDGER_DB_PATH=/var/lib/medledger/ledger.db                     │
//! │     MEDLEDGER_HIGH_VALUE_THRESHOLD_PAISE=5000000                       │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/medledger/medledger.toml (Linux)                         │
//! │     ~/Library/Application Support/com.medledger.medledger/... (macOS)  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "medledger.db"
//! max_connections = 5
//! busy_timeout_ms = 5000
//!
//! [engine]
//! retry_initial_backoff_ms = 20
//! retry_max_elapsed_ms = 2000
//! max_document_lines = 200
//!
//! [notifications]
//! high_value_threshold_paise = 5000000
//! alert_email = "accounts@example.com"
//! outbox_poll_interval_secs = 5
//! outbox_batch_size = 50
//! max_delivery_attempts = 10
//!
//! [store]
//! name = "Main Distribution Centre"
//! ```

use medledger_core::{Money, MAX_DOCUMENT_LINES};
use medledger_db::DbConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{LedgerError, LedgerResult};

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Path to the SQLite file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a writer waits for the SQLite lock (milliseconds).
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("com", "medledger", "medledger")
        .map(|dirs| dirs.data_dir().join("medledger.db"))
        .unwrap_or_else(|| PathBuf::from("medledger.db"))
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout() -> u64 {
    5_000
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

impl DatabaseSettings {
    /// Builds the pool configuration.
    pub fn to_db_config(&self) -> DbConfig {
        DbConfig::new(self.path.clone())
            .max_connections(self.max_connections)
            .busy_timeout(Duration::from_millis(self.busy_timeout_ms))
    }
}

// =============================================================================
// Engine Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// First wait before re-running a unit of work that hit lock contention.
    #[serde(default = "default_initial_backoff")]
    pub retry_initial_backoff_ms: u64,

    /// Total time budget for retries of one operation.
    #[serde(default = "default_max_elapsed")]
    pub retry_max_elapsed_ms: u64,

    /// Upper bound on lines per document (never above MAX_DOCUMENT_LINES).
    #[serde(default = "default_max_lines")]
    pub max_document_lines: usize,
}

fn default_initial_backoff() -> u64 {
    20
}

fn default_max_elapsed() -> u64 {
    2_000
}

fn default_max_lines() -> usize {
    MAX_DOCUMENT_LINES
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            retry_initial_backoff_ms: default_initial_backoff(),
            retry_max_elapsed_ms: default_max_elapsed(),
            max_document_lines: default_max_lines(),
        }
    }
}

impl EngineSettings {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_initial_backoff_ms)
    }

    pub fn max_elapsed(&self) -> Duration {
        Duration::from_millis(self.retry_max_elapsed_ms)
    }
}

// =============================================================================
// Notification Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSettings {
    /// Invoices at or above this net amount raise an email alert.
    #[serde(default = "default_high_value_threshold")]
    pub high_value_threshold_paise: i64,

    /// Recipient of high-value alerts. No alert is queued when unset.
    #[serde(default)]
    pub alert_email: Option<String>,

    #[serde(default = "default_poll_interval")]
    pub outbox_poll_interval_secs: u64,

    #[serde(default = "default_outbox_batch_size")]
    pub outbox_batch_size: u32,

    /// Entries that failed this many times are left for manual review.
    #[serde(default = "default_max_attempts")]
    pub max_delivery_attempts: u32,
}

fn default_high_value_threshold() -> i64 {
    // ₹50,000
    5_000_000
}

fn default_poll_interval() -> u64 {
    5
}

fn default_outbox_batch_size() -> u32 {
    50
}

fn default_max_attempts() -> u32 {
    10
}

impl Default for NotificationSettings {
    fn default() -> Self {
        NotificationSettings {
            high_value_threshold_paise: default_high_value_threshold(),
            alert_email: None,
            outbox_poll_interval_secs: default_poll_interval(),
            outbox_batch_size: default_outbox_batch_size(),
            max_delivery_attempts: default_max_attempts(),
        }
    }
}

impl NotificationSettings {
    pub fn high_value_threshold(&self) -> Money {
        Money::from_paise(self.high_value_threshold_paise)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.outbox_poll_interval_secs)
    }
}

// =============================================================================
// Store Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default = "default_store_name")]
    pub name: String,
}

fn default_store_name() -> String {
    "MedLedger Store".to_string()
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            name: default_store_name(),
        }
    }
}

// =============================================================================
// Ledger Config
// =============================================================================

/// Complete configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub notifications: NotificationSettings,

    #[serde(default)]
    pub store: StoreSettings,
}

impl LedgerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (medledger.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> LedgerResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading ledger config from file");
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
            warn!("Failed to load ledger config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> LedgerResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| LedgerError::Config("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Ledger config saved");
        Ok(())
    }

    pub fn validate(&self) -> LedgerResult<()> {
        if self.database.max_connections == 0 {
            return Err(LedgerError::Config(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.engine.max_document_lines == 0 {
            return Err(LedgerError::Config(
                "engine.max_document_lines must be greater than 0".into(),
            ));
        }

        if self.notifications.outbox_batch_size == 0 {
            return Err(LedgerError::Config(
                "notifications.outbox_batch_size must be greater than 0".into(),
            ));
        }

        if self.notifications.outbox_poll_interval_secs == 0 {
            return Err(LedgerError::Config(
                "notifications.outbox_poll_interval_secs must be greater than 0".into(),
            ));
        }

        if self.notifications.high_value_threshold_paise <= 0 {
            return Err(LedgerError::Config(
                "notifications.high_value_threshold_paise must be positive".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("MEDLEDGER_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(max) = std::env::var("MEDLEDGER_DB_MAX_CONNECTIONS") {
            if let Ok(n) = max.parse::<u32>() {
                self.database.max_connections = n;
            }
        }

        if let Ok(threshold) = std::env::var("MEDLEDGER_HIGH_VALUE_THRESHOLD_PAISE") {
            match threshold.parse::<i64>() {
                Ok(paise) => self.notifications.high_value_threshold_paise = paise,
                Err(_) => warn!(value = %threshold, "Ignoring non-numeric alert threshold"),
            }
        }

        if let Ok(email) = std::env::var("MEDLEDGER_ALERT_EMAIL") {
            self.notifications.alert_email = Some(email);
        }

        if let Ok(secs) = std::env::var("MEDLEDGER_OUTBOX_POLL_SECS") {
            if let Ok(s) = secs.parse::<u64>() {
                self.notifications.outbox_poll_interval_secs = s;
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "medledger", "medledger")
            .map(|dirs| dirs.config_dir().join("medledger.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LedgerConfig::default();
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.engine.max_document_lines, MAX_DOCUMENT_LINES);
        assert_eq!(config.notifications.high_value_threshold().paise(), 5_000_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = LedgerConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());

        let mut config = LedgerConfig::default();
        config.notifications.outbox_batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = LedgerConfig::default();
        config.notifications.outbox_poll_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: LedgerConfig = toml::from_str(
            r#"
            [notifications]
            alert_email = "accounts@example.com"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.notifications.alert_email.as_deref(),
            Some("accounts@example.com")
        );
        assert_eq!(config.notifications.max_delivery_attempts, 10);
        assert_eq!(config.engine.retry_max_elapsed_ms, 2_000);
    }

    #[test]
    fn test_save_and_load_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("medledger.toml");

        let mut config = LedgerConfig::default();
        config.store.name = "Pune Depot".into();
        config.save(Some(path.clone())).unwrap();

        let loaded = LedgerConfig::load(Some(path)).unwrap();
        assert_eq!(loaded.store.name, "Pune Depot");
    }

    #[test]
    fn test_toml_serialization() {
        let toml_str = toml::to_string_pretty(&LedgerConfig::default()).unwrap();
        assert!(toml_str.contains("[database]"));
        assert!(toml_str.contains("[notifications]"));
    }
}
