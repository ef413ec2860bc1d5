//! # Configuration Management Module
//!
//! Loads and validates the station's TOML configuration, organized into
//! sections:
//!
//! - [`StationConfig`] - station identity and payload limits
//! - [`MeshtasticConfig`] - device communication settings
//! - [`SchedulerConfig`] - auto-send defaults applied when no persisted
//!   state exists yet
//! - [`RateLimitConfig`] - free-text rate limiting policy
//! - [`ResponderConfig`] - conversational responder backend
//! - [`StorageConfig`] - data persistence settings
//! - [`LoggingConfig`] - logging settings
//!
//! ## Usage
//!
//! ```rust,no_run
//! use meshbeacon::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("Serial port: {}", config.meshtastic.port);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [station]
//! name = "My Beacon"
//! max_payload_bytes = 200
//!
//! [meshtastic]
//! port = "/dev/ttyUSB0"
//! baud_rate = 115200
//!
//! [scheduler]
//! enabled = false
//! interval_seconds = 300
//! target_peers = ["!aabbccdd"]
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::station::{MAX_INTERVAL_SECONDS, MIN_INTERVAL_SECONDS};
use crate::transport::PeerId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub station: StationConfig,
    pub meshtastic: MeshtasticConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub responder: ResponderConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    pub name: String,
    /// Usable bytes per transmitted frame. The radio protocol's own
    /// overhead is already subtracted from the default.
    #[serde(default = "default_max_payload")]
    pub max_payload_bytes: usize,
}

fn default_max_payload() -> usize {
    200
}

/// Smallest payload budget that still fits any single UTF-8 character.
pub const MIN_PAYLOAD_BYTES: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshtasticConfig {
    pub port: String,
    pub baud_rate: u32,
    /// Require the device at startup. When false the station starts without
    /// a connection, which is useful for testing.
    #[serde(default)]
    pub require_device_at_startup: bool,
}

/// Auto-send defaults. Used only until a persisted state file exists; after
/// that the persisted values win.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_interval")]
    pub interval_seconds: u32,
    #[serde(default)]
    pub target_peers: Vec<PeerId>,
}

fn default_interval() -> u32 {
    300
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_seconds: default_interval(),
            target_peers: Vec::new(),
        }
    }
}

impl SchedulerConfig {
    /// Interval clamped into the permitted range.
    pub fn clamped_interval(&self) -> u32 {
        self.interval_seconds
            .clamp(MIN_INTERVAL_SECONDS, MAX_INTERVAL_SECONDS)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_per_window")]
    pub max_per_window: u32,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u32,
}

fn default_max_per_window() -> u32 {
    50
}

fn default_window_seconds() -> u32 {
    3600
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_per_window: default_max_per_window(),
            window_seconds: default_window_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResponderConfig {
    /// Path to the conversational model, if one is installed. Absent means
    /// RESPONDERON reports that no responder is configured.
    #[serde(default)]
    pub model_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl LoggingConfig {
    /// The configured level as a filter; unrecognized values fall back to
    /// Info. CLI verbosity flags override this.
    pub fn level_filter(&self) -> log::LevelFilter {
        self.level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values that would misbehave at runtime.
    pub fn validate(&self) -> Result<()> {
        if self.station.max_payload_bytes < MIN_PAYLOAD_BYTES {
            return Err(anyhow!(
                "station.max_payload_bytes must be at least {} (got {})",
                MIN_PAYLOAD_BYTES,
                self.station.max_payload_bytes
            ));
        }
        Ok(())
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            station: StationConfig {
                name: "meshbeacon Station".to_string(),
                max_payload_bytes: default_max_payload(),
            },
            meshtastic: MeshtasticConfig {
                port: "/dev/ttyUSB0".to_string(),
                baud_rate: 115200,
                require_device_at_startup: false,
            },
            scheduler: SchedulerConfig::default(),
            rate_limit: RateLimitConfig::default(),
            responder: ResponderConfig::default(),
            storage: StorageConfig {
                data_dir: "./data".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("meshbeacon.log".to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.station.max_payload_bytes, 200);
        assert_eq!(parsed.rate_limit.max_per_window, 50);
        assert_eq!(parsed.rate_limit.window_seconds, 3600);
        assert_eq!(parsed.scheduler.interval_seconds, 300);
    }

    #[test]
    fn minimal_file_fills_in_defaults() {
        let toml = r#"
            [station]
            name = "Test"

            [meshtastic]
            port = "/dev/ttyACM0"
            baud_rate = 115200

            [storage]
            data_dir = "./data"

            [logging]
            level = "debug"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.station.max_payload_bytes, 200);
        assert!(!config.scheduler.enabled);
        assert!(config.scheduler.target_peers.is_empty());
        assert!(config.responder.model_path.is_none());
        assert_eq!(config.logging.file, None);
    }

    #[test]
    fn payload_budget_below_minimum_is_rejected() {
        let mut config = Config::default();
        config.station.max_payload_bytes = 2;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("max_payload_bytes"), "unexpected error: {err}");
        config.station.max_payload_bytes = MIN_PAYLOAD_BYTES;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn create_default_writes_a_loadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let path = path.to_str().unwrap();
        tokio_test::block_on(async {
            Config::create_default(path).await.unwrap();
            let config = Config::load(path).await.unwrap();
            assert_eq!(config.station.name, "meshbeacon Station");
        });
    }

    #[test]
    fn scheduler_interval_is_clamped() {
        let scheduler = SchedulerConfig {
            interval_seconds: 5,
            ..Default::default()
        };
        assert_eq!(scheduler.clamped_interval(), MIN_INTERVAL_SECONDS);
        let scheduler = SchedulerConfig {
            interval_seconds: 50_000,
            ..Default::default()
        };
        assert_eq!(scheduler.clamped_interval(), MAX_INTERVAL_SECONDS);
    }

    #[test]
    fn logging_level_parses_with_info_fallback() {
        let logging = LoggingConfig {
            level: "debug".to_string(),
            file: None,
        };
        assert_eq!(logging.level_filter(), log::LevelFilter::Debug);
        let logging = LoggingConfig {
            level: "nonsense".to_string(),
            file: None,
        };
        assert_eq!(logging.level_filter(), log::LevelFilter::Info);
    }

    #[test]
    fn target_peers_parse_from_toml_array() {
        let toml = r#"
            [station]
            name = "Test"

            [meshtastic]
            port = "/dev/ttyACM0"
            baud_rate = 115200

            [scheduler]
            enabled = true
            interval_seconds = 120
            target_peers = ["!aabbccdd", "!11223344"]

            [storage]
            data_dir = "./data"

            [logging]
            level = "info"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.scheduler.enabled);
        assert_eq!(config.scheduler.target_peers.len(), 2);
        assert_eq!(config.scheduler.target_peers[0], PeerId::from("!aabbccdd"));
    }
}
