pub mod connection_config;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, anyhow};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::config::connection_config::ConnectionConfig;
use crate::core::bluetooth::constants::{DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_SCAN_DURATION_SECS};
use crate::utils::ensure_directory_exists;

const CONFIG_DIR_NAME: &str = "ble-thermometer";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// How long a CLI scan runs
    pub duration_secs: u64,
    /// Sightings weaker than this are dropped
    pub min_rssi: Option<i16>,
    /// Only report peripherals advertising the thermometer service
    pub filter_by_service: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            duration_secs: DEFAULT_SCAN_DURATION_SECS,
            min_rssi: None,
            filter_by_service: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub connection: ConnectionConfig,
    pub scan: ScanConfig,
    /// `None` waits for a connect attempt forever
    pub connect_timeout_ms: Option<u64>,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            connection: ConnectionConfig::default(),
            scan: ScanConfig::default(),
            connect_timeout_ms: Some(DEFAULT_CONNECT_TIMEOUT_MS),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    /// `<config dir>/ble-thermometer/config.json`
    pub fn default_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("No configuration directory on this platform"))?;
        Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Loads the config from a configuration file.
    pub async fn load_config(file_path: &Path) -> Result<Self> {
        if !file_path.exists() {
            warn!("Config file not found at {:?}, using default.", file_path);
            return Ok(Self::default());
        }

        let config_json = fs::read_to_string(file_path).await?;
        let config: Self = serde_json::from_str(&config_json)?;

        info!("Config loaded from {:?}", file_path);
        Ok(config)
    }

    /// Saves the current config to a configuration file.
    pub async fn save_config(&self, file_path: &Path) -> Result<()> {
        if let Some(parent) = file_path.parent() {
            ensure_directory_exists(parent).await?;
        }

        let config_json = match serde_json::to_string_pretty(&self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize config to JSON: {}", e);
                return Err(e.into());
            }
        };

        fs::write(file_path, config_json).await?;

        info!("Config saved to {:?}.", file_path);
        Ok(())
    }
}
