use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;
use uuid::Uuid;

use crate::core::bluetooth::codec;
use crate::core::bluetooth::constants::{
    DEFAULT_REQUESTED_MTU, DEFAULT_SCAN_DURATION_SECS, DEFAULT_SCAN_SERVICE,
};
use crate::core::bluetooth::BleError;
use crate::utils::ensure_directory_exists;

const CONFIG_DIR_NAME: &str = "ble-explorer";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// How long a scan runs before it stops on its own.
    pub duration_secs: u64,

    /// Services a peripheral must advertise to be reported, in short
    /// (`ab25`) or full UUID form. Empty reports every peripheral.
    pub service_filter: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            duration_secs: DEFAULT_SCAN_DURATION_SECS,
            service_filter: vec![DEFAULT_SCAN_SERVICE.to_string()],
        }
    }
}

impl ScanConfig {
    pub fn filter_uuids(&self) -> Result<Vec<Uuid>, BleError> {
        self.service_filter
            .iter()
            .map(|text| codec::parse_uuid(text))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// MTU requested before each read/write; `None` leaves it to the platform.
    pub mtu: Option<u16>,

    /// Drop the connection once the GATT tree is discovered, so every
    /// read/write sets up its own connection.
    pub release_after_discovery: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            mtu: Some(DEFAULT_REQUESTED_MTU),
            release_after_discovery: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scan: ScanConfig,
    pub transport: TransportConfig,
}

impl AppConfig {
    /// `<config dir>/ble-explorer/config.json`
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| anyhow!("No config directory on this platform"))?;
        Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Loads the config, falling back to defaults when the file is missing.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Config file not found at {:?}, using default.", path);
            return Ok(Self::default());
        }

        let config_json = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config {:?}", path))?;
        let config: Self = serde_json::from_str(&config_json)
            .with_context(|| format!("Invalid config {:?}", path))?;

        // reject bad filters at load time rather than at the first scan
        config.scan.filter_uuids()?;

        info!("Config loaded from {:?}", path);
        Ok(config)
    }

    /// Saves the config, creating its directory if needed.
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            ensure_directory_exists(dir).await?;
        }

        let config_json = match serde_json::to_string_pretty(self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize config to JSON: {}", e);
                return Err(e.into());
            }
        };

        fs::write(path, config_json).await?;

        info!("Config saved to {:?}.", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("ble-explorer-test-{}-{}", name, std::process::id()))
            .join(CONFIG_FILE_NAME)
    }

    #[test]
    fn defaults_follow_the_explorer_flow() {
        let config = AppConfig::default();
        assert_eq!(config.scan.duration_secs, 15);
        assert_eq!(
            config.scan.filter_uuids().unwrap(),
            vec![codec::from_short(0xab25)]
        );
        assert_eq!(config.transport.mtu, Some(512));
        assert!(config.transport.release_after_discovery);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{"scan": {"duration_secs": 3}}"#).unwrap();
        assert_eq!(config.scan.duration_secs, 3);
        assert_eq!(config.scan.service_filter, vec!["ab25".to_string()]);
        assert_eq!(config.transport, TransportConfig::default());
    }

    #[tokio::test]
    async fn missing_file_yields_default() {
        let config = AppConfig::load(&scratch_path("missing")).await.unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[tokio::test]
    async fn save_then_load() {
        let path = scratch_path("save");
        let mut config = AppConfig::default();
        config.scan.service_filter = vec!["180f".into()];
        config.transport.mtu = None;

        config.save(&path).await.unwrap();
        let loaded = AppConfig::load(&path).await.unwrap();
        assert_eq!(loaded, config);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn rejects_bad_filter() {
        let path = scratch_path("bad-filter");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"scan": {"service_filter": ["battery"]}}"#).unwrap();

        assert!(AppConfig::load(&path).await.is_err());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
