use std::path::Path;

use tokio::fs;
use tracing::{info, warn};

use crate::types::SyncError;

use super::paths;
use super::types::SyncConfig;

impl SyncConfig {
    /// Load configuration from config.json in the app directory
    /// Falls back to defaults if the file doesn't exist or can't be parsed
    pub async fn load() -> Self {
        match Self::try_load().await {
            Ok(config) => {
                info!(
                    folder = %config.remote_folder_name,
                    interval = config.interval_seconds,
                    dir = %config.local_directory.display(),
                    "Loaded configuration"
                );
                config
            }
            Err(err) => {
                warn!(error = ?err, "Failed to load config.json, using defaults");
                Self::default()
            }
        }
    }

    async fn try_load() -> Result<Self, SyncError> {
        let config_path = paths::get_config_path()?;
        Self::load_from(&config_path).await
    }

    /// Load configuration from an explicit path.
    pub async fn load_from(path: &Path) -> Result<Self, SyncError> {
        if !path.exists() {
            warn!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .await
            .map_err(|err| SyncError::Config(format!("Failed to read config file: {err}")))?;

        let mut config: SyncConfig = serde_json::from_str(&contents)
            .map_err(|err| SyncError::Config(format!("Failed to parse config.json: {err}")))?;

        if config.clamp_interval() {
            warn!(
                interval = config.interval_seconds,
                "Configured sync interval out of range, clamped"
            );
        }

        Ok(config)
    }

    /// Persist the configuration; called on configuration change and on
    /// shutdown.
    pub async fn save(&self) -> Result<(), SyncError> {
        let config_path = paths::get_config_path()?;
        self.save_to(&config_path).await
    }

    /// Persist the configuration to an explicit path.
    pub async fn save_to(&self, path: &Path) -> Result<(), SyncError> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|err| SyncError::Config(format!("Failed to serialize config: {err}")))?;

        fs::write(path, contents)
            .await
            .map_err(|err| SyncError::Config(format!("Failed to write config file: {err}")))?;

        Ok(())
    }
}
