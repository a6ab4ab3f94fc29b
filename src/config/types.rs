use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::paths;

/// Shortest supported sync interval, in seconds.
pub const MIN_INTERVAL_SECS: u64 = 30;
/// Longest supported sync interval, in seconds.
pub const MAX_INTERVAL_SECS: u64 = 3600;

/// Configuration for one sync agent instance.
///
/// Immutable while an agent runs; reconfiguration means stopping the agent
/// and constructing a new one with a fresh config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_local_directory", rename = "localDirectory")]
    pub local_directory: PathBuf,

    #[serde(default = "default_remote_folder_name", rename = "remoteFolderName")]
    pub remote_folder_name: String,

    #[serde(default = "default_interval_seconds", rename = "intervalSeconds")]
    pub interval_seconds: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            local_directory: default_local_directory(),
            remote_folder_name: default_remote_folder_name(),
            interval_seconds: default_interval_seconds(),
        }
    }
}

fn default_local_directory() -> PathBuf {
    paths::app_root_dir()
        .map(|root| root.join("images"))
        .unwrap_or_else(|_| PathBuf::from("images"))
}

fn default_remote_folder_name() -> String {
    "SnapsyncImages".to_string()
}

fn default_interval_seconds() -> u64 {
    60
}

impl SyncConfig {
    /// Force the interval into the supported range. Returns true when the
    /// configured value had to be changed.
    pub(super) fn clamp_interval(&mut self) -> bool {
        let clamped = self
            .interval_seconds
            .clamp(MIN_INTERVAL_SECS, MAX_INTERVAL_SECS);
        let changed = clamped != self.interval_seconds;
        self.interval_seconds = clamped;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_interval_below_minimum() {
        let mut config = SyncConfig {
            interval_seconds: 5,
            ..SyncConfig::default()
        };
        assert!(config.clamp_interval());
        assert_eq!(config.interval_seconds, MIN_INTERVAL_SECS);
    }

    #[test]
    fn clamps_interval_above_maximum() {
        let mut config = SyncConfig {
            interval_seconds: 86_400,
            ..SyncConfig::default()
        };
        assert!(config.clamp_interval());
        assert_eq!(config.interval_seconds, MAX_INTERVAL_SECS);
    }

    #[test]
    fn keeps_interval_in_range() {
        let mut config = SyncConfig {
            interval_seconds: 60,
            ..SyncConfig::default()
        };
        assert!(!config.clamp_interval());
        assert_eq!(config.interval_seconds, 60);
    }
}
