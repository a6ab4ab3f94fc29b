use std::path::PathBuf;
use tracing::{debug, warn};

use crate::types::SyncError;

/// Get the path to the config.json file
/// Looks for config.json next to the executable
pub(super) fn get_config_path() -> Result<PathBuf, SyncError> {
    if let Ok(exe_path) = std::env::current_exe() {
        debug!(path = %exe_path.display(), "Executable path detected");

        if let Some(app_root) = exe_path.parent() {
            let config_path = app_root.join("config.json");
            debug!(path = %config_path.display(), "Looking for config");
            return Ok(config_path);
        }
    }

    // Fallback: look in current directory
    warn!("Using fallback: looking for config.json in current directory");
    Ok(PathBuf::from("config.json"))
}

/// Get the root directory of the application
pub fn app_root_dir() -> Result<PathBuf, SyncError> {
    let config_path = get_config_path()?;
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Ok(parent.to_path_buf()),
        Some(_) => std::env::current_dir()
            .map_err(|err| SyncError::Config(format!("Failed to determine app root: {err}"))),
        None => Err(SyncError::Config(
            "Unable to determine app root directory".to_string(),
        )),
    }
}

/// Path of the stored credential material for the remote service.
pub fn credentials_path() -> Result<PathBuf, SyncError> {
    Ok(app_root_dir()?.join("config").join("credentials.json"))
}

/// Path of the registered client identity file, provisioned externally.
pub fn client_identity_path() -> Result<PathBuf, SyncError> {
    Ok(app_root_dir()?.join("config").join("client_secrets.json"))
}
