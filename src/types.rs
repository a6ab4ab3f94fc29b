use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("remote drive error: {0}")]
    Drive(String),

    #[error("client identity file is missing or unreadable")]
    MissingClientIdentity,
}

/// Lifecycle of the sync agent as observed by the caller.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    Authenticating,
    Reconciling,
    Uploading,
    Stopped,
}

/// Result of a single reconciliation pass.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Credential could not be established; nothing was attempted.
    AuthFailed,
    /// The remote folder could not be resolved or listed.
    FolderUnavailable,
    /// The pass ran to completion, possibly with per-file failures.
    Completed(PassReport),
}

/// Upload counts for one completed pass.
#[derive(Debug, Serialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}
