pub mod agent;
pub mod config;
pub mod drive_client;
pub mod remote;
pub mod types;

pub use agent::SyncAgent;
pub use config::SyncConfig;
pub use drive_client::DriveClient;
pub use remote::{FolderHandle, RemoteDrive, RemoteFileEntry};
pub use types::{PassReport, SyncError, SyncOutcome, SyncState};
