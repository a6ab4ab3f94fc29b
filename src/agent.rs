use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::remote::{FolderHandle, RemoteDrive};
use crate::types::{PassReport, SyncError, SyncOutcome, SyncState};

/// Background worker bookkeeping: cancellation token plus join handle.
struct Worker {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Keeps a remote folder's contents a superset of a local snapshot
/// directory, on a timer.
///
/// Reconciliation matches by filename only: a file whose name is already
/// present remotely is never re-uploaded, even when its local content has
/// changed since. That is the intended behavior, not a gap.
pub struct SyncAgent {
    config: SyncConfig,
    drive: Arc<dyn RemoteDrive>,
    authenticated: AtomicBool,
    state: Mutex<SyncState>,
    // Serializes full passes so a manual trigger cannot race the worker.
    pass_lock: tokio::sync::Mutex<()>,
    worker: Mutex<Option<Worker>>,
}

impl SyncAgent {
    /// Create an agent for the given configuration. Ensures the local
    /// directory exists; authentication is deferred to first use.
    pub fn new(config: SyncConfig, drive: Arc<dyn RemoteDrive>) -> Result<Arc<Self>, SyncError> {
        std::fs::create_dir_all(&config.local_directory)?;

        Ok(Arc::new(Self {
            config,
            drive,
            authenticated: AtomicBool::new(false),
            state: Mutex::new(SyncState::Idle),
            pass_lock: tokio::sync::Mutex::new(()),
            worker: Mutex::new(None),
        }))
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> SyncState {
        *self.state.lock()
    }

    pub fn interval_seconds(&self) -> u64 {
        self.config.interval_seconds
    }

    pub fn local_directory(&self) -> &Path {
        &self.config.local_directory
    }

    pub fn remote_folder_name(&self) -> &str {
        &self.config.remote_folder_name
    }

    fn transition(&self, next: SyncState) {
        let mut state = self.state.lock();
        // A stopped agent stays visibly stopped; a pass that is still
        // draining must not flip the state back.
        if *state != SyncState::Stopped {
            *state = next;
        }
    }

    /// Establish or refresh the credential. Never raises; the outcome is
    /// mirrored in `is_authenticated`.
    pub async fn authenticate(&self) -> bool {
        self.transition(SyncState::Authenticating);
        let ok = match self.drive.authenticate().await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "Authentication failed");
                false
            }
        };
        self.authenticated.store(ok, Ordering::SeqCst);
        self.transition(SyncState::Idle);
        ok
    }

    /// Resolve the named remote folder, creating it when absent. Returns
    /// `None` when authentication or the remote calls fail.
    ///
    /// Lookup-then-create is not transactional: two agents racing can still
    /// produce duplicate folders. One agent per process is assumed.
    pub async fn ensure_remote_folder(&self, name: &str) -> Option<FolderHandle> {
        if !self.is_authenticated() && !self.authenticate().await {
            return None;
        }

        match self.resolve_folder(name).await {
            Ok(folder) => Some(folder),
            Err(err) => {
                warn!(folder = name, error = %err, "Failed to resolve remote folder");
                None
            }
        }
    }

    async fn resolve_folder(&self, name: &str) -> Result<FolderHandle, SyncError> {
        let matches = self.drive.find_folder_by_name(name).await?;
        let count = matches.len();
        if let Some(first) = matches.into_iter().next() {
            if count > 1 {
                debug!(
                    folder = name,
                    matches = count,
                    "Multiple remote folders match, using the first"
                );
            }
            return Ok(first);
        }

        self.drive.create_folder(name).await
    }

    /// One reconciliation pass: list remote filenames, enumerate eligible
    /// local files, upload the delta. Concurrent invocations serialize.
    ///
    /// Per-file upload failures are counted and never abort the pass.
    pub async fn sync_once(&self) -> SyncOutcome {
        let _pass = self.pass_lock.lock().await;

        if !self.is_authenticated() && !self.authenticate().await {
            return SyncOutcome::AuthFailed;
        }

        self.transition(SyncState::Reconciling);
        let folder = match self
            .ensure_remote_folder(&self.config.remote_folder_name)
            .await
        {
            Some(folder) => folder,
            None => {
                self.transition(SyncState::Idle);
                return SyncOutcome::FolderUnavailable;
            }
        };

        let remote_names: HashSet<String> = match self.drive.list_files_in_folder(&folder).await {
            Ok(entries) => entries.into_iter().map(|entry| entry.name).collect(),
            Err(err) => {
                warn!(folder = %folder.name, error = %err, "Failed to list remote folder");
                self.transition(SyncState::Idle);
                return SyncOutcome::FolderUnavailable;
            }
        };

        self.transition(SyncState::Uploading);
        let mut report = PassReport::default();
        for (name, path) in self.eligible_local_files().await {
            if remote_names.contains(&name) {
                continue;
            }

            report.attempted += 1;
            match self.drive.upload_file(&path, &name, &folder).await {
                Ok(()) => {
                    report.succeeded += 1;
                    info!(file = %name, folder = %folder.name, "Uploaded file");
                }
                Err(err) => {
                    report.failed += 1;
                    warn!(file = %name, error = %err, "Upload failed");
                }
            }
        }

        self.transition(SyncState::Idle);
        debug!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            "Pass complete"
        );
        SyncOutcome::Completed(report)
    }

    /// Regular files with a `.jpg` extension (case-sensitive), flat.
    ///
    /// A directory that cannot be read mid-pass is logged and treated as
    /// empty; the next scheduled pass retries.
    async fn eligible_local_files(&self) -> Vec<(String, PathBuf)> {
        let mut entries = match tokio::fs::read_dir(&self.config.local_directory).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(
                    dir = %self.config.local_directory.display(),
                    error = %err,
                    "Failed to read local directory"
                );
                return Vec::new();
            }
        };

        let mut files = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let path = entry.path();
                    let is_file = entry
                        .file_type()
                        .await
                        .map(|file_type| file_type.is_file())
                        .unwrap_or(false);
                    if !is_file || path.extension().and_then(|ext| ext.to_str()) != Some("jpg") {
                        continue;
                    }
                    if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                        files.push((name.to_string(), path.clone()));
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    warn!(error = %err, "Failed to read local directory entry");
                    break;
                }
            }
        }

        files.sort();
        files
    }

    /// Start the periodic worker: pass, sleep, repeat. At most one worker
    /// runs per agent; calling this again while one is live is a no-op.
    pub fn start_background_sync(self: &Arc<Self>) {
        let mut worker = self.worker.lock();
        if let Some(active) = worker.as_ref() {
            if !active.handle.is_finished() {
                debug!("Background sync already running");
                return;
            }
        }

        *self.state.lock() = SyncState::Idle;
        let token = CancellationToken::new();
        let worker_token = token.clone();
        let agent = Arc::clone(self);
        let interval = Duration::from_secs(self.config.interval_seconds);

        let handle = tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "Background sync started");
            loop {
                if worker_token.is_cancelled() {
                    break;
                }

                let outcome = agent.sync_once().await;
                if !matches!(outcome, SyncOutcome::Completed(_)) {
                    warn!(outcome = ?outcome, "Pass did not complete");
                }

                tokio::select! {
                    _ = worker_token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            info!("Background sync stopped");
        });

        *worker = Some(Worker { token, handle });
    }

    /// Request cooperative stop and wait up to `timeout` for an in-flight
    /// pass to drain. The worker is never aborted; after the timeout the
    /// call returns regardless of whether it has finished.
    pub async fn stop_background_sync(&self, timeout: Duration) {
        let worker = self.worker.lock().take();
        *self.state.lock() = SyncState::Stopped;

        if let Some(worker) = worker {
            worker.token.cancel();
            if tokio::time::timeout(timeout, worker.handle).await.is_err() {
                warn!("Background sync did not stop within the timeout");
            }
        }
    }
}
