use std::path::Path;

use async_trait::async_trait;

use crate::types::SyncError;

/// Opaque handle for a named folder on the remote storage service.
///
/// Folder names are not unique on the remote side; the handle pins the
/// concrete container a pass works against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderHandle {
    pub id: String,
    pub name: String,
}

/// A file entry inside a remote folder, as reported by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFileEntry {
    pub id: String,
    pub name: String,
}

/// Remote storage capability required by the sync agent.
///
/// Implementations own the credential material; `authenticate` must be a
/// cheap no-op while the current credential is still valid.
#[async_trait]
pub trait RemoteDrive: Send + Sync {
    /// Establish or refresh the credential used by the other operations.
    async fn authenticate(&self) -> Result<(), SyncError>;

    /// Exact-name folder lookup, excluding trashed folders. May return
    /// multiple matches; callers treat the first as canonical.
    async fn find_folder_by_name(&self, name: &str) -> Result<Vec<FolderHandle>, SyncError>;

    /// Create a new folder with the given name.
    async fn create_folder(&self, name: &str) -> Result<FolderHandle, SyncError>;

    /// List the folder's current non-trashed file entries.
    async fn list_files_in_folder(
        &self,
        folder: &FolderHandle,
    ) -> Result<Vec<RemoteFileEntry>, SyncError>;

    /// Upload a local file into the folder under the given name.
    async fn upload_file(
        &self,
        local_path: &Path,
        target_name: &str,
        parent: &FolderHandle,
    ) -> Result<(), SyncError>;
}
