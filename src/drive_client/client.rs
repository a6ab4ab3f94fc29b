use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config;
use crate::remote::{FolderHandle, RemoteDrive, RemoteFileEntry};
use crate::types::SyncError;

use super::api_types::{FileList, FileMetadata, FileResource, FOLDER_MIME_TYPE};
use super::auth::{Authenticator, ClientIdentity, Credential};
use super::helpers::escape_query_value;

const API_BASE_URL: &str = "https://www.googleapis.com/drive/v3";
const UPLOAD_BASE_URL: &str = "https://www.googleapis.com/upload/drive/v3";
const HTTP_TIMEOUT_SECS: u64 = 30;
const LIST_PAGE_SIZE: &str = "1000";

/// Drive-backed implementation of the remote storage capability.
///
/// Owns the credential material; the agent only ever sees success or
/// failure of `authenticate`.
pub struct DriveClient {
    http: Client,
    base_url: String,
    upload_base_url: String,
    authenticator: Authenticator,
    credential: Mutex<Option<Credential>>,
}

impl DriveClient {
    /// Build a client from the externally provisioned identity file and
    /// the credential store in the app config directory.
    pub async fn from_app_config() -> Result<Self, SyncError> {
        let identity = ClientIdentity::load(&config::client_identity_path()?).await?;
        Self::new(identity, config::credentials_path()?)
    }

    pub fn new(identity: ClientIdentity, credentials_path: PathBuf) -> Result<Self, SyncError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            authenticator: Authenticator::new(identity, credentials_path, http.clone()),
            http,
            base_url: API_BASE_URL.to_string(),
            upload_base_url: UPLOAD_BASE_URL.to_string(),
            credential: Mutex::new(None),
        })
    }

    /// Current bearer token; operations require `authenticate` first.
    async fn access_token(&self) -> Result<String, SyncError> {
        let credential = self.credential.lock().await;
        credential
            .as_ref()
            .map(|c| c.access_token.clone())
            .ok_or_else(|| SyncError::Auth("Not authenticated".to_string()))
    }

    async fn get_json<T>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, SyncError>
    where
        T: DeserializeOwned,
    {
        let token = self.access_token().await?;
        let url = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let response = self
            .http
            .get(url)
            .bearer_auth(&token)
            .query(query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SyncError::Drive(format!(
                "{} returned {}",
                path,
                response.status()
            )));
        }

        Ok(response.json::<T>().await?)
    }

    async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T, SyncError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let token = self.access_token().await?;
        let url = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let response = self
            .http
            .post(url)
            .bearer_auth(&token)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SyncError::Drive(format!(
                "{} returned {}",
                path,
                response.status()
            )));
        }

        Ok(response.json::<T>().await?)
    }

    /// Resumable upload: initiate a session with the file metadata, then
    /// send the bytes in a single shot to the session URI.
    async fn upload(
        &self,
        local_path: &Path,
        target_name: &str,
        parent: &FolderHandle,
    ) -> Result<(), SyncError> {
        let token = self.access_token().await?;
        let metadata = FileMetadata {
            name: target_name,
            mime_type: None,
            parents: Some(vec![parent.id.as_str()]),
        };

        let initiate_url = format!("{}/files?uploadType=resumable", self.upload_base_url);
        let response = self
            .http
            .post(&initiate_url)
            .bearer_auth(&token)
            .header("X-Upload-Content-Type", "image/jpeg")
            .json(&metadata)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SyncError::Drive(format!(
                "Upload session for {} returned {}",
                target_name,
                response.status()
            )));
        }

        let session_uri = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string())
            .ok_or_else(|| {
                SyncError::Drive(format!(
                    "Upload session for {target_name} returned no session URI"
                ))
            })?;

        let contents = tokio::fs::read(local_path).await?;
        let response = self
            .http
            .put(&session_uri)
            .bearer_auth(&token)
            .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
            .body(contents)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SyncError::Drive(format!(
                "Upload of {} returned {}",
                target_name,
                response.status()
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl RemoteDrive for DriveClient {
    async fn authenticate(&self) -> Result<(), SyncError> {
        let mut credential = self.credential.lock().await;
        if let Some(current) = credential.as_ref() {
            if !current.is_expired() {
                debug!("Credential still valid, skipping authentication");
                return Ok(());
            }
        }

        let fresh = self.authenticator.obtain(credential.take()).await?;
        *credential = Some(fresh);
        info!("Authenticated with the remote storage service");
        Ok(())
    }

    async fn find_folder_by_name(&self, name: &str) -> Result<Vec<FolderHandle>, SyncError> {
        let query = format!(
            "name = '{}' and mimeType = '{}' and trashed = false",
            escape_query_value(name),
            FOLDER_MIME_TYPE
        );
        let list: FileList = self
            .get_json(
                "files",
                &[("q", query.as_str()), ("fields", "files(id, name)")],
            )
            .await?;

        Ok(list
            .files
            .into_iter()
            .map(|folder| FolderHandle {
                id: folder.id,
                name: folder.name,
            })
            .collect())
    }

    async fn create_folder(&self, name: &str) -> Result<FolderHandle, SyncError> {
        let metadata = FileMetadata {
            name,
            mime_type: Some(FOLDER_MIME_TYPE),
            parents: None,
        };
        let created: FileResource = self.post_json("files", &metadata).await?;
        info!(folder = %created.name, id = %created.id, "Created remote folder");

        Ok(FolderHandle {
            id: created.id,
            name: created.name,
        })
    }

    async fn list_files_in_folder(
        &self,
        folder: &FolderHandle,
    ) -> Result<Vec<RemoteFileEntry>, SyncError> {
        let query = format!(
            "'{}' in parents and trashed = false",
            escape_query_value(&folder.id)
        );

        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut params = vec![
                ("q", query.as_str()),
                ("fields", "nextPageToken, files(id, name)"),
                ("pageSize", LIST_PAGE_SIZE),
            ];
            if let Some(token) = page_token.as_deref() {
                params.push(("pageToken", token));
            }

            let list: FileList = self.get_json("files", &params).await?;
            entries.extend(list.files.into_iter().map(|file| RemoteFileEntry {
                id: file.id,
                name: file.name,
            }));

            match list.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(entries)
    }

    async fn upload_file(
        &self,
        local_path: &Path,
        target_name: &str,
        parent: &FolderHandle,
    ) -> Result<(), SyncError> {
        self.upload(local_path, target_name, parent).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn identity() -> ClientIdentity {
        ClientIdentity {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            auth_uri: "https://example.com/auth".to_string(),
            // Unroutable, so any accidental network call fails fast.
            token_uri: "http://127.0.0.1:1/token".to_string(),
        }
    }

    #[tokio::test]
    async fn adopts_unexpired_stored_credential_without_network() {
        let dir = TempDir::new().unwrap();
        let credentials_path = dir.path().join("credentials.json");

        let stored = Credential {
            access_token: "stored-token".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at: chrono::Utc::now() + chrono::Duration::hours(1),
        };
        crate::drive_client::save_credential(&credentials_path, &stored)
            .await
            .unwrap();

        let client = DriveClient::new(identity(), credentials_path).unwrap();
        // The token endpoint is unreachable, so success proves the stored
        // credential was adopted without a round-trip.
        client.authenticate().await.unwrap();
        assert_eq!(client.access_token().await.unwrap(), "stored-token");

        // Second call is a no-op against the in-memory credential.
        client.authenticate().await.unwrap();
    }

    #[tokio::test]
    async fn expired_credential_without_refresh_token_fails() {
        let dir = TempDir::new().unwrap();
        let credentials_path = dir.path().join("credentials.json");

        let stored = Credential {
            access_token: "stale".to_string(),
            refresh_token: None,
            expires_at: chrono::Utc::now() - chrono::Duration::hours(1),
        };
        crate::drive_client::save_credential(&credentials_path, &stored)
            .await
            .unwrap();

        let client = DriveClient::new(identity(), credentials_path).unwrap();
        assert!(matches!(
            client.authenticate().await,
            Err(SyncError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn operations_require_authentication() {
        let dir = TempDir::new().unwrap();
        let client = DriveClient::new(identity(), dir.path().join("credentials.json")).unwrap();

        let result = client.find_folder_by_name("Receipts").await;
        assert!(matches!(result, Err(SyncError::Auth(_))));
    }
}
