use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::types::SyncError;

use super::api_types::TokenResponse;
use super::helpers::query_param;

/// Access requested during interactive authorization.
const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Treat tokens this close to expiry as already expired, so an upload does
/// not start with a credential that dies mid-request.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Registered client identity for the remote service. Provisioned
/// externally; this application only ever reads it.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientIdentity {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl ClientIdentity {
    /// Load the client identity file. Accepts the flat form as well as the
    /// `{"installed": {...}}` wrapper the provider console produces.
    pub async fn load(path: &Path) -> Result<Self, SyncError> {
        let contents = fs::read_to_string(path).await.map_err(|err| {
            warn!(path = %path.display(), error = %err, "Failed to read client identity file");
            SyncError::MissingClientIdentity
        })?;

        let value: serde_json::Value =
            serde_json::from_str(&contents).map_err(|_| SyncError::MissingClientIdentity)?;
        let inner = value
            .get("installed")
            .or_else(|| value.get("web"))
            .cloned()
            .unwrap_or(value);

        serde_json::from_value(inner).map_err(|_| SyncError::MissingClientIdentity)
    }
}

/// Token material permitting remote-service calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn is_expired(&self) -> bool {
        Utc::now() + chrono::Duration::seconds(EXPIRY_SKEW_SECS) >= self.expires_at
    }

    fn from_token_response(token: TokenResponse, previous_refresh: Option<String>) -> Self {
        Self {
            access_token: token.access_token,
            refresh_token: token.refresh_token.or(previous_refresh),
            expires_at: Utc::now() + chrono::Duration::seconds(token.expires_in),
        }
    }
}

/// Read stored credential material. A missing file means "never
/// authenticated" and is not an error.
pub async fn load_credential(path: &Path) -> Result<Option<Credential>, SyncError> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path)
        .await
        .map_err(|err| SyncError::Auth(format!("Credential store unreadable: {err}")))?;
    let credential = serde_json::from_str(&contents)
        .map_err(|err| SyncError::Auth(format!("Credential store corrupt: {err}")))?;

    Ok(Some(credential))
}

/// Persist credential material. Only the authenticate/refresh path writes
/// the store.
pub async fn save_credential(path: &Path, credential: &Credential) -> Result<(), SyncError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let contents = serde_json::to_string_pretty(credential)
        .map_err(|err| SyncError::Auth(format!("Failed to serialize credential: {err}")))?;
    fs::write(path, contents).await?;

    Ok(())
}

/// Resolves a usable credential: adopt stored material, refresh it when
/// expired, or run the interactive browser flow when nothing is stored.
pub struct Authenticator {
    identity: ClientIdentity,
    credentials_path: PathBuf,
    http: Client,
}

impl Authenticator {
    pub fn new(identity: ClientIdentity, credentials_path: PathBuf, http: Client) -> Self {
        Self {
            identity,
            credentials_path,
            http,
        }
    }

    /// Produce a valid credential, persisting any newly obtained material.
    pub async fn obtain(&self, current: Option<Credential>) -> Result<Credential, SyncError> {
        let stored = match current {
            Some(credential) => Some(credential),
            None => load_credential(&self.credentials_path).await?,
        };

        let credential = match stored {
            // Unexpired stored material is adopted with no network round-trip.
            Some(credential) if !credential.is_expired() => return Ok(credential),
            Some(credential) => self.refresh(credential).await?,
            None => self.interactive_authorize().await?,
        };

        save_credential(&self.credentials_path, &credential).await?;
        Ok(credential)
    }

    /// Exchange a refresh token for a new access token. A rejected refresh
    /// is a failure; the caller decides whether to retry later.
    async fn refresh(&self, credential: Credential) -> Result<Credential, SyncError> {
        let refresh_token = credential.refresh_token.clone().ok_or_else(|| {
            SyncError::Auth("Credential expired and no refresh token stored".to_string())
        })?;

        info!("Refreshing expired credential");
        let params = [
            ("client_id", self.identity.client_id.as_str()),
            ("client_secret", self.identity.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];
        let token = self.token_request(&params).await?;

        Ok(Credential::from_token_response(
            token,
            credential.refresh_token,
        ))
    }

    /// Run the installed-app authorization flow: a loopback listener takes
    /// the redirect while the user approves access in a browser.
    async fn interactive_authorize(&self) -> Result<Credential, SyncError> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let port = listener.local_addr()?.port();
        let redirect_uri = format!("http://127.0.0.1:{port}/");

        let auth_url = Url::parse_with_params(
            &self.identity.auth_uri,
            &[
                ("client_id", self.identity.client_id.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", DRIVE_SCOPE),
                // Offline access so the service issues a refresh token.
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|err| SyncError::Auth(format!("Invalid authorization URI: {err}")))?;

        info!(url = %auth_url, "Waiting for interactive authorization in the browser");
        if let Err(err) = open::that(auth_url.as_str()) {
            warn!(error = %err, "Could not open a browser, visit the URL manually");
        }

        let code = wait_for_authorization_code(&listener).await?;
        self.exchange_code(&code, &redirect_uri).await
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<Credential, SyncError> {
        let params = [
            ("client_id", self.identity.client_id.as_str()),
            ("client_secret", self.identity.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ];
        let token = self.token_request(&params).await?;

        Ok(Credential::from_token_response(token, None))
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenResponse, SyncError> {
        let response = self
            .http
            .post(&self.identity.token_uri)
            .form(params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Auth(format!(
                "Token endpoint returned {status}: {body}"
            )));
        }

        Ok(response.json::<TokenResponse>().await?)
    }
}

/// Accept one redirect on the loopback listener and extract the
/// authorization code, answering the browser either way.
async fn wait_for_authorization_code(listener: &TcpListener) -> Result<String, SyncError> {
    let (mut stream, _) = listener.accept().await?;
    let mut buf = vec![0u8; 4096];
    let read = stream.read(&mut buf).await?;
    let request = String::from_utf8_lossy(&buf[..read]);
    let request_line = request.lines().next().unwrap_or_default();

    let result = if let Some(code) = query_param(request_line, "code") {
        Ok(code)
    } else if let Some(error) = query_param(request_line, "error") {
        Err(SyncError::Auth(format!("Authorization denied: {error}")))
    } else {
        Err(SyncError::Auth(
            "Redirect carried no authorization code".to_string(),
        ))
    };

    let message = match &result {
        Ok(_) => "Authorization complete. You can close this window.",
        Err(_) => "Authorization failed. You can close this window.",
    };
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        message.len(),
        message
    );
    let _ = stream.write_all(response.as_bytes()).await;

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn credential(expires_in_secs: i64) -> Credential {
        Credential {
            access_token: "token".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at: Utc::now() + chrono::Duration::seconds(expires_in_secs),
        }
    }

    #[test]
    fn expiry_honors_skew_margin() {
        assert!(credential(-10).is_expired());
        // Inside the skew window counts as expired.
        assert!(credential(EXPIRY_SKEW_SECS / 2).is_expired());
        assert!(!credential(3600).is_expired());
    }

    #[tokio::test]
    async fn missing_store_is_absent_not_an_error() {
        let dir = TempDir::new().unwrap();
        let loaded = load_credential(&dir.path().join("credentials.json"))
            .await
            .unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn corrupt_store_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "garbage").unwrap();

        assert!(matches!(
            load_credential(&path).await,
            Err(SyncError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn store_round_trips_and_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config").join("credentials.json");

        let stored = credential(3600);
        save_credential(&path, &stored).await.unwrap();

        let loaded = load_credential(&path).await.unwrap().unwrap();
        assert_eq!(loaded, stored);
    }

    #[tokio::test]
    async fn identity_parses_installed_wrapper() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("client_secrets.json");
        std::fs::write(
            &path,
            r#"{"installed": {"client_id": "id", "client_secret": "secret",
                "auth_uri": "https://example.com/auth",
                "token_uri": "https://example.com/token"}}"#,
        )
        .unwrap();

        let identity = ClientIdentity::load(&path).await.unwrap();
        assert_eq!(identity.client_id, "id");
        assert_eq!(identity.token_uri, "https://example.com/token");
    }

    #[tokio::test]
    async fn identity_parses_flat_form_with_default_uris() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("client_secrets.json");
        std::fs::write(&path, r#"{"client_id": "id", "client_secret": "secret"}"#).unwrap();

        let identity = ClientIdentity::load(&path).await.unwrap();
        assert_eq!(identity.client_id, "id");
        assert_eq!(identity.auth_uri, default_auth_uri());
    }

    #[tokio::test]
    async fn missing_identity_file_maps_to_dedicated_error() {
        let dir = TempDir::new().unwrap();
        let result = ClientIdentity::load(&dir.path().join("client_secrets.json")).await;
        assert!(matches!(result, Err(SyncError::MissingClientIdentity)));
    }
}
