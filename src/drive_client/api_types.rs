use serde::{Deserialize, Serialize};

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

#[derive(Debug, Deserialize, Default)]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<FileResource>,
    #[serde(default, rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FileResource {
    pub id: String,
    pub name: String,
}

/// Metadata sent when creating folders or initiating uploads.
#[derive(Debug, Serialize)]
pub struct FileMetadata<'a> {
    pub name: &'a str,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parents: Option<Vec<&'a str>>,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_metadata_uses_wire_names_and_skips_absent_fields() {
        let metadata = FileMetadata {
            name: "scan.jpg",
            mime_type: None,
            parents: Some(vec!["folder-1"]),
        };
        let json = serde_json::to_string(&metadata).unwrap();
        assert_eq!(json, r#"{"name":"scan.jpg","parents":["folder-1"]}"#);

        let folder = FileMetadata {
            name: "Receipts",
            mime_type: Some(FOLDER_MIME_TYPE),
            parents: None,
        };
        let json = serde_json::to_string(&folder).unwrap();
        assert!(json.contains(r#""mimeType":"application/vnd.google-apps.folder""#));
        assert!(!json.contains("parents"));
    }

    #[test]
    fn token_response_defaults_missing_fields() {
        let token: TokenResponse = serde_json::from_str(r#"{"access_token": "abc"}"#).unwrap();
        assert_eq!(token.access_token, "abc");
        assert!(token.refresh_token.is_none());
        assert_eq!(token.expires_in, 3600);
    }
}
