//! Google Drive routing: idempotent folder resolution and file upload.
//!
//! Folder creation is lookup-before-create so repeated runs reuse the same
//! remote folder instead of stacking duplicates. The access token is read
//! from the configured token file; obtaining or refreshing it is outside
//! this tool's scope.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::config::Config;

/// Production Drive API endpoint. Tests substitute a local mock server.
pub const DRIVE_DEFAULT_BASE_URL: &str = "https://www.googleapis.com";

const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Errors talking to the Drive API.
#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    #[error("drive credentials unavailable: {0}")]
    MissingCredentials(String),

    #[error("failed to read {}: {source}", .path.display())]
    TokenRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("drive request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("drive API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("drive response missing `{0}`")]
    MissingField(&'static str),

    #[error("failed to read artifact {}: {source}", .path.display())]
    ArtifactRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Minimal Drive v3 client scoped to what placement needs.
#[derive(Debug, Clone)]
pub struct DriveClient {
    client: Client,
    base_url: String,
    token: String,
}

impl DriveClient {
    #[must_use]
    pub fn new(token: String) -> Self {
        Self::with_base_url(token, DRIVE_DEFAULT_BASE_URL)
    }

    /// Client against an alternate endpoint, for tests.
    #[must_use]
    pub fn with_base_url(token: String, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            token,
        }
    }

    /// Builds a client from the settings document, reading the access token
    /// from the configured token file.
    pub fn from_config(config: &Config) -> Result<Self, DriveError> {
        let path = config.gdrive_token_path.as_ref().ok_or_else(|| {
            DriveError::MissingCredentials("gdrive_token_path is not configured".to_string())
        })?;
        let token = fs::read_to_string(path).map_err(|source| DriveError::TokenRead {
            path: path.clone(),
            source,
        })?;
        let token = token.trim().to_string();
        if token.is_empty() {
            return Err(DriveError::MissingCredentials(format!(
                "token file {} is empty",
                path.display()
            )));
        }
        Ok(Self::new(token))
    }

    /// Looks up a folder by name under `parent`. `None` when absent.
    pub async fn find_folder(
        &self,
        name: &str,
        parent: &str,
    ) -> Result<Option<String>, DriveError> {
        let query = format!(
            "name = '{}' and mimeType = '{FOLDER_MIME_TYPE}' and '{parent}' in parents and trashed = false",
            escape_query_value(name)
        );
        let response = self
            .client
            .get(format!("{}/drive/v3/files", self.base_url))
            .bearer_auth(&self.token)
            .query(&[("q", query.as_str()), ("fields", "files(id, name)")])
            .send()
            .await?;
        let body = check(response).await?;
        let id = body
            .get("files")
            .and_then(Value::as_array)
            .and_then(|files| files.first())
            .and_then(|file| file.get("id"))
            .and_then(Value::as_str)
            .map(ToString::to_string);
        Ok(id)
    }

    /// Creates a folder under `parent` and returns its id.
    pub async fn create_folder(&self, name: &str, parent: &str) -> Result<String, DriveError> {
        let response = self
            .client
            .post(format!("{}/drive/v3/files", self.base_url))
            .bearer_auth(&self.token)
            .json(&json!({
                "name": name,
                "mimeType": FOLDER_MIME_TYPE,
                "parents": [parent],
            }))
            .send()
            .await?;
        let body = check(response).await?;
        file_id(&body)
    }

    /// Resolve-or-create: reuses an existing folder of the same name so the
    /// operation is idempotent across runs.
    pub async fn ensure_folder(&self, name: &str, parent: &str) -> Result<String, DriveError> {
        if let Some(id) = self.find_folder(name, parent).await? {
            debug!(name, id, "reusing existing drive folder");
            return Ok(id);
        }
        let id = self.create_folder(name, parent).await?;
        info!(name, id, "created drive folder");
        Ok(id)
    }

    /// Uploads a local file as a new object under `parent` and returns the
    /// new file id.
    pub async fn upload_file(
        &self,
        path: &Path,
        file_name: &str,
        parent: &str,
    ) -> Result<String, DriveError> {
        let bytes = fs::read(path).map_err(|source| DriveError::ArtifactRead {
            path: path.to_path_buf(),
            source,
        })?;
        let metadata = json!({ "name": file_name, "parents": [parent] });
        // Drive multipart upload wants multipart/related: one JSON metadata
        // part, one media part.
        let boundary = "tubedl_upload";
        let mut body = Vec::with_capacity(bytes.len() + 512);
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(
            format!("--{boundary}\r\nContent-Type: application/octet-stream\r\n\r\n").as_bytes(),
        );
        body.extend_from_slice(&bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let response = self
            .client
            .post(format!("{}/upload/drive/v3/files", self.base_url))
            .bearer_auth(&self.token)
            .query(&[("uploadType", "multipart")])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await?;
        let body = check(response).await?;
        let id = file_id(&body)?;
        info!(file = file_name, id, "uploaded to drive");
        Ok(id)
    }
}

/// Escapes a value for embedding in a Drive query string.
fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn file_id(body: &Value) -> Result<String, DriveError> {
    body.get("id")
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or(DriveError::MissingField("id"))
}

async fn check(response: reqwest::Response) -> Result<Value, DriveError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(DriveError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json().await?)
}
