//! Structured audit mirror (Notion).
//!
//! Every download result can be mirrored as a page in a Notion database,
//! with playlist runs producing one parent summary page and one child page
//! per member related back to it. Mirroring is strictly best-effort: when
//! it is disabled or unconfigured the uploader degrades to a no-op, and a
//! mirror failure never un-places an artifact.
//!
//! Page property names are Japanese to match the database schema the
//! downstream tooling already reads.

use std::sync::Arc;

use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::fetch::DownloadResult;
use crate::timefmt;

/// Production Notion endpoint. Tests substitute a local mock server.
pub const NOTION_DEFAULT_BASE_URL: &str = "https://api.notion.com";

const NOTION_VERSION: &str = "2022-06-28";

/// Errors talking to the Notion API.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("notion request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("notion API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("notion response missing page id")]
    MissingPageId,
}

/// One record destined for the audit mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    /// Page title: the file name, or a playlist summary label.
    pub file_label: String,
    pub url: String,
    pub output_location: String,
    pub requested_format: String,
    pub quality_label: String,
    pub timestamp: String,
    pub success: bool,
    pub error_message: String,
    pub duration_minutes: Option<u64>,
}

impl AuditEntry {
    /// Entry for a single download result.
    #[must_use]
    pub fn from_result(result: &DownloadResult, output_location: &str, quality: &str) -> Self {
        let file_label = if result.success {
            result.display_title().to_string()
        } else {
            // failed items fall back to whatever identifies them best
            result
                .metadata
                .title
                .clone()
                .unwrap_or_else(|| result.source_url.clone())
        };
        Self {
            file_label,
            url: result.source_url.clone(),
            output_location: output_location.to_string(),
            requested_format: result.requested_format.clone(),
            quality_label: quality.to_string(),
            timestamp: timefmt::jst_timestamp(),
            success: result.success,
            error_message: result.error_message.clone().unwrap_or_default(),
            duration_minutes: result.metadata.duration_seconds.map(|s| s / 60),
        }
    }

    /// Parent summary entry for a playlist run. Success means zero failed
    /// members; error text aggregates the members' messages.
    #[must_use]
    pub fn playlist_summary(
        playlist_url: &str,
        playlist_title: &str,
        results: &[DownloadResult],
        output_location: &str,
        quality: &str,
    ) -> Self {
        let failed: Vec<&DownloadResult> = results.iter().filter(|r| !r.success).collect();
        let total_minutes: u64 = results
            .iter()
            .filter_map(|r| r.metadata.duration_seconds)
            .sum::<u64>()
            / 60;
        let error_message = failed
            .iter()
            .filter_map(|r| r.error_message.as_deref())
            .collect::<Vec<_>>()
            .join("; ");
        Self {
            file_label: format!("{playlist_title} ({}件)", results.len()),
            url: playlist_url.to_string(),
            output_location: output_location.to_string(),
            requested_format: results
                .first()
                .map(|r| r.requested_format.clone())
                .unwrap_or_default(),
            quality_label: quality.to_string(),
            timestamp: timefmt::jst_timestamp(),
            success: failed.is_empty(),
            error_message,
            duration_minutes: Some(total_minutes),
        }
    }

    fn properties(&self, parent_page_id: Option<&str>) -> Value {
        let mut properties = json!({
            "ファイル名": {"title": [{"text": {"content": &self.file_label}}]},
            "URL": {"url": &self.url},
            "出力ディレクトリ": {"rich_text": [{"text": {"content": &self.output_location}}]},
            "形式": {"select": {"name": &self.requested_format}},
            "フォーマット": {"select": {"name": &self.quality_label}},
            "タイムスタンプ": {"date": {"start": &self.timestamp}},
            "成否": {"checkbox": self.success},
            "エラーメッセージ": {"rich_text": [{"text": {"content": &self.error_message}}]},
        });
        if let Some(minutes) = self.duration_minutes
            && let Some(map) = properties.as_object_mut()
        {
            map.insert("時間(分)".to_string(), json!({"number": minutes}));
        }
        if let Some(parent) = parent_page_id
            && let Some(map) = properties.as_object_mut()
        {
            map.insert(
                "親アイテム".to_string(),
                json!({"relation": [{"id": parent}]}),
            );
        }
        properties
    }
}

/// Resolved quality label for the audit mirror: video formats report the
/// configured ceiling, lossy audio its bitrate cap, lossless audio a fixed
/// label.
#[must_use]
pub fn quality_label(config: &Config, format: &str) -> String {
    match format {
        "mp4" | "webm" => config.video_quality.clone(),
        "mp3" => "192kbps".to_string(),
        "wav" | "flac" => "lossless".to_string(),
        _ => "best".to_string(),
    }
}

/// Mirrors audit entries into a Notion database.
///
/// Carries no credentials when mirroring is disabled or unconfigured; in
/// that state every call is a no-op returning `Ok(None)`.
pub struct AuditUploader {
    client: Client,
    base_url: String,
    credentials: Option<NotionCredentials>,
}

struct NotionCredentials {
    api_key: String,
    database_id: String,
}

impl AuditUploader {
    /// Uploader per the settings document, degraded when the feature is off
    /// or the key/database id are missing.
    #[must_use]
    pub fn from_config(config: &Arc<Config>) -> Self {
        Self::from_config_with_base_url(config, NOTION_DEFAULT_BASE_URL)
    }

    /// Same, against an alternate endpoint (tests).
    #[must_use]
    pub fn from_config_with_base_url(config: &Arc<Config>, base_url: impl Into<String>) -> Self {
        let credentials = if config.enable_notion_upload {
            match (&config.notion_api_key, &config.notion_database_id) {
                (Some(api_key), Some(database_id))
                    if !api_key.is_empty() && !database_id.is_empty() =>
                {
                    Some(NotionCredentials {
                        api_key: api_key.clone(),
                        database_id: database_id.clone(),
                    })
                }
                _ => None,
            }
        } else {
            None
        };
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            credentials,
        }
    }

    /// Mirroring is enabled but unusable (credentials missing). The caller
    /// reports this once in the failure ledger.
    #[must_use]
    pub fn is_degraded(&self, config: &Config) -> bool {
        config.enable_notion_upload && self.credentials.is_none()
    }

    /// Creates one page for `entry`, related to `parent_page_id` when given.
    /// Returns the new page id, or `None` when the uploader is degraded.
    pub async fn upload(
        &self,
        entry: &AuditEntry,
        parent_page_id: Option<&str>,
    ) -> Result<Option<String>, AuditError> {
        let Some(credentials) = &self.credentials else {
            debug!("audit mirror disabled, skipping upload");
            return Ok(None);
        };
        let payload = json!({
            "parent": {"database_id": credentials.database_id},
            "properties": entry.properties(parent_page_id),
        });
        let response = self
            .client
            .post(format!("{}/v1/pages", self.base_url))
            .bearer_auth(&credentials.api_key)
            .header("Notion-Version", NOTION_VERSION)
            .json(&payload)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuditError::Api {
                status: status.as_u16(),
                body,
            });
        }
        let body: Value = response.json().await?;
        let page_id = body
            .get("id")
            .and_then(Value::as_str)
            .ok_or(AuditError::MissingPageId)?
            .to_string();
        info!(file = %entry.file_label, page_id, "mirrored audit entry");
        Ok(Some(page_id))
    }

    /// Mirrors a playlist run: the parent summary first, then one child per
    /// member with the relation attached. A parent failure skips the
    /// children entirely; a child failure is logged and the rest continue.
    pub async fn mirror_playlist(
        &self,
        parent: &AuditEntry,
        children: &[AuditEntry],
    ) -> Result<Option<String>, AuditError> {
        let Some(parent_id) = self.upload(parent, None).await? else {
            return Ok(None);
        };
        for child in children {
            if let Err(e) = self.upload(child, Some(&parent_id)).await {
                warn!(file = %child.file_label, error = %e, "child audit upload failed");
            }
        }
        Ok(Some(parent_id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fetch::MediaMetadata;

    fn result(success: bool) -> DownloadResult {
        DownloadResult {
            source_url: "https://example.com/v1".to_string(),
            success,
            error_message: (!success).then(|| "HTTP Error 403".to_string()),
            metadata: MediaMetadata {
                title: Some("My Video".to_string()),
                duration_seconds: Some(185),
            },
            temp_file: None,
            requested_format: "mp4".to_string(),
            playlist: None,
        }
    }

    #[test]
    fn quality_labels_follow_format_class() {
        let mut config = Config::default();
        config.video_quality = "1080".to_string();
        assert_eq!(quality_label(&config, "mp4"), "1080");
        assert_eq!(quality_label(&config, "webm"), "1080");
        assert_eq!(quality_label(&config, "mp3"), "192kbps");
        assert_eq!(quality_label(&config, "wav"), "lossless");
        assert_eq!(quality_label(&config, "flac"), "lossless");
        assert_eq!(quality_label(&config, "ogg"), "best");
    }

    #[test]
    fn entry_converts_duration_to_whole_minutes() {
        let entry = AuditEntry::from_result(&result(true), "/media/video", "1080");
        assert_eq!(entry.duration_minutes, Some(3));
        assert_eq!(entry.file_label, "My Video");
        assert!(entry.success);
        assert!(entry.error_message.is_empty());
    }

    #[test]
    fn failed_entry_carries_error_text() {
        let entry = AuditEntry::from_result(&result(false), "/media/video", "1080");
        assert!(!entry.success);
        assert_eq!(entry.error_message, "HTTP Error 403");
    }

    #[test]
    fn playlist_summary_aggregates_members() {
        let results = vec![result(true), result(false), result(true)];
        let entry = AuditEntry::playlist_summary(
            "https://example.com/playlist",
            "My Mix",
            &results,
            "/media/video",
            "best",
        );
        assert_eq!(entry.file_label, "My Mix (3件)");
        assert!(!entry.success, "one failed member fails the summary");
        assert_eq!(entry.error_message, "HTTP Error 403");
        // 3 x 185s
        assert_eq!(entry.duration_minutes, Some(9));
    }

    #[test]
    fn properties_use_japanese_names_and_optional_relation() {
        let entry = AuditEntry::from_result(&result(true), "/media/video", "1080");
        let props = entry.properties(Some("parent-123"));
        assert!(props.get("ファイル名").is_some());
        assert!(props.get("成否").is_some());
        assert_eq!(
            props
                .pointer("/親アイテム/relation/0/id")
                .and_then(Value::as_str),
            Some("parent-123")
        );
        assert_eq!(
            props.pointer("/時間(分)/number").and_then(Value::as_u64),
            Some(3)
        );

        let props = entry.properties(None);
        assert!(props.get("親アイテム").is_none());
    }

    #[tokio::test]
    async fn disabled_uploader_is_a_quiet_noop() {
        let config = Arc::new(Config::default());
        let uploader = AuditUploader::from_config(&config);
        let entry = AuditEntry::from_result(&result(true), "/media/video", "best");
        let page = uploader.upload(&entry, None).await.unwrap();
        assert!(page.is_none());
        assert!(!uploader.is_degraded(&config));
    }

    #[test]
    fn enabled_but_unconfigured_uploader_is_degraded() {
        let mut config = Config::default();
        config.enable_notion_upload = true;
        let config = Arc::new(config);
        let uploader = AuditUploader::from_config(&config);
        assert!(uploader.is_degraded(&config));
    }
}
