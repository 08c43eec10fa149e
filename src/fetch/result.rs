//! Outcome records for individual media items.

use std::path::PathBuf;

/// Metadata salvaged for an item, best-effort.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaMetadata {
    pub title: Option<String>,
    pub duration_seconds: Option<u64>,
}

/// The playlist an item was reached through, when it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistContext {
    pub playlist_url: String,
    pub playlist_title: String,
}

/// Immutable outcome of one fetch attempt.
///
/// `temp_file` points into the per-item workspace and is only set on
/// success; placement consumes it later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    pub source_url: String,
    pub success: bool,
    pub error_message: Option<String>,
    pub metadata: MediaMetadata,
    pub temp_file: Option<PathBuf>,
    pub requested_format: String,
    pub playlist: Option<PlaylistContext>,
}

impl DownloadResult {
    /// A failed result with no artifact.
    #[must_use]
    pub fn failure(url: &str, format: &str, message: impl Into<String>) -> Self {
        Self {
            source_url: url.to_string(),
            success: false,
            error_message: Some(message.into()),
            metadata: MediaMetadata::default(),
            temp_file: None,
            requested_format: format.to_string(),
            playlist: None,
        }
    }

    /// Title for human-facing output, falling back to the URL.
    #[must_use]
    pub fn display_title(&self) -> &str {
        self.metadata.title.as_deref().unwrap_or(&self.source_url)
    }
}
