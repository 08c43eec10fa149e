//! External media-extraction engine seam.
//!
//! The pipeline never talks to yt-dlp directly; it goes through the
//! [`MediaExtractor`] trait so the fetch and batch layers are testable with
//! an in-process fake. [`YtDlpExtractor`] is the production implementation.

mod error;
mod options;
mod ytdlp;

pub use error::ExtractError;
pub use options::{
    AUDIO_FORMATS, AudioExtraction, ClientProfile, CookieSource, DownloadOptions, MP3_BITRATE,
    VIDEO_FORMATS, quality_selector,
};
pub use ytdlp::{YtDlpExtractor, strip_ansi};

use async_trait::async_trait;

/// Metadata for a single media item, no bytes transferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeInfo {
    pub title: String,
    pub duration_seconds: Option<u64>,
}

/// Flat, non-recursive playlist listing. Member metadata is not resolved;
/// each member is probed individually by whoever downloads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistListing {
    pub title: String,
    pub members: Vec<String>,
    /// Whether the source identified itself as a playlist at all. A playlist
    /// with zero members is distinct from a single video.
    pub is_playlist: bool,
}

/// Contract with the external extraction engine.
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Fetches metadata for one item without downloading media bytes.
    async fn probe(&self, url: &str) -> Result<ProbeInfo, ExtractError>;

    /// Lists playlist members without resolving their metadata.
    async fn list_playlist(&self, url: &str) -> Result<PlaylistListing, ExtractError>;

    /// Runs one download attempt with fully built options.
    async fn download(&self, url: &str, options: &DownloadOptions) -> Result<(), ExtractError>;
}
