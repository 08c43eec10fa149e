//! Playlist expansion and the bounded download pool.
//!
//! `run_all` dispatches one task per playlist member through a semaphore of
//! configurable width and collects results in completion order. The pool is
//! crash-safe: a panicking worker is caught at the join boundary and turned
//! into a failed result, so the caller always receives exactly one result
//! per member.

use std::path::Path;
use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use tokio::sync::Semaphore;
use tracing::{error, info, instrument, warn};

use crate::extractor::{ExtractError, MediaExtractor, PlaylistListing};
use crate::fetch::{DownloadResult, FetchRequest, MediaFetcher, PlaylistContext};

/// Message reported when a playlist expands to nothing.
pub const EMPTY_PLAYLIST_MESSAGE: &str = "再生リストからURL取得失敗";

/// Drives playlist downloads through a bounded worker pool.
pub struct PlaylistOrchestrator {
    extractor: Arc<dyn MediaExtractor>,
    fetcher: Arc<MediaFetcher>,
    width: usize,
}

impl PlaylistOrchestrator {
    /// Pool of the given width (clamped to at least 1).
    #[must_use]
    pub fn new(
        extractor: Arc<dyn MediaExtractor>,
        fetcher: Arc<MediaFetcher>,
        width: usize,
    ) -> Self {
        Self {
            extractor,
            fetcher,
            width: width.max(1),
        }
    }

    /// Flat playlist expansion: member URLs plus the playlist title.
    pub async fn expand(&self, url: &str) -> Result<PlaylistListing, ExtractError> {
        self.extractor.list_playlist(url).await
    }

    /// Downloads every member concurrently, at most `width` at a time.
    ///
    /// Returns exactly one result per member, in completion order. An empty
    /// member list yields a single synthetic failure so downstream stages
    /// always have something to report.
    #[instrument(skip_all, fields(playlist = %playlist.playlist_title, members = members.len()))]
    pub async fn run_all(
        &self,
        members: &[String],
        format: &str,
        workspace: &Path,
        final_dir: &Path,
        playlist: &PlaylistContext,
    ) -> Vec<DownloadResult> {
        if members.is_empty() {
            warn!("playlist expanded to zero members");
            return vec![DownloadResult::failure(
                &playlist.playlist_url,
                format,
                EMPTY_PLAYLIST_MESSAGE,
            )];
        }

        let semaphore = Arc::new(Semaphore::new(self.width));
        let mut pool = FuturesUnordered::new();
        for url in members {
            let request = FetchRequest {
                url: url.clone(),
                format: format.to_string(),
                workspace: workspace.to_path_buf(),
                final_dir: final_dir.to_path_buf(),
                playlist: Some(playlist.clone()),
            };
            let fetcher = Arc::clone(&self.fetcher);
            let semaphore = Arc::clone(&semaphore);
            let handle = tokio::spawn(async move {
                // permit held for the task's whole lifetime (RAII)
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return DownloadResult::failure(
                        &request.url,
                        &request.format,
                        "worker pool shut down before dispatch",
                    );
                };
                fetcher.fetch(request).await
            });
            let url = url.clone();
            let format = format.to_string();
            pool.push(async move {
                match handle.await {
                    Ok(result) => result,
                    Err(join_error) => {
                        error!(url, error = %join_error, "download worker crashed");
                        DownloadResult::failure(
                            &url,
                            &format,
                            format!("download worker crashed: {join_error}"),
                        )
                    }
                }
            });
        }

        let mut results = Vec::with_capacity(members.len());
        while let Some(result) = pool.next().await {
            results.push(result);
        }
        info!(
            succeeded = results.iter().filter(|r| r.success).count(),
            failed = results.iter().filter(|r| !r.success).count(),
            "playlist batch complete"
        );
        results
    }
}
