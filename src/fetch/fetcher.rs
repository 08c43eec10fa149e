//! Single-item fetch: probe, duplicate skip, fallback ladder.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::extractor::{ClientProfile, DownloadOptions, MediaExtractor, strip_ansi};

use super::result::{DownloadResult, MediaMetadata, PlaylistContext};

/// Replaces filesystem-hostile characters with underscores. The sanitized
/// title is both the workspace subdirectory name and the final file stem.
#[must_use]
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| match c {
            '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect()
}

/// Everything one fetch needs. Owned so it can cross task boundaries.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    /// Target format (extension), e.g. `mp4` or `mp3`.
    pub format: String,
    /// Workspace root the per-item subdirectory is created under.
    pub workspace: PathBuf,
    /// Destination directory the duplicate check runs against.
    pub final_dir: PathBuf,
    pub playlist: Option<PlaylistContext>,
}

/// Turns one source URL into a [`DownloadResult`]. Infallible by contract:
/// every failure mode becomes a failed result value.
#[derive(Clone)]
pub struct MediaFetcher {
    extractor: Arc<dyn MediaExtractor>,
    config: Arc<Config>,
}

impl MediaFetcher {
    #[must_use]
    pub fn new(extractor: Arc<dyn MediaExtractor>, config: Arc<Config>) -> Self {
        Self { extractor, config }
    }

    #[instrument(skip(self, request), fields(url = %request.url, format = %request.format))]
    pub async fn fetch(&self, request: FetchRequest) -> DownloadResult {
        let probe = match self.extractor.probe(&request.url).await {
            Ok(probe) => probe,
            Err(e) => {
                let message = strip_ansi(&e.to_string());
                warn!(error = %message, "probe failed");
                // one salvage probe so the failure at least carries a title
                let title = self
                    .extractor
                    .probe(&request.url)
                    .await
                    .ok()
                    .map(|p| p.title);
                return DownloadResult {
                    metadata: MediaMetadata {
                        title,
                        duration_seconds: None,
                    },
                    playlist: request.playlist.clone(),
                    ..DownloadResult::failure(&request.url, &request.format, message)
                };
            }
        };

        let metadata = MediaMetadata {
            title: Some(probe.title.clone()),
            duration_seconds: probe.duration_seconds,
        };
        let safe_title = sanitize_title(&probe.title);
        let item_dir = request.workspace.join(&safe_title);
        if let Err(e) = fs::create_dir_all(&item_dir) {
            warn!(dir = %item_dir.display(), error = %e, "workspace creation failed");
            return DownloadResult {
                metadata,
                playlist: request.playlist.clone(),
                ..DownloadResult::failure(
                    &request.url,
                    &request.format,
                    format!("workspace creation failed: {e}"),
                )
            };
        }

        let expected_name = format!("{safe_title}.{}", request.format);
        if request.final_dir.join(&expected_name).exists() {
            // duplicate skip happens before the engine is ever invoked
            debug!(file = %expected_name, "already present at destination, skipping");
            let _ = fs::remove_dir(&item_dir);
            return DownloadResult {
                metadata,
                playlist: request.playlist.clone(),
                ..DownloadResult::failure(
                    &request.url,
                    &request.format,
                    format!("ファイルが既に存在: {expected_name}"),
                )
            };
        }

        let mut last_error = String::new();
        for profile in ClientProfile::LADDER {
            let options =
                DownloadOptions::build(&self.config, &request.format, &item_dir, profile);
            match self.extractor.download(&request.url, &options).await {
                Ok(()) => {
                    if let Some(artifact) = locate_artifact(&item_dir, &expected_name) {
                        info!(profile = profile.as_str(), file = %artifact.display(), "download complete");
                        return DownloadResult {
                            source_url: request.url.clone(),
                            success: true,
                            error_message: None,
                            metadata,
                            temp_file: Some(artifact),
                            requested_format: request.format.clone(),
                            playlist: request.playlist.clone(),
                        };
                    }
                    warn!(
                        profile = profile.as_str(),
                        "engine reported success but produced no file"
                    );
                    last_error = "engine reported success but produced no file".to_string();
                }
                Err(e) => {
                    last_error = strip_ansi(&e.to_string());
                    warn!(profile = profile.as_str(), error = %last_error, "download attempt failed");
                }
            }
        }

        DownloadResult {
            metadata,
            playlist: request.playlist.clone(),
            ..DownloadResult::failure(&request.url, &request.format, last_error)
        }
    }
}

/// The artifact the engine left in the item workspace: the expected name if
/// present, otherwise the first regular file (post-processing can shift the
/// extension).
fn locate_artifact(dir: &Path, expected_name: &str) -> Option<PathBuf> {
    let expected = dir.join(expected_name);
    if expected.is_file() {
        return Some(expected);
    }
    fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .find(|path| path.is_file())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::extractor::{ExtractError, PlaylistListing, ProbeInfo};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// In-process engine fake. `failing_attempts` leading download calls
    /// error; later ones write `artifact_name` into the attempt's output
    /// directory.
    struct FakeEngine {
        title: String,
        artifact_name: String,
        probe_fails: bool,
        failing_attempts: usize,
        probe_calls: AtomicUsize,
        download_calls: AtomicUsize,
    }

    impl FakeEngine {
        fn new(title: &str, artifact_name: &str) -> Self {
            Self {
                title: title.to_string(),
                artifact_name: artifact_name.to_string(),
                probe_fails: false,
                failing_attempts: 0,
                probe_calls: AtomicUsize::new(0),
                download_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MediaExtractor for FakeEngine {
        async fn probe(&self, _url: &str) -> Result<ProbeInfo, ExtractError> {
            self.probe_calls.fetch_add(1, Ordering::SeqCst);
            if self.probe_fails {
                return Err(ExtractError::engine("\x1b[31mERROR:\x1b[0m no metadata"));
            }
            Ok(ProbeInfo {
                title: self.title.clone(),
                duration_seconds: Some(300),
            })
        }

        async fn list_playlist(&self, _url: &str) -> Result<PlaylistListing, ExtractError> {
            Err(ExtractError::engine("not used in this test"))
        }

        async fn download(
            &self,
            _url: &str,
            options: &DownloadOptions,
        ) -> Result<(), ExtractError> {
            let call = self.download_calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failing_attempts {
                return Err(ExtractError::engine("\x1b[31mHTTP Error 403\x1b[0m"));
            }
            fs::write(options.output_dir.join(&self.artifact_name), b"media").unwrap();
            Ok(())
        }
    }

    fn request_in(temp: &TempDir) -> FetchRequest {
        let workspace = temp.path().join("work");
        let final_dir = temp.path().join("dest");
        fs::create_dir_all(&workspace).unwrap();
        fs::create_dir_all(&final_dir).unwrap();
        FetchRequest {
            url: "https://example.com/v1".to_string(),
            format: "mp4".to_string(),
            workspace,
            final_dir,
            playlist: None,
        }
    }

    fn fetcher_with(engine: Arc<FakeEngine>) -> MediaFetcher {
        MediaFetcher::new(engine, Arc::new(Config::default()))
    }

    #[test]
    fn sanitize_replaces_each_hostile_character() {
        assert_eq!(sanitize_title(r#"a\b/c*d?e:f"g<h>i|j"#), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(sanitize_title("plain title"), "plain title");
    }

    #[tokio::test]
    async fn successful_fetch_yields_artifact_in_item_workspace() {
        let temp = TempDir::new().unwrap();
        let engine = Arc::new(FakeEngine::new("My Video", "My Video.mp4"));
        let result = fetcher_with(engine.clone()).fetch(request_in(&temp)).await;

        assert!(result.success);
        let artifact = result.temp_file.unwrap();
        assert!(artifact.is_file());
        assert!(artifact.starts_with(temp.path().join("work").join("My Video")));
        assert_eq!(result.metadata.title.as_deref(), Some("My Video"));
        assert_eq!(result.metadata.duration_seconds, Some(300));
        assert_eq!(engine.download_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn duplicate_at_destination_skips_engine_entirely() {
        let temp = TempDir::new().unwrap();
        let engine = Arc::new(FakeEngine::new("My Video", "My Video.mp4"));
        let request = request_in(&temp);
        fs::write(request.final_dir.join("My Video.mp4"), b"already here").unwrap();

        let result = fetcher_with(engine.clone()).fetch(request).await;
        assert!(!result.success);
        assert!(result.error_message.unwrap().contains("既に存在"));
        assert_eq!(engine.download_calls.load(Ordering::SeqCst), 0);
        // metadata still salvaged from the probe
        assert_eq!(result.metadata.title.as_deref(), Some("My Video"));
    }

    #[tokio::test]
    async fn ladder_falls_through_to_later_profiles() {
        let temp = TempDir::new().unwrap();
        let mut engine = FakeEngine::new("My Video", "My Video.mp4");
        engine.failing_attempts = 2;
        let engine = Arc::new(engine);

        let result = fetcher_with(engine.clone()).fetch(request_in(&temp)).await;
        assert!(result.success);
        // full and reduced failed, minimal carried it
        assert_eq!(engine.download_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_ladder_reports_stripped_engine_error() {
        let temp = TempDir::new().unwrap();
        let mut engine = FakeEngine::new("My Video", "My Video.mp4");
        engine.failing_attempts = usize::MAX;
        let engine = Arc::new(engine);

        let result = fetcher_with(engine.clone()).fetch(request_in(&temp)).await;
        assert!(!result.success);
        let message = result.error_message.unwrap();
        assert_eq!(message, "HTTP Error 403");
        assert!(!message.contains('\u{1b}'));
        assert_eq!(engine.download_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn probe_failure_returns_failed_result_without_download() {
        let temp = TempDir::new().unwrap();
        let mut engine = FakeEngine::new("My Video", "My Video.mp4");
        engine.probe_fails = true;
        let engine = Arc::new(engine);

        let result = fetcher_with(engine.clone()).fetch(request_in(&temp)).await;
        assert!(!result.success);
        assert!(!result.error_message.unwrap().contains('\u{1b}'));
        assert_eq!(engine.download_calls.load(Ordering::SeqCst), 0);
        // initial probe plus one salvage attempt
        assert_eq!(engine.probe_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn artifact_with_shifted_extension_is_still_located() {
        let temp = TempDir::new().unwrap();
        // engine produces .webm even though mp4 was requested
        let engine = Arc::new(FakeEngine::new("My Video", "My Video.webm"));
        let result = fetcher_with(engine).fetch(request_in(&temp)).await;
        assert!(result.success);
        assert!(result.temp_file.unwrap().to_string_lossy().ends_with(".webm"));
    }
}
