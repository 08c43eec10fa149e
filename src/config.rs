//! Settings document: load, defaults, validation, persistence.
//!
//! The configuration lives in a JSON document at a fixed relative path
//! (`config.json`). It is loaded once at startup, merged with CLI overrides
//! in memory, and passed by `Arc` into every component. Missing keys backfill
//! from defaults; unknown keys from older schema versions are silently
//! dropped the next time the document is saved.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default config document location, relative to the working directory.
pub const CONFIG_PATH: &str = "config.json";

/// Default worker pool width for playlist downloads.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// One output profile: a destination directory paired with the format
/// downloads into it default to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryProfile {
    pub path: PathBuf,
    pub format: String,
}

/// Where finished artifacts are routed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationKind {
    #[default]
    Local,
    Gdrive,
}

/// Persisted settings document.
///
/// Constructed once at startup and treated as immutable afterwards; CLI
/// overrides are merged before the value is shared.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Output profiles selectable by index.
    pub directories: Vec<DirectoryProfile>,
    /// Index into `directories` used when no profile is named explicitly.
    pub default_directory_index: usize,
    /// Local move or Google Drive upload.
    pub destination: DestinationKind,
    /// Drive folder receiving uploads when `destination` is `gdrive`.
    pub gdrive_folder_id: Option<String>,
    pub gdrive_credentials_path: Option<PathBuf>,
    pub gdrive_token_path: Option<PathBuf>,
    /// Quality ceiling for video formats: a height like "1080", or "best".
    pub video_quality: String,
    pub enable_volume_adjustment: bool,
    pub volume_level: f64,
    pub use_cookies: bool,
    /// Browser whose cookie store the engine reads when no cookie file is set.
    pub cookie_browser: String,
    pub cookie_file: Option<PathBuf>,
    pub mark_as_watched: bool,
    /// Create a per-playlist subdirectory under the destination.
    pub makedirector: bool,
    /// Enables the failure ledger.
    pub enable_logging: bool,
    /// Failure ledger location; defaults to `download_errors.json`.
    pub log_file_path: Option<PathBuf>,
    pub enable_notion_upload: bool,
    pub notion_api_key: Option<String>,
    pub notion_database_id: Option<String>,
    /// Explicit ffmpeg location handed to the engine; discovery is the
    /// engine's own when unset.
    pub ffmpeg_path: Option<PathBuf>,
    /// Playlist worker pool width.
    pub concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            directories: Vec::new(),
            default_directory_index: 0,
            destination: DestinationKind::Local,
            gdrive_folder_id: None,
            gdrive_credentials_path: None,
            gdrive_token_path: None,
            video_quality: "best".to_string(),
            enable_volume_adjustment: false,
            volume_level: 1.0,
            use_cookies: false,
            cookie_browser: "firefox".to_string(),
            cookie_file: None,
            mark_as_watched: false,
            makedirector: true,
            enable_logging: true,
            log_file_path: None,
            enable_notion_upload: false,
            notion_api_key: None,
            notion_database_id: None,
            ffmpeg_path: None,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Errors persisting the settings document.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to write config to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl Config {
    /// Loads the document from the default location.
    #[must_use]
    pub fn load() -> Self {
        Self::load_from(Path::new(CONFIG_PATH))
    }

    /// Loads the document from `path`.
    ///
    /// A missing file yields the defaults; a corrupt file is reported with a
    /// `warn!` and also yields the defaults. Startup never fails on config.
    #[must_use]
    pub fn load_from(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Self::default();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config unreadable, using defaults");
                return Self::default();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config corrupt, using defaults");
                Self::default()
            }
        }
    }

    /// Persists the document as pretty JSON via a temp file + rename, so a
    /// crash mid-write never leaves a truncated config behind.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let body = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(|source| ConfigError::Write {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, path).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The directory profile selected by `default_directory_index`, falling
    /// back to the first profile when the index is out of range. `None` only
    /// when no profiles are configured.
    #[must_use]
    pub fn default_directory(&self) -> Option<&DirectoryProfile> {
        self.directories
            .get(self.default_directory_index)
            .or_else(|| self.directories.first())
    }

    /// Worker pool width, clamped to at least 1.
    #[must_use]
    pub fn pool_width(&self) -> usize {
        self.concurrency.max(1)
    }

    /// Failure ledger path (configured or the default file name).
    #[must_use]
    pub fn ledger_path(&self) -> PathBuf {
        self.log_file_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("download_errors.json"))
    }
}
