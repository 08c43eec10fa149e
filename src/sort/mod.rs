//! Destination routing for finished artifacts.
//!
//! After a fetch succeeds the artifact sits in its per-item workspace.
//! [`FileSorter::place`] moves it to its final home: a local directory or a
//! Google Drive folder. On success the workspace copy is gone and exactly
//! one final copy exists; on failure the temp file is retained so the run
//! can be diagnosed and retried.

mod drive;

pub use drive::{DRIVE_DEFAULT_BASE_URL, DriveClient, DriveError};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{Config, DestinationKind};
use crate::fetch::{DownloadResult, sanitize_title};

/// Where an artifact ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacedLocation {
    Local(PathBuf),
    Drive { file_id: String },
}

/// A successfully routed artifact, paired with the result it came from.
#[derive(Debug, Clone)]
pub struct PlacedArtifact {
    pub location: PlacedLocation,
    pub result: DownloadResult,
}

/// Errors routing an artifact to its destination.
#[derive(Debug, thiserror::Error)]
pub enum PlacementError {
    #[error("result carries no artifact to place")]
    MissingArtifact,

    #[error("artifact vanished before placement: {}", .0.display())]
    ArtifactGone(PathBuf),

    #[error("placement I/O failed at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Drive(#[from] DriveError),
}

/// Routes finished artifacts to the configured destination.
pub struct FileSorter {
    config: Arc<Config>,
    output_override: Option<PathBuf>,
    drive: Option<DriveClient>,
}

impl FileSorter {
    /// Sorter for the configured destination. Builds a Drive client when the
    /// destination is `gdrive`, which requires a readable token file.
    pub fn new(
        config: Arc<Config>,
        output_override: Option<PathBuf>,
    ) -> Result<Self, PlacementError> {
        let drive = match config.destination {
            DestinationKind::Local => None,
            DestinationKind::Gdrive => Some(DriveClient::from_config(&config)?),
        };
        Ok(Self {
            config,
            output_override,
            drive,
        })
    }

    /// Sorter with an injected Drive client (tests point it at a mock).
    #[must_use]
    pub fn with_drive(
        config: Arc<Config>,
        output_override: Option<PathBuf>,
        drive: DriveClient,
    ) -> Self {
        Self {
            config,
            output_override,
            drive: Some(drive),
        }
    }

    /// Resolves the local destination directory.
    ///
    /// Priority: explicit override, then the configured default profile. A
    /// configured directory that no longer exists on disk falls back to the
    /// working directory with a `warn!` rather than aborting the batch; an
    /// explicit override is taken at face value. A playlist title appends a
    /// per-playlist subdirectory when `makedirector` is on.
    #[must_use]
    pub fn resolve_local_dir(&self, playlist_title: Option<&str>) -> PathBuf {
        let mut dir = if let Some(dir) = &self.output_override {
            dir.clone()
        } else if let Some(profile) = self.config.default_directory() {
            if profile.path.is_dir() {
                profile.path.clone()
            } else {
                warn!(
                    dir = %profile.path.display(),
                    "configured destination unavailable, falling back to working directory"
                );
                working_dir()
            }
        } else {
            working_dir()
        };
        if self.config.makedirector
            && let Some(title) = playlist_title
        {
            dir = dir.join(sanitize_title(title));
        }
        dir
    }

    /// Moves (or uploads) one successful result's artifact to its final
    /// location, then deletes the per-item workspace.
    pub async fn place(&self, result: &DownloadResult) -> Result<PlacedArtifact, PlacementError> {
        let temp = result
            .temp_file
            .as_ref()
            .ok_or(PlacementError::MissingArtifact)?;
        if !temp.is_file() {
            return Err(PlacementError::ArtifactGone(temp.clone()));
        }
        let file_name = temp
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| PlacementError::ArtifactGone(temp.clone()))?;
        let playlist_title = result.playlist.as_ref().map(|p| p.playlist_title.as_str());

        let location = match &self.drive {
            None => {
                let dir = self.resolve_local_dir(playlist_title);
                fs::create_dir_all(&dir).map_err(|source| PlacementError::Io {
                    path: dir.clone(),
                    source,
                })?;
                let dest = dir.join(&file_name);
                move_file(temp, &dest)?;
                info!(file = %dest.display(), "placed locally");
                PlacedLocation::Local(dest)
            }
            Some(drive) => {
                let base_folder = self.config.gdrive_folder_id.clone().ok_or_else(|| {
                    DriveError::MissingCredentials("gdrive_folder_id is not configured".to_string())
                })?;
                let parent = match playlist_title {
                    Some(title) if self.config.makedirector => {
                        drive.ensure_folder(&sanitize_title(title), &base_folder).await?
                    }
                    _ => base_folder,
                };
                let file_id = drive.upload_file(temp, &file_name, &parent).await?;
                fs::remove_file(temp).map_err(|source| PlacementError::Io {
                    path: temp.clone(),
                    source,
                })?;
                PlacedLocation::Drive { file_id }
            }
        };

        // the per-item workspace is done with, take leftovers with it
        if let Some(item_dir) = temp.parent()
            && let Err(e) = fs::remove_dir_all(item_dir)
        {
            debug!(dir = %item_dir.display(), error = %e, "item workspace cleanup failed");
        }

        Ok(PlacedArtifact {
            location,
            result: result.clone(),
        })
    }

    /// Removes the playlist workspace once every member is processed. Only
    /// an empty directory is removed; retained temp files from failed
    /// placements keep it (and themselves) alive for diagnosis.
    pub fn cleanup_playlist_workspace(path: &Path) {
        if let Err(e) = fs::remove_dir(path) {
            debug!(dir = %path.display(), error = %e, "playlist workspace not removed");
        }
    }
}

fn working_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Rename, with a copy+remove fallback for cross-filesystem moves.
fn move_file(src: &Path, dest: &Path) -> Result<(), PlacementError> {
    if fs::rename(src, dest).is_ok() {
        return Ok(());
    }
    fs::copy(src, dest).map_err(|source| PlacementError::Io {
        path: dest.to_path_buf(),
        source,
    })?;
    fs::remove_file(src).map_err(|source| PlacementError::Io {
        path: src.to_path_buf(),
        source,
    })
}
