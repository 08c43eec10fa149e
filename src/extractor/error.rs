//! Engine error taxonomy.

use std::io;
use std::path::PathBuf;

/// Errors from the external extraction engine.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// The engine binary is not installed anywhere we look.
    #[error("yt-dlp not found in common install locations or on PATH")]
    BinaryNotFound,

    /// The engine binary exists but could not be started.
    #[error("failed to start {binary}: {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The engine ran and reported a failure. The message is its (already
    /// ANSI-stripped) stderr output.
    #[error("{message}")]
    Engine { message: String },

    /// The engine's metadata output was not the JSON we expect.
    #[error("engine produced unparseable metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

impl ExtractError {
    /// Convenience constructor for engine-reported failures.
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }
}
