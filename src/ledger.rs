//! Failure ledger: durable record of per-URL download failures.
//!
//! The ledger is a single JSON array on disk. Each entry tracks one failure
//! for one source URL with an unresolved/resolved flag. At most one
//! unresolved entry exists per URL at any time; a later success flips the
//! entry rather than removing it, so the file doubles as a history.
//!
//! Wire keys are Japanese for compatibility with the tooling that consumes
//! this file downstream.
//!
//! All operations are best-effort: I/O problems are logged and swallowed,
//! a broken ledger must never take the pipeline down with it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::timefmt;

/// One failure record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    #[serde(rename = "タイムスタンプ")]
    pub timestamp: String,
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "エラーメッセージ")]
    pub error_message: String,
    #[serde(rename = "解決済み")]
    pub resolved: bool,
}

/// JSON-array failure ledger with flip-on-success semantics.
#[derive(Debug, Clone)]
pub struct ErrorLedger {
    path: PathBuf,
    enabled: bool,
}

impl ErrorLedger {
    /// Ledger backed by `path`.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            enabled: true,
        }
    }

    /// A ledger that records nothing (`--no-ledger` / logging disabled).
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            path: PathBuf::new(),
            enabled: false,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Loads all entries. Missing file is an empty ledger; a corrupt file is
    /// reported with `warn!` and treated as empty.
    #[must_use]
    pub fn load(&self) -> Vec<LedgerEntry> {
        if !self.enabled {
            return Vec::new();
        }
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ledger unreadable");
                return Vec::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ledger corrupt, starting empty");
                Vec::new()
            }
        }
    }

    /// Records a failure for `url`.
    ///
    /// If an unresolved entry for the URL already exists this is a no-op, so
    /// repeated failures never grow the file.
    pub fn record_failure(&self, url: &str, message: &str) {
        if !self.enabled {
            return;
        }
        let mut entries = self.load();
        if entries.iter().any(|e| e.url == url && !e.resolved) {
            debug!(url, "failure already tracked, not appending");
            return;
        }
        entries.push(LedgerEntry {
            timestamp: timefmt::jst_timestamp(),
            url: url.to_string(),
            error_message: message.to_string(),
            resolved: false,
        });
        self.persist(&entries);
    }

    /// Flips every unresolved entry for `url` to resolved.
    ///
    /// All matches are flipped, not just the first, in case older ledgers
    /// accumulated duplicates. Entries are never removed.
    pub fn record_resolved(&self, url: &str) {
        if !self.enabled {
            return;
        }
        let mut entries = self.load();
        let mut flipped = 0usize;
        for entry in entries.iter_mut().filter(|e| e.url == url && !e.resolved) {
            entry.resolved = true;
            flipped += 1;
        }
        if flipped > 0 {
            debug!(url, flipped, "marked ledger entries resolved");
            self.persist(&entries);
        }
    }

    /// Writes the full array via temp file + rename. Errors are logged and
    /// swallowed; the ledger never aborts a run.
    fn persist(&self, entries: &[LedgerEntry]) {
        let body = match serde_json::to_string_pretty(entries) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "ledger serialization failed");
                return;
            }
        };
        let tmp = self.path.with_extension("json.tmp");
        if let Err(e) = fs::write(&tmp, body) {
            warn!(path = %tmp.display(), error = %e, "ledger write failed");
            return;
        }
        if let Err(e) = fs::rename(&tmp, &self.path) {
            warn!(path = %self.path.display(), error = %e, "ledger rename failed");
        }
    }
}
