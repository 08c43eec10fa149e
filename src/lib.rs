//! Tubedl Core Library
//!
//! This library provides the core functionality for the tubedl tool, which
//! retrieves online media (single items and playlists) through an external
//! extraction engine, normalizes the artifacts, and routes them to a local
//! directory or a cloud store while keeping a durable failure ledger and an
//! optional structured audit mirror.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`config`] - Settings document loading, defaults, and persistence
//! - [`extractor`] - External media-extraction engine seam (yt-dlp)
//! - [`fetch`] - Per-item fetch pipeline with duplicate skip and fallback
//! - [`batch`] - Playlist expansion and the bounded worker pool
//! - [`sort`] - Destination routing (local move or Drive upload)
//! - [`ledger`] - Unresolved/resolved failure bookkeeping per source URL
//! - [`audit`] - Structured audit mirror (Notion) with parent/child relations

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod audit;
pub mod batch;
pub mod config;
pub mod extractor;
pub mod fetch;
pub mod ledger;
pub mod sort;
pub mod timefmt;

// Re-export commonly used types
pub use audit::{AuditEntry, AuditError, AuditUploader, quality_label};
pub use batch::PlaylistOrchestrator;
pub use config::{Config, DestinationKind, DirectoryProfile};
pub use extractor::{
    ClientProfile, DownloadOptions, ExtractError, MediaExtractor, PlaylistListing, ProbeInfo,
    YtDlpExtractor,
};
pub use fetch::{
    DownloadResult, FetchRequest, MediaFetcher, MediaMetadata, PlaylistContext, sanitize_title,
};
pub use ledger::{ErrorLedger, LedgerEntry};
pub use sort::{FileSorter, PlacedArtifact, PlacedLocation, PlacementError};
