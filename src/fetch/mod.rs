//! Per-item fetch pipeline.
//!
//! [`MediaFetcher`] turns one source URL into a [`DownloadResult`]: probe,
//! duplicate skip, fallback ladder, artifact location. It never panics and
//! never propagates errors; every outcome is a result value.

mod fetcher;
mod result;

pub use fetcher::{FetchRequest, MediaFetcher, sanitize_title};
pub use result::{DownloadResult, MediaMetadata, PlaylistContext};
