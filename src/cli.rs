//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use tubedl_core::DestinationKind;

/// Download online media and playlists, then route them to local or cloud
/// storage.
///
/// Tubedl fetches single items and whole playlists through yt-dlp, skips
/// files it already delivered, records failures in a ledger, and optionally
/// mirrors an audit trail to Notion.
#[derive(Parser, Debug)]
#[command(name = "tubedl")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download a media URL (single item or playlist)
    Download(DownloadArgs),
}

/// Destination override accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DestType {
    Local,
    Cloud,
}

impl From<DestType> for DestinationKind {
    fn from(value: DestType) -> Self {
        match value {
            DestType::Local => Self::Local,
            DestType::Cloud => Self::Gdrive,
        }
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct DownloadArgs {
    /// Media or playlist URL
    pub url: String,

    /// Target format (mp4, webm, mp3, wav, flac); defaults to the selected
    /// directory profile's format
    #[arg(short, long)]
    pub format: Option<String>,

    /// Video quality ceiling (a height like 1080, or "best")
    #[arg(long)]
    pub quality: Option<String>,

    /// Output directory, overriding the configured profile
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Directory profile index to use instead of the configured default
    #[arg(long)]
    pub profile_index: Option<usize>,

    /// Destination kind for finished files
    #[arg(long, value_enum)]
    pub dest_type: Option<DestType>,

    /// Skip the Notion audit mirror for this run
    #[arg(long)]
    pub no_mirror: bool,

    /// Skip failure ledger writes for this run
    #[arg(long)]
    pub no_ledger: bool,

    /// Persist the merged configuration back to config.json
    #[arg(long)]
    pub save: bool,
}
