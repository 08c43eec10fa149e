//! CLI entry point for the tubedl tool.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use tubedl_core::config::CONFIG_PATH;
use tubedl_core::{
    AuditEntry, AuditUploader, Config, DestinationKind, DownloadResult, ErrorLedger, FetchRequest,
    FileSorter, MediaExtractor, MediaFetcher, PlacedArtifact, PlaylistContext, PlaylistListing,
    PlaylistOrchestrator, YtDlpExtractor, quality_label, sanitize_title,
};

mod cli;
mod summary;

use cli::{Cli, Command, DownloadArgs};
use summary::RunSummary;

/// Synthetic ledger key for audit mirror problems, which have no source URL
/// of their own.
const MIRROR_LEDGER_KEY: &str = "Notion API";

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Command::Download(args) => run_download(args).await,
    }
}

/// Merges per-run CLI flags over the loaded settings document.
fn apply_overrides(config: &mut Config, args: &DownloadArgs) {
    if let Some(index) = args.profile_index {
        config.default_directory_index = index;
    }
    if let Some(quality) = &args.quality {
        config.video_quality = quality.clone();
    }
    if let Some(dest) = args.dest_type {
        config.destination = dest.into();
    }
    if args.no_mirror {
        config.enable_notion_upload = false;
    }
    if args.no_ledger {
        config.enable_logging = false;
    }
}

async fn run_download(args: DownloadArgs) -> Result<()> {
    url::Url::parse(&args.url).with_context(|| format!("invalid URL: {}", args.url))?;

    let mut config = Config::load();
    apply_overrides(&mut config, &args);
    if args.save {
        config.save_to(Path::new(CONFIG_PATH))?;
        info!(path = CONFIG_PATH, "configuration saved");
    }
    let config = Arc::new(config);

    let profile = config.default_directory();
    let format = args
        .format
        .clone()
        .or_else(|| profile.map(|p| p.format.clone()))
        .context("no output format: pass --format or configure a directory profile")?;
    if args.output.is_none() && profile.is_none() && config.destination == DestinationKind::Local {
        anyhow::bail!("no output directory: pass --output or configure a directory profile");
    }

    let ledger = if config.enable_logging {
        ErrorLedger::new(config.ledger_path())
    } else {
        ErrorLedger::disabled()
    };

    let extractor: Arc<dyn MediaExtractor> = Arc::new(YtDlpExtractor::discover(&config)?);
    let fetcher = Arc::new(MediaFetcher::new(Arc::clone(&extractor), Arc::clone(&config)));
    let orchestrator =
        PlaylistOrchestrator::new(Arc::clone(&extractor), fetcher.clone(), config.pool_width());
    let sorter = FileSorter::new(Arc::clone(&config), args.output.clone())?;

    // run-scoped workspace under the system temp directory
    let workspace = std::env::temp_dir().join(format!("tubedl-{}", std::process::id()));
    fs::create_dir_all(&workspace)
        .with_context(|| format!("cannot create workspace {}", workspace.display()))?;

    let listing = match orchestrator.expand(&args.url).await {
        Ok(listing) => listing,
        Err(e) => {
            warn!(error = %e, "playlist detection failed, treating URL as a single item");
            PlaylistListing {
                title: String::new(),
                members: Vec::new(),
                is_playlist: false,
            }
        }
    };

    let (results, playlist, playlist_workspace) = if listing.is_playlist {
        info!(title = %listing.title, members = listing.members.len(), "playlist detected");
        let context = PlaylistContext {
            playlist_url: args.url.clone(),
            playlist_title: listing.title.clone(),
        };
        let playlist_workspace = workspace.join(sanitize_title(&listing.title));
        fs::create_dir_all(&playlist_workspace).with_context(|| {
            format!("cannot create workspace {}", playlist_workspace.display())
        })?;
        let final_dir = duplicate_check_dir(&config, &sorter, Some(&context), &playlist_workspace);

        let spinner = batch_spinner(listing.members.len());
        let results = orchestrator
            .run_all(
                &listing.members,
                &format,
                &playlist_workspace,
                &final_dir,
                &context,
            )
            .await;
        spinner.finish_and_clear();
        (results, Some(context), Some(playlist_workspace))
    } else {
        debug!("single item mode");
        let final_dir = duplicate_check_dir(&config, &sorter, None, &workspace);
        let request = FetchRequest {
            url: args.url.clone(),
            format: format.clone(),
            workspace: workspace.clone(),
            final_dir,
            playlist: None,
        };
        (vec![fetcher.fetch(request).await], None, None)
    };

    // placement and ledger bookkeeping run strictly after the batch joins
    let mut placed: Vec<PlacedArtifact> = Vec::new();
    for result in &results {
        if result.success {
            match sorter.place(result).await {
                Ok(artifact) => {
                    ledger.record_resolved(&result.source_url);
                    placed.push(artifact);
                }
                Err(e) => {
                    warn!(url = %result.source_url, error = %e, "placement failed, temp file retained");
                    ledger.record_failure(&result.source_url, &format!("placement failed: {e}"));
                }
            }
        } else if let Some(message) = &result.error_message {
            ledger.record_failure(&result.source_url, message);
        }
    }

    if let Some(dir) = &playlist_workspace {
        FileSorter::cleanup_playlist_workspace(dir);
    }
    FileSorter::cleanup_playlist_workspace(&workspace);

    mirror_audit(&config, &ledger, &format, &results, playlist.as_ref(), &sorter).await;

    let summary = RunSummary::new(results.len(), placed.len());
    summary.report(&ledger);
    if summary.all_failed() {
        anyhow::bail!("all downloads failed");
    }
    Ok(())
}

/// Directory the fetcher checks for already-delivered files. For a local
/// destination that is the real final directory; for Drive there is no local
/// final directory, so the (empty) workspace stands in and nothing collides.
fn duplicate_check_dir(
    config: &Config,
    sorter: &FileSorter,
    playlist: Option<&PlaylistContext>,
    workspace: &Path,
) -> PathBuf {
    match config.destination {
        DestinationKind::Local => {
            sorter.resolve_local_dir(playlist.map(|p| p.playlist_title.as_str()))
        }
        DestinationKind::Gdrive => workspace.to_path_buf(),
    }
}

fn batch_spinner(members: usize) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("downloading {members} item(s)"));
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Mirrors the run to Notion when configured, recording mirror problems in
/// the ledger under a synthetic key. Never fails the run.
async fn mirror_audit(
    config: &Arc<Config>,
    ledger: &ErrorLedger,
    format: &str,
    results: &[DownloadResult],
    playlist: Option<&PlaylistContext>,
    sorter: &FileSorter,
) {
    if !config.enable_notion_upload {
        return;
    }
    let uploader = AuditUploader::from_config(config);
    if uploader.is_degraded(config) {
        warn!("audit mirror enabled but notion credentials are missing");
        ledger.record_failure(
            MIRROR_LEDGER_KEY,
            "notion_api_key or notion_database_id is not configured",
        );
        return;
    }

    let quality = quality_label(config, format);
    let output_location = match config.destination {
        DestinationKind::Local => sorter
            .resolve_local_dir(playlist.map(|p| p.playlist_title.as_str()))
            .display()
            .to_string(),
        DestinationKind::Gdrive => "Google Drive".to_string(),
    };

    let outcome = match playlist {
        Some(context) => {
            let children: Vec<AuditEntry> = results
                .iter()
                .map(|r| AuditEntry::from_result(r, &output_location, &quality))
                .collect();
            let parent = AuditEntry::playlist_summary(
                &context.playlist_url,
                &context.playlist_title,
                results,
                &output_location,
                &quality,
            );
            uploader.mirror_playlist(&parent, &children).await
        }
        None => match results.first() {
            Some(result) => {
                let entry = AuditEntry::from_result(result, &output_location, &quality);
                uploader.upload(&entry, None).await
            }
            None => return,
        },
    };
    if let Err(e) = outcome {
        warn!(error = %e, "audit mirror upload failed");
        ledger.record_failure(MIRROR_LEDGER_KEY, &e.to_string());
    }
}
