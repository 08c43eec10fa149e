//! yt-dlp subprocess driver.
//!
//! Every call shells out to the yt-dlp binary with a fully built argv and
//! captured output. Metadata calls use `--dump-single-json`; download calls
//! translate [`DownloadOptions`] into flags. ffmpeg is handed to the engine
//! via `--ffmpeg-location` when configured, never via PATH mutation.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, instrument};
use which::which;

use crate::config::Config;

use super::error::ExtractError;
use super::options::{CookieSource, DownloadOptions};
use super::{MediaExtractor, PlaylistListing, ProbeInfo};

/// Install locations checked before falling back to a PATH search.
const KNOWN_PATHS: &[&str] = &[
    "/opt/homebrew/bin/yt-dlp",
    "/usr/local/bin/yt-dlp",
    "/usr/bin/yt-dlp",
];

const ENGINE_BINARY: &str = "yt-dlp";

/// Probe title when the engine returns none.
const FALLBACK_TITLE: &str = "タイトル取得失敗";

/// Playlist title when the engine returns none.
const FALLBACK_PLAYLIST_TITLE: &str = "プレイリスト";

#[allow(clippy::unwrap_used)]
fn ansi_pattern() -> &'static Regex {
    // SGR escape sequences as emitted by the engine's colored output.
    static RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*m").unwrap());
    &RE
}

/// Removes ANSI color sequences from engine output so messages are safe for
/// the ledger and the audit mirror.
#[must_use]
pub fn strip_ansi(text: &str) -> String {
    ansi_pattern().replace_all(text, "").into_owned()
}

/// [`MediaExtractor`] backed by the yt-dlp binary.
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    binary: PathBuf,
    /// Session cookies for metadata calls. Download calls carry their own
    /// cookie source inside [`DownloadOptions`].
    cookies: CookieSource,
}

impl YtDlpExtractor {
    /// Locates the engine binary: well-known install paths first, then a
    /// PATH search.
    pub fn discover(config: &Config) -> Result<Self, ExtractError> {
        for candidate in KNOWN_PATHS {
            let path = Path::new(candidate);
            if path.is_file() {
                debug!(binary = %path.display(), "using engine from known location");
                return Ok(Self {
                    binary: path.to_path_buf(),
                    cookies: CookieSource::from_config(config),
                });
            }
        }
        let binary = which(ENGINE_BINARY).map_err(|_| ExtractError::BinaryNotFound)?;
        debug!(binary = %binary.display(), "using engine from PATH");
        Ok(Self {
            binary,
            cookies: CookieSource::from_config(config),
        })
    }

    /// Engine at an explicit path, no cookies.
    #[must_use]
    pub fn with_binary(binary: PathBuf) -> Self {
        Self {
            binary,
            cookies: CookieSource::None,
        }
    }

    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    async fn run(&self, args: &[String]) -> Result<Vec<u8>, ExtractError> {
        debug!(binary = %self.binary.display(), ?args, "running engine");
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| ExtractError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;
        if output.status.success() {
            return Ok(output.stdout);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = strip_ansi(stderr.trim());
        if message.is_empty() {
            return Err(ExtractError::engine(format!(
                "engine exited with {}",
                output.status
            )));
        }
        Err(ExtractError::engine(message))
    }
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    #[instrument(skip(self))]
    async fn probe(&self, url: &str) -> Result<ProbeInfo, ExtractError> {
        let mut args = string_args(&[
            "--dump-single-json",
            "--no-playlist",
            "--skip-download",
            "--no-warnings",
        ]);
        args.extend(cookie_args(&self.cookies));
        args.push(url.to_string());
        let stdout = self.run(&args).await?;
        parse_probe(&stdout)
    }

    #[instrument(skip(self))]
    async fn list_playlist(&self, url: &str) -> Result<PlaylistListing, ExtractError> {
        let mut args = string_args(&[
            "--dump-single-json",
            "--flat-playlist",
            "--skip-download",
            "--no-warnings",
        ]);
        args.extend(cookie_args(&self.cookies));
        args.push(url.to_string());
        let stdout = self.run(&args).await?;
        parse_listing(&stdout)
    }

    #[instrument(skip(self, options))]
    async fn download(&self, url: &str, options: &DownloadOptions) -> Result<(), ExtractError> {
        let args = download_args(url, options);
        self.run(&args).await.map(|_| ())
    }
}

fn string_args(args: &[&str]) -> Vec<String> {
    args.iter().map(ToString::to_string).collect()
}

fn cookie_args(cookies: &CookieSource) -> Vec<String> {
    match cookies {
        CookieSource::None => Vec::new(),
        CookieSource::Browser(browser) => {
            vec!["--cookies-from-browser".to_string(), browser.clone()]
        }
        CookieSource::File(path) => {
            vec!["--cookies".to_string(), path.display().to_string()]
        }
    }
}

/// Translates one attempt into engine argv (URL last).
fn download_args(url: &str, options: &DownloadOptions) -> Vec<String> {
    let mut args = string_args(&["--no-playlist", "--no-warnings", "--newline"]);
    args.push("-f".to_string());
    args.push(options.format_selector.clone());
    args.push("-P".to_string());
    args.push(options.output_dir.display().to_string());
    args.push("-o".to_string());
    args.push("%(title)s.%(ext)s".to_string());
    if let Some(container) = &options.recode_video {
        args.push("--recode-video".to_string());
        args.push(container.clone());
    }
    if let Some(audio) = &options.extract_audio {
        args.push("-x".to_string());
        args.push("--audio-format".to_string());
        args.push(audio.codec.clone());
        if let Some(bitrate) = audio.bitrate {
            args.push("--audio-quality".to_string());
            args.push(bitrate.to_string());
        }
    }
    if let Some(level) = options.volume_filter {
        args.push("--postprocessor-args".to_string());
        args.push(format!("ffmpeg:-af volume={level}"));
    }
    if let Some(client) = options.player_client {
        args.push("--extractor-args".to_string());
        args.push(format!("youtube:player_client={client}"));
    }
    if options.mark_watched {
        args.push("--mark-watched".to_string());
    }
    if let Some(ffmpeg) = &options.ffmpeg_location {
        args.push("--ffmpeg-location".to_string());
        args.push(ffmpeg.display().to_string());
    }
    args.extend(cookie_args(&options.cookies));
    args.push(url.to_string());
    args
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn duration_seconds(value: &Value) -> Option<u64> {
    value.get("duration").and_then(Value::as_f64).map(|d| d.max(0.0) as u64)
}

fn parse_probe(raw: &[u8]) -> Result<ProbeInfo, ExtractError> {
    let value: Value = serde_json::from_slice(raw)?;
    let title = value
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or(FALLBACK_TITLE)
        .to_string();
    Ok(ProbeInfo {
        title,
        duration_seconds: duration_seconds(&value),
    })
}

fn parse_listing(raw: &[u8]) -> Result<PlaylistListing, ExtractError> {
    let value: Value = serde_json::from_slice(raw)?;
    let title = value
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or(FALLBACK_PLAYLIST_TITLE)
        .to_string();
    let (is_playlist, members) = match value.get("entries").and_then(Value::as_array) {
        Some(entries) => {
            let members = entries
                .iter()
                .filter_map(|entry| entry.get("url").and_then(Value::as_str))
                .map(ToString::to_string)
                .collect();
            (true, members)
        }
        None => (false, Vec::new()),
    };
    Ok(PlaylistListing {
        title,
        members,
        is_playlist,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::extractor::options::{AudioExtraction, ClientProfile};

    #[test]
    fn strip_ansi_removes_color_codes() {
        let colored = "\x1b[0;31mERROR:\x1b[0m Video unavailable";
        assert_eq!(strip_ansi(colored), "ERROR: Video unavailable");
    }

    #[test]
    fn strip_ansi_leaves_plain_text_alone() {
        assert_eq!(strip_ansi("plain message"), "plain message");
    }

    #[test]
    fn probe_parses_title_and_duration() {
        let raw = br#"{"title": "A Video", "duration": 125.6}"#;
        let info = parse_probe(raw).unwrap();
        assert_eq!(info.title, "A Video");
        assert_eq!(info.duration_seconds, Some(125));
    }

    #[test]
    fn probe_without_title_uses_fallback_label() {
        let raw = br#"{"duration": 10}"#;
        let info = parse_probe(raw).unwrap();
        assert_eq!(info.title, FALLBACK_TITLE);
    }

    #[test]
    fn probe_rejects_garbage() {
        assert!(parse_probe(b"not json").is_err());
    }

    #[test]
    fn listing_collects_member_urls() {
        let raw = br#"{"title": "My Mix", "entries": [
            {"url": "https://example.com/a"},
            {"url": "https://example.com/b"}
        ]}"#;
        let listing = parse_listing(raw).unwrap();
        assert!(listing.is_playlist);
        assert_eq!(listing.title, "My Mix");
        assert_eq!(
            listing.members,
            vec!["https://example.com/a", "https://example.com/b"]
        );
    }

    #[test]
    fn listing_with_empty_entries_is_still_a_playlist() {
        let raw = br#"{"title": "Empty Mix", "entries": []}"#;
        let listing = parse_listing(raw).unwrap();
        assert!(listing.is_playlist);
        assert!(listing.members.is_empty());
    }

    #[test]
    fn single_video_is_not_a_playlist() {
        let raw = br#"{"title": "Just One"}"#;
        let listing = parse_listing(raw).unwrap();
        assert!(!listing.is_playlist);
        assert!(listing.members.is_empty());
    }

    #[test]
    fn download_args_put_url_last_and_carry_format_selector() {
        let config = Config::default();
        let opts = DownloadOptions::build(
            &config,
            "mp4",
            Path::new("/tmp/work/item"),
            ClientProfile::Full,
        );
        let args = download_args("https://example.com/v", &opts);
        assert_eq!(args.last().map(String::as_str), Some("https://example.com/v"));
        let f_pos = args.iter().position(|a| a == "-f").unwrap();
        assert_eq!(args[f_pos + 1], "bestvideo+bestaudio/best");
        assert!(args.contains(&"--recode-video".to_string()));
        assert!(args.contains(&"--no-playlist".to_string()));
    }

    #[test]
    fn download_args_for_mp3_request_extraction_with_bitrate() {
        let opts = DownloadOptions {
            format_selector: "bestaudio/best".to_string(),
            recode_video: None,
            extract_audio: Some(AudioExtraction {
                codec: "mp3".to_string(),
                bitrate: Some("192K"),
            }),
            volume_filter: Some(1.5),
            output_dir: PathBuf::from("/tmp/work/item"),
            cookies: CookieSource::None,
            ffmpeg_location: Some(PathBuf::from("/opt/ffmpeg/bin")),
            mark_watched: true,
            player_client: None,
        };
        let args = download_args("https://example.com/v", &opts);
        assert!(args.windows(2).any(|w| w[0] == "-x" || (w[0] == "--audio-format" && w[1] == "mp3")));
        assert!(args.windows(2).any(|w| w[0] == "--audio-quality" && w[1] == "192K"));
        assert!(args.contains(&"ffmpeg:-af volume=1.5".to_string()));
        assert!(args.contains(&"--mark-watched".to_string()));
        assert!(args.windows(2).any(|w| w[0] == "--ffmpeg-location" && w[1] == "/opt/ffmpeg/bin"));
    }

    #[test]
    fn cookie_args_cover_both_sources() {
        assert!(cookie_args(&CookieSource::None).is_empty());
        assert_eq!(
            cookie_args(&CookieSource::Browser("firefox".to_string())),
            vec!["--cookies-from-browser", "firefox"]
        );
        assert_eq!(
            cookie_args(&CookieSource::File(PathBuf::from("/tmp/c.txt"))),
            vec!["--cookies", "/tmp/c.txt"]
        );
    }

    #[test]
    fn reduced_profile_args_carry_player_client() {
        let config = Config::default();
        let opts = DownloadOptions::build(
            &config,
            "mp4",
            Path::new("/tmp/work/item"),
            ClientProfile::Reduced,
        );
        let args = download_args("https://example.com/v", &opts);
        assert!(args.contains(&"youtube:player_client=android".to_string()));
    }
}
