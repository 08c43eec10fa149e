//! Engine invocation options and the client-profile fallback ladder.
//!
//! A download attempt is described by [`DownloadOptions`], built from the
//! settings document plus the requested format and one rung of the
//! [`ClientProfile`] ladder. The ladder trades fidelity for reliability:
//! each retry asks for less until the request is almost impossible to
//! refuse.

use std::path::{Path, PathBuf};

use crate::config::Config;

/// Formats delivered as video containers (recode directive).
pub const VIDEO_FORMATS: &[&str] = &["mp4", "webm"];

/// Formats delivered by audio extraction.
pub const AUDIO_FORMATS: &[&str] = &["mp3", "wav", "flac"];

/// Bitrate cap applied to mp3 extraction.
pub const MP3_BITRATE: &str = "192K";

/// One rung of the fallback ladder. Attempts are independent; the ladder
/// order is fixed and stops at the first success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientProfile {
    /// Everything the configuration asks for.
    Full,
    /// Alternate player client, no post-processing directives.
    Reduced,
    /// Bare "worst/best" request, nothing else.
    Minimal,
}

impl ClientProfile {
    pub const LADDER: [Self; 3] = [Self::Full, Self::Reduced, Self::Minimal];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Reduced => "reduced",
            Self::Minimal => "minimal",
        }
    }
}

/// Where the engine reads session cookies from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CookieSource {
    #[default]
    None,
    Browser(String),
    File(PathBuf),
}

impl CookieSource {
    /// Cookie source the configuration describes.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        if !config.use_cookies {
            return Self::None;
        }
        match &config.cookie_file {
            Some(path) => Self::File(path.clone()),
            None => Self::Browser(config.cookie_browser.clone()),
        }
    }
}

/// Audio extraction directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioExtraction {
    pub codec: String,
    /// Bitrate cap, set for lossy codecs only.
    pub bitrate: Option<&'static str>,
}

/// Fully described engine invocation for one attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadOptions {
    pub format_selector: String,
    pub recode_video: Option<String>,
    pub extract_audio: Option<AudioExtraction>,
    /// ffmpeg volume filter level, when volume adjustment is enabled.
    pub volume_filter: Option<f64>,
    /// Per-item workspace the artifact lands in.
    pub output_dir: PathBuf,
    pub cookies: CookieSource,
    pub ffmpeg_location: Option<PathBuf>,
    pub mark_watched: bool,
    /// Alternate extractor player client (reduced profile).
    pub player_client: Option<&'static str>,
}

impl DownloadOptions {
    /// Builds the invocation for `format` at the given ladder rung.
    #[must_use]
    pub fn build(config: &Config, format: &str, output_dir: &Path, profile: ClientProfile) -> Self {
        let is_audio = AUDIO_FORMATS.contains(&format);
        let is_video = VIDEO_FORMATS.contains(&format);

        let format_selector = match profile {
            ClientProfile::Minimal => "worst/best".to_string(),
            _ if is_audio => "bestaudio/best".to_string(),
            _ => quality_selector(&config.video_quality),
        };

        let full = profile == ClientProfile::Full;
        Self {
            format_selector,
            recode_video: (full && is_video).then(|| format.to_string()),
            extract_audio: (full && is_audio).then(|| AudioExtraction {
                codec: format.to_string(),
                bitrate: (format == "mp3").then_some(MP3_BITRATE),
            }),
            volume_filter: (full && config.enable_volume_adjustment).then_some(config.volume_level),
            output_dir: output_dir.to_path_buf(),
            cookies: match profile {
                ClientProfile::Minimal => CookieSource::None,
                _ => CookieSource::from_config(config),
            },
            ffmpeg_location: full.then(|| config.ffmpeg_path.clone()).flatten(),
            mark_watched: full && config.mark_as_watched,
            player_client: (profile == ClientProfile::Reduced).then_some("android"),
        }
    }
}

/// Format selector for video downloads under a quality ceiling.
///
/// A numeric quality N caps the stream height at N pixels while still
/// falling back to whatever is available; anything non-numeric means
/// best quality.
#[must_use]
pub fn quality_selector(video_quality: &str) -> String {
    match video_quality.trim().parse::<u32>() {
        Ok(height) => {
            format!("bestvideo[height<=?{height}]+bestaudio/best[height<=?{height}]/best")
        }
        Err(_) => "bestvideo+bestaudio/best".to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config_with(quality: &str) -> Config {
        Config {
            video_quality: quality.to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn numeric_quality_caps_height() {
        assert_eq!(
            quality_selector("1080"),
            "bestvideo[height<=?1080]+bestaudio/best[height<=?1080]/best"
        );
    }

    #[test]
    fn non_numeric_quality_means_best() {
        assert_eq!(quality_selector("best"), "bestvideo+bestaudio/best");
        assert_eq!(quality_selector(""), "bestvideo+bestaudio/best");
    }

    #[test]
    fn full_profile_video_recodes_to_target_container() {
        let config = config_with("720");
        let opts =
            DownloadOptions::build(&config, "webm", Path::new("/tmp/work"), ClientProfile::Full);
        assert_eq!(opts.recode_video.as_deref(), Some("webm"));
        assert!(opts.extract_audio.is_none());
        assert!(opts.format_selector.contains("height<=?720"));
    }

    #[test]
    fn full_profile_mp3_extracts_with_bitrate_cap() {
        let config = config_with("best");
        let opts =
            DownloadOptions::build(&config, "mp3", Path::new("/tmp/work"), ClientProfile::Full);
        let audio = opts.extract_audio.unwrap();
        assert_eq!(audio.codec, "mp3");
        assert_eq!(audio.bitrate, Some("192K"));
        assert_eq!(opts.format_selector, "bestaudio/best");
        assert!(opts.recode_video.is_none());
    }

    #[test]
    fn lossless_audio_has_no_bitrate_cap() {
        let config = config_with("best");
        let opts =
            DownloadOptions::build(&config, "flac", Path::new("/tmp/work"), ClientProfile::Full);
        assert_eq!(opts.extract_audio.unwrap().bitrate, None);
    }

    #[test]
    fn reduced_profile_swaps_player_client_and_drops_postprocessing() {
        let mut config = config_with("1080");
        config.enable_volume_adjustment = true;
        config.mark_as_watched = true;
        let opts =
            DownloadOptions::build(&config, "mp4", Path::new("/tmp/work"), ClientProfile::Reduced);
        assert_eq!(opts.player_client, Some("android"));
        assert!(opts.recode_video.is_none());
        assert!(opts.volume_filter.is_none());
        assert!(!opts.mark_watched);
        // quality ceiling still applies on the reduced rung
        assert!(opts.format_selector.contains("height<=?1080"));
    }

    #[test]
    fn minimal_profile_asks_for_anything_at_all() {
        let mut config = config_with("1080");
        config.use_cookies = true;
        let opts =
            DownloadOptions::build(&config, "mp4", Path::new("/tmp/work"), ClientProfile::Minimal);
        assert_eq!(opts.format_selector, "worst/best");
        assert_eq!(opts.cookies, CookieSource::None);
        assert!(opts.recode_video.is_none());
        assert!(opts.player_client.is_none());
    }

    #[test]
    fn cookie_file_wins_over_browser() {
        let mut config = Config::default();
        config.use_cookies = true;
        config.cookie_file = Some(PathBuf::from("/tmp/cookies.txt"));
        assert_eq!(
            CookieSource::from_config(&config),
            CookieSource::File(PathBuf::from("/tmp/cookies.txt"))
        );
        config.cookie_file = None;
        assert_eq!(
            CookieSource::from_config(&config),
            CookieSource::Browser("firefox".to_string())
        );
    }
}
