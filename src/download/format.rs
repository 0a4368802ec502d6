//! Download options and their mapping to yt-dlp arguments.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What the client wants out of the media.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadMode {
    #[default]
    Video,
    Audio,
}

impl DownloadMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadMode::Video => "video",
            DownloadMode::Audio => "audio",
        }
    }
}

impl FromStr for DownloadMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "video" => Ok(DownloadMode::Video),
            "audio" => Ok(DownloadMode::Audio),
            other => Err(format!("unknown mode '{}', expected video or audio", other)),
        }
    }
}

/// Requested video quality
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quality {
    #[default]
    #[serde(rename = "best")]
    Best,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "360p")]
    P360,
}

impl Quality {
    /// Height cap, `None` for `best`
    pub fn max_height(&self) -> Option<u32> {
        match self {
            Quality::Best => None,
            Quality::P1080 => Some(1080),
            Quality::P720 => Some(720),
            Quality::P480 => Some(480),
            Quality::P360 => Some(360),
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max_height() {
            Some(h) => write!(f, "{}p", h),
            None => f.write_str("best"),
        }
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "best" => Ok(Quality::Best),
            "1080p" | "1080" => Ok(Quality::P1080),
            "720p" | "720" => Ok(Quality::P720),
            "480p" | "480" => Ok(Quality::P480),
            "360p" | "360" => Ok(Quality::P360),
            other => Err(format!("unknown quality '{}', expected best, 1080p, 720p, 480p or 360p", other)),
        }
    }
}

/// Target container of audio-only downloads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    M4a,
}

impl AudioFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::M4a => "m4a",
        }
    }
}

impl FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mp3" => Ok(AudioFormat::Mp3),
            "m4a" => Ok(AudioFormat::M4a),
            other => Err(format!("unknown audio format '{}', expected mp3 or m4a", other)),
        }
    }
}

/// Options of one download request; every field has a default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadOptions {
    #[serde(default)]
    pub mode: DownloadMode,
    #[serde(default)]
    pub quality: Quality,
    #[serde(default)]
    pub audio_format: AudioFormat,
}

/// Builds a video format selector capped at `max_height`.
///
/// H.264 + AAC streams come first so the merged mp4 plays everywhere, then
/// any codec at the same cap, then whatever yt-dlp considers best.
pub fn build_video_format(max_height: Option<u32>) -> String {
    let filt = max_height.map(|h| format!("[height<={h}]")).unwrap_or_default();

    let parts = [
        format!("bv*{filt}[vcodec^=avc1]+ba[acodec^=mp4a]"),
        format!("bv*{filt}[vcodec^=avc1][ext=mp4]+ba[ext=m4a]"),
        format!("bv*{filt}+ba"),
        format!("b{filt}"),
        "best".to_string(),
    ];

    parts.join("/")
}

/// yt-dlp arguments selecting formats and post-processing for `options`.
pub fn ytdlp_format_args(options: &DownloadOptions) -> Vec<String> {
    match options.mode {
        DownloadMode::Video => vec![
            "-f".to_string(),
            build_video_format(options.quality.max_height()),
            "--merge-output-format".to_string(),
            "mp4".to_string(),
        ],
        DownloadMode::Audio => vec![
            "-f".to_string(),
            "bestaudio/best".to_string(),
            "--extract-audio".to_string(),
            "--audio-format".to_string(),
            options.audio_format.as_str().to_string(),
            "--audio-quality".to_string(),
            "0".to_string(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_options_defaults_from_empty_json() {
        let opts: DownloadOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts, DownloadOptions::default());
        assert_eq!(opts.mode, DownloadMode::Video);
        assert_eq!(opts.quality, Quality::Best);
        assert_eq!(opts.audio_format, AudioFormat::Mp3);
    }

    #[test]
    fn test_options_parse() {
        let opts: DownloadOptions =
            serde_json::from_str(r#"{"mode":"audio","quality":"720p","audio_format":"m4a"}"#).unwrap();
        assert_eq!(opts.mode, DownloadMode::Audio);
        assert_eq!(opts.quality, Quality::P720);
        assert_eq!(opts.audio_format, AudioFormat::M4a);

        assert!(serde_json::from_str::<DownloadOptions>(r#"{"quality":"4k"}"#).is_err());
    }

    #[test]
    fn test_quality_display() {
        assert_eq!(Quality::Best.to_string(), "best");
        assert_eq!(Quality::P480.to_string(), "480p");
    }

    #[test]
    fn test_from_str() {
        assert_eq!("Audio".parse::<DownloadMode>(), Ok(DownloadMode::Audio));
        assert_eq!("720".parse::<Quality>(), Ok(Quality::P720));
        assert_eq!("1080p".parse::<Quality>(), Ok(Quality::P1080));
        assert_eq!("m4a".parse::<AudioFormat>(), Ok(AudioFormat::M4a));
        assert!("flac".parse::<AudioFormat>().is_err());
        assert!("4k".parse::<Quality>().is_err());
    }

    #[test]
    fn test_video_format_with_height() {
        let f = build_video_format(Some(720));
        assert!(f.starts_with("bv*[height<=720][vcodec^=avc1]+ba[acodec^=mp4a]/"));
        assert!(f.contains("/bv*[height<=720]+ba/"));
        assert!(f.contains("/b[height<=720]/"));
        assert!(f.ends_with("/best"));
        assert!(!f.contains("1080"));
    }

    #[test]
    fn test_video_format_best_has_no_height_filter() {
        let f = build_video_format(None);
        assert!(!f.contains("height"));
        assert_eq!(f, "bv*[vcodec^=avc1]+ba[acodec^=mp4a]/bv*[vcodec^=avc1][ext=mp4]+ba[ext=m4a]/bv*+ba/b/best");
    }

    #[test]
    fn test_ytdlp_args_video() {
        let args = ytdlp_format_args(&DownloadOptions {
            quality: Quality::P1080,
            ..Default::default()
        });
        assert_eq!(args[0], "-f");
        assert!(args[1].contains("[height<=1080]"));
        assert_eq!(&args[2..], &["--merge-output-format", "mp4"]);
    }

    #[test]
    fn test_ytdlp_args_audio() {
        let args = ytdlp_format_args(&DownloadOptions {
            mode: DownloadMode::Audio,
            quality: Quality::P360,
            audio_format: AudioFormat::M4a,
        });
        assert_eq!(
            args,
            vec![
                "-f",
                "bestaudio/best",
                "--extract-audio",
                "--audio-format",
                "m4a",
                "--audio-quality",
                "0"
            ]
        );
    }
}
