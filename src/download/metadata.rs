//! Media probing through `yt-dlp --dump-single-json`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::process::Command;
use url::Url;

use crate::core::config;
use crate::core::error::AppError;
use crate::core::process::run_with_timeout;
use crate::core::validation::Platform;
use crate::download::error::DownloadError;
use crate::download::ytdlp_errors::ytdlp_failure;

/// What the client is shown before starting a download.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaInfo {
    pub url: String,
    pub platform: Platform,
    pub title: String,
    pub uploader: Option<String>,
    pub duration_secs: Option<u64>,
    pub thumbnail: Option<String>,
    pub is_live: bool,
    /// Distinct video heights on offer, highest first
    pub available_heights: Vec<u32>,
    pub filesize_approx: Option<u64>,
    /// True for Instagram profile URLs; the download will be the profile picture
    pub profile_picture: bool,
}

/// The subset of yt-dlp's info JSON we read.
#[derive(Debug, Default, Deserialize)]
struct YtDlpInfo {
    title: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    is_live: Option<bool>,
    live_status: Option<String>,
    filesize: Option<u64>,
    filesize_approx: Option<u64>,
    #[serde(default)]
    formats: Vec<YtDlpFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct YtDlpFormat {
    height: Option<u32>,
    vcodec: Option<String>,
}

impl MediaInfo {
    /// Builds `MediaInfo` from yt-dlp's `--dump-single-json` output.
    pub fn from_ytdlp_json(url: &Url, platform: Platform, json: &str) -> Result<Self, AppError> {
        let info: YtDlpInfo = serde_json::from_str(json)?;

        let mut available_heights: Vec<u32> = info
            .formats
            .iter()
            .filter(|f| f.vcodec.as_deref() != Some("none"))
            .filter_map(|f| f.height)
            .filter(|h| *h > 0)
            .collect();
        available_heights.sort_unstable_by(|a, b| b.cmp(a));
        available_heights.dedup();

        let is_live = info.is_live.unwrap_or(false)
            || matches!(info.live_status.as_deref(), Some("is_live") | Some("is_upcoming"));

        Ok(Self {
            url: url.to_string(),
            platform,
            title: info
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "Untitled".to_string()),
            uploader: info.uploader.or(info.channel),
            duration_secs: info.duration.filter(|d| d.is_finite() && *d >= 0.0).map(|d| d.round() as u64),
            thumbnail: info.thumbnail,
            is_live,
            available_heights,
            filesize_approx: info.filesize.or(info.filesize_approx),
            profile_picture: false,
        })
    }
}

/// Adds `--cookies <file>` when a cookies file is configured and present.
pub fn add_cookies_args(args: &mut Vec<String>) {
    if let Some(cookies_file) = config::YTDL_COOKIES_FILE.as_deref() {
        let expanded = shellexpand::tilde(cookies_file).into_owned();
        if Path::new(&expanded).exists() {
            args.push("--cookies".to_string());
            args.push(expanded);
        } else {
            log::warn!("Cookies file not found, running without cookies: {}", expanded);
        }
    }
}

/// Probes `url` with yt-dlp, bounded by the probe timeout.
pub async fn probe_with_ytdlp(url: &Url, platform: Platform) -> Result<MediaInfo, AppError> {
    let ytdl_bin = config::YTDL_BIN.as_str();
    let mut args: Vec<String> = vec![
        "--dump-single-json".to_string(),
        "--no-playlist".to_string(),
        "--no-warnings".to_string(),
        "--skip-download".to_string(),
    ];
    add_cookies_args(&mut args);
    args.push(url.to_string());

    log::debug!("Probing {} with {}", url, ytdl_bin);
    let mut cmd = Command::new(ytdl_bin);
    cmd.args(&args);
    let output = run_with_timeout(&mut cmd, config::download::probe_timeout()).await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ytdlp_failure("probe", &stderr).into());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    MediaInfo::from_ytdlp_json(url, platform, &stdout).map_err(|e| {
        log::error!("Unparseable yt-dlp JSON for {}: {}", url, e);
        AppError::Download(DownloadError::YtDlp("Could not read media information.".to_string()))
    })
}
