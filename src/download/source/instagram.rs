//! InstagramProfileSource: profile-picture downloads for Instagram profile URLs.
//!
//! yt-dlp has no extractor for `instagram.com/<username>`, so profile URLs are
//! resolved through Instagram's public `web_profile_info` endpoint and the HD
//! profile picture is fetched directly.

use crate::core::config;
use crate::core::error::AppError;
use crate::core::utils::escape_filename;
use crate::core::validation::{MediaUrl, Platform};
use crate::download::error::DownloadError;
use crate::download::metadata::MediaInfo;
use crate::download::progress::ProgressInfo;
use crate::download::source::{DownloadOutput, DownloadRequest, DownloadSource, SourceEvent};
use async_trait::async_trait;
use futures_util::StreamExt;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

const PROFILE_API: &str = "https://i.instagram.com/api/v1/users/web_profile_info/";
const API_USER_AGENT: &str = "Instagram 275.0.0.27.98 Android";
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// The profile fields we need.
#[derive(Debug, Clone, PartialEq)]
pub struct InstagramProfile {
    pub username: String,
    pub full_name: Option<String>,
    pub profile_pic_url: String,
}

/// Download source for Instagram profile pictures.
pub struct InstagramProfileSource {
    client: reqwest::Client,
}

impl Default for InstagramProfileSource {
    fn default() -> Self {
        Self::new()
    }
}

impl InstagramProfileSource {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(config::download::http_timeout())
            .connect_timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|e| {
                log::warn!("InstagramProfileSource: falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });
        Self { client }
    }

    fn username(media: &MediaUrl) -> Result<String, AppError> {
        media
            .instagram_profile()
            .ok_or_else(|| AppError::Validation("Not an Instagram profile URL".to_string()))
    }

    /// Looks the profile up through `web_profile_info`.
    pub async fn fetch_profile(&self, username: &str) -> Result<InstagramProfile, AppError> {
        let endpoint = format!("{}?username={}", PROFILE_API, urlencoding::encode(username));
        log::debug!("Fetching Instagram profile {}", username);

        let response = self
            .client
            .get(&endpoint)
            .header("X-IG-App-ID", config::download::INSTAGRAM_APP_ID.as_str())
            .header(reqwest::header::USER_AGENT, API_USER_AGENT)
            .send()
            .await
            .map_err(|e| DownloadError::Instagram(format!("Instagram profile lookup failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DownloadError::Instagram(format!("Instagram profile '{}' not found", username)).into());
        }
        if !status.is_success() {
            log::warn!("web_profile_info for {} returned HTTP {}", username, status);
            return Err(DownloadError::Instagram(format!("Instagram returned HTTP {}", status.as_u16())).into());
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| DownloadError::Instagram(format!("Failed to parse profile response: {}", e)))?;

        parse_profile_response(username, &body).map_err(AppError::from)
    }
}

/// Extracts the profile from a `web_profile_info` body.
///
/// Prefers `profile_pic_url_hd`, falling back to `profile_pic_url`.
pub fn parse_profile_response(username: &str, body: &serde_json::Value) -> Result<InstagramProfile, DownloadError> {
    let user = body
        .pointer("/data/user")
        .filter(|u| !u.is_null())
        .ok_or_else(|| DownloadError::Instagram(format!("Instagram profile '{}' not found", username)))?;

    let pic = |key: &str| {
        user.get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(String::from)
    };
    let profile_pic_url = pic("profile_pic_url_hd")
        .or_else(|| pic("profile_pic_url"))
        .ok_or_else(|| DownloadError::Instagram("Profile has no picture".to_string()))?;

    let full_name = user
        .get("full_name")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);

    let username = user
        .get("username")
        .and_then(|v| v.as_str())
        .unwrap_or(username)
        .to_string();

    Ok(InstagramProfile {
        username,
        full_name,
        profile_pic_url,
    })
}

/// File name of a saved profile picture
pub fn profile_picture_filename(username: &str) -> String {
    escape_filename(&format!("{}_profile.jpg", username))
}

#[async_trait]
impl DownloadSource for InstagramProfileSource {
    fn name(&self) -> &str {
        "instagram-profile"
    }

    fn supports_url(&self, media: &MediaUrl) -> bool {
        media.instagram_profile().is_some()
    }

    async fn probe(&self, media: &MediaUrl) -> Result<MediaInfo, AppError> {
        let profile = self.fetch_profile(&Self::username(media)?).await?;
        let shown_name = profile.full_name.clone().unwrap_or_else(|| profile.username.clone());

        Ok(MediaInfo {
            url: media.url.to_string(),
            platform: Platform::Instagram,
            title: format!("{} profile picture", shown_name),
            uploader: Some(profile.username),
            duration_secs: None,
            thumbnail: Some(profile.profile_pic_url),
            is_live: false,
            available_heights: Vec::new(),
            filesize_approx: None,
            profile_picture: true,
        })
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        events: mpsc::UnboundedSender<SourceEvent>,
    ) -> Result<DownloadOutput, AppError> {
        let profile = self.fetch_profile(&Self::username(&request.media)?).await?;
        log::info!("Downloading Instagram profile picture of {}", profile.username);

        let response = self
            .client
            .get(&profile.profile_pic_url)
            .send()
            .await
            .map_err(|e| DownloadError::Instagram(format!("Failed to download profile picture: {}", e)))?;
        if !response.status().is_success() {
            return Err(DownloadError::Instagram(format!(
                "Profile picture download HTTP {}",
                response.status().as_u16()
            ))
            .into());
        }

        let total_size = response.content_length();
        let file_path = request.work_dir.join(profile_picture_filename(&profile.username));
        let mut file = tokio::fs::File::create(&file_path).await?;

        let started = Instant::now();
        let mut downloaded: u64 = 0;
        let mut last_percent: Option<u8> = None;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| DownloadError::Instagram(format!("Error reading picture: {}", e)))?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;

            let percent = match total_size {
                Some(total) if total > 0 => ((downloaded as f64 / total as f64) * 100.0).min(100.0) as u8,
                _ => 0,
            };
            if last_percent != Some(percent) {
                last_percent = Some(percent);
                let elapsed = started.elapsed().as_secs_f64();
                let _ = events.send(SourceEvent::Progress(ProgressInfo {
                    percent,
                    speed_bytes_per_sec: (elapsed > 0.0).then(|| downloaded as f64 / elapsed),
                    eta_seconds: None,
                    downloaded_bytes: Some(downloaded),
                    total_bytes: total_size,
                }));
            }
        }
        file.flush().await?;

        Ok(DownloadOutput {
            file_path,
            file_size: downloaded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::validation::validate_media_url;
    use serde_json::json;

    #[test]
    fn test_parse_profile_prefers_hd() {
        let body = json!({"data": {"user": {
            "username": "nasa",
            "full_name": "NASA",
            "profile_pic_url": "https://cdn.example/small.jpg",
            "profile_pic_url_hd": "https://cdn.example/hd.jpg"
        }}});
        let profile = parse_profile_response("nasa", &body).unwrap();
        assert_eq!(profile.profile_pic_url, "https://cdn.example/hd.jpg");
        assert_eq!(profile.full_name.as_deref(), Some("NASA"));
        assert_eq!(profile.username, "nasa");
    }

    #[test]
    fn test_parse_profile_falls_back_to_regular_picture() {
        let body = json!({"data": {"user": {
            "full_name": "",
            "profile_pic_url": "https://cdn.example/small.jpg",
            "profile_pic_url_hd": ""
        }}});
        let profile = parse_profile_response("someone", &body).unwrap();
        assert_eq!(profile.profile_pic_url, "https://cdn.example/small.jpg");
        assert_eq!(profile.full_name, None);
        assert_eq!(profile.username, "someone");
    }

    #[test]
    fn test_parse_profile_missing_user() {
        let err = parse_profile_response("ghost", &json!({"data": {"user": null}})).unwrap_err();
        assert!(matches!(err, DownloadError::Instagram(msg) if msg.contains("ghost")));
        assert!(parse_profile_response("ghost", &json!({"status": "fail"})).is_err());
        assert!(parse_profile_response("x", &json!({"data": {"user": {"full_name": "X"}}})).is_err());
    }

    #[test]
    fn test_profile_picture_filename() {
        assert_eq!(profile_picture_filename("nasa"), "nasa_profile.jpg");
        assert_eq!(profile_picture_filename("some.user_1"), "some.user_1_profile.jpg");
    }

    #[test]
    fn test_supports_only_profiles() {
        let source = InstagramProfileSource::new();
        assert!(source.supports_url(&validate_media_url("https://instagram.com/nasa").unwrap()));
        assert!(!source.supports_url(&validate_media_url("https://instagram.com/p/Cabc/").unwrap()));
        assert!(!source.supports_url(&validate_media_url("https://youtu.be/abc").unwrap()));
    }
}
