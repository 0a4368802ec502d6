//! URL validation and platform detection
//!
//! Whitelist-based: only http(s) URLs on YouTube, TikTok and Instagram hosts
//! are accepted. Instagram profile URLs are recognised separately because the
//! extractor cannot download them and they go through the profile-picture flow.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use url::Url;

use crate::core::error::AppError;

/// Platform a media URL belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    YouTube,
    TikTok,
    Instagram,
}

impl Platform {
    /// Detects the platform from the URL host, `None` for anything else.
    pub fn from_url(url: &Url) -> Option<Self> {
        let host = url.host_str()?.to_ascii_lowercase();
        let matches = |domain: &str| host == domain || host.ends_with(&format!(".{}", domain));

        if matches("youtube.com") || matches("youtu.be") || matches("youtube-nocookie.com") {
            Some(Platform::YouTube)
        } else if matches("tiktok.com") {
            Some(Platform::TikTok)
        } else if matches("instagram.com") || matches("instagr.am") {
            Some(Platform::Instagram)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::YouTube => "youtube",
            Platform::TikTok => "tiktok",
            Platform::Instagram => "instagram",
        }
    }

    /// Human-readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::YouTube => "YouTube",
            Platform::TikTok => "TikTok",
            Platform::Instagram => "Instagram",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Path segments on instagram.com that are never usernames.
const INSTAGRAM_RESERVED_PATHS: &[&str] = &[
    "p",
    "reel",
    "reels",
    "tv",
    "stories",
    "explore",
    "accounts",
    "direct",
    "about",
    "legal",
    "developer",
    "web",
    "api",
    "graphql",
    "static",
    "emails",
    "challenge",
];

#[allow(clippy::unwrap_used)]
static INSTAGRAM_USERNAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9._]{1,30}$").unwrap());

/// A validated media URL together with its platform.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaUrl {
    pub url: Url,
    pub platform: Platform,
}

impl MediaUrl {
    /// Instagram username when the URL points at a profile rather than a post.
    pub fn instagram_profile(&self) -> Option<String> {
        if self.platform == Platform::Instagram {
            extract_instagram_profile(&self.url)
        } else {
            None
        }
    }
}

/// Validates a user-supplied URL string.
///
/// # Security
/// - Only HTTP and HTTPS schemes
/// - Only YouTube, TikTok and Instagram hosts (and their subdomains)
///
/// # Examples
/// ```
/// use doraweb::core::validation::{validate_media_url, Platform};
///
/// let media = validate_media_url("https://youtu.be/dQw4w9WgXcQ").unwrap();
/// assert_eq!(media.platform, Platform::YouTube);
///
/// assert!(validate_media_url("ftp://youtube.com/video").is_err());
/// assert!(validate_media_url("https://example.com/watch").is_err());
/// assert!(validate_media_url("").is_err());
/// ```
pub fn validate_media_url(raw: &str) -> Result<MediaUrl, AppError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AppError::Validation("URL is required".to_string()));
    }

    let url = Url::parse(raw).map_err(|e| AppError::Validation(format!("Invalid URL '{}': {}", raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(AppError::Validation(format!(
            "Invalid URL '{}': unsupported scheme {}",
            raw,
            url.scheme()
        )));
    }

    let host = url
        .host_str()
        .ok_or_else(|| AppError::Validation(format!("Invalid URL '{}': no host", raw)))?
        .to_string();

    let platform = Platform::from_url(&url).ok_or(AppError::UnsupportedPlatform(host))?;

    Ok(MediaUrl { url, platform })
}

/// Returns the username when `url` is an Instagram profile URL (`instagram.com/<username>`).
///
/// Post, reel, story and other content paths return `None`.
pub fn extract_instagram_profile(url: &Url) -> Option<String> {
    if Platform::from_url(url) != Some(Platform::Instagram) {
        return None;
    }

    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    let first = segments.next()?;
    if segments.next().is_some() {
        return None;
    }

    let lower = first.to_ascii_lowercase();
    if INSTAGRAM_RESERVED_PATHS.contains(&lower.as_str()) || !INSTAGRAM_USERNAME.is_match(first) {
        return None;
    }

    Some(first.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_platform_detection() {
        assert_eq!(
            Platform::from_url(&url("https://www.youtube.com/watch?v=x")),
            Some(Platform::YouTube)
        );
        assert_eq!(
            Platform::from_url(&url("https://music.youtube.com/watch?v=x")),
            Some(Platform::YouTube)
        );
        assert_eq!(Platform::from_url(&url("https://youtu.be/x")), Some(Platform::YouTube));
        assert_eq!(
            Platform::from_url(&url("https://vm.tiktok.com/ZM123/")),
            Some(Platform::TikTok)
        );
        assert_eq!(
            Platform::from_url(&url("https://www.instagram.com/reel/abc/")),
            Some(Platform::Instagram)
        );
        assert_eq!(Platform::from_url(&url("https://example.com/youtube.com")), None);
        assert_eq!(Platform::from_url(&url("https://notyoutube.com/watch")), None);
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        assert!(matches!(validate_media_url("   "), Err(AppError::Validation(_))));
        assert!(matches!(validate_media_url("not a url"), Err(AppError::Validation(_))));
        assert!(matches!(
            validate_media_url("file:///etc/passwd"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            validate_media_url("https://vimeo.com/123"),
            Err(AppError::UnsupportedPlatform(host)) if host == "vimeo.com"
        ));
    }

    #[test]
    fn test_validate_trims_whitespace() {
        let media = validate_media_url("  https://www.tiktok.com/@user/video/1  ").unwrap();
        assert_eq!(media.platform, Platform::TikTok);
        assert_eq!(media.url.as_str(), "https://www.tiktok.com/@user/video/1");
    }

    #[test]
    fn test_extract_instagram_profile() {
        assert_eq!(
            extract_instagram_profile(&url("https://www.instagram.com/nasa/")),
            Some("nasa".to_string())
        );
        assert_eq!(
            extract_instagram_profile(&url("https://instagram.com/some.user_1")),
            Some("some.user_1".to_string())
        );
        assert_eq!(
            extract_instagram_profile(&url("https://instagram.com/nasa?igsh=abc")),
            Some("nasa".to_string())
        );
    }

    #[test]
    fn test_extract_instagram_profile_rejects_content() {
        assert_eq!(extract_instagram_profile(&url("https://www.instagram.com/p/Cxyz/")), None);
        assert_eq!(extract_instagram_profile(&url("https://www.instagram.com/reel/Cxyz/")), None);
        assert_eq!(extract_instagram_profile(&url("https://www.instagram.com/explore/")), None);
        assert_eq!(extract_instagram_profile(&url("https://www.instagram.com/")), None);
        assert_eq!(
            extract_instagram_profile(&url("https://www.instagram.com/nasa/tagged/")),
            None
        );
        assert_eq!(extract_instagram_profile(&url("https://youtube.com/nasa")), None);
    }

    #[test]
    fn test_media_url_instagram_profile() {
        let media = validate_media_url("https://www.instagram.com/nasa/").unwrap();
        assert_eq!(media.instagram_profile(), Some("nasa".to_string()));

        let media = validate_media_url("https://www.youtube.com/nasa").unwrap();
        assert_eq!(media.instagram_profile(), None);
    }

    #[test]
    fn test_platform_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Platform::TikTok).unwrap(), "\"tiktok\"");
        assert_eq!(Platform::YouTube.to_string(), "youtube");
    }
}
