//! Classification of yt-dlp failures.
//!
//! The extractor reports failures as free text on stderr. This module maps that
//! text to a small set of error kinds and to a message a user can act on.

use crate::core::utils::truncate_tail_utf8;
use crate::download::error::DownloadError;

/// Kinds of yt-dlp failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YtDlpErrorType {
    /// Private, removed, region-locked or otherwise unavailable media
    VideoUnavailable,
    /// The platform wants a logged-in session (age gate, private account, stale cookies)
    LoginRequired,
    /// The platform blocked the request as automated
    BotDetection,
    /// Timeouts, DNS failures, dropped connections
    NetworkError,
    /// URL not recognised by any extractor
    Unsupported,
    /// ffmpeg or another post-processor failed
    PostprocessingError,
    Unknown,
}

impl YtDlpErrorType {
    /// Label used for logs and the `reason` metric label
    pub fn as_str(&self) -> &'static str {
        match self {
            YtDlpErrorType::VideoUnavailable => "unavailable",
            YtDlpErrorType::LoginRequired => "login_required",
            YtDlpErrorType::BotDetection => "bot_detection",
            YtDlpErrorType::NetworkError => "network",
            YtDlpErrorType::Unsupported => "unsupported",
            YtDlpErrorType::PostprocessingError => "postprocessing",
            YtDlpErrorType::Unknown => "unknown",
        }
    }
}

/// Analyses yt-dlp stderr and determines the error type.
///
/// Order matters: login prompts often also mention "unavailable", so they are
/// checked first.
pub fn analyze_ytdlp_error(stderr: &str) -> YtDlpErrorType {
    let stderr_lower = stderr.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| stderr_lower.contains(n));

    if has(&[
        "sign in to confirm your age",
        "login required",
        "requires login",
        "log in for access",
        "this account is private",
        "cookies are no longer valid",
        "cookies have likely been rotated",
        "use --cookies",
        "please sign in",
    ]) {
        return YtDlpErrorType::LoginRequired;
    }

    if has(&[
        "sign in to confirm you're not a bot",
        "sign in to confirm you’re not a bot",
        "bot detection",
        "http error 403",
        "http error 429",
        "too many requests",
        "rate-limit reached",
    ]) {
        return YtDlpErrorType::BotDetection;
    }

    if has(&[
        "private video",
        "video unavailable",
        "this video is not available",
        "video is not available",
        "video is private",
        "video has been removed",
        "this video does not exist",
        "http error 404",
        "not available in your country",
        "content is not available",
        "this post is unavailable",
    ]) {
        return YtDlpErrorType::VideoUnavailable;
    }

    if has(&["unsupported url", "no suitable extractor", "is not a valid url"]) {
        return YtDlpErrorType::Unsupported;
    }

    if has(&[
        "postprocessing:",
        "ffmpeg not found",
        "ffprobe and ffmpeg not found",
        "conversion failed",
        "error merging",
    ]) {
        return YtDlpErrorType::PostprocessingError;
    }

    if has(&[
        "timed out",
        "timeout",
        "connection",
        "network is unreachable",
        "temporary failure in name resolution",
        "name or service not known",
        "failed to connect",
        "socket",
    ]) {
        return YtDlpErrorType::NetworkError;
    }

    YtDlpErrorType::Unknown
}

/// Returns the user-facing message for an error type
pub fn get_error_message(error_type: YtDlpErrorType) -> &'static str {
    match error_type {
        YtDlpErrorType::VideoUnavailable => {
            "This media is unavailable. It may be private, removed or blocked in this region."
        }
        YtDlpErrorType::LoginRequired => "This media requires a logged-in account and cannot be downloaded.",
        YtDlpErrorType::BotDetection => "The platform blocked the request. Please try again later.",
        YtDlpErrorType::NetworkError => "Network problem while contacting the platform. Please try again.",
        YtDlpErrorType::Unsupported => "This link is not supported.",
        YtDlpErrorType::PostprocessingError => "The file was downloaded but could not be converted.",
        YtDlpErrorType::Unknown => "Download failed. Check that the link is correct.",
    }
}

/// Turns a failed run's stderr into a `DownloadError` carrying the user message.
///
/// The raw stderr line is logged here and nowhere else.
pub fn ytdlp_failure(context: &str, stderr: &str) -> DownloadError {
    let error_type = analyze_ytdlp_error(stderr);
    log::error!(
        "yt-dlp {} failed ({}): {}",
        context,
        error_type.as_str(),
        truncate_tail_utf8(last_error_line(stderr).unwrap_or("<no stderr>"), 500)
    );
    DownloadError::YtDlp(get_error_message(error_type).to_string())
}

/// Last non-empty `ERROR:` line of stderr, for logs.
pub fn last_error_line(stderr: &str) -> Option<&str> {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| stderr.lines().rev().map(str::trim).find(|l| !l.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_unavailable() {
        assert_eq!(
            analyze_ytdlp_error("ERROR: [youtube] abc: Private video. Sign in if you've been granted access"),
            YtDlpErrorType::VideoUnavailable
        );
        assert_eq!(
            analyze_ytdlp_error("ERROR: [youtube] abc: Video unavailable"),
            YtDlpErrorType::VideoUnavailable
        );
    }

    #[test]
    fn test_analyze_login_and_bot() {
        assert_eq!(
            analyze_ytdlp_error("ERROR: [youtube] abc: Sign in to confirm your age."),
            YtDlpErrorType::LoginRequired
        );
        assert_eq!(
            analyze_ytdlp_error("ERROR: [Instagram] abc: Requires login. Use --cookies"),
            YtDlpErrorType::LoginRequired
        );
        assert_eq!(
            analyze_ytdlp_error("ERROR: [youtube] abc: Sign in to confirm you're not a bot."),
            YtDlpErrorType::BotDetection
        );
        assert_eq!(
            analyze_ytdlp_error("ERROR: unable to download video data: HTTP Error 403: Forbidden"),
            YtDlpErrorType::BotDetection
        );
    }

    #[test]
    fn test_analyze_other_kinds() {
        assert_eq!(
            analyze_ytdlp_error("ERROR: Unsupported URL: https://www.tiktok.com/"),
            YtDlpErrorType::Unsupported
        );
        assert_eq!(
            analyze_ytdlp_error("ERROR: Postprocessing: Conversion failed!"),
            YtDlpErrorType::PostprocessingError
        );
        assert_eq!(
            analyze_ytdlp_error("ERROR: <urlopen error [Errno -3] Temporary failure in name resolution>"),
            YtDlpErrorType::NetworkError
        );
        assert_eq!(analyze_ytdlp_error("something odd"), YtDlpErrorType::Unknown);
        assert_eq!(analyze_ytdlp_error(""), YtDlpErrorType::Unknown);
    }

    #[test]
    fn test_messages_are_english_and_distinct() {
        let kinds = [
            YtDlpErrorType::VideoUnavailable,
            YtDlpErrorType::LoginRequired,
            YtDlpErrorType::BotDetection,
            YtDlpErrorType::NetworkError,
            YtDlpErrorType::Unsupported,
            YtDlpErrorType::PostprocessingError,
            YtDlpErrorType::Unknown,
        ];
        let mut messages: Vec<&str> = kinds.iter().map(|k| get_error_message(*k)).collect();
        messages.sort_unstable();
        messages.dedup();
        assert_eq!(messages.len(), kinds.len());
    }

    #[test]
    fn test_ytdlp_failure_hides_raw_stderr() {
        let err = ytdlp_failure("probe", "ERROR: [youtube] abc123: Video unavailable. This video is private");
        assert_eq!(
            err,
            DownloadError::YtDlp(get_error_message(YtDlpErrorType::VideoUnavailable).to_string())
        );
        assert!(!err.message().contains("abc123"));
    }

    #[test]
    fn test_last_error_line() {
        let stderr = "WARNING: something\nERROR: [youtube] abc: Video unavailable\n\n";
        assert_eq!(last_error_line(stderr), Some("ERROR: [youtube] abc: Video unavailable"));
        assert_eq!(last_error_line("just a line\n"), Some("just a line"));
        assert_eq!(last_error_line(""), None);
    }
}
