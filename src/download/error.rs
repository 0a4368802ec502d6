use std::fmt;

/// Structured error type for download jobs and probes.
///
/// The message carried by each variant is already safe to show to the client;
/// raw stderr stays in the logs.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadError {
    /// yt-dlp failures (bad exit code, unusable output)
    YtDlp(String),
    /// Expected file not found after the extractor finished
    FileNotFound(String),
    /// Job or probe timed out
    Timeout(String),
    /// Process execution failure (spawn, wait)
    Process(String),
    /// Instagram profile lookup or picture download failures
    Instagram(String),
    /// Job was cancelled by the client
    Cancelled,
    /// Catch-all for uncategorized errors
    Other(String),
}

impl fmt::Display for DownloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadError::Cancelled => write!(f, "Cancelled"),
            other => write!(f, "{}", other.message()),
        }
    }
}

impl std::error::Error for DownloadError {}

impl DownloadError {
    /// Returns subcategory for metrics
    pub fn subcategory(&self) -> &'static str {
        match self {
            DownloadError::YtDlp(_) => "ytdlp",
            DownloadError::FileNotFound(_) => "file_not_found",
            DownloadError::Timeout(_) => "timeout",
            DownloadError::Process(_) => "process",
            DownloadError::Instagram(_) => "instagram",
            DownloadError::Cancelled => "cancelled",
            DownloadError::Other(_) => "other",
        }
    }

    /// Returns the inner message
    pub fn message(&self) -> &str {
        match self {
            DownloadError::YtDlp(msg)
            | DownloadError::FileNotFound(msg)
            | DownloadError::Timeout(msg)
            | DownloadError::Process(msg)
            | DownloadError::Instagram(msg)
            | DownloadError::Other(msg) => msg,
            DownloadError::Cancelled => "Cancelled",
        }
    }
}

impl From<String> for DownloadError {
    fn from(s: String) -> Self {
        DownloadError::Other(s)
    }
}

impl From<&str> for DownloadError {
    fn from(s: &str) -> Self {
        DownloadError::Other(s.to_string())
    }
}
