//! Download source abstraction layer.
//!
//! Provides the `DownloadSource` trait for pluggable download backends and a
//! `SourceRegistry` for URL-based routing.
//!
//! Built-in backends:
//! - `InstagramProfileSource`: Instagram profile URLs, downloads the profile picture
//! - `YtDlpSource`: everything else on the supported platforms, via yt-dlp

pub mod instagram;
pub mod ytdlp;

use crate::core::error::AppError;
use crate::core::validation::MediaUrl;
use crate::download::format::DownloadOptions;
use crate::download::metadata::MediaInfo;
use crate::download::progress::ProgressInfo;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

/// State changes a source reports while a job runs.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    /// Bytes are flowing
    Progress(ProgressInfo),
    /// Transfer finished, post-processing (merge, conversion) is running
    Processing,
}

/// Request parameters for a download operation.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub media: MediaUrl,
    pub options: DownloadOptions,
    /// Per-task directory; the source writes only here
    pub work_dir: PathBuf,
}

/// Output from a successful download operation.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadOutput {
    /// The produced file inside the work dir
    pub file_path: PathBuf,
    /// File size in bytes
    pub file_size: u64,
}

/// Trait for download source implementations.
///
/// Each source handles one kind of URL and provides both the probe and the
/// actual download.
#[async_trait]
pub trait DownloadSource: Send + Sync {
    /// Human-readable name of this source (e.g., "yt-dlp")
    fn name(&self) -> &str;

    /// Whether this source can handle the given URL.
    fn supports_url(&self, media: &MediaUrl) -> bool;

    /// Fetch the metadata shown before a download starts.
    async fn probe(&self, media: &MediaUrl) -> Result<MediaInfo, AppError>;

    /// Execute the download into `request.work_dir`, reporting through `events`.
    async fn download(
        &self,
        request: &DownloadRequest,
        events: mpsc::UnboundedSender<SourceEvent>,
    ) -> Result<DownloadOutput, AppError>;
}

/// Registry that routes URLs to the appropriate download source.
///
/// Sources are tried in order; the first source that claims to support
/// the URL is used.
pub struct SourceRegistry {
    sources: Vec<Arc<dyn DownloadSource>>,
}

impl SourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { sources: Vec::new() }
    }

    /// Register a download source. Sources are tried in insertion order.
    pub fn register(&mut self, source: Arc<dyn DownloadSource>) {
        self.sources.push(source);
    }

    /// Find the first source that supports the given URL.
    pub fn resolve(&self, media: &MediaUrl) -> Option<Arc<dyn DownloadSource>> {
        self.sources.iter().find(|s| s.supports_url(media)).cloned()
    }

    /// Like `resolve`, but an unmatched URL is a client error.
    pub fn resolve_or_err(&self, media: &MediaUrl) -> Result<Arc<dyn DownloadSource>, AppError> {
        self.resolve(media).ok_or_else(|| {
            AppError::Validation(format!(
                "No download source can handle this {} link",
                media.platform.display_name()
            ))
        })
    }

    /// Create the default registry with built-in sources.
    pub fn default_registry() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(instagram::InstagramProfileSource::new()));
        registry.register(Arc::new(ytdlp::YtDlpSource::new()));
        registry
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::default_registry()
    }
}
