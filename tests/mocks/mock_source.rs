//! Mock download source
//!
//! Simulates a probe and a download with a configurable outcome. Progress and
//! processing events are sent the way a real source sends them.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

use doraweb::core::validation::MediaUrl;
use doraweb::download::{
    DownloadError, DownloadOutput, DownloadRequest, DownloadSource, MediaInfo, ProgressInfo, SourceEvent,
};
use doraweb::AppError;

/// What a mock download does
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Write `content` to `file_name` in the work dir
    Succeed { file_name: String, content: Vec<u8> },
    /// Fail with a yt-dlp style error carrying this message
    Fail(String),
    /// Report some progress, then wait until `MockSource::release` is called
    Hold,
}

/// Configurable fake source
pub struct MockSource {
    behavior: MockBehavior,
    is_live: bool,
    probe_error: Option<String>,
    release: Arc<Semaphore>,
    downloads: AtomicU64,
}

impl MockSource {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            is_live: false,
            probe_error: None,
            release: Arc::new(Semaphore::new(0)),
            downloads: AtomicU64::new(0),
        }
    }

    /// Succeeds with a small mp4
    pub fn succeeding() -> Self {
        Self::new(MockBehavior::Succeed {
            file_name: "Mock Clip [abc123].mp4".to_string(),
            content: b"mock video bytes".to_vec(),
        })
    }

    pub fn failing(message: &str) -> Self {
        Self::new(MockBehavior::Fail(message.to_string()))
    }

    pub fn holding() -> Self {
        Self::new(MockBehavior::Hold)
    }

    /// Probe reports a live stream
    pub fn live(mut self) -> Self {
        self.is_live = true;
        self
    }

    /// Probe fails with this extraction error
    pub fn with_probe_error(mut self, message: &str) -> Self {
        self.probe_error = Some(message.to_string());
        self
    }

    /// Lets held downloads finish, including ones that have not reached the gate yet
    pub fn release(&self) {
        self.release.add_permits(Semaphore::MAX_PERMITS / 2);
    }

    /// Number of downloads started
    pub fn downloads(&self) -> u64 {
        self.downloads.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DownloadSource for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    fn supports_url(&self, _media: &MediaUrl) -> bool {
        true
    }

    async fn probe(&self, media: &MediaUrl) -> Result<MediaInfo, AppError> {
        if let Some(message) = &self.probe_error {
            return Err(DownloadError::YtDlp(message.clone()).into());
        }
        Ok(MediaInfo {
            url: media.url.to_string(),
            platform: media.platform,
            title: "Mock Clip".to_string(),
            uploader: Some("Mock Channel".to_string()),
            duration_secs: Some(42),
            thumbnail: None,
            is_live: self.is_live,
            available_heights: vec![1080, 720, 360],
            filesize_approx: Some(16),
            profile_picture: media.instagram_profile().is_some(),
        })
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        events: mpsc::UnboundedSender<SourceEvent>,
    ) -> Result<DownloadOutput, AppError> {
        self.downloads.fetch_add(1, Ordering::Relaxed);

        let _ = events.send(SourceEvent::Progress(ProgressInfo {
            percent: 40,
            downloaded_bytes: Some(40),
            total_bytes: Some(100),
            ..Default::default()
        }));

        let (file_name, content) = match &self.behavior {
            MockBehavior::Succeed { file_name, content } => (file_name.clone(), content.clone()),
            MockBehavior::Fail(message) => return Err(DownloadError::YtDlp(message.clone()).into()),
            MockBehavior::Hold => {
                let _gate = self
                    .release
                    .acquire()
                    .await
                    .map_err(|_| DownloadError::Cancelled)?;
                ("Held Clip [held].mp4".to_string(), b"held".to_vec())
            }
        };

        let _ = events.send(SourceEvent::Progress(ProgressInfo {
            percent: 100,
            downloaded_bytes: Some(100),
            total_bytes: Some(100),
            ..Default::default()
        }));
        let _ = events.send(SourceEvent::Processing);

        let file_path = request.work_dir.join(file_name);
        tokio::fs::write(&file_path, &content).await?;
        Ok(DownloadOutput {
            file_path,
            file_size: content.len() as u64,
        })
    }
}
