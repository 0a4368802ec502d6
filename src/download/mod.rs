//! Download layer: yt-dlp driving, progress parsing and the pluggable sources

pub mod error;
pub mod format;
pub mod metadata;
pub mod progress;
pub mod source;
pub mod ytdlp_errors;

pub use error::DownloadError;
pub use format::{AudioFormat, DownloadMode, DownloadOptions, Quality};
pub use metadata::MediaInfo;
pub use progress::ProgressInfo;
pub use source::{DownloadOutput, DownloadRequest, DownloadSource, SourceEvent, SourceRegistry};
