//! Mock implementations for integration tests
//!
//! Provides a `DownloadSource` that never touches the network or spawns
//! yt-dlp, so the web layer and task runner can be driven end to end.

pub mod mock_source;

#[allow(unused_imports)]
pub use mock_source::{MockBehavior, MockSource};
