//! Doraweb - web front-end for downloading media via yt-dlp
//!
//! A client posts a YouTube, TikTok or Instagram URL, the server runs the
//! download as a background task, streams progress over server-sent events and
//! hands the finished file out exactly once.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, metrics and URL validation
//! - `download`: yt-dlp driving, progress parsing and download sources
//! - `tasks`: in-memory task registry, job runner and cleanup
//! - `web`: axum router and handlers
//! - `cli`: command-line interface

pub mod cli;
pub mod core;
pub mod download;
pub mod tasks;
pub mod web;

// Re-export commonly used types for convenience
pub use core::{config, AppError, AppResult};
pub use tasks::{TaskRegistry, TaskRunner, TaskStatus};
pub use web::{create_router, AppState};
