//! Logging initialization and startup diagnostics
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - A startup summary of the effective configuration

use anyhow::Result;
use simplelog::*;
use std::fs::File;
use std::path::Path;

use crate::core::config;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
/// * `level` - Level applied to both sinks
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to create the file or a logger was already set
pub fn init_logger(log_file_path: &str, level: LevelFilter) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    CombinedLogger::init(vec![
        TermLogger::new(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto),
        WriteLogger::new(level, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs the effective configuration at startup
///
/// Warns about a missing cookies file early, since yt-dlp only reports it
/// once the first job runs.
pub fn log_startup_configuration() {
    log::info!("yt-dlp binary: {}", config::YTDL_BIN.as_str());
    log::info!("Download folder: {}", config::DOWNLOAD_FOLDER.display());
    log::info!("Static dir: {}", config::STATIC_DIR.display());
    log::info!(
        "Max concurrent downloads: {}, task TTL: {}s, job timeout: {}s",
        *config::tasks::MAX_CONCURRENT_DOWNLOADS,
        *config::tasks::TASK_TTL_SECS,
        *config::download::YTDLP_TIMEOUT_SECS
    );

    match config::YTDL_COOKIES_FILE.as_deref() {
        Some(cookies_file) => {
            let expanded = shellexpand::tilde(cookies_file).into_owned();
            if Path::new(&expanded).exists() {
                log::info!("Cookies file: {}", expanded);
            } else {
                log::error!("YTDL_COOKIES_FILE: {} (FILE NOT FOUND), downloads run without cookies", expanded);
            }
        }
        None => log::info!("Cookies file: not set"),
    }

    if !config::STATIC_DIR.join("index.html").exists() {
        log::warn!(
            "No index.html in {}, the web page will 404 (API still works)",
            config::STATIC_DIR.display()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::NamedTempFile;

    #[test]
    fn test_init_logger_creates_log_file() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap();

        // A logger may already be installed by another test in this binary,
        // in which case init fails but the file is still created.
        let _ = init_logger(path, LevelFilter::Info);
        assert!(temp_file.path().exists());
    }
}
