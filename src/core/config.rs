use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Reads an env var and parses it, falling back to `default` when unset or malformed.
fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Cached yt-dlp binary path
/// Read once at startup from YTDL_BIN environment variable or defaults to "yt-dlp"
pub static YTDL_BIN: Lazy<String> = Lazy::new(|| env::var("YTDL_BIN").unwrap_or_else(|_| "yt-dlp".to_string()));

/// Path to a Netscape cookies file passed to yt-dlp with `--cookies`
/// Read from YTDL_COOKIES_FILE environment variable, empty values are ignored
pub static YTDL_COOKIES_FILE: Lazy<Option<String>> = Lazy::new(|| {
    env::var("YTDL_COOKIES_FILE")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
});

/// Root directory holding one work directory per task
/// Read from DOWNLOAD_FOLDER environment variable, supports tilde (~) expansion
/// Default: ./downloads
pub static DOWNLOAD_FOLDER: Lazy<PathBuf> = Lazy::new(|| {
    let raw = env::var("DOWNLOAD_FOLDER").unwrap_or_else(|_| "downloads".to_string());
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
});

/// Directory with the index page and its assets
/// Read from STATIC_DIR environment variable
/// Default: static
pub static STATIC_DIR: Lazy<PathBuf> =
    Lazy::new(|| PathBuf::from(env::var("STATIC_DIR").unwrap_or_else(|_| "static".to_string())));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: doraweb.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "doraweb.log".to_string()));

/// Log level for both terminal and file output (error, warn, info, debug, trace)
/// Read from LOG_LEVEL environment variable
/// Default: info
pub static LOG_LEVEL: Lazy<log::LevelFilter> = Lazy::new(|| env_parse("LOG_LEVEL", log::LevelFilter::Info));

/// Web server configuration
pub mod web {
    use super::{env, env_parse, Lazy};

    /// Listen host (IP or host name), read from WEB_HOST (default 0.0.0.0)
    pub static HOST: Lazy<String> = Lazy::new(|| env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()));

    /// Listen port, read from WEB_PORT (default 5000)
    pub static PORT: Lazy<u16> = Lazy::new(|| env_parse("WEB_PORT", 5000));

    /// Interval between SSE keep-alive comments (in seconds)
    pub const SSE_KEEP_ALIVE_SECS: u64 = 15;
}

/// Task registry and job execution configuration
pub mod tasks {
    use super::{env_parse, Duration, Lazy};

    /// Maximum number of jobs running yt-dlp at the same time
    /// Read from MAX_CONCURRENT_DOWNLOADS (default 2)
    pub static MAX_CONCURRENT_DOWNLOADS: Lazy<usize> =
        Lazy::new(|| env_parse("MAX_CONCURRENT_DOWNLOADS", 2_usize).max(1));

    /// Seconds a finished task is kept when its file is never fetched
    /// Read from TASK_TTL_SECS (default 900)
    pub static TASK_TTL_SECS: Lazy<u64> = Lazy::new(|| env_parse("TASK_TTL_SECS", 900));

    /// Interval between sweeps of expired tasks (in seconds)
    pub const SWEEP_INTERVAL_SECS: u64 = 30;

    /// Finished task TTL duration
    pub fn ttl() -> Duration {
        Duration::from_secs(*TASK_TTL_SECS)
    }

    /// Sweep interval duration
    pub fn sweep_interval() -> Duration {
        Duration::from_secs(SWEEP_INTERVAL_SECS)
    }
}

/// Download configuration
pub mod download {
    use super::{env, env_parse, Duration, Lazy};

    /// Timeout for a whole yt-dlp download job (in seconds)
    /// Read from YTDLP_TIMEOUT_SECS (default 1800)
    pub static YTDLP_TIMEOUT_SECS: Lazy<u64> = Lazy::new(|| env_parse("YTDLP_TIMEOUT_SECS", 1800));

    /// Timeout for metadata probes (in seconds)
    /// Read from PROBE_TIMEOUT_SECS (default 60)
    pub static PROBE_TIMEOUT_SECS: Lazy<u64> = Lazy::new(|| env_parse("PROBE_TIMEOUT_SECS", 60));

    /// Instagram web app id sent as `X-IG-App-ID` on profile lookups
    pub static INSTAGRAM_APP_ID: Lazy<String> =
        Lazy::new(|| env::var("INSTAGRAM_APP_ID").unwrap_or_else(|_| "936619743392459".to_string()));

    /// Timeout for plain HTTP requests (profile lookups, image downloads)
    pub const HTTP_TIMEOUT_SECS: u64 = 60;

    /// Maximum length of the title part of output filenames (bytes)
    pub const MAX_TITLE_BYTES: usize = 150;

    /// yt-dlp job timeout duration
    pub fn ytdlp_timeout() -> Duration {
        Duration::from_secs(*YTDLP_TIMEOUT_SECS)
    }

    /// Probe timeout duration
    pub fn probe_timeout() -> Duration {
        Duration::from_secs(*PROBE_TIMEOUT_SECS)
    }

    /// HTTP request timeout duration
    pub fn http_timeout() -> Duration {
        Duration::from_secs(HTTP_TIMEOUT_SECS)
    }
}
