//! YtDlpSource: the download backend powered by yt-dlp.
//!
//! Runs one yt-dlp child per job with `--newline` so every progress update is
//! its own stdout line, streams those lines into `SourceEvent`s and keeps the
//! tail of stderr for error classification.

use crate::core::config;
use crate::core::error::AppError;
use crate::core::validation::MediaUrl;
use crate::download::error::DownloadError;
use crate::download::format::ytdlp_format_args;
use crate::download::metadata::{add_cookies_args, probe_with_ytdlp, MediaInfo};
use crate::download::progress::{parse_line, ExtractorLine};
use crate::download::source::{DownloadOutput, DownloadRequest, DownloadSource, SourceEvent};
use crate::download::ytdlp_errors::ytdlp_failure;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// Lines of stderr kept for error classification
const STDERR_TAIL_LINES: usize = 40;

/// Suffixes of files yt-dlp leaves behind while (or after failing at) downloading.
const TEMP_SUFFIXES: &[&str] = &[".part", ".ytdl", ".temp", ".tmp"];

/// Download source powered by yt-dlp for YouTube, TikTok and Instagram posts.
pub struct YtDlpSource;

impl Default for YtDlpSource {
    fn default() -> Self {
        Self::new()
    }
}

impl YtDlpSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DownloadSource for YtDlpSource {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    fn supports_url(&self, media: &MediaUrl) -> bool {
        // yt-dlp has no extractor for bare Instagram profiles
        media.instagram_profile().is_none()
    }

    async fn probe(&self, media: &MediaUrl) -> Result<MediaInfo, AppError> {
        probe_with_ytdlp(&media.url, media.platform).await
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        events: mpsc::UnboundedSender<SourceEvent>,
    ) -> Result<DownloadOutput, AppError> {
        let args = build_download_args(request);
        let timeout = config::download::ytdlp_timeout();

        log::info!(
            "Starting yt-dlp ({} {}) for {}",
            request.options.mode.as_str(),
            request.options.quality,
            request.media.url
        );

        // Dropping the run future on timeout drops the child, and kill_on_drop reaps it
        match tokio::time::timeout(timeout, run_ytdlp(&args, &events)).await {
            Ok(result) => result?,
            Err(_) => {
                log::error!("yt-dlp timed out after {}s for {}", timeout.as_secs(), request.media.url);
                return Err(DownloadError::Timeout(format!(
                    "Download timed out after {} minutes",
                    timeout.as_secs() / 60
                ))
                .into());
            }
        }

        let _ = events.send(SourceEvent::Processing);

        let (file_path, file_size) = find_output_file(&request.work_dir).await?;
        log::info!("yt-dlp produced {} ({} bytes)", file_path.display(), file_size);

        Ok(DownloadOutput { file_path, file_size })
    }
}

/// Full yt-dlp argument list for a download job.
pub fn build_download_args(request: &DownloadRequest) -> Vec<String> {
    let template = request.work_dir.join(format!(
        "%(title).{}B [%(id)s].%(ext)s",
        config::download::MAX_TITLE_BYTES
    ));

    let mut args = vec![
        "--newline".to_string(),
        "--no-playlist".to_string(),
        "--no-colors".to_string(),
        "-o".to_string(),
        template.to_string_lossy().into_owned(),
    ];
    args.extend(ytdlp_format_args(&request.options));
    add_cookies_args(&mut args);
    args.push(request.media.url.to_string());
    args
}

/// Spawns yt-dlp and pumps its output until it exits.
async fn run_ytdlp(args: &[String], events: &mpsc::UnboundedSender<SourceEvent>) -> Result<(), AppError> {
    let ytdl_bin = config::YTDL_BIN.as_str();
    let mut child = Command::new(ytdl_bin)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| DownloadError::Process(format!("Failed to start {}: {}", ytdl_bin, e)))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| DownloadError::Process("yt-dlp stdout unavailable".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| DownloadError::Process("yt-dlp stderr unavailable".to_string()))?;

    let (pumped, stderr_tail) = tokio::join!(pump_stdout(stdout, events), read_tail(stderr, STDERR_TAIL_LINES));
    pumped?;

    let status = child
        .wait()
        .await
        .map_err(|e| DownloadError::Process(format!("Failed to wait for yt-dlp: {}", e)))?;

    if !status.success() {
        let stderr_text = stderr_tail.into_iter().collect::<Vec<_>>().join("\n");
        return Err(ytdlp_failure("download", &stderr_text).into());
    }
    Ok(())
}

/// Forwards progress and post-processing lines as events.
async fn pump_stdout<R: AsyncRead + Unpin>(
    stdout: R,
    events: &mpsc::UnboundedSender<SourceEvent>,
) -> Result<(), AppError> {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(());
        }
        let line = String::from_utf8_lossy(&buf);
        match parse_line(&line) {
            Some(ExtractorLine::Progress(progress)) => {
                let _ = events.send(SourceEvent::Progress(progress));
            }
            Some(ExtractorLine::PostProcessing(tag)) => {
                log::debug!("yt-dlp post-processing: {}", tag);
                let _ = events.send(SourceEvent::Processing);
            }
            None => log::trace!("yt-dlp: {}", line.trim_end()),
        }
    }
}

/// Reads a stream to the end keeping only its last `max_lines` lines.
async fn read_tail<R: AsyncRead + Unpin>(stream: R, max_lines: usize) -> VecDeque<String> {
    let mut reader = BufReader::new(stream);
    let mut tail = VecDeque::with_capacity(max_lines);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                if tail.len() == max_lines {
                    tail.pop_front();
                }
                tail.push_back(String::from_utf8_lossy(&buf).trim_end().to_string());
            }
        }
    }
    tail
}

/// Finds the file yt-dlp produced in `work_dir`, with its size.
///
/// The work dir belongs to a single job, so after temporary and hidden files
/// are skipped the largest remaining file is the result.
pub async fn find_output_file(work_dir: &Path) -> Result<(PathBuf, u64), DownloadError> {
    let read_err = |e: std::io::Error| DownloadError::FileNotFound(format!("Failed to read work dir: {}", e));
    let mut entries = tokio::fs::read_dir(work_dir).await.map_err(read_err)?;
    let mut best: Option<(PathBuf, u64)> = None;

    while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') || TEMP_SUFFIXES.iter().any(|s| name.ends_with(s)) || name.contains(".part-Frag") {
            continue;
        }
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        let larger = !matches!(&best, Some((_, len)) if *len >= meta.len());
        if meta.is_file() && larger {
            best = Some((entry.path(), meta.len()));
        }
    }

    best.ok_or_else(|| DownloadError::FileNotFound("Download finished but produced no file".to_string()))
}
