use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;

use doraweb::cli::{Cli, Commands};
use doraweb::core::utils::format_bytes;
use doraweb::core::{config, init_logger, log_startup_configuration, validate_media_url};
use doraweb::download::{DownloadOptions, DownloadRequest, SourceEvent, SourceRegistry};
use doraweb::tasks::sweeper::{purge_work_root, spawn_sweeper};
use doraweb::tasks::{TaskRegistry, TaskRunner};
use doraweb::web::{resolve_listen_addr, start_web_server, AppState};

/// Main entry point
///
/// Parses CLI arguments and dispatches to the subcommand; with none given the
/// web server runs.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Log panics in spawned jobs instead of letting them vanish silently
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
        if let Some(msg) = panic_info.payload().downcast_ref::<&str>() {
            log::error!("Panic message: {}", msg);
        }
    }));

    // .env first, so it can set LOG_FILE_PATH and LOG_LEVEL
    let _ = dotenv();

    init_logger(&config::LOG_FILE_PATH, *config::LOG_LEVEL)?;

    match cli.command {
        Some(Commands::Serve { host, port }) => run_server(host, port).await,
        Some(Commands::Info { url, json }) => run_cli_info(url, json).await,
        Some(Commands::Download {
            url,
            mode,
            quality,
            audio_format,
            output,
        }) => {
            let options = DownloadOptions {
                mode,
                quality,
                audio_format,
            };
            run_cli_download(url, options, output).await
        }
        None => {
            log::info!("No command specified, running the web server");
            run_server(None, None).await
        }
    }
}

/// Runs the web server until Ctrl+C.
async fn run_server(host: Option<String>, port: Option<u16>) -> Result<()> {
    log_startup_configuration();

    let root = config::DOWNLOAD_FOLDER.clone();
    purge_work_root(&root)
        .await
        .with_context(|| format!("Failed to prepare download folder {}", root.display()))?;

    let registry = Arc::new(TaskRegistry::new(root.clone()));
    let sources = Arc::new(SourceRegistry::default_registry());
    let runner = Arc::new(TaskRunner::new(
        Arc::clone(&registry),
        sources,
        *config::tasks::MAX_CONCURRENT_DOWNLOADS,
    ));

    let sweeper = spawn_sweeper(
        Arc::clone(&registry),
        config::tasks::sweep_interval(),
        config::tasks::ttl(),
    );

    let host = host.unwrap_or_else(|| config::web::HOST.clone());
    let port = port.unwrap_or(*config::web::PORT);
    let addr = resolve_listen_addr(&host, port).await?;

    let state = Arc::new(AppState::new(runner));
    let static_dir = config::STATIC_DIR.clone();

    let result = tokio::select! {
        res = start_web_server(addr, state, &static_dir) => res,
        _ = signal::ctrl_c() => {
            log::info!("Received Ctrl+C, shutting down");
            Ok(())
        }
    };

    sweeper.abort();
    // In-flight jobs die with the runtime; their directories would be orphans
    if let Err(e) = purge_work_root(&root).await {
        log::warn!("Failed to clean download folder on shutdown: {}", e);
    }

    result
}

/// Prints what a URL points to.
async fn run_cli_info(url: String, json: bool) -> Result<()> {
    let media = validate_media_url(&url)?;
    let sources = SourceRegistry::default_registry();
    let source = sources.resolve_or_err(&media)?;
    let info = source.probe(&media).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("Media Information");
    println!("=================");
    println!("URL:       {}", info.url);
    println!("Platform:  {}", info.platform.display_name());
    println!("Title:     {}", info.title);
    if let Some(uploader) = &info.uploader {
        println!("Uploader:  {}", uploader);
    }
    if let Some(duration) = info.duration_secs {
        println!("Duration:  {}:{:02}", duration / 60, duration % 60);
    }
    if let Some(size) = info.filesize_approx {
        println!("Size:      ~{}", format_bytes(size));
    }
    if !info.available_heights.is_empty() {
        let heights: Vec<String> = info.available_heights.iter().map(|h| format!("{}p", h)).collect();
        println!("Qualities: {}", heights.join(", "));
    }
    if info.is_live {
        println!("Live stream: cannot be downloaded");
    }
    if info.profile_picture {
        println!("Profile URL: the profile picture will be downloaded");
    }

    Ok(())
}

/// Downloads a URL into `output` (default: current directory).
async fn run_cli_download(url: String, options: DownloadOptions, output: Option<PathBuf>) -> Result<()> {
    let media = validate_media_url(&url)?;
    let sources = SourceRegistry::default_registry();
    let source = sources.resolve_or_err(&media)?;

    let output_dir = output.unwrap_or_else(|| PathBuf::from("."));
    tokio::fs::create_dir_all(&output_dir)
        .await
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    // Work in a private directory so the largest-file pick never sees unrelated files
    let work_dir = output_dir.join(format!(".doraweb-{}", uuid::Uuid::new_v4()));
    tokio::fs::create_dir_all(&work_dir).await?;

    println!("Downloading {} ({}, {})", media.url, options.mode.as_str(), options.quality);

    let request = DownloadRequest {
        media,
        options,
        work_dir: work_dir.clone(),
    };
    let (tx, mut rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                SourceEvent::Progress(p) => {
                    let eta = p.eta_seconds.map(|s| format!(" ETA {}s", s)).unwrap_or_default();
                    println!("  {:>3}%{}", p.percent, eta);
                }
                SourceEvent::Processing => println!("  processing..."),
            }
        }
    });

    let result = source.download(&request, tx).await;
    let _ = printer.await;

    let outcome = match result {
        Ok(out) => move_into(&out.file_path, &output_dir).await.map(|dest| (dest, out.file_size)),
        Err(e) => Err(anyhow::Error::from(e)),
    };

    if let Err(e) = tokio::fs::remove_dir_all(&work_dir).await {
        log::warn!("Failed to remove {}: {}", work_dir.display(), e);
    }

    let (dest, size) = outcome?;
    println!("Saved {} ({})", dest.display(), format_bytes(size));
    Ok(())
}

async fn move_into(file: &Path, dir: &Path) -> Result<PathBuf> {
    let name = file
        .file_name()
        .with_context(|| format!("Downloaded path has no file name: {}", file.display()))?;
    let dest = dir.join(name);
    tokio::fs::rename(file, &dest)
        .await
        .with_context(|| format!("Failed to move file to {}", dest.display()))?;
    Ok(dest)
}
