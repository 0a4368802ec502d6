//! HTTP front-end.
//!
//! Routes:
//! - `GET  /`                        index page (and other files from the static dir)
//! - `POST /api/info`                probe a URL
//! - `POST /api/download`            start a download task
//! - `GET  /api/tasks/{id}`           task snapshot
//! - `GET  /api/tasks/{id}/events`    server-sent events with snapshots
//! - `GET  /api/tasks/{id}/file`      fetch the finished file (once)
//! - `DELETE /api/tasks/{id}`         cancel a task
//! - `POST /download`                synchronous download, file in the response
//! - `GET  /health`, `GET /metrics`

pub mod events;
pub mod files;
pub mod handlers;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::tasks::{TaskRegistry, TaskRunner};

/// Shared state for the web server.
pub struct AppState {
    pub runner: Arc<TaskRunner>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(runner: Arc<TaskRunner>) -> Self {
        Self {
            runner,
            started_at: Instant::now(),
        }
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        self.runner.registry()
    }
}

pub type SharedState = Arc<AppState>;

/// Builds the router; files not matched by a route come from `static_dir`.
pub fn create_router(state: SharedState, static_dir: &Path) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/info", post(handlers::info_handler))
        .route("/api/download", post(handlers::start_download_handler))
        .route(
            "/api/tasks/{id}",
            get(handlers::task_handler).delete(handlers::cancel_handler),
        )
        .route("/api/tasks/{id}/events", get(events::events_handler))
        .route("/api/tasks/{id}/file", get(files::file_handler))
        .route("/download", post(files::legacy_download_handler))
        .route("/health", get(handlers::health_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .fallback_service(ServeDir::new(static_dir))
        .layer(cors)
        .with_state(state)
}

/// Route overview logged at start-up
const ROUTE_SUMMARY: &[(&str, &str)] = &[
    ("/api/info", "Probe a URL"),
    ("/api/download", "Start a download"),
    ("/api/tasks/{id}[/events|/file]", "Task status, progress, file"),
    ("/download", "Download and return the file in one request"),
    ("/health, /metrics", "Health and Prometheus metrics"),
];

/// Resolves the listen address. `host` may be an IP literal or a name such as `localhost`.
pub async fn resolve_listen_addr(host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    let mut addrs = tokio::net::lookup_host((host, port))
        .await
        .with_context(|| format!("Invalid listen address: {}", host))?;
    addrs
        .next()
        .with_context(|| format!("Listen address {} resolved to nothing", host))
}

/// Binds `addr` and serves until the process stops.
pub async fn start_web_server(addr: SocketAddr, state: SharedState, static_dir: &Path) -> anyhow::Result<()> {
    let app = create_router(state, static_dir);

    log::info!("Starting web server on http://{}", addr);
    log::info!("  {:<30} - Index page ({})", "/", static_dir.display());
    for (path, what) in ROUTE_SUMMARY {
        log::info!("  {:<30} - {}", path, what);
    }

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
