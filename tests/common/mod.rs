//! Common test utilities
//!
//! Builds the full router over a temporary download root and a temporary
//! static dir, with a mock source in place of yt-dlp.

#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use futures_util::StreamExt;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

use doraweb::download::{DownloadSource, SourceRegistry};
use doraweb::tasks::{TaskRegistry, TaskRunner, TaskSnapshot};
use doraweb::web::events::snapshot_stream;
use doraweb::web::{create_router, AppState, SharedState};

pub const INDEX_HTML: &str = "<!DOCTYPE html><title>doraweb test</title>";

/// A router wired to a mock source, plus handles to inspect its state.
pub struct TestApp {
    pub router: Router,
    pub state: SharedState,
    pub download_root: PathBuf,
    _dir: TempDir,
}

impl TestApp {
    pub fn new(source: Arc<dyn DownloadSource>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let download_root = dir.path().join("downloads");
        let static_dir = dir.path().join("static");
        std::fs::create_dir_all(&download_root).unwrap();
        std::fs::create_dir_all(&static_dir).unwrap();
        std::fs::write(static_dir.join("index.html"), INDEX_HTML).unwrap();

        let registry = Arc::new(TaskRegistry::new(download_root.clone()));
        let mut sources = SourceRegistry::new();
        sources.register(source);
        let runner = Arc::new(TaskRunner::new(registry, Arc::new(sources), 2));
        let state = Arc::new(AppState::new(runner));
        let router = create_router(Arc::clone(&state), &static_dir);

        Self {
            router,
            state,
            download_root,
            _dir: dir,
        }
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        self.state.registry()
    }

    /// Sends one request through the router
    pub async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Sends a request and reads the body as JSON (Null for an empty body)
    pub async fn send_json(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let response = self.send(method, uri, body).await;
        let status = response.status();
        let bytes = body_bytes(response).await;
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    /// Starts a download through the API and returns the task id
    pub async fn start(&self, url: &str) -> String {
        let (status, body) = self
            .send_json(Method::POST, "/api/download", Some(serde_json::json!({ "url": url })))
            .await;
        assert_eq!(status, StatusCode::ACCEPTED, "unexpected body: {}", body);
        body["task_id"].as_str().unwrap().to_string()
    }

    /// Waits until the task reaches `done` or `error`
    pub async fn wait_terminal(&self, id: &str) -> TaskSnapshot {
        let rx = self.registry().subscribe(id).expect("task exists");
        tokio::time::timeout(Duration::from_secs(5), async {
            snapshot_stream(rx)
                .fold(None, |_, snap| async move { Some(snap) })
                .await
                .expect("at least one snapshot")
        })
        .await
        .expect("task did not finish in time")
    }

    /// Number of entries left under the download root
    pub fn work_dirs(&self) -> usize {
        std::fs::read_dir(&self.download_root).unwrap().count()
    }

    /// Waits until the download root is empty. A served file is removed by a
    /// spawned task once its body is dropped.
    pub async fn wait_work_dirs_cleared(&self) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.work_dirs() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("work dirs were not removed in time");
    }
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}
