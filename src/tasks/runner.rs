//! Job execution: one tokio task per download, bounded by a semaphore.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Semaphore};

use crate::core::error::{AppError, AppResult};
use crate::core::metrics;
use crate::core::validation::MediaUrl;
use crate::download::format::DownloadOptions;
use crate::download::source::{DownloadRequest, DownloadSource, SourceEvent, SourceRegistry};
use crate::tasks::registry::{TaskRegistry, TaskSnapshot};

/// Starts download jobs and feeds their events into the registry.
pub struct TaskRunner {
    registry: Arc<TaskRegistry>,
    sources: Arc<SourceRegistry>,
    permits: Arc<Semaphore>,
}

impl TaskRunner {
    pub fn new(registry: Arc<TaskRegistry>, sources: Arc<SourceRegistry>, max_concurrent: usize) -> Self {
        Self {
            registry,
            sources,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn sources(&self) -> &Arc<SourceRegistry> {
        &self.sources
    }

    /// Registers a task and spawns its job. Returns the `queued` snapshot.
    ///
    /// The job waits for a permit while the task stays `queued`.
    pub async fn start(
        &self,
        media: MediaUrl,
        options: DownloadOptions,
        title: Option<String>,
    ) -> AppResult<TaskSnapshot> {
        let source = self.sources.resolve_or_err(&media)?;
        let snapshot = self.registry.create(&media, options, title).await?;
        let mode = metric_mode(&snapshot);
        metrics::record_task_started(media.platform.as_str(), mode);

        let request = DownloadRequest {
            media,
            options,
            work_dir: self.registry.root().join(&snapshot.id),
        };
        let handle = tokio::spawn(run_job(
            Arc::clone(&self.registry),
            source,
            Arc::clone(&self.permits),
            snapshot.id.clone(),
            request,
        ));
        self.registry.set_abort_handle(&snapshot.id, handle.abort_handle());

        Ok(snapshot)
    }
}

fn metric_mode(snapshot: &TaskSnapshot) -> &'static str {
    if snapshot.profile_picture {
        "profile_picture"
    } else {
        snapshot.options.mode.as_str()
    }
}

/// Label for the `reason` of a failed task
fn failure_reason(err: &AppError) -> &'static str {
    match err {
        AppError::Download(e) => e.subcategory(),
        AppError::Http(_) => "http",
        AppError::Io(_) => "io",
        _ => "other",
    }
}

async fn run_job(
    registry: Arc<TaskRegistry>,
    source: Arc<dyn DownloadSource>,
    permits: Arc<Semaphore>,
    id: String,
    request: DownloadRequest,
) {
    let _permit = match permits.acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            registry.mark_error(&id, "Server is shutting down").await;
            return;
        }
    };
    let started = Instant::now();
    log::info!("Task {} started with source {}", id, source.name());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let forward = async {
        while let Some(event) = rx.recv().await {
            match event {
                SourceEvent::Progress(progress) => {
                    registry.update_progress(&id, &progress);
                }
                SourceEvent::Processing => {
                    registry.mark_processing(&id);
                }
            }
        }
    };
    // `tx` moves into the download so the forwarder ends with it
    let (result, ()) = tokio::join!(source.download(&request, tx), forward);

    match result {
        Ok(output) => {
            if registry.mark_done(&id, output.file_path, output.file_size) {
                if let Some(snap) = registry.get(&id) {
                    metrics::record_task_completed(
                        snap.platform.as_str(),
                        metric_mode(&snap),
                        started.elapsed().as_secs_f64(),
                    );
                }
            }
        }
        Err(e) => {
            if registry.mark_error(&id, &e.to_string()).await {
                metrics::record_task_failed(failure_reason(&e));
            }
        }
    }
}
