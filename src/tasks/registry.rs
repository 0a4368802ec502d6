//! In-memory task registry.
//!
//! Each task lives in a `DashMap` entry that owns a `watch::Sender` holding the
//! latest `TaskSnapshot`. Pollers read the current value, SSE subscribers await
//! changes, and evicting the entry drops the sender, which ends every open
//! subscription.
//!
//! Status only ever moves forward (`queued → downloading → processing → done |
//! error`); anything that would go back is ignored.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::AbortHandle;
use uuid::Uuid;

use crate::core::metrics;
use crate::core::utils::escape_filename;
use crate::core::validation::{MediaUrl, Platform};
use crate::download::format::DownloadOptions;
use crate::download::progress::ProgressInfo;

/// Lifecycle state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Downloading,
    Processing,
    Done,
    Error,
}

impl TaskStatus {
    /// Position in the lifecycle; `done` and `error` share the last rank.
    pub fn rank(&self) -> u8 {
        match self {
            TaskStatus::Queued => 0,
            TaskStatus::Downloading => 1,
            TaskStatus::Processing => 2,
            TaskStatus::Done | TaskStatus::Error => 3,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Downloading => "downloading",
            TaskStatus::Processing => "processing",
            TaskStatus::Done => "done",
            TaskStatus::Error => "error",
        }
    }
}

/// Client-visible state of a task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskSnapshot {
    pub id: String,
    pub status: TaskStatus,
    pub url: String,
    pub platform: Platform,
    pub options: DownloadOptions,
    /// True when the job downloads an Instagram profile picture
    pub profile_picture: bool,
    pub title: Option<String>,
    pub percent: u8,
    pub eta_seconds: Option<u64>,
    pub speed_bytes_per_sec: Option<f64>,
    pub downloaded_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
    /// Filename offered to the client once the task is done
    pub display_name: Option<String>,
    pub file_size: Option<u64>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

struct TaskEntry {
    state: watch::Sender<TaskSnapshot>,
    work_dir: PathBuf,
    file_path: Option<PathBuf>,
    /// Set once the file has been handed to a client
    serving: bool,
    finished: Option<Instant>,
    abort: Option<AbortHandle>,
}

impl TaskEntry {
    fn status(&self) -> TaskStatus {
        self.state.borrow().status
    }
}

/// Why a file could not be handed out.
#[derive(Debug, Clone, PartialEq)]
pub enum ServeRejection {
    NotFound,
    /// Still queued, downloading or processing
    NotReady(TaskStatus),
    /// The task failed; carries its error message
    Failed(String),
    /// Someone already fetched (or is fetching) the file
    AlreadyServed,
}

/// A finished file reserved for one client.
///
/// Dropping it deletes the work dir and evicts the task, so tie it to the
/// lifetime of the response body.
pub struct ServedFile {
    pub path: PathBuf,
    pub display_name: String,
    pub file_size: Option<u64>,
    _guard: EvictOnDrop,
}

/// Evicts a task (and deletes its work dir) when dropped.
///
/// Drop cannot await, so inside a runtime the directory is removed by a
/// spawned task; outside one it is removed in place.
pub struct EvictOnDrop {
    registry: Arc<TaskRegistry>,
    id: String,
}

impl Drop for EvictOnDrop {
    fn drop(&mut self) {
        log::debug!("Served file released for task {}", self.id);
        let Some(work_dir) = self.registry.detach(&self.id) else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { remove_work_dir(&work_dir).await });
            }
            Err(_) => {
                if let Err(e) = std::fs::remove_dir_all(&work_dir) {
                    log_removal_failure(&work_dir, &e);
                }
            }
        }
    }
}

/// The task registry.
pub struct TaskRegistry {
    tasks: DashMap<String, TaskEntry>,
    root: PathBuf,
}

impl TaskRegistry {
    /// Creates a registry whose work dirs live under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            tasks: DashMap::new(),
            root: root.into(),
        }
    }

    /// Download root holding one directory per task
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Registers a new `queued` task and creates its work dir.
    pub async fn create(
        &self,
        media: &MediaUrl,
        options: DownloadOptions,
        title: Option<String>,
    ) -> std::io::Result<TaskSnapshot> {
        let id = Uuid::new_v4().to_string();
        let work_dir = self.root.join(&id);
        tokio::fs::create_dir_all(&work_dir).await?;

        let snapshot = TaskSnapshot {
            id: id.clone(),
            status: TaskStatus::Queued,
            url: media.url.to_string(),
            platform: media.platform,
            options,
            profile_picture: media.instagram_profile().is_some(),
            title,
            percent: 0,
            eta_seconds: None,
            speed_bytes_per_sec: None,
            downloaded_bytes: None,
            total_bytes: None,
            display_name: None,
            file_size: None,
            error: None,
            created_at: Utc::now(),
            finished_at: None,
        };

        let (state, _) = watch::channel(snapshot.clone());
        self.tasks.insert(
            id.clone(),
            TaskEntry {
                state,
                work_dir,
                file_path: None,
                serving: false,
                finished: None,
                abort: None,
            },
        );
        metrics::TASKS_ACTIVE.inc();
        log::info!("Task {} queued for {}", id, snapshot.url);

        Ok(snapshot)
    }

    /// Current snapshot of a task
    pub fn get(&self, id: &str) -> Option<TaskSnapshot> {
        self.tasks.get(id).map(|entry| entry.state.borrow().clone())
    }

    /// Subscribes to snapshot changes of a task.
    pub fn subscribe(&self, id: &str) -> Option<watch::Receiver<TaskSnapshot>> {
        self.tasks.get(id).map(|entry| entry.state.subscribe())
    }

    pub fn work_dir(&self, id: &str) -> Option<PathBuf> {
        self.tasks.get(id).map(|entry| entry.work_dir.clone())
    }

    /// Number of tasks held in memory
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Remembers the job handle so the task can be cancelled.
    pub fn set_abort_handle(&self, id: &str, handle: AbortHandle) {
        if let Some(mut entry) = self.tasks.get_mut(id) {
            entry.abort = Some(handle);
        }
    }

    /// Applies a progress update, moving `queued` to `downloading`.
    ///
    /// Ignored once the task is past `downloading`. The percent never goes
    /// down: a second stream restarting at 0% keeps the highest value seen.
    pub fn update_progress(&self, id: &str, progress: &ProgressInfo) -> bool {
        let Some(entry) = self.tasks.get(id) else {
            return false;
        };
        entry.state.send_if_modified(|snap| {
            if snap.status.rank() > TaskStatus::Downloading.rank() {
                return false;
            }
            let before = snap.clone();
            snap.status = TaskStatus::Downloading;
            snap.percent = snap.percent.max(progress.percent.min(100));
            snap.eta_seconds = progress.eta_seconds;
            snap.speed_bytes_per_sec = progress.speed_bytes_per_sec;
            if progress.downloaded_bytes.is_some() {
                snap.downloaded_bytes = progress.downloaded_bytes;
            }
            if progress.total_bytes.is_some() {
                snap.total_bytes = progress.total_bytes;
            }
            *snap != before
        })
    }

    /// Moves the task to `processing` unless it is already there or beyond.
    pub fn mark_processing(&self, id: &str) -> bool {
        self.transition(id, TaskStatus::Processing, |snap| {
            snap.eta_seconds = None;
            snap.speed_bytes_per_sec = None;
        })
    }

    /// Marks the task `done` with its produced file.
    pub fn mark_done(&self, id: &str, file_path: PathBuf, file_size: u64) -> bool {
        let display_name = file_path
            .file_name()
            .map(|n| escape_filename(&n.to_string_lossy()))
            .unwrap_or_else(|| "download".to_string());

        let Some(mut entry) = self.tasks.get_mut(id) else {
            return false;
        };
        let changed = entry.state.send_if_modified(|snap| {
            if snap.status.is_terminal() {
                return false;
            }
            snap.status = TaskStatus::Done;
            snap.percent = 100;
            snap.eta_seconds = None;
            snap.speed_bytes_per_sec = None;
            snap.display_name = Some(display_name.clone());
            snap.file_size = Some(file_size);
            snap.finished_at = Some(Utc::now());
            true
        });
        if changed {
            entry.file_path = Some(file_path);
            entry.finished = Some(Instant::now());
            entry.abort = None;
            log::info!("Task {} done: {}", id, display_name);
        }
        changed
    }

    /// Marks the task `error` and deletes its work dir right away.
    pub async fn mark_error(&self, id: &str, message: &str) -> bool {
        let work_dir = {
            let Some(mut entry) = self.tasks.get_mut(id) else {
                return false;
            };
            let changed = entry.state.send_if_modified(|snap| {
                if snap.status.is_terminal() {
                    return false;
                }
                snap.status = TaskStatus::Error;
                snap.error = Some(message.to_string());
                snap.eta_seconds = None;
                snap.speed_bytes_per_sec = None;
                snap.finished_at = Some(Utc::now());
                true
            });
            if !changed {
                return false;
            }
            entry.file_path = None;
            entry.finished = Some(Instant::now());
            entry.work_dir.clone()
        };

        log::warn!("Task {} failed: {}", id, message);
        remove_work_dir(&work_dir).await;
        true
    }

    /// Reserves the finished file of a task for exactly one client.
    pub fn take_for_serving(self: &Arc<Self>, id: &str) -> Result<ServedFile, ServeRejection> {
        let mut entry = self.tasks.get_mut(id).ok_or(ServeRejection::NotFound)?;
        let snap = entry.state.borrow().clone();

        match snap.status {
            TaskStatus::Error => {
                return Err(ServeRejection::Failed(
                    snap.error.unwrap_or_else(|| "Download failed".to_string()),
                ))
            }
            TaskStatus::Done => {}
            other => return Err(ServeRejection::NotReady(other)),
        }
        if entry.serving {
            return Err(ServeRejection::AlreadyServed);
        }
        let path = entry.file_path.clone().ok_or(ServeRejection::AlreadyServed)?;
        entry.serving = true;
        drop(entry);

        Ok(ServedFile {
            path,
            display_name: snap.display_name.unwrap_or_else(|| "download".to_string()),
            file_size: snap.file_size,
            _guard: EvictOnDrop {
                registry: Arc::clone(self),
                id: id.to_string(),
            },
        })
    }

    /// Removes a task and deletes its work dir. A still-running job is aborted.
    pub async fn evict(&self, id: &str) -> bool {
        let Some(work_dir) = self.detach(id) else {
            return false;
        };
        remove_work_dir(&work_dir).await;
        true
    }

    /// Removes a task from the table and returns its work dir for deletion.
    fn detach(&self, id: &str) -> Option<PathBuf> {
        let (_, entry) = self.tasks.remove(id)?;
        if let Some(abort) = entry.abort {
            abort.abort();
        }
        metrics::TASKS_ACTIVE.dec();
        log::debug!("Task {} evicted", id);
        Some(entry.work_dir)
    }

    /// Cancels a task: aborts its job, marks it `error` and evicts it.
    pub async fn cancel(&self, id: &str) -> bool {
        let abort = match self.tasks.get_mut(id) {
            Some(mut entry) => entry.abort.take(),
            None => return false,
        };
        if let Some(abort) = abort {
            abort.abort();
        }
        if self.mark_error(id, "Cancelled").await {
            metrics::record_task_failed("cancelled");
        }
        self.evict(id).await
    }

    /// Evicts finished tasks older than `ttl` whose file nobody is fetching.
    pub async fn sweep_expired(&self, ttl: Duration) -> usize {
        let expired: Vec<String> = self
            .tasks
            .iter()
            .filter(|entry| !entry.serving && entry.finished.is_some_and(|at| at.elapsed() >= ttl))
            .map(|entry| entry.key().clone())
            .collect();

        let mut evicted = 0;
        for id in &expired {
            if self.evict(id).await {
                evicted += 1;
            }
        }
        evicted
    }

    /// Number of tasks per status (for logs)
    pub fn status_counts(&self) -> Vec<(TaskStatus, usize)> {
        let mut counts: Vec<(TaskStatus, usize)> = Vec::new();
        for entry in self.tasks.iter() {
            let status = entry.status();
            match counts.iter_mut().find(|(s, _)| *s == status) {
                Some((_, n)) => *n += 1,
                None => counts.push((status, 1)),
            }
        }
        counts.sort_by_key(|(s, _)| s.rank());
        counts
    }

    fn transition(&self, id: &str, to: TaskStatus, apply: impl FnOnce(&mut TaskSnapshot)) -> bool {
        let Some(entry) = self.tasks.get(id) else {
            return false;
        };
        entry.state.send_if_modified(|snap| {
            if snap.status.rank() >= to.rank() {
                return false;
            }
            snap.status = to;
            apply(snap);
            true
        })
    }
}

async fn remove_work_dir(dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(dir).await {
        log_removal_failure(dir, &e);
    }
}

fn log_removal_failure(dir: &Path, e: &std::io::Error) {
    if e.kind() != std::io::ErrorKind::NotFound {
        log::warn!("Failed to remove work dir {}: {}", dir.display(), e);
    }
}
