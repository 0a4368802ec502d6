//! Housekeeping for the download root.
//!
//! - `purge_work_root` runs once at start-up and removes task directories left
//!   over by a previous process (tasks are not persisted, so they are orphans).
//! - `spawn_sweeper` periodically evicts finished tasks nobody fetched.

use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::tasks::registry::{TaskRegistry, TaskStatus};

/// Creates the download root if needed and deletes leftover task directories.
///
/// Only entries named like a task id are touched, so pointing the root at a
/// shared directory does not wipe unrelated files.
pub async fn purge_work_root(root: &Path) -> std::io::Result<usize> {
    tokio::fs::create_dir_all(root).await?;

    let mut entries = tokio::fs::read_dir(root).await?;
    let mut removed = 0;

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if Uuid::parse_str(&name.to_string_lossy()).is_err() {
            continue;
        }

        let path = entry.path();
        let result = match entry.file_type().await {
            Ok(ft) if ft.is_dir() => tokio::fs::remove_dir_all(&path).await,
            Ok(_) => tokio::fs::remove_file(&path).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to remove stale task dir {}: {}", path.display(), e),
        }
    }

    if removed > 0 {
        log::info!("Removed {} stale task directories from {}", removed, root.display());
    }
    Ok(removed)
}

/// Spawns the periodic TTL sweep.
pub fn spawn_sweeper(registry: Arc<TaskRegistry>, every: Duration, ttl: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let evicted = registry.sweep_expired(ttl).await;
            let counts = describe_counts(&registry.status_counts());
            if evicted > 0 {
                log::info!("Evicted {} expired tasks, remaining: {}", evicted, counts);
            } else {
                log::debug!("Sweep found nothing to evict, tasks: {}", counts);
            }
        }
    })
}

/// Renders per-status counts as `queued=1 done=2`, or `none`.
fn describe_counts(counts: &[(TaskStatus, usize)]) -> String {
    if counts.is_empty() {
        return "none".to_string();
    }
    counts
        .iter()
        .map(|(status, n)| format!("{}={}", status.as_str(), n))
        .collect::<Vec<_>>()
        .join(" ")
}
