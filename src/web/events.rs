//! Server-sent progress events.
//!
//! Every event is named after the task status and carries the JSON snapshot.
//! The current snapshot goes out immediately, later ones on change, and the
//! stream ends after the first terminal snapshot.

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::watch;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::tasks::TaskSnapshot;
use crate::web::SharedState;

/// Turns a snapshot receiver into a stream of distinct snapshots ending after a terminal one.
///
/// Also ends when the task is evicted and the sender goes away.
pub fn snapshot_stream(rx: watch::Receiver<TaskSnapshot>) -> impl Stream<Item = TaskSnapshot> {
    stream::unfold((rx, true, false), |(mut rx, first, finished)| async move {
        if finished {
            return None;
        }
        if !first && rx.changed().await.is_err() {
            return None;
        }
        let snapshot = rx.borrow_and_update().clone();
        let terminal = snapshot.status.is_terminal();
        Some((snapshot, (rx, false, terminal)))
    })
}

/// Renders a snapshot as an SSE event
pub fn snapshot_event(snapshot: &TaskSnapshot) -> Event {
    let event = Event::default().event(snapshot.status.as_str());
    match serde_json::to_string(snapshot) {
        Ok(data) => event.data(data),
        Err(e) => {
            log::error!("Failed to serialize snapshot of task {}: {}", snapshot.id, e);
            event.data("{}")
        }
    }
}

/// GET /api/tasks/{id}/events
pub async fn events_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let rx = state
        .registry()
        .subscribe(&id)
        .ok_or_else(|| AppError::NotFound(format!("Task {} not found", id)))?;
    log::debug!("SSE subscriber attached to task {}", id);

    let events = snapshot_stream(rx).map(|snapshot| Ok(snapshot_event(&snapshot)));

    Ok(Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(config::web::SSE_KEEP_ALIVE_SECS))
            .text("keep-alive"),
    ))
}
