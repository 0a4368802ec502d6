//! Prometheus metrics for download tasks
//!
//! Everything is registered in the default registry and exposed by the web
//! server at `/metrics`.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram_vec, Counter, CounterVec, Encoder,
    Gauge, HistogramVec, TextEncoder,
};

lazy_static! {
    /// Tasks accepted by the registry
    /// Labels: platform, mode (video/audio/profile_picture)
    pub static ref TASKS_STARTED_TOTAL: CounterVec = register_counter_vec!(
        "doraweb_tasks_started_total",
        "Total number of download tasks created",
        &["platform", "mode"]
    )
    .unwrap();

    /// Tasks that reached `done`
    /// Labels: platform, mode
    pub static ref TASKS_COMPLETED_TOTAL: CounterVec = register_counter_vec!(
        "doraweb_tasks_completed_total",
        "Total number of download tasks finished successfully",
        &["platform", "mode"]
    )
    .unwrap();

    /// Tasks that reached `error`
    /// Labels: reason (DownloadError subcategory)
    pub static ref TASKS_FAILED_TOTAL: CounterVec = register_counter_vec!(
        "doraweb_tasks_failed_total",
        "Total number of download tasks that failed",
        &["reason"]
    )
    .unwrap();

    /// Tasks currently present in the registry
    pub static ref TASKS_ACTIVE: Gauge = register_gauge!(
        "doraweb_tasks_active",
        "Number of tasks currently held in memory"
    )
    .unwrap();

    /// Bytes streamed back to clients
    pub static ref BYTES_SERVED_TOTAL: Counter = register_counter!(
        "doraweb_bytes_served_total",
        "Total bytes of finished files served to clients"
    )
    .unwrap();

    /// Wall time of a job from start of extraction to `done`
    /// Labels: platform
    pub static ref DOWNLOAD_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "doraweb_download_duration_seconds",
        "Time spent running download jobs",
        &["platform"],
        vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]
    )
    .unwrap();
}

/// Helper function to record a created task
pub fn record_task_started(platform: &str, mode: &str) {
    TASKS_STARTED_TOTAL.with_label_values(&[platform, mode]).inc();
}

/// Helper function to record a finished task
pub fn record_task_completed(platform: &str, mode: &str, elapsed_secs: f64) {
    TASKS_COMPLETED_TOTAL.with_label_values(&[platform, mode]).inc();
    DOWNLOAD_DURATION_SECONDS
        .with_label_values(&[platform])
        .observe(elapsed_secs);
}

/// Helper function to record a failed task
pub fn record_task_failed(reason: &str) {
    TASKS_FAILED_TOTAL.with_label_values(&[reason]).inc();
}

/// Encodes all registered metrics in the Prometheus text format.
pub fn gather_text() -> Result<(String, String), prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok((
        encoder.format_type().to_string(),
        String::from_utf8_lossy(&buffer).into_owned(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_increment() {
        let before = TASKS_STARTED_TOTAL.with_label_values(&["youtube", "video"]).get();
        record_task_started("youtube", "video");
        let after = TASKS_STARTED_TOTAL.with_label_values(&["youtube", "video"]).get();
        assert!(after >= before + 1.0);
    }

    #[test]
    fn test_gather_text_contains_metric_names() {
        record_task_failed("timeout");
        let (content_type, body) = gather_text().unwrap();
        assert!(content_type.starts_with("text/plain"));
        assert!(body.contains("doraweb_tasks_failed_total"));
    }
}
