//! Process execution utilities with timeout support
//!
//! Helpers for running the extractor (and anything else external) with a
//! deadline so a hung process never blocks a probe.

use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

use crate::download::error::DownloadError;

/// Run an async Command with a timeout.
///
/// The child is spawned with `kill_on_drop`, so hitting the timeout also kills it.
pub async fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<Output, DownloadError> {
    cmd.kill_on_drop(true);
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(DownloadError::Process(format!("Failed to run process: {}", e))),
        Err(_) => Err(DownloadError::Timeout(format!(
            "Process timed out after {}s",
            timeout.as_secs()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_with_timeout_missing_binary() {
        let mut cmd = Command::new("definitely-not-a-real-binary-doraweb");
        let result = run_with_timeout(&mut cmd, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(DownloadError::Process(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_with_timeout_times_out() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let result = run_with_timeout(&mut cmd, Duration::from_millis(100)).await;
        assert!(matches!(result, Err(DownloadError::Timeout(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_with_timeout_collects_output() {
        let mut cmd = Command::new("echo");
        cmd.arg("hello");
        let output = run_with_timeout(&mut cmd, Duration::from_secs(5)).await.unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
    }
}
