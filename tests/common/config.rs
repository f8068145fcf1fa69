//! Test configuration helpers for creating schedulers in a throwaway work directory

use std::sync::Arc;
use std::time::Duration;

use episode_dl::{Config, DownloadScheduler, DownloaderTool};
use tempfile::TempDir;

use super::fixtures::ScriptTool;

/// Config rooted in `temp_dir` with fast cancellation polling
pub fn test_config(temp_dir: &TempDir, max_concurrent: usize) -> Config {
    let mut config = Config::default();
    config.download.work_dir = temp_dir.path().join("downloads");
    config.download.max_concurrent_downloads = max_concurrent;
    config.download.cancel_poll_interval = Duration::from_millis(20);
    config.download.shutdown_timeout = Duration::from_secs(10);
    config
}

/// Create a scheduler that runs each job URL as a `/bin/sh` script.
/// The returned tempdir must be kept alive for the duration of the test.
pub async fn create_scheduler(max_concurrent: usize) -> (DownloadScheduler, TempDir) {
    create_scheduler_with_tool(max_concurrent, Arc::new(ScriptTool)).await
}

/// Create a scheduler with a custom downloader tool
pub async fn create_scheduler_with_tool(
    max_concurrent: usize,
    tool: Arc<dyn DownloaderTool>,
) -> (DownloadScheduler, TempDir) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let scheduler = DownloadScheduler::with_tool(test_config(&temp_dir, max_concurrent), tool)
        .await
        .expect("Failed to create scheduler");
    (scheduler, temp_dir)
}
