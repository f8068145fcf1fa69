//! Shared test helpers for creating DownloadScheduler instances in tests.

use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::{TempDir, tempdir};
use tokio::sync::Semaphore;

use crate::config::Config;
use crate::error::ExtractionError;
use crate::playlist::{Episode, Playlist, Show};
use crate::provider::{PlayInfo, Provider, VideoServer, VideoSource};
use crate::scheduler::DownloadScheduler;
use crate::supervisor::{DownloaderTool, TransferJob};

/// Script that runs until killed
pub(crate) const BLOCKING_SCRIPT: &str = "printf '1.0%%\\n'; exec sleep 30";

/// Downloader that runs the job URL as a `/bin/sh` script
pub(crate) struct ScriptTool;

impl DownloaderTool for ScriptTool {
    fn name(&self) -> &str {
        "script"
    }

    fn program(&self) -> &Path {
        Path::new("/bin/sh")
    }

    fn arguments(&self, job: &TransferJob) -> Vec<OsString> {
        vec!["-c".into(), job.url.clone().into()]
    }
}

/// Downloader whose binary does not exist
pub(crate) struct MissingTool;

impl DownloaderTool for MissingTool {
    fn name(&self) -> &str {
        "missing"
    }

    fn program(&self) -> &Path {
        Path::new("/nonexistent/N_m3u8DL-RE")
    }

    fn arguments(&self, _job: &TransferJob) -> Vec<OsString> {
        Vec::new()
    }
}

/// Provider that serves each episode's link as its only source
///
/// With a gate, every `extract_source` call waits for a permit first.
pub(crate) struct MockProvider {
    pub(crate) no_servers: bool,
    pub(crate) gate: Option<Arc<Semaphore>>,
    pub(crate) extract_calls: AtomicUsize,
}

impl MockProvider {
    pub(crate) fn new() -> Self {
        Self {
            no_servers: false,
            gate: None,
            extract_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new()
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn load_servers(&self, episode: &Episode) -> Vec<VideoServer> {
        if self.no_servers {
            return Vec::new();
        }
        vec![VideoServer::new("default", episode.link.clone())]
    }

    async fn extract_source(&self, server: &VideoServer) -> Result<PlayInfo, ExtractionError> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        Ok(PlayInfo {
            sources: vec![VideoSource::new(server.link.clone()).with_header("Referer", "https://mock")],
        })
    }
}

/// Helper to create a test scheduler running `/bin/sh` scripts.
/// Returns the scheduler and the tempdir (which must be kept alive).
pub(crate) async fn create_test_scheduler(max_concurrent: usize) -> (DownloadScheduler, TempDir) {
    create_test_scheduler_with_tool(max_concurrent, Arc::new(ScriptTool)).await
}

pub(crate) async fn create_test_scheduler_with_tool(
    max_concurrent: usize,
    tool: Arc<dyn DownloaderTool>,
) -> (DownloadScheduler, TempDir) {
    let temp_dir = tempdir().unwrap();

    let mut config = Config::default();
    config.download.work_dir = temp_dir.path().join("downloads");
    config.download.max_concurrent_downloads = max_concurrent;
    config.download.cancel_poll_interval = Duration::from_millis(20);
    config.download.shutdown_timeout = Duration::from_secs(10);

    let scheduler = DownloadScheduler::with_tool(config, tool).await.unwrap();
    (scheduler, temp_dir)
}

/// Build a show whose episodes all use `script` as their link
pub(crate) fn make_show(
    scheduler: &DownloadScheduler,
    title: &str,
    episodes: usize,
    script: &str,
    provider: Arc<dyn Provider>,
) -> Show {
    let playlist = Playlist::new(
        title,
        (1..=episodes)
            .map(|n| Episode::new(n as f32, None, script))
            .collect(),
    );
    Show {
        title: title.to_string(),
        playlist: scheduler.playlists().insert(playlist),
        provider,
    }
}

/// Script that blocks until `gate` exists, then prints progress and exits 0
pub(crate) fn gated_script(gate: &Path) -> String {
    format!(
        "while [ ! -f '{}' ]; do sleep 0.02; done; printf '100.0%%\\n'",
        gate.display()
    )
}

/// Path of a gate file inside the test's tempdir
pub(crate) fn gate_path(temp_dir: &TempDir, name: &str) -> PathBuf {
    temp_dir.path().join(format!("{}.gate", name))
}

/// Poll `condition` until it holds, panicking after 10 seconds
pub(crate) async fn wait_until<F, Fut>(what: &str, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !condition().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {}",
            what
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
