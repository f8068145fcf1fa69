//! Downloader scripts, fake tools and providers

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use episode_dl::{
    DownloadScheduler, DownloaderTool, Episode, ExtractionError, PlayInfo, Playlist, Provider,
    Show, TransferJob, VideoServer, VideoSource,
};
use tempfile::TempDir;

/// Prints one progress line, then runs until killed
pub const BLOCKING_SCRIPT: &str = "printf '1.0%%\\n'; exec sleep 30";

/// Prints a few progress lines and exits successfully
pub const QUICK_SCRIPT: &str = "printf '25.0%%\\n50.0%%\\n100.0%%\\n'";

/// Downloader that runs the job URL as a `/bin/sh` script
pub struct ScriptTool;

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

/// Provider that serves each episode's link as its only source
pub struct ScriptProvider {
    /// Number of `extract_source` calls so far
    pub extract_calls: AtomicUsize,
}

impl ScriptProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            extract_calls: AtomicUsize::new(0),
        })
    }

    pub fn extractions(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for ScriptProvider {
    fn name(&self) -> &str {
        "script"
    }

    async fn load_servers(&self, episode: &Episode) -> Vec<VideoServer> {
        vec![VideoServer::new("default", episode.link.clone())]
    }

    async fn extract_source(&self, server: &VideoServer) -> Result<PlayInfo, ExtractionError> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        Ok(PlayInfo {
            sources: vec![VideoSource::new(server.link.clone())],
        })
    }
}

/// Register a show of `episodes` episodes, each using `script` as its link
pub fn make_show(
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

/// Script that blocks until `gate` exists, then reports completion
pub fn gated_script(gate: &Path) -> String {
    format!(
        "while [ ! -f '{}' ]; do sleep 0.02; done; printf '100.0%%\\n'",
        gate.display()
    )
}

/// Path of a gate file inside the test's tempdir
pub fn gate_path(temp_dir: &TempDir, name: &str) -> PathBuf {
    temp_dir.path().join(format!("{}.gate", name))
}

/// Open a gate created with [`gate_path`]
pub fn open_gate(temp_dir: &TempDir, name: &str) {
    std::fs::write(gate_path(temp_dir, name), b"").expect("Failed to open gate");
}
