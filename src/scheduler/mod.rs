//! Download scheduler split into focused submodules.
//!
//! The `DownloadScheduler` struct and its methods are organized by domain:
//! - [`guard`] - Destination-path deduplication
//! - [`queue`] - FIFO of pending tasks (weak references)
//! - [`pool`] - Worker slot bookkeeping
//! - [`submit`] - Link and show-range submission
//! - [`control`] - Cancellation, concurrency and work directory changes, task listing
//! - [`worker`] - Per-slot task execution and the completion coordinator
//! - [`lifecycle`] - Graceful shutdown

mod control;
mod guard;
mod lifecycle;
mod pool;
mod queue;
mod submit;
mod worker;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64};
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::playlist::PlaylistArena;
use crate::supervisor::{CliDownloader, DownloaderTool};
use crate::task::DownloadTask;
use crate::types::Event;
use crate::utils::validate_work_dir;

use guard::DuplicateGuard;
use pool::WorkerPool;
use queue::TaskQueue;
use worker::SlotDone;

/// Everything guarded by the coordination lock
///
/// Critical sections only touch this metadata. Process I/O, provider calls and
/// filesystem checks happen outside the lock.
#[derive(Debug)]
pub(crate) struct SchedulerState {
    /// Live tasks in submission order (the rows of the task list)
    pub(crate) tasks: Vec<Arc<DownloadTask>>,
    /// Tasks waiting for a slot
    pub(crate) queue: TaskQueue,
    /// Destination paths owned by live tasks
    pub(crate) guard: DuplicateGuard,
    /// Slot bindings and the concurrency limit
    pub(crate) pool: WorkerPool,
}

impl SchedulerState {
    fn new(max_concurrent: usize) -> Self {
        Self {
            tasks: Vec::new(),
            queue: TaskQueue::new(),
            guard: DuplicateGuard::new(),
            pool: WorkerPool::new(max_concurrent),
        }
    }

    pub(crate) fn position(&self, id: crate::types::TaskId) -> Option<usize> {
        self.tasks.iter().position(|task| task.id() == id)
    }
}

/// Concurrent download orchestrator (cloneable - all fields are Arc-wrapped)
///
/// Accepts single links and show ranges, deduplicates them by destination
/// path, runs at most `max_concurrent` of them at once (source extraction
/// followed by the external downloader), and reports everything through
/// [`Event`]s.
#[derive(Clone)]
pub struct DownloadScheduler {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// External downloader used for every transfer
    pub(crate) tool: Arc<dyn DownloaderTool>,
    /// Playlists that show submissions refer into
    pub(crate) playlists: Arc<PlaylistArena>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Coordination lock over tasks, queue, guard and pool
    pub(crate) state: Arc<tokio::sync::Mutex<SchedulerState>>,
    /// Workers post their terminal state here; drained by the coordinator
    pub(crate) done_tx: mpsc::UnboundedSender<SlotDone>,
    /// Next task id
    pub(crate) next_id: Arc<AtomicU64>,
    /// Cleared during shutdown
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Stops the coordinator after shutdown or once the last handle is dropped
    pub(crate) coordinator_stop: CancellationToken,
    /// Root for new destinations (absolute, normalized)
    pub(crate) work_dir: Arc<std::sync::RwLock<PathBuf>>,
    /// Shared by caller-held handles only; see [`OwnerGuard`]
    owner: Option<Arc<OwnerGuard>>,
}

/// Stops the coordinator when the last caller-held handle is dropped
///
/// Internal clones (coordinator, workers) are made with
/// [`DownloadScheduler::detached`] and do not carry it, so they cannot keep
/// the scheduler alive on their own.
#[derive(Debug)]
struct OwnerGuard(CancellationToken);

impl Drop for OwnerGuard {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

impl DownloadScheduler {
    /// Create a scheduler that drives the N_m3u8DL downloader
    ///
    /// The work directory is created if missing. A downloader binary that
    /// cannot be found does not fail construction; submissions are refused with
    /// [`Error::DependencyMissing`] until it is installed.
    pub async fn new(config: Config) -> Result<Self> {
        let tool = CliDownloader::discover(&config.tools);
        Self::with_tool(config, Arc::new(tool)).await
    }

    /// Create a scheduler with a custom downloader
    pub async fn with_tool(config: Config, tool: Arc<dyn DownloaderTool>) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(config.work_dir())
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create work directory '{}': {}",
                        config.work_dir().display(),
                        e
                    ),
                ))
            })?;
        let work_dir = validate_work_dir(config.work_dir())?;

        // Create broadcast channel with buffer size of 1000 events
        let (event_tx, _rx) = broadcast::channel(1000);
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let coordinator_stop = CancellationToken::new();

        let scheduler = Self {
            state: Arc::new(tokio::sync::Mutex::new(SchedulerState::new(
                config.download.max_concurrent_downloads,
            ))),
            config: Arc::new(config),
            tool,
            playlists: Arc::new(PlaylistArena::new()),
            event_tx,
            done_tx,
            next_id: Arc::new(AtomicU64::new(1)),
            accepting_new: Arc::new(AtomicBool::new(true)),
            owner: Some(Arc::new(OwnerGuard(coordinator_stop.clone()))),
            coordinator_stop,
            work_dir: Arc::new(std::sync::RwLock::new(work_dir)),
        };

        tracing::info!(
            work_dir = ?scheduler.work_dir(),
            max_concurrent = scheduler.config.download.max_concurrent_downloads,
            tool = scheduler.tool.name(),
            tool_available = scheduler.tool.is_available(),
            "Download scheduler initialized"
        );

        let coordinator = scheduler.detached();
        tokio::spawn(async move { coordinator.run_coordinator(done_rx).await });

        Ok(scheduler)
    }

    /// Subscribe to scheduler events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// A subscriber that falls behind by more than 1000 events receives
    /// `RecvError::Lagged`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use episode_dl::{Config, DownloadScheduler, Event};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let scheduler = DownloadScheduler::new(Config::default()).await?;
    ///     let mut events = scheduler.subscribe();
    ///
    ///     while let Ok(event) = events.recv().await {
    ///         if let Event::Progress { id, percent, .. } = event {
    ///             println!("task {}: {}%", id, percent);
    ///         }
    ///     }
    ///     Ok(())
    /// }
    /// ```
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Events as a `Stream`; lagged items surface as `Err`
    pub fn event_stream(&self) -> BroadcastStream<Event> {
        BroadcastStream::new(self.event_tx.subscribe())
    }

    /// Playlist storage that [`Show`](crate::playlist::Show) submissions refer into
    pub fn playlists(&self) -> &Arc<PlaylistArena> {
        &self.playlists
    }

    /// Current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Refuse work when the downloader binary is missing
    pub fn check_dependencies(&self) -> Result<()> {
        if self.tool.is_available() {
            return Ok(());
        }
        Err(Error::DependencyMissing {
            tool: self.tool.name().to_string(),
            searched: self.tool.searched_locations(),
        })
    }

    /// Clone for spawned internals; does not keep the scheduler alive
    pub(crate) fn detached(&self) -> Self {
        Self {
            owner: None,
            ..self.clone()
        }
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is silently dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        // send() returns Err if there are no receivers, which is fine
        self.event_tx.send(event).ok();
    }
}

impl std::fmt::Debug for DownloadScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadScheduler")
            .field("work_dir", &self.work_dir())
            .field("tool", &self.tool.name())
            .finish_non_exhaustive()
    }
}
