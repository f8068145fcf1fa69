//! Download task state machine
//!
//! A [`DownloadTask`] is shared between the scheduler (which lists, queues and
//! removes it) and the worker running it. All mutable fields sit behind short
//! std mutexes that are never held across an `.await`.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

use crate::error::ExtractionError;
use crate::playlist::{EpisodeRef, PlaylistArena};
use crate::provider::{Headers, Provider, Selection, auto_select_server};
use crate::types::{TaskId, TaskInfo, TaskState};

pub(crate) const TEXT_EXTRACTING: &str = "Extracting source...";
pub(crate) const TEXT_EXTRACTED: &str = "Extracted source successfully!";
pub(crate) const TEXT_CANCELLING: &str = "Cancelling";

/// Where a task gets its stream from
enum TaskSource {
    /// Not yet extracted; resolved through the provider when a slot picks it up
    Episode {
        episode: EpisodeRef,
        provider: Arc<dyn Provider>,
    },
    /// Ready to download
    Resolved { link: String, headers: Headers },
}

struct Progress {
    state: TaskState,
    percent: u8,
    text: String,
}

/// Result of the extraction phase
#[derive(Debug)]
pub(crate) enum Extraction {
    /// Link and headers are now set
    Resolved,
    /// Cancellation observed at a checkpoint
    Cancelled,
    /// Nothing playable was found
    Failed(ExtractionError),
}

/// One item to download, from source resolution to a terminal state
pub(crate) struct DownloadTask {
    id: TaskId,
    display_name: String,
    path: PathBuf,
    created_at: DateTime<Utc>,
    source: Mutex<TaskSource>,
    progress: Mutex<Progress>,
    cancel: CancellationToken,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl DownloadTask {
    fn with_source(id: TaskId, display_name: String, path: PathBuf, source: TaskSource) -> Self {
        Self {
            id,
            display_name,
            path,
            created_at: Utc::now(),
            source: Mutex::new(source),
            progress: Mutex::new(Progress {
                state: TaskState::Pending,
                percent: 0,
                text: String::new(),
            }),
            cancel: CancellationToken::new(),
        }
    }

    /// Task for an already-known stream URL
    pub(crate) fn from_link(
        id: TaskId,
        display_name: String,
        path: PathBuf,
        link: String,
        headers: Headers,
    ) -> Self {
        Self::with_source(id, display_name, path, TaskSource::Resolved { link, headers })
    }

    /// Task that must extract its stream from a provider first
    pub(crate) fn from_episode(
        id: TaskId,
        display_name: String,
        path: PathBuf,
        episode: EpisodeRef,
        provider: Arc<dyn Provider>,
    ) -> Self {
        Self::with_source(
            id,
            display_name,
            path,
            TaskSource::Episode { episode, provider },
        )
    }

    pub(crate) fn id(&self) -> TaskId {
        self.id
    }

    pub(crate) fn display_name(&self) -> &str {
        &self.display_name
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn state(&self) -> TaskState {
        lock(&self.progress).state
    }

    /// Move to a later state
    ///
    /// Returns false (and changes nothing) if `to` is not strictly later than
    /// the current state, so terminal states are final and nothing returns to
    /// `Pending`.
    pub(crate) fn advance(&self, to: TaskState) -> bool {
        let mut progress = lock(&self.progress);
        if progress.state.is_terminal() || to.rank() <= progress.state.rank() {
            return false;
        }
        progress.state = to;
        true
    }

    /// Record a downloader progress line
    ///
    /// Ignored unless the task is `Downloading` and not being cancelled. The
    /// percentage is clamped to 100 and never decreases. Returns the values to
    /// publish.
    pub(crate) fn record_progress(&self, percent: Option<u8>, text: &str) -> Option<(u8, String)> {
        if self.cancel.is_cancelled() {
            return None;
        }
        let mut progress = lock(&self.progress);
        if progress.state != TaskState::Downloading {
            return None;
        }
        if let Some(percent) = percent {
            progress.percent = progress.percent.max(percent.min(100));
        }
        progress.text = text.to_string();
        Some((progress.percent, progress.text.clone()))
    }

    /// Set the status line outside of downloader output
    pub(crate) fn set_progress_text(&self, text: &str) {
        let mut progress = lock(&self.progress);
        if !progress.state.is_terminal() {
            progress.text = text.to_string();
        }
    }

    /// Request cooperative cancellation
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    pub(crate) fn is_cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Link and headers, if extraction has happened (or was never needed)
    pub(crate) fn resolved_link(&self) -> Option<(String, Headers)> {
        match &*lock(&self.source) {
            TaskSource::Resolved { link, headers } => Some((link.clone(), headers.clone())),
            TaskSource::Episode { .. } => None,
        }
    }

    fn episode_source(&self) -> Option<(EpisodeRef, Arc<dyn Provider>)> {
        match &*lock(&self.source) {
            TaskSource::Episode { episode, provider } => Some((*episode, Arc::clone(provider))),
            TaskSource::Resolved { .. } => None,
        }
    }

    /// Store the extracted stream, dropping the episode reference and provider
    fn resolve(&self, link: String, headers: Headers) {
        *lock(&self.source) = TaskSource::Resolved { link, headers };
    }

    /// Resolve the episode reference into a link through the provider
    ///
    /// Cancellation is checked before starting, after loading servers, before
    /// each server is tried, and after selection. A provider call in flight is
    /// not interrupted.
    pub(crate) async fn extract(&self, arena: &PlaylistArena) -> Extraction {
        if self.is_cancel_requested() {
            return Extraction::Cancelled;
        }
        let Some((episode_ref, provider)) = self.episode_source() else {
            return match self.resolved_link() {
                Some(_) => Extraction::Resolved,
                None => Extraction::Failed(ExtractionError::NoEpisode),
            };
        };

        self.set_progress_text(TEXT_EXTRACTING);

        let Some(episode) = arena.episode(&episode_ref) else {
            return Extraction::Failed(ExtractionError::EpisodeUnavailable);
        };

        let servers = provider.load_servers(&episode).await;
        if self.is_cancel_requested() {
            return Extraction::Cancelled;
        }
        if servers.is_empty() {
            return Extraction::Failed(ExtractionError::NoServers {
                episode: episode.full_name(),
            });
        }

        match auto_select_server(provider.as_ref(), &servers, &self.cancel).await {
            Selection::Found(source) => {
                if self.is_cancel_requested() {
                    return Extraction::Cancelled;
                }
                self.resolve(source.url, source.headers);
                self.set_progress_text(TEXT_EXTRACTED);
                tracing::debug!(task_id = self.id.0, "Source extracted");
                Extraction::Resolved
            }
            Selection::Cancelled => Extraction::Cancelled,
            Selection::Failed(e) => Extraction::Failed(e),
        }
    }

    /// Snapshot for listing
    pub(crate) fn info(&self) -> TaskInfo {
        let progress = lock(&self.progress);
        TaskInfo {
            id: self.id,
            display_name: self.display_name.clone(),
            path: self.path.clone(),
            state: progress.state,
            progress_percent: if progress.state == TaskState::Downloading {
                progress.percent
            } else {
                0
            },
            progress_text: progress.text.clone(),
            cancel_requested: self.cancel.is_cancelled(),
            created_at: self.created_at,
        }
    }
}

impl std::fmt::Debug for DownloadTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadTask")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("path", &self.path)
            .field("state", &self.state())
            .finish()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::playlist::{Episode, Playlist};
    use crate::provider::{PlayInfo, VideoServer, VideoSource};
    use async_trait::async_trait;
    use std::sync::OnceLock;

    fn link_task() -> DownloadTask {
        DownloadTask::from_link(
            TaskId(1),
            "Movie".into(),
            PathBuf::from("/tv/Movie.mp4"),
            "https://cdn/movie.m3u8".into(),
            Headers::new(),
        )
    }

    struct FixedProvider {
        servers: Vec<VideoServer>,
        sources: Vec<VideoSource>,
        cancel_on_load: OnceLock<CancellationToken>,
    }

    #[async_trait]
    impl Provider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn load_servers(&self, _episode: &Episode) -> Vec<VideoServer> {
            if let Some(token) = self.cancel_on_load.get() {
                token.cancel();
            }
            self.servers.clone()
        }

        async fn extract_source(&self, _server: &VideoServer) -> Result<PlayInfo, ExtractionError> {
            Ok(PlayInfo {
                sources: self.sources.clone(),
            })
        }
    }

    fn episode_task(arena: &PlaylistArena, provider: Arc<FixedProvider>) -> DownloadTask {
        let id = arena.insert(Playlist::new(
            "Show",
            vec![Episode::new(1.0, None, "/ep/1")],
        ));
        DownloadTask::from_episode(
            TaskId(2),
            "Show - Episode 1".into(),
            PathBuf::from("/tv/Show/Episode 1.mp4"),
            EpisodeRef {
                playlist: id,
                index: 0,
            },
            provider,
        )
    }

    #[test]
    fn states_only_move_forward() {
        let task = link_task();
        assert!(task.advance(TaskState::Downloading), "Pending may skip extraction");
        assert!(!task.advance(TaskState::ExtractingSource));
        assert!(!task.advance(TaskState::Pending));
        assert!(task.advance(TaskState::Completed));
        assert!(!task.advance(TaskState::Cancelled), "terminal states are final");
        assert_eq!(task.state(), TaskState::Completed);
    }

    #[test]
    fn pending_task_can_be_cancelled() {
        let task = link_task();
        assert!(task.advance(TaskState::Cancelled));
        assert_eq!(task.state(), TaskState::Cancelled);
    }

    #[test]
    fn progress_is_monotonic_and_clamped() {
        let task = link_task();
        task.advance(TaskState::Downloading);

        assert_eq!(task.record_progress(Some(40), "40.0%").unwrap().0, 40);
        assert_eq!(
            task.record_progress(Some(20), "20.0%").unwrap().0,
            40,
            "percent must never decrease"
        );
        assert_eq!(task.record_progress(None, "muxing").unwrap().0, 40);
        assert_eq!(task.record_progress(Some(250), "?").unwrap().0, 100);
        assert_eq!(task.info().progress_text, "?");
    }

    #[test]
    fn progress_is_ignored_outside_downloading() {
        let task = link_task();
        assert!(task.record_progress(Some(10), "10.0%").is_none());
        assert_eq!(task.info().progress_percent, 0);
    }

    #[test]
    fn progress_is_ignored_after_cancel_request() {
        let task = link_task();
        task.advance(TaskState::Downloading);
        task.record_progress(Some(30), "30.0%");
        task.cancel();

        assert!(task.record_progress(Some(60), "60.0%").is_none());
        assert!(task.info().cancel_requested);
    }

    #[test]
    fn info_reports_zero_percent_outside_downloading() {
        let task = link_task();
        task.advance(TaskState::Downloading);
        task.record_progress(Some(70), "70.0%");
        task.advance(TaskState::Failed);

        let info = task.info();
        assert_eq!(info.state, TaskState::Failed);
        assert_eq!(info.progress_percent, 0);
    }

    #[tokio::test]
    async fn extraction_resolves_link_and_drops_episode() {
        let arena = PlaylistArena::new();
        let task = episode_task(
            &arena,
            Arc::new(FixedProvider {
                servers: vec![VideoServer::new("main", "s1")],
                sources: vec![VideoSource::new("https://cdn/1.m3u8").with_header("Referer", "r")],
                cancel_on_load: OnceLock::new(),
            }),
        );
        assert!(task.resolved_link().is_none());

        let outcome = task.extract(&arena).await;

        assert!(matches!(outcome, Extraction::Resolved));
        let (link, headers) = task.resolved_link().unwrap();
        assert_eq!(link, "https://cdn/1.m3u8");
        assert_eq!(headers.get("Referer").unwrap(), "r");
        assert!(task.episode_source().is_none(), "episode ref must be cleared");
        assert_eq!(task.info().progress_text, TEXT_EXTRACTED);
    }

    #[tokio::test]
    async fn extraction_without_servers_fails() {
        let arena = PlaylistArena::new();
        let task = episode_task(
            &arena,
            Arc::new(FixedProvider {
                servers: vec![],
                sources: vec![],
                cancel_on_load: OnceLock::new(),
            }),
        );

        match task.extract(&arena).await {
            Extraction::Failed(ExtractionError::NoServers { episode }) => {
                assert_eq!(episode, "Episode 1")
            }
            other => panic!("expected NoServers, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn extraction_without_sources_fails() {
        let arena = PlaylistArena::new();
        let task = episode_task(
            &arena,
            Arc::new(FixedProvider {
                servers: vec![VideoServer::new("main", "s1")],
                sources: vec![],
                cancel_on_load: OnceLock::new(),
            }),
        );

        assert!(matches!(
            task.extract(&arena).await,
            Extraction::Failed(ExtractionError::NoSources { servers: 1 })
        ));
    }

    #[tokio::test]
    async fn cancel_during_server_load_is_honored_at_next_checkpoint() {
        let arena = PlaylistArena::new();
        let provider = Arc::new(FixedProvider {
            servers: vec![VideoServer::new("main", "s1")],
            sources: vec![VideoSource::new("https://cdn/1.m3u8")],
            cancel_on_load: OnceLock::new(),
        });
        let task = episode_task(&arena, Arc::clone(&provider));
        // the provider cancels the task while its call is in flight
        provider
            .cancel_on_load
            .set(task.cancel_token().clone())
            .unwrap();

        assert!(matches!(task.extract(&arena).await, Extraction::Cancelled));
        assert!(task.resolved_link().is_none());
    }

    #[tokio::test]
    async fn stale_episode_reference_fails_extraction() {
        let arena = PlaylistArena::new();
        let task = episode_task(
            &arena,
            Arc::new(FixedProvider {
                servers: vec![VideoServer::new("main", "s1")],
                sources: vec![VideoSource::new("https://cdn/1.m3u8")],
                cancel_on_load: OnceLock::new(),
            }),
        );
        let (episode, _) = task.episode_source().unwrap();
        arena.remove(episode.playlist);

        assert!(matches!(
            task.extract(&arena).await,
            Extraction::Failed(ExtractionError::EpisodeUnavailable)
        ));
    }

    #[tokio::test]
    async fn link_task_needs_no_extraction() {
        let arena = PlaylistArena::new();
        let task = link_task();
        assert!(matches!(task.extract(&arena).await, Extraction::Resolved));
    }
}
