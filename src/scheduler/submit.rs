//! Link and show-range submission.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use crate::error::{Error, Result};
use crate::playlist::{EpisodeRef, Show};
use crate::provider::Headers;
use crate::task::DownloadTask;
use crate::types::{Event, TaskId};
use crate::utils::{destination_path, sanitize_file_name};

use super::DownloadScheduler;

/// A task to be created once its destination has been checked
struct Candidate {
    name: String,
    path: PathBuf,
    source: CandidateSource,
}

enum CandidateSource {
    Link { link: String, headers: Headers },
    Episode(EpisodeRef, Arc<dyn crate::provider::Provider>),
}

impl DownloadScheduler {
    /// Queue a download of an already-resolved stream
    ///
    /// The file goes to `<work_dir>/<name>.<ext>` with illegal characters in
    /// `name` replaced. Returns `Ok(None)` when that file already exists or is
    /// already being downloaded.
    ///
    /// # Errors
    ///
    /// [`Error::ShuttingDown`] during shutdown and [`Error::DependencyMissing`]
    /// when the downloader is not installed. No task is created in either case.
    pub async fn download_link(&self, name: &str, link: &str) -> Result<Option<TaskId>> {
        self.download_link_with_headers(name, link, Headers::new())
            .await
    }

    /// Like [`download_link`](Self::download_link), forwarding `headers` to the downloader
    pub async fn download_link_with_headers(
        &self,
        name: &str,
        link: &str,
        headers: Headers,
    ) -> Result<Option<TaskId>> {
        self.ensure_accepting()?;
        self.check_dependencies()?;

        let path = destination_path(&self.work_dir(), name, &self.config.download.file_extension);
        let candidate = Candidate {
            name: name.to_string(),
            path,
            source: CandidateSource::Link {
                link: link.to_string(),
                headers,
            },
        };

        let ids = self.submit(vec![candidate]).await;
        Ok(ids.into_iter().next())
    }

    /// Queue episodes `start..=end` of a show
    ///
    /// The range is swapped if reversed and `end` is clamped to the last
    /// episode. Files go to `<work_dir>/<show title>/<episode name>.<ext>`.
    /// Episodes whose file exists or is already queued are skipped silently, so
    /// re-submitting a range is idempotent. Returns the ids of the created
    /// tasks in episode order.
    ///
    /// # Errors
    ///
    /// Same refusals as [`download_link`](Self::download_link).
    pub async fn download_show(&self, show: &Show, start: usize, end: usize) -> Result<Vec<TaskId>> {
        self.ensure_accepting()?;
        self.check_dependencies()?;

        let Some(playlist) = self.playlists.get(show.playlist) else {
            tracing::warn!(show = %show.title, playlist = %show.playlist, "Playlist no longer available");
            return Ok(Vec::new());
        };

        let (start, end) = if end < start { (end, start) } else { (start, end) };
        if start >= playlist.len() {
            tracing::warn!(
                show = %show.title,
                start,
                episodes = playlist.len(),
                "Range starts past the end of the playlist"
            );
            return Ok(Vec::new());
        }
        let end = end.min(playlist.len() - 1);

        let folder = self.work_dir().join(sanitize_file_name(&show.title));
        tracing::debug!(show = %show.title, start, end, folder = ?folder, "Submitting show range");

        let candidates = (start..=end)
            .map(|index| {
                let episode_name = playlist.episodes[index].full_name();
                Candidate {
                    name: format!("{} - {}", show.title, episode_name),
                    path: destination_path(&folder, &episode_name, &self.config.download.file_extension),
                    source: CandidateSource::Episode(
                        EpisodeRef {
                            playlist: show.playlist,
                            index,
                        },
                        Arc::clone(&show.provider),
                    ),
                }
            })
            .collect();

        Ok(self.submit(candidates).await)
    }

    pub(crate) fn ensure_accepting(&self) -> Result<()> {
        if self.accepting_new.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::ShuttingDown)
        }
    }

    /// Create, list and queue every candidate whose destination is free
    async fn submit(&self, candidates: Vec<Candidate>) -> Vec<TaskId> {
        // disk checks stay outside the coordination lock
        let mut fresh = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if tokio::fs::try_exists(&candidate.path).await.unwrap_or(false) {
                tracing::debug!(path = ?candidate.path, "File already exists, skipping");
                continue;
            }
            fresh.push(candidate);
        }

        let mut state = self.state.lock().await;
        let mut ids = Vec::with_capacity(fresh.len());

        for candidate in fresh {
            if !state.guard.reserve(&candidate.path) {
                tracing::debug!(path = ?candidate.path, "Already downloading, skipping");
                continue;
            }

            let id = TaskId(self.next_id.fetch_add(1, Ordering::SeqCst));
            let task = Arc::new(match candidate.source {
                CandidateSource::Link { link, headers } => DownloadTask::from_link(
                    id,
                    candidate.name,
                    candidate.path,
                    link,
                    headers,
                ),
                CandidateSource::Episode(episode, provider) => DownloadTask::from_episode(
                    id,
                    candidate.name,
                    candidate.path,
                    episode,
                    provider,
                ),
            });

            tracing::info!(task_id = id.0, name = task.display_name(), "Appending new download task");
            state.tasks.push(Arc::clone(&task));
            state.queue.enqueue(&task);
            self.emit_event(Event::Queued {
                id,
                name: task.display_name().to_string(),
                path: task.path().to_path_buf(),
            });
            ids.push(id);
        }

        self.fill_slots(&mut state);
        ids
    }
}
