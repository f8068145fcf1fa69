//! Per-slot task execution and the completion coordinator.

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::supervisor::TransferJob;
use crate::supervisor::process::{NOTICE_TITLE, ProcessOutcome, ProcessSupervisor};
use crate::task::{DownloadTask, Extraction};
use crate::types::{Event, NoticeKind, TaskId, TaskState};

use super::{DownloadScheduler, SchedulerState};

/// Posted by a worker when its task reached a terminal state
#[derive(Debug)]
pub(crate) struct SlotDone {
    pub(crate) id: TaskId,
    pub(crate) slot: usize,
    pub(crate) state: TaskState,
}

impl DownloadScheduler {
    /// Bind queued tasks to free slots until either runs out
    ///
    /// Must be called with the coordination lock held.
    pub(crate) fn fill_slots(&self, state: &mut SchedulerState) {
        while state.pool.has_capacity() {
            let Some(task) = state.queue.dequeue_next() else {
                break;
            };
            let Some(slot) = state.pool.acquire(task.id()) else {
                break;
            };

            tracing::debug!(
                task_id = task.id().0,
                slot,
                running = state.pool.running(),
                max = state.pool.max_concurrent(),
                "Binding task to worker slot"
            );

            let scheduler = self.detached();
            tokio::spawn(async move { scheduler.run_slot(task, slot).await });
        }
    }

    async fn run_slot(self, task: Arc<DownloadTask>, slot: usize) {
        let id = task.id();
        let state = self.execute(&task).await;

        if task.advance(state) {
            self.emit_event(Event::StateChanged { id, state });
        }
        let state = task.state();
        match state {
            TaskState::Completed => {
                tracing::info!(task_id = id.0, path = ?task.path(), "Download completed")
            }
            TaskState::Cancelled => {
                tracing::info!(task_id = id.0, "Download cancelled successfully")
            }
            _ => tracing::warn!(task_id = id.0, state = ?state, "Download did not complete"),
        }

        if self.done_tx.send(SlotDone { id, slot, state }).is_err() {
            tracing::debug!(task_id = id.0, "Coordinator stopped; slot not recycled");
        }
    }

    /// Take a task from its current state to a terminal one
    async fn execute(&self, task: &DownloadTask) -> TaskState {
        let id = task.id();

        if task.resolved_link().is_none() {
            if task.advance(TaskState::ExtractingSource) {
                self.emit_event(Event::StateChanged {
                    id,
                    state: TaskState::ExtractingSource,
                });
            }
            match task.extract(&self.playlists).await {
                Extraction::Resolved => {}
                Extraction::Cancelled => return TaskState::Cancelled,
                Extraction::Failed(e) => {
                    tracing::warn!(task_id = id.0, error = %e, "Source extraction failed");
                    self.notify(task, e.to_string(), NoticeKind::ExtractionFailed);
                    return TaskState::Failed;
                }
            }
        }

        if task.is_cancel_requested() {
            return TaskState::Cancelled;
        }

        let Some((url, headers)) = task.resolved_link() else {
            return TaskState::Failed;
        };

        if let Err(e) = self.check_dependencies() {
            tracing::error!(task_id = id.0, error = %e, "Downloader unavailable");
            self.notify(task, e.to_string(), NoticeKind::DownloadFailed);
            return TaskState::Failed;
        }

        if let Some(parent) = task.path().parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            tracing::error!(task_id = id.0, error = %e, dir = ?parent, "Failed to create destination directory");
            self.notify(task, e.to_string(), NoticeKind::DownloadFailed);
            return TaskState::Failed;
        }

        if task.advance(TaskState::Downloading) {
            self.emit_event(Event::StateChanged {
                id,
                state: TaskState::Downloading,
            });
        }
        tracing::info!(task_id = id.0, name = task.display_name(), "Download started");

        let job = TransferJob {
            url,
            headers,
            destination: task.path().to_path_buf(),
        };
        let supervisor = ProcessSupervisor::new(
            self.tool.as_ref(),
            self.config.download.cancel_poll_interval,
            &self.event_tx,
        );

        match supervisor.run(task, &job).await {
            ProcessOutcome::Completed => TaskState::Completed,
            ProcessOutcome::Cancelled => TaskState::Cancelled,
            ProcessOutcome::Failed(e) => {
                tracing::error!(task_id = id.0, error = %e, "Download failed");
                self.notify(
                    task,
                    format!("Failed to download {}: {}", task.display_name(), e),
                    NoticeKind::DownloadFailed,
                );
                TaskState::Failed
            }
        }
    }

    fn notify(&self, task: &DownloadTask, message: String, kind: NoticeKind) {
        let message = match kind {
            NoticeKind::ExtractionFailed => format!("{}\n{}", task.display_name(), message),
            NoticeKind::ProcessError | NoticeKind::DownloadFailed => message,
        };
        self.emit_event(Event::Notice {
            id: Some(task.id()),
            title: NOTICE_TITLE.to_string(),
            message,
            kind,
        });
    }

    /// Drain worker completions: free the slot, drop the task, refill
    pub(crate) async fn run_coordinator(self, mut done_rx: mpsc::UnboundedReceiver<SlotDone>) {
        loop {
            let done = tokio::select! {
                done = done_rx.recv() => done,
                _ = self.coordinator_stop.cancelled() => {
                    self.stop_remaining().await;
                    return;
                }
            };
            let Some(done) = done else {
                return;
            };

            let mut state = self.state.lock().await;
            state.pool.release(done.slot, done.id);
            self.remove_locked(&mut state, done.id);
            tracing::debug!(
                task_id = done.id.0,
                final_state = ?done.state,
                running = state.pool.running(),
                "Worker slot freed"
            );
            self.fill_slots(&mut state);
        }
    }

    /// Cancel whatever is still listed once the coordinator stops
    ///
    /// After `shutdown()` the list is already empty. When every handle was
    /// dropped instead, this makes the workers kill their processes and exit.
    async fn stop_remaining(&self) {
        let state = self.state.lock().await;
        if !state.tasks.is_empty() {
            tracing::info!(count = state.tasks.len(), "Scheduler dropped; cancelling remaining tasks");
        }
        for task in &state.tasks {
            task.cancel();
        }
        tracing::debug!("Coordinator stopped");
    }

    /// Drop a task from the list and release its path
    ///
    /// A task already removed is left alone, so removal never happens twice.
    pub(crate) fn remove_locked(&self, state: &mut SchedulerState, id: TaskId) -> bool {
        let Some(index) = state.position(id) else {
            return false;
        };
        let task = state.tasks.remove(index);
        state.guard.release(task.path());
        self.emit_event(Event::Removed { id });
        true
    }
}
