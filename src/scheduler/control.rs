//! Cancellation, runtime settings, and task listing.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};

use crate::error::{Error, Result};
use crate::task::{DownloadTask, TEXT_CANCELLING};
use crate::types::{Event, TaskId, TaskInfo, TaskState};
use crate::utils::validate_work_dir;

use super::{DownloadScheduler, SchedulerState};

impl DownloadScheduler {
    /// Cancel and remove a task
    ///
    /// A task still waiting in the queue is removed immediately. A task bound
    /// to a worker has its cancel flag set and is removed by its worker once
    /// the flag is observed (at the next output line or poll tick, or at the
    /// next extraction checkpoint). Cancelling an already-cancelling task is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if no live task has this id.
    pub async fn cancel_task(&self, id: TaskId) -> Result<()> {
        let mut state = self.state.lock().await;
        let Some(index) = state.position(id) else {
            return Err(Error::NotFound(id));
        };
        let task = Arc::clone(&state.tasks[index]);
        self.cancel_locked(&mut state, &task);
        Ok(())
    }

    /// Cancel the task at list position `row`; out-of-range rows are ignored
    pub async fn cancel_task_at(&self, row: usize) -> Result<()> {
        let mut state = self.state.lock().await;
        let Some(task) = state.tasks.get(row).cloned() else {
            tracing::debug!(row, "Cancel requested for a row that does not exist");
            return Ok(());
        };
        self.cancel_locked(&mut state, &task);
        Ok(())
    }

    /// Cancel every task
    ///
    /// The queue is drained first so no queued task can be bound while the
    /// list is walked.
    pub async fn cancel_all_tasks(&self) {
        let mut state = self.state.lock().await;
        state.queue.clear();
        let tasks: Vec<Arc<DownloadTask>> = state.tasks.iter().rev().cloned().collect();
        tracing::info!(count = tasks.len(), "Cancelling all tasks");
        for task in tasks {
            self.cancel_locked(&mut state, &task);
        }
    }

    fn cancel_locked(&self, state: &mut SchedulerState, task: &Arc<DownloadTask>) {
        let id = task.id();

        if state.pool.slot_of(id).is_some() {
            if task.is_cancel_requested() {
                return;
            }
            tracing::info!(task_id = id.0, name = task.display_name(), "Attempting to kill task");
            task.cancel();
            task.set_progress_text(TEXT_CANCELLING);
            return;
        }

        // never bound: nothing to kill
        task.cancel();
        if task.advance(TaskState::Cancelled) {
            self.emit_event(Event::StateChanged {
                id,
                state: TaskState::Cancelled,
            });
        }
        self.remove_locked(state, id);
        tracing::info!(task_id = id.0, "Removed queued task");
    }

    /// Change the concurrency limit
    ///
    /// Lowering it never interrupts running tasks; raising it binds queued
    /// tasks to the new capacity right away.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for a limit of zero.
    pub async fn set_max_concurrent(&self, max: usize) -> Result<()> {
        if max == 0 {
            return Err(Error::Config {
                message: "max_concurrent_downloads must be at least 1".to_string(),
                key: Some("max_concurrent_downloads".to_string()),
            });
        }

        let mut state = self.state.lock().await;
        if state.pool.max_concurrent() == max {
            return Ok(());
        }
        state.pool.set_max_concurrent(max);
        tracing::info!(max, "Concurrency limit changed");
        self.emit_event(Event::MaxConcurrentChanged { max });
        self.fill_slots(&mut state);
        Ok(())
    }

    /// Current concurrency limit
    pub async fn max_concurrent(&self) -> usize {
        self.state.lock().await.pool.max_concurrent()
    }

    /// Directory new downloads are placed under
    pub fn work_dir(&self) -> PathBuf {
        self.work_dir
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Change the work directory for future submissions
    ///
    /// # Errors
    ///
    /// [`Error::InvalidWorkDir`] if the path does not exist, is not a
    /// directory, or is read-only. The previous directory stays in effect.
    pub fn set_work_dir(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = match validate_work_dir(path.as_ref()) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(error = %e, "Rejected work directory");
                return Err(e);
            }
        };

        {
            let mut current = self.work_dir.write().unwrap_or_else(PoisonError::into_inner);
            if *current == path {
                return Ok(());
            }
            current.clone_from(&path);
        }
        tracing::info!(path = ?path, "Work directory changed");
        self.emit_event(Event::WorkDirChanged { path });
        Ok(())
    }

    /// Snapshots of all live tasks in list order
    pub async fn tasks(&self) -> Vec<TaskInfo> {
        let state = self.state.lock().await;
        state.tasks.iter().map(|task| task.info()).collect()
    }

    /// Snapshot of one task
    pub async fn task(&self, id: TaskId) -> Option<TaskInfo> {
        let state = self.state.lock().await;
        state.position(id).map(|index| state.tasks[index].info())
    }

    /// Snapshot of the task at list position `row`
    pub async fn task_at(&self, row: usize) -> Option<TaskInfo> {
        let state = self.state.lock().await;
        state.tasks.get(row).map(|task| task.info())
    }

    /// Number of live tasks
    pub async fn task_count(&self) -> usize {
        self.state.lock().await.tasks.len()
    }

    /// Tasks waiting for a slot
    pub async fn queued_count(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    /// Tasks bound to a worker slot
    pub async fn running_count(&self) -> usize {
        self.state.lock().await.pool.running()
    }
}
