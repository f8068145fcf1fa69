//! FIFO of tasks waiting for a worker slot

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use crate::task::DownloadTask;
use crate::types::TaskState;

/// Pending tasks in submission order
///
/// Holds weak references only. The task list owns the tasks, so a task that
/// is cancelled and removed while queued simply expires here and is skipped
/// on dequeue without any bookkeeping.
#[derive(Debug, Default)]
pub(crate) struct TaskQueue {
    entries: VecDeque<Weak<DownloadTask>>,
}

impl TaskQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn enqueue(&mut self, task: &Arc<DownloadTask>) {
        self.entries.push_back(Arc::downgrade(task));
    }

    /// Pop the oldest task that is still alive and runnable
    ///
    /// Expired entries, and tasks that were cancelled or already left
    /// `Pending`, are discarded along the way.
    pub(crate) fn dequeue_next(&mut self) -> Option<Arc<DownloadTask>> {
        while let Some(entry) = self.entries.pop_front() {
            let Some(task) = entry.upgrade() else {
                continue;
            };
            if task.is_cancel_requested() || task.state() != TaskState::Pending {
                tracing::debug!(task_id = task.id().0, "Skipping stale queue entry");
                continue;
            }
            return Some(task);
        }
        None
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of live, runnable entries
    pub(crate) fn len(&self) -> usize {
        self.entries
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|task| !task.is_cancel_requested() && task.state() == TaskState::Pending)
            .count()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
