//! Core types for episode-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique identifier for a download task
///
/// Assigned at creation from a per-scheduler counter and never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl TaskId {
    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for TaskId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a download task
///
/// States only move forward: `Pending` → `ExtractingSource` → `Downloading` →
/// one of the terminal states. `ExtractingSource` may be skipped when the task
/// was submitted with a resolved link.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Queued, waiting for a worker slot
    Pending,
    /// Bound to a slot, resolving the source through the provider
    ExtractingSource,
    /// External downloader running
    Downloading,
    /// Downloader exited successfully
    Completed,
    /// Extraction or transfer failed
    Failed,
    /// Cancelled by the user
    Cancelled,
}

impl TaskState {
    /// Whether the task occupies a worker slot in this state
    pub fn is_active(self) -> bool {
        matches!(self, TaskState::ExtractingSource | TaskState::Downloading)
    }

    /// Whether no further transitions are possible
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled
        )
    }

    pub(crate) fn rank(self) -> u8 {
        match self {
            TaskState::Pending => 0,
            TaskState::ExtractingSource => 1,
            TaskState::Downloading => 2,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled => 3,
        }
    }
}

/// Point-in-time view of a task, as bound by a UI list
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskInfo {
    /// Task ID
    pub id: TaskId,
    /// Human label (show and episode title, or the submitted name)
    pub display_name: String,
    /// Normalized destination file path
    pub path: PathBuf,
    /// Current state
    pub state: TaskState,
    /// Progress percentage (0-100); always 0 outside `Downloading`
    pub progress_percent: u8,
    /// Last status line
    pub progress_text: String,
    /// Whether cancellation has been requested
    pub cancel_requested: bool,
    /// When the task was created
    pub created_at: DateTime<Utc>,
}

/// Category of a user-facing notice
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// Source extraction failed; the task is marked failed
    ExtractionFailed,
    /// The downloader printed an error line; the process keeps running
    ProcessError,
    /// The downloader failed or could not be supervised; the task is marked failed
    DownloadFailed,
}

/// Event emitted by the scheduler
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Task added to the list and queue
    Queued {
        /// Task ID
        id: TaskId,
        /// Display name
        name: String,
        /// Destination path
        path: PathBuf,
    },

    /// Task moved to a new state
    StateChanged {
        /// Task ID
        id: TaskId,
        /// New state
        state: TaskState,
    },

    /// Task progress update (one per downloader output line)
    Progress {
        /// Task ID
        id: TaskId,
        /// Progress percentage (0-100)
        percent: u8,
        /// Status line
        text: String,
    },

    /// Something the user should be told about
    Notice {
        /// Related task, if any
        id: Option<TaskId>,
        /// Short title (the task's display name)
        title: String,
        /// Message body
        message: String,
        /// Notice category
        kind: NoticeKind,
    },

    /// Task removed from the active list
    Removed {
        /// Task ID
        id: TaskId,
    },

    /// Concurrency limit changed
    MaxConcurrentChanged {
        /// New limit
        max: usize,
    },

    /// Work directory changed
    WorkDirChanged {
        /// New work directory
        path: PathBuf,
    },

    /// Scheduler shutting down
    Shutdown,
}
