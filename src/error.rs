//! Error types for episode-dl
//!
//! Errors returned from the public API are refusals: the scheduler declined to
//! do something (missing downloader binary, unknown task, shutdown in progress).
//! Failures that happen *inside* a task never surface as `Err` from the
//! scheduler; they become the task's terminal state and a user-facing
//! [`Event::Notice`](crate::types::Event::Notice). [`ExtractionError`] and
//! [`ProcessError`] describe those per-task failures.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::TaskId;

/// Result type alias for episode-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for episode-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max_concurrent_downloads")
        key: Option<String>,
    },

    /// The external downloader binary could not be found
    #[error("required tool {tool} not found (searched: {})", display_paths(.searched))]
    DependencyMissing {
        /// Name of the missing tool
        tool: String,
        /// Locations that were checked
        searched: Vec<PathBuf>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Task not found in the active list
    #[error("task {0} not found")]
    NotFound(TaskId),

    /// Requested work directory cannot be used
    #[error("invalid work directory {path}: {reason}")]
    InvalidWorkDir {
        /// The rejected path
        path: PathBuf,
        /// Why the path was rejected
        reason: String,
    },

    /// Shutdown in progress - not accepting new downloads
    #[error("shutdown in progress: not accepting new downloads")]
    ShuttingDown,

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Why a task could not resolve a downloadable source
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    /// The task has neither a resolved link nor an episode reference
    #[error("task has no source to extract from")]
    NoEpisode,

    /// The playlist backing the episode reference was removed or replaced
    #[error("episode is no longer available")]
    EpisodeUnavailable,

    /// The provider returned an empty server list
    #[error("no servers found for {episode}")]
    NoServers {
        /// Episode display name
        episode: String,
    },

    /// None of the servers yielded a playable source
    #[error("no playable source found on {servers} server(s)")]
    NoSources {
        /// Number of servers that were tried
        servers: usize,
    },

    /// Provider-specific failure (network, parse, ...)
    #[error("{provider}: {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Provider error message
        message: String,
    },
}

/// Failures of the external downloader process
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The process could not be started
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        /// Program that failed to start
        program: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Reading output or waiting for exit failed
    #[error("failed while supervising downloader: {0}")]
    Wait(#[source] std::io::Error),

    /// The process exited unsuccessfully
    #[error("downloader exited with {}", describe_exit(.code))]
    Exited {
        /// Exit code (None if terminated by signal)
        code: Option<i32>,
    },
}

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "PATH".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "a signal".to_string(),
    }
}

impl Error {
    /// Machine-readable error code, stable across releases
    ///
    /// UIs can use this to pick their own wording instead of showing `Display` output.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::DependencyMissing { .. } => "dependency_missing",
            Error::Io(_) => "io_error",
            Error::NotFound(_) => "not_found",
            Error::InvalidWorkDir { .. } => "invalid_work_dir",
            Error::ShuttingDown => "shutting_down",
            Error::Serialization(_) => "serialization_error",
        }
    }
}
