//! # episode-dl
//!
//! Concurrent download orchestrator for episode and stream downloads.
//!
//! A [`DownloadScheduler`] takes single links or ranges of a show's episodes,
//! resolves each episode into a playable source through a pluggable
//! [`Provider`], and hands the source to an external downloader
//! (N_m3u8DL-style by default) while keeping at most `max_concurrent`
//! transfers in flight.
//!
//! - **Bounded** - a fixed number of worker slots, adjustable at runtime
//! - **Deduplicated** - a destination path is never downloaded twice at once,
//!   and files already on disk are skipped
//! - **Cancellable** - queued tasks vanish at once, running ones are killed at
//!   the next output line or poll tick
//! - **Event-driven** - progress, state changes and user-facing notices are
//!   broadcast as [`Event`]s
//!
//! ## Quick Start
//!
//! ```no_run
//! use episode_dl::{Config, DownloadScheduler, Event};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.download.work_dir = "/srv/tv".into();
//!
//!     let scheduler = DownloadScheduler::new(config).await?;
//!
//!     let mut events = scheduler.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             if let Event::Notice { title, message, .. } = event {
//!                 eprintln!("{}: {}", title, message);
//!             }
//!         }
//!     });
//!
//!     scheduler
//!         .download_link("Big Buck Bunny", "https://cdn.example/bbb/master.m3u8")
//!         .await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Playlists, episodes and the generation-checked playlist arena
pub mod playlist;
/// Provider collaborator interface and server selection
pub mod provider;
/// Download scheduler (decomposed into focused submodules)
pub mod scheduler;
/// External downloader tool, output parsing and process supervision
pub mod supervisor;
mod task;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{Config, DownloadConfig, ToolsConfig};
pub use error::{Error, ExtractionError, ProcessError, Result};
pub use playlist::{Episode, EpisodeRef, Playlist, PlaylistArena, PlaylistId, Show};
pub use provider::{Headers, PlayInfo, Provider, VideoServer, VideoSource};
pub use scheduler::DownloadScheduler;
pub use supervisor::{CliDownloader, DownloaderTool, OutputLine, TransferJob};
pub use types::{Event, NoticeKind, TaskId, TaskInfo, TaskState};

/// Run the scheduler until a termination signal arrives, then shut it down.
///
/// - **Unix:** SIGTERM or SIGINT, falling back to `ctrl_c()` if the handlers
///   cannot be registered.
/// - **Windows/other:** Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use episode_dl::{Config, DownloadScheduler, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let scheduler = DownloadScheduler::new(Config::default()).await?;
///     run_with_shutdown(scheduler).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(scheduler: DownloadScheduler) -> Result<()> {
    wait_for_signal().await;
    scheduler.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Received Ctrl+C signal");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}
