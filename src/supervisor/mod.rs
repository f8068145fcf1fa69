//! External downloader supervision
//!
//! The transfer itself is done by an external program. This module isolates
//! everything that depends on that program behind the [`DownloaderTool`] trait:
//! where the binary lives, how it is invoked, and how its human-readable
//! output is classified.
//!
//! ## Architecture
//!
//! - [`DownloaderTool`]: program path, argument construction, line parsing
//! - [`CliDownloader`]: the N_m3u8DL-style implementation, discovered via `which`
//! - [`parse_output_line`]: default classifier (`<digits>.<digits>%` progress,
//!   `ERROR:` marker)
//! - `ProcessSupervisor` (crate-internal): spawns the tool, streams stdout and
//!   stderr line by line (`\r` or `\n` terminated, decoded lossily), and
//!   kills the process once cancellation is observed
//!
//! ## Usage
//!
//! ```no_run
//! use episode_dl::supervisor::{CliDownloader, DownloaderTool, TransferJob};
//! use episode_dl::config::ToolsConfig;
//! use std::path::PathBuf;
//!
//! let tool = CliDownloader::discover(&ToolsConfig::default());
//! if tool.is_available() {
//!     let job = TransferJob {
//!         url: "https://cdn.example/master.m3u8".into(),
//!         headers: Default::default(),
//!         destination: PathBuf::from("/tv/Show/Episode 1.mp4"),
//!     };
//!     println!("{:?} {:?}", tool.program(), tool.arguments(&job));
//! }
//! ```

mod cli;
mod parser;
pub(crate) mod process;
mod reader;
mod traits;

pub use cli::CliDownloader;
pub use parser::{OutputLine, clean_line, parse_output_line};
pub use traits::{DownloaderTool, TransferJob};
