//! Traits and types for the external downloader

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::parser::{OutputLine, parse_output_line};
use crate::provider::Headers;

/// A resolved transfer handed to the downloader
#[derive(Debug, Clone)]
pub struct TransferJob {
    /// Source URL
    pub url: String,
    /// Headers the host requires
    pub headers: Headers,
    /// Final output path including extension
    pub destination: PathBuf,
}

impl TransferJob {
    /// Directory the file is written into
    pub fn save_dir(&self) -> &Path {
        self.destination.parent().unwrap_or_else(|| Path::new("."))
    }

    /// File name without extension; the tool appends its own
    pub fn save_name(&self) -> String {
        self.destination
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// An external program that performs the actual transfer
///
/// Implementations decide how to invoke the tool and how to read its output.
/// The supervisor owns spawning, streaming and cancellation.
///
/// # Examples
///
/// ```
/// use episode_dl::supervisor::{DownloaderTool, TransferJob};
/// use std::ffi::OsString;
/// use std::path::{Path, PathBuf};
///
/// /// Fetch with curl, one header per -H
/// struct Curl(PathBuf);
///
/// impl DownloaderTool for Curl {
///     fn name(&self) -> &str {
///         "curl"
///     }
///
///     fn program(&self) -> &Path {
///         &self.0
///     }
///
///     fn arguments(&self, job: &TransferJob) -> Vec<OsString> {
///         let mut args: Vec<OsString> = vec!["-o".into(), job.destination.clone().into()];
///         for (key, value) in &job.headers {
///             args.push("-H".into());
///             args.push(format!("{}: {}", key, value).into());
///         }
///         args.push(job.url.clone().into());
///         args
///     }
/// }
/// ```
pub trait DownloaderTool: Send + Sync {
    /// Tool name for logs and dependency errors
    fn name(&self) -> &str;

    /// Executable to spawn
    fn program(&self) -> &Path;

    /// Command-line arguments for one transfer
    fn arguments(&self, job: &TransferJob) -> Vec<OsString>;

    /// Classify one line of output
    fn parse_line(&self, line: &str) -> OutputLine {
        parse_output_line(line)
    }

    /// Whether the executable is present
    ///
    /// Checked before every submission, so installing the tool while the
    /// application runs takes effect without a restart.
    fn is_available(&self) -> bool {
        self.program().is_file()
    }

    /// Locations that were checked when looking for the executable
    fn searched_locations(&self) -> Vec<PathBuf> {
        vec![self.program().to_path_buf()]
    }
}
