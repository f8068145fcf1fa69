//! N_m3u8DL-style command-line downloader

use super::traits::{DownloaderTool, TransferJob};
use crate::config::ToolsConfig;
use crate::error::{Error, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Downloader driven through the N_m3u8DL command-line contract
///
/// Invocation: `<url> --save-dir <dir> --save-name <stem>` followed by one
/// `-H "<Key>: <Value>"` pair per header.
///
/// # Examples
///
/// ```no_run
/// use episode_dl::config::ToolsConfig;
/// use episode_dl::supervisor::{CliDownloader, DownloaderTool};
/// use std::path::PathBuf;
///
/// // Explicit path
/// let tool = CliDownloader::new(PathBuf::from("/opt/tools/N_m3u8DL-RE"));
///
/// // Or install directory, then PATH
/// let tool = CliDownloader::resolve(&ToolsConfig::default())
///     .expect("downloader not installed");
/// assert!(tool.is_available());
/// ```
#[derive(Debug, Clone)]
pub struct CliDownloader {
    binary_path: PathBuf,
    searched: Vec<PathBuf>,
}

impl CliDownloader {
    /// Create a downloader with an explicit binary path
    ///
    /// A relative path is resolved against the current directory.
    pub fn new(binary_path: PathBuf) -> Self {
        let binary_path = std::path::absolute(&binary_path).unwrap_or(binary_path);
        Self {
            searched: vec![binary_path.clone()],
            binary_path,
        }
    }

    /// Attempt to find the binary in PATH
    pub fn from_path(binary_name: &str) -> Option<Self> {
        which::which(binary_name).ok().map(Self::new)
    }

    /// Attempt to find the binary next to the running executable
    pub fn from_install_dir(binary_name: &str) -> Option<Self> {
        let candidate = install_dir_candidate(binary_name)?;
        candidate.is_file().then(|| Self::new(candidate))
    }

    /// Locate the binary following the configured lookup order
    ///
    /// Explicit `downloader_path`, then the install directory, then PATH.
    pub fn resolve(tools: &ToolsConfig) -> Result<Self> {
        let mut searched = Vec::new();

        if let Some(path) = &tools.downloader_path {
            if path.is_file() {
                return Ok(Self::new(path.clone()));
            }
            searched.push(path.clone());
        }

        if tools.search_install_dir {
            if let Some(found) = Self::from_install_dir(&tools.binary_name) {
                return Ok(found);
            }
            if let Some(candidate) = install_dir_candidate(&tools.binary_name) {
                searched.push(candidate);
            }
        }

        if tools.search_path {
            if let Some(found) = Self::from_path(&tools.binary_name) {
                return Ok(found);
            }
            searched.push(PathBuf::from("PATH"));
        }

        Err(Error::DependencyMissing {
            tool: tools.binary_name.clone(),
            searched,
        })
    }

    /// Like [`resolve`](Self::resolve), but never fails
    ///
    /// When nothing is found the downloader keeps the bare binary name and
    /// reports itself unavailable, so submissions are refused with
    /// [`Error::DependencyMissing`] until the tool is installed.
    pub fn discover(tools: &ToolsConfig) -> Self {
        match Self::resolve(tools) {
            Ok(found) => {
                tracing::info!(path = ?found.binary_path, "Found downloader binary");
                found
            }
            Err(e) => {
                tracing::warn!(error = %e, "Downloader binary not found; downloads disabled until installed");
                let searched = match e {
                    Error::DependencyMissing { searched, .. } => searched,
                    _ => Vec::new(),
                };
                Self {
                    binary_path: PathBuf::from(&tools.binary_name),
                    searched,
                }
            }
        }
    }
}

fn install_dir_candidate(binary_name: &str) -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let dir = exe.parent()?;
    Some(dir.join(format!("{}{}", binary_name, std::env::consts::EXE_SUFFIX)))
}

impl DownloaderTool for CliDownloader {
    fn name(&self) -> &str {
        "N_m3u8DL"
    }

    fn program(&self) -> &Path {
        &self.binary_path
    }

    fn arguments(&self, job: &TransferJob) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            job.url.clone().into(),
            "--save-dir".into(),
            job.save_dir().as_os_str().to_owned(),
            "--save-name".into(),
            job.save_name().into(),
        ];
        for (key, value) in &job.headers {
            args.push("-H".into());
            args.push(format!("{}: {}", key, value).into());
        }
        args
    }

    fn is_available(&self) -> bool {
        self.binary_path.is_absolute() && self.binary_path.is_file()
    }

    fn searched_locations(&self) -> Vec<PathBuf> {
        self.searched.clone()
    }
}
