//! Configuration types for episode-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Download behavior configuration (work directory, concurrency, timing)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Root directory for downloads (default: "./downloads")
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Maximum number of tasks extracting or downloading at once (default: 16)
    ///
    /// Can be changed at runtime with
    /// [`DownloadScheduler::set_max_concurrent`](crate::DownloadScheduler::set_max_concurrent).
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// Extension appended to destination file names (default: "mp4")
    #[serde(default = "default_file_extension")]
    pub file_extension: String,

    /// Upper bound on how long a silent downloader delays cancellation (default: 250ms)
    ///
    /// The supervisor checks the cancel flag after every output line and, when the
    /// tool prints nothing, at least this often.
    #[serde(default = "default_cancel_poll_interval", with = "duration_millis_serde")]
    pub cancel_poll_interval: Duration,

    /// How long `shutdown()` waits for running tasks to stop (default: 30 seconds)
    #[serde(default = "default_shutdown_timeout", with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            max_concurrent_downloads: default_max_concurrent(),
            file_extension: default_file_extension(),
            cancel_poll_interval: default_cancel_poll_interval(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// External downloader discovery
///
/// Lookup order: `downloader_path`, then the application install directory
/// (when `search_install_dir`), then `PATH` (when `search_path`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Explicit path to the downloader executable
    #[serde(default)]
    pub downloader_path: Option<PathBuf>,

    /// Executable name to look for (default: "N_m3u8DL-RE")
    #[serde(default = "default_binary_name")]
    pub binary_name: String,

    /// Look next to the running executable (default: true)
    #[serde(default = "default_true")]
    pub search_install_dir: bool,

    /// Search PATH if not found elsewhere (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            downloader_path: None,
            binary_name: default_binary_name(),
            search_install_dir: true,
            search_path: true,
        }
    }
}

/// Main configuration for [`DownloadScheduler`](crate::DownloadScheduler)
///
/// Sub-configs are flattened, so the serialized form is a single flat object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Download behavior settings
    #[serde(flatten)]
    pub download: DownloadConfig,

    /// External tool discovery
    #[serde(flatten)]
    pub tools: ToolsConfig,
}

impl Config {
    /// Work directory
    pub fn work_dir(&self) -> &PathBuf {
        &self.download.work_dir
    }

    /// Reject settings the scheduler cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.download.max_concurrent_downloads == 0 {
            return Err(Error::Config {
                message: "max_concurrent_downloads must be at least 1".to_string(),
                key: Some("max_concurrent_downloads".to_string()),
            });
        }
        if self.tools.binary_name.trim().is_empty() {
            return Err(Error::Config {
                message: "binary_name must not be empty".to_string(),
                key: Some("binary_name".to_string()),
            });
        }
        if self.download.cancel_poll_interval.is_zero() {
            return Err(Error::Config {
                message: "cancel_poll_interval must be greater than zero".to_string(),
                key: Some("cancel_poll_interval".to_string()),
            });
        }
        Ok(())
    }

    /// Parse a configuration from JSON, applying defaults for missing fields
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_max_concurrent() -> usize {
    16
}

fn default_file_extension() -> String {
    "mp4".to_string()
}

fn default_cancel_poll_interval() -> Duration {
    Duration::from_millis(250)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_binary_name() -> String {
    "N_m3u8DL-RE".to_string()
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
