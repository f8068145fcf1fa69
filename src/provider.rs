//! Provider collaborator interface and server selection
//!
//! Providers are the scraping backends that turn an episode into playable
//! sources. This crate only consumes them; [`Provider`] is the seam.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

use crate::error::ExtractionError;
use crate::playlist::Episode;

/// HTTP headers forwarded to the downloader, ordered by name
pub type Headers = BTreeMap<String, String>;

/// A server (mirror) offering an episode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoServer {
    /// Server label as shown by the site
    pub name: String,
    /// Provider-specific link used by [`Provider::extract_source`]
    pub link: String,
}

impl VideoServer {
    /// Create a server entry
    pub fn new(name: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            link: link.into(),
        }
    }
}

/// A concrete downloadable stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSource {
    /// Stream URL (usually an m3u8 playlist)
    pub url: String,
    /// Headers the host requires (Referer, User-Agent, ...)
    pub headers: Headers,
}

impl VideoSource {
    /// Create a source without headers
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Headers::new(),
        }
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Result of extracting a server
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayInfo {
    /// Candidate sources, best first
    pub sources: Vec<VideoSource>,
}

/// Source-resolution capability of a media site
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use episode_dl::error::ExtractionError;
/// use episode_dl::playlist::Episode;
/// use episode_dl::provider::{PlayInfo, Provider, VideoServer, VideoSource};
///
/// struct DirectProvider;
///
/// #[async_trait]
/// impl Provider for DirectProvider {
///     fn name(&self) -> &str {
///         "direct"
///     }
///
///     async fn load_servers(&self, episode: &Episode) -> Vec<VideoServer> {
///         vec![VideoServer::new("default", episode.link.clone())]
///     }
///
///     async fn extract_source(&self, server: &VideoServer) -> Result<PlayInfo, ExtractionError> {
///         Ok(PlayInfo {
///             sources: vec![VideoSource::new(server.link.clone())],
///         })
///     }
/// }
/// ```
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable provider name for logging and error messages
    fn name(&self) -> &str;

    /// List the servers offering an episode
    ///
    /// Fails soft: returns an empty list when nothing is found.
    async fn load_servers(&self, episode: &Episode) -> Vec<VideoServer>;

    /// Resolve a server into playable sources
    async fn extract_source(&self, server: &VideoServer) -> Result<PlayInfo, ExtractionError>;
}

/// Outcome of server selection
#[derive(Debug)]
pub(crate) enum Selection {
    /// A source was found
    Found(VideoSource),
    /// Cancellation was observed between servers
    Cancelled,
    /// No server produced a source
    Failed(ExtractionError),
}

/// Try each server in order and take the first source of the first server that
/// yields one
///
/// Provider errors on individual servers are logged and the next server is
/// tried. The cancel flag is checked before each server.
pub(crate) async fn auto_select_server(
    provider: &dyn Provider,
    servers: &[VideoServer],
    cancel: &CancellationToken,
) -> Selection {
    let mut last_error = None;

    for server in servers {
        if cancel.is_cancelled() {
            return Selection::Cancelled;
        }

        match provider.extract_source(server).await {
            Ok(info) => {
                if let Some(source) = info.sources.into_iter().next() {
                    tracing::debug!(
                        provider = provider.name(),
                        server = %server.name,
                        "Selected server"
                    );
                    return Selection::Found(source);
                }
                tracing::debug!(
                    provider = provider.name(),
                    server = %server.name,
                    "Server returned no sources"
                );
            }
            Err(e) => {
                tracing::warn!(
                    provider = provider.name(),
                    server = %server.name,
                    error = %e,
                    "Server extraction failed, trying next"
                );
                last_error = Some(e);
            }
        }
    }

    if cancel.is_cancelled() {
        return Selection::Cancelled;
    }

    Selection::Failed(match last_error {
        // a single failing server reports the provider's own error
        Some(e) if servers.len() == 1 => e,
        _ => ExtractionError::NoSources {
            servers: servers.len(),
        },
    })
}
