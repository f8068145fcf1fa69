//! Playlist arena with generation-checked handles
//!
//! Episodes are owned by the UI side. Tasks hold an [`EpisodeRef`] (slot index
//! plus generation) instead of a pointer, and resolve it only when extraction
//! starts. Removing or replacing a playlist bumps the slot generation, so stale
//! references resolve to `None` instead of dangling.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::provider::Provider;

/// One playable item of a playlist
#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    /// Episode number as listed by the site (may be fractional, e.g. 12.5)
    pub number: f32,
    /// Optional episode title
    pub title: Option<String>,
    /// Provider-specific link
    pub link: String,
}

impl Episode {
    /// Create an episode
    pub fn new(number: f32, title: Option<String>, link: impl Into<String>) -> Self {
        Self {
            number,
            title,
            link: link.into(),
        }
    }

    /// Name used for display and as the destination file name
    ///
    /// `"Episode 3"`, `"Episode 3. The Title"`, or `"Episode 12.5"`.
    pub fn full_name(&self) -> String {
        let number = if self.number.fract() == 0.0 {
            format!("{}", self.number as i64)
        } else {
            format!("{}", self.number)
        };
        match self.title.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => format!("Episode {}. {}", number, title),
            _ => format!("Episode {}", number),
        }
    }
}

/// An ordered list of episodes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Playlist {
    /// Playlist title
    pub title: String,
    /// Episodes in playback order
    pub episodes: Vec<Episode>,
}

impl Playlist {
    /// Create a playlist
    pub fn new(title: impl Into<String>, episodes: Vec<Episode>) -> Self {
        Self {
            title: title.into(),
            episodes,
        }
    }

    /// Number of episodes
    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    /// Whether the playlist has no episodes
    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }
}

/// Handle to a playlist slot in a [`PlaylistArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaylistId {
    index: usize,
    generation: u64,
}

impl fmt::Display for PlaylistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Reference to one episode of an arena playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EpisodeRef {
    /// Playlist handle
    pub playlist: PlaylistId,
    /// Episode index within the playlist
    pub index: usize,
}

/// A show to download episodes from
#[derive(Clone)]
pub struct Show {
    /// Show title; becomes the folder name
    pub title: String,
    /// Playlist holding the show's episodes
    pub playlist: PlaylistId,
    /// Provider able to extract the episodes
    pub provider: Arc<dyn Provider>,
}

impl fmt::Debug for Show {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Show")
            .field("title", &self.title)
            .field("playlist", &self.playlist)
            .field("provider", &self.provider.name())
            .finish()
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    playlist: Option<Arc<Playlist>>,
}

/// Slot storage for playlists shared between the UI and the scheduler
#[derive(Debug, Default)]
pub struct PlaylistArena {
    slots: RwLock<Vec<Slot>>,
}

impl PlaylistArena {
    /// Create an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a playlist, reusing a free slot when one exists
    pub fn insert(&self, playlist: Playlist) -> PlaylistId {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let playlist = Some(Arc::new(playlist));

        if let Some((index, slot)) = slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.playlist.is_none())
        {
            slot.generation += 1;
            slot.playlist = playlist;
            return PlaylistId {
                index,
                generation: slot.generation,
            };
        }

        slots.push(Slot {
            generation: 0,
            playlist,
        });
        PlaylistId {
            index: slots.len() - 1,
            generation: 0,
        }
    }

    /// Replace a playlist in place; references to the old contents go stale
    ///
    /// Returns the new handle, or `None` if `id` was already stale.
    pub fn replace(&self, id: PlaylistId, playlist: Playlist) -> Option<PlaylistId> {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let slot = slots.get_mut(id.index)?;
        if slot.generation != id.generation || slot.playlist.is_none() {
            return None;
        }
        slot.generation += 1;
        slot.playlist = Some(Arc::new(playlist));
        Some(PlaylistId {
            index: id.index,
            generation: slot.generation,
        })
    }

    /// Remove a playlist; returns false if `id` was already stale
    pub fn remove(&self, id: PlaylistId) -> bool {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        match slots.get_mut(id.index) {
            Some(slot) if slot.generation == id.generation && slot.playlist.is_some() => {
                slot.playlist = None;
                slot.generation += 1;
                true
            }
            _ => false,
        }
    }

    /// Look up a playlist
    pub fn get(&self, id: PlaylistId) -> Option<Arc<Playlist>> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        let slot = slots.get(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.playlist.clone()
    }

    /// Resolve an episode reference
    pub fn episode(&self, episode: &EpisodeRef) -> Option<Episode> {
        self.get(episode.playlist)?
            .episodes
            .get(episode.index)
            .cloned()
    }
}
