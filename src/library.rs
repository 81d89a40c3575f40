// Track library access
// The broker only needs to resolve a track id into title/artist metadata

use crate::scrobbler::traits::Track;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LibraryError {
    #[error("Track not found: {0}")]
    NotFound(String),
    #[error("Library unavailable: {0}")]
    Unavailable(String),
}

/// Read access to track metadata
#[async_trait]
pub trait Library: Send + Sync {
    async fn track(&self, id: &str) -> Result<Track, LibraryError>;
}

/// In-memory library keyed by track id
#[derive(Clone, Default)]
pub struct MemoryLibrary {
    tracks: Arc<DashMap<String, Track>>,
}

impl MemoryLibrary {
    pub fn new() -> Self {
        Self {
            tracks: Arc::new(DashMap::new()),
        }
    }

    pub fn insert(&self, track: Track) {
        self.tracks.insert(track.id.clone(), track);
    }

    pub fn remove(&self, id: &str) -> Option<Track> {
        self.tracks.remove(id).map(|(_, track)| track)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

impl FromIterator<Track> for MemoryLibrary {
    fn from_iter<I: IntoIterator<Item = Track>>(iter: I) -> Self {
        let library = Self::new();
        for track in iter {
            library.insert(track);
        }
        library
    }
}

#[async_trait]
impl Library for MemoryLibrary {
    async fn track(&self, id: &str) -> Result<Track, LibraryError> {
        self.tracks
            .get(id)
            .map(|t| t.clone())
            .ok_or_else(|| LibraryError::NotFound(id.to_string()))
    }
}
