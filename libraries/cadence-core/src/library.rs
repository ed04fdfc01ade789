//! In-memory track library
//!
//! A `TrackRepository` over a fixed set of tracks, loadable from a JSON
//! manifest (an array of `Track` objects).

use crate::error::{CoreError, Result};
use crate::traits::TrackRepository;
use crate::types::{Track, TrackId};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::info;

/// Track library held in memory
#[derive(Debug, Default, Clone)]
pub struct Library {
    tracks: HashMap<TrackId, Track>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a library from tracks; a later duplicate id replaces an
    /// earlier one.
    pub fn from_tracks(tracks: impl IntoIterator<Item = Track>) -> Self {
        Self {
            tracks: tracks.into_iter().map(|t| (t.id, t)).collect(),
        }
    }

    /// Load a JSON manifest
    pub fn load_manifest(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            CoreError::storage(format!("Cannot read manifest {}: {}", path.display(), e))
        })?;
        let tracks: Vec<Track> = serde_json::from_str(&contents)?;
        info!(path = %path.display(), tracks = tracks.len(), "Loaded library manifest");
        Ok(Self::from_tracks(tracks))
    }

    pub fn insert(&mut self, track: Track) {
        self.tracks.insert(track.id, track);
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// All tracks ordered by id
    pub fn tracks(&self) -> Vec<Track> {
        let mut tracks: Vec<Track> = self.tracks.values().cloned().collect();
        tracks.sort_by_key(|t| t.id);
        tracks
    }
}

impl TrackRepository for Library {
    fn get_track(&self, id: TrackId) -> Result<Option<Track>> {
        Ok(self.tracks.get(&id).cloned())
    }
}
