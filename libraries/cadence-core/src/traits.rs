/// Collaborator traits consumed by the playback engine
use crate::error::Result;
use crate::types::{Track, TrackId};

/// Resolves track ids to library metadata
///
/// The engine never scans or indexes media itself; it asks the library.
pub trait TrackRepository: Send + Sync {
    /// Look up a single track
    fn get_track(&self, id: TrackId) -> Result<Option<Track>>;

    /// Resolve an ordered list of ids
    ///
    /// The output has the same length and order as `ids`, duplicates
    /// included.
    ///
    /// # Errors
    /// Returns `CoreError::TrackNotFound` for the first id the library
    /// does not know.
    fn resolve_tracks_by_ids(&self, ids: &[TrackId]) -> Result<Vec<Track>> {
        ids.iter()
            .map(|&id| {
                self.get_track(id)?
                    .ok_or(crate::error::CoreError::TrackNotFound(id))
            })
            .collect()
    }
}

/// Persistent string key-value store
///
/// Writes are only guaranteed durable after `flush`.
pub trait KeyValueStore: Send {
    /// Read a value
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value
    fn put(&mut self, key: &str, value: &str) -> Result<()>;

    /// Persist pending writes
    fn flush(&mut self) -> Result<()>;
}

/// Storage for the single-line playback snapshot
pub trait SnapshotStore: Send {
    /// Load the saved snapshot text, `None` when nothing was saved yet
    fn load(&self) -> Result<Option<String>>;

    /// Replace the saved snapshot text
    fn save(&mut self, contents: &str) -> Result<()>;
}
