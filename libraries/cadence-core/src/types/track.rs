//! Library track type
//!
//! Tracks are owned by the library. The playback engine only ever holds
//! copies and compares them by id.

use super::ids::TrackId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An immutable library track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Duration in milliseconds as reported by the library scan
    pub duration_ms: u64,
    /// URI or filesystem path handed to the decoder
    pub location: String,
    #[serde(default)]
    pub track_number: Option<u32>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default = "epoch")]
    pub date_added: DateTime<Utc>,
}

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

impl Track {
    /// Create a track with the fields the engine needs; everything else
    /// defaults to empty.
    pub fn new(id: impl Into<TrackId>, title: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: String::new(),
            album: String::new(),
            duration_ms: 0,
            location: location.into(),
            track_number: None,
            year: None,
            date_added: epoch(),
        }
    }

    /// Set the artist and album
    #[must_use]
    pub fn with_album(mut self, artist: impl Into<String>, album: impl Into<String>) -> Self {
        self.artist = artist.into();
        self.album = album.into();
        self
    }

    /// Set the duration in milliseconds
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Key shared by every track of the same album, used for artwork caching
    pub fn artwork_key(&self) -> String {
        format!("{}/{}", self.artist, self.album)
    }
}
