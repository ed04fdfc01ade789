//! Queue engine with linear and shuffled projections
//!
//! The linear queue is the order the user chose. While shuffle is on, a
//! shuffled projection of the same tracks drives playback and the active
//! index points into it:
//!
//! ```text
//! linear:    [A, B, C, D, E]        shuffle off -> index into linear
//! shuffled:  [C, E, A, D, B]        shuffle on  -> index into shuffled
//!             ^ track playing when shuffle was enabled
//! ```
//!
//! Insertions made while shuffled go into the shuffled projection and are
//! appended to the linear queue, so turning shuffle off keeps them.

use crate::error::{PlaybackError, Result};
use crate::shuffle::generate_shuffled_queue;
use cadence_core::{Track, TrackId};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct QueueEngine {
    linear: Vec<Track>,
    shuffled: Vec<Track>,
    shuffle: bool,
    /// Index into the active projection; 0 when it is empty
    index: usize,
    rng: StdRng,
}

impl QueueEngine {
    /// Create an empty queue
    pub fn new(shuffle: bool) -> Self {
        Self::with_rng(shuffle, StdRng::from_entropy())
    }

    /// Create an empty queue with a deterministic shuffle order
    pub fn with_seed(shuffle: bool, seed: u64) -> Self {
        Self::with_rng(shuffle, StdRng::seed_from_u64(seed))
    }

    fn with_rng(shuffle: bool, rng: StdRng) -> Self {
        Self {
            linear: Vec::new(),
            shuffled: Vec::new(),
            shuffle,
            index: 0,
            rng,
        }
    }

    // ===== Accessors =====

    pub fn is_shuffled(&self) -> bool {
        self.shuffle
    }

    /// Index into the active projection
    pub fn index(&self) -> usize {
        self.index
    }

    /// The projection currently driving playback
    pub fn active(&self) -> &[Track] {
        if self.shuffle {
            &self.shuffled
        } else {
            &self.linear
        }
    }

    pub fn linear(&self) -> &[Track] {
        &self.linear
    }

    /// Shuffled projection; empty while shuffle is off
    pub fn shuffled(&self) -> &[Track] {
        &self.shuffled
    }

    pub fn len(&self) -> usize {
        self.active().len()
    }

    pub fn is_empty(&self) -> bool {
        self.active().is_empty()
    }

    pub fn now_playing(&self) -> Option<&Track> {
        self.active().get(self.index)
    }

    /// Whether the active index is on the final track
    pub fn is_last(&self) -> bool {
        self.index + 1 >= self.len()
    }

    fn active_mut(&mut self) -> &mut Vec<Track> {
        if self.shuffle {
            &mut self.shuffled
        } else {
            &mut self.linear
        }
    }

    fn check_index(index: usize, len: usize) -> Result<()> {
        if len == 0 || index < len {
            Ok(())
        } else {
            Err(PlaybackError::QueueIndexOutOfBounds { index, len })
        }
    }

    // ===== Replacement =====

    /// Replace the linear queue
    ///
    /// With shuffle on, a fresh projection is built with the track at
    /// `start_index` first and the active index becomes 0.
    pub fn set_queue(&mut self, tracks: Vec<Track>, start_index: usize) -> Result<()> {
        Self::check_index(start_index, tracks.len())?;

        if tracks.is_empty() {
            self.linear.clear();
            self.shuffled.clear();
            self.index = 0;
            return Ok(());
        }

        if self.shuffle {
            self.shuffled = generate_shuffled_queue(&tracks, start_index, &mut self.rng);
            self.index = 0;
        } else {
            self.shuffled.clear();
            self.index = start_index;
        }
        self.linear = tracks;
        Ok(())
    }

    /// Replace the active projection in place, without reshuffling
    pub fn edit_queue(&mut self, tracks: Vec<Track>, current_index: usize) -> Result<()> {
        Self::check_index(current_index, tracks.len())?;
        self.index = if tracks.is_empty() { 0 } else { current_index };
        *self.active_mut() = tracks;
        Ok(())
    }

    /// Restore both projections from a snapshot
    ///
    /// `shuffled` decides the shuffle flag. It must hold as many tracks as
    /// `linear`.
    pub fn restore(
        &mut self,
        linear: Vec<Track>,
        shuffled: Option<Vec<Track>>,
        index: usize,
    ) -> Result<()> {
        if let Some(shuffled) = &shuffled {
            if shuffled.len() != linear.len() {
                return Err(PlaybackError::malformed(format!(
                    "shuffled queue has {} tracks, linear queue has {}",
                    shuffled.len(),
                    linear.len()
                )));
            }
        }
        Self::check_index(index, linear.len())?;

        self.shuffle = shuffled.is_some();
        self.shuffled = shuffled.unwrap_or_default();
        self.index = if linear.is_empty() { 0 } else { index };
        self.linear = linear;
        Ok(())
    }

    // ===== Shuffle =====

    /// Switch to a fresh shuffled projection led by the current track
    pub fn enable_shuffle(&mut self) {
        if self.shuffle {
            return;
        }
        self.shuffled = generate_shuffled_queue(&self.linear, self.index, &mut self.rng);
        self.shuffle = true;
        self.index = 0;
        debug!(tracks = self.shuffled.len(), "Shuffle enabled");
    }

    /// Linear queue with the shuffled projection's membership applied
    ///
    /// Linear tracks are kept in order while a matching id remains in the
    /// shuffled projection, each occurrence consumed once. Shuffled tracks
    /// left unmatched are appended in shuffled order. Without shuffle this
    /// is the linear queue as is.
    pub fn reconciled_linear(&self) -> Vec<Track> {
        if !self.shuffle {
            return self.linear.clone();
        }

        let mut remaining: HashMap<TrackId, usize> = HashMap::new();
        for track in &self.shuffled {
            *remaining.entry(track.id).or_default() += 1;
        }

        let mut take = |track: &Track| match remaining.get_mut(&track.id) {
            Some(count) if *count > 0 => {
                *count -= 1;
                true
            }
            _ => false,
        };

        let mut reconciled: Vec<Track> =
            self.linear.iter().filter(|t| take(*t)).cloned().collect();
        reconciled.extend(self.shuffled.iter().filter(|t| take(*t)).cloned());
        reconciled
    }

    /// Switch back to the linear queue
    ///
    /// Membership follows [`reconciled_linear`](Self::reconciled_linear).
    /// The active index follows the playing track.
    pub fn disable_shuffle(&mut self) {
        if !self.shuffle {
            return;
        }
        let playing = self.now_playing().map(|t| t.id);
        let reconciled = self.reconciled_linear();

        // First copy of the playing id, even when a later duplicate was playing
        self.index = playing
            .and_then(|id| reconciled.iter().position(|t| t.id == id))
            .unwrap_or(0);
        self.linear = reconciled;
        self.shuffled.clear();
        self.shuffle = false;
        debug!(
            tracks = self.linear.len(),
            index = self.index,
            "Shuffle disabled"
        );
    }

    // ===== Insertion =====

    /// Insert tracks right after the current one
    pub fn insert_next(&mut self, tracks: Vec<Track>) {
        if tracks.is_empty() {
            return;
        }
        let position = if self.is_empty() { 0 } else { self.index + 1 };
        if self.shuffle {
            self.linear.extend(tracks.iter().cloned());
        }
        self.active_mut().splice(position..position, tracks);
    }

    /// Append tracks to the end of the queue
    pub fn append_last(&mut self, tracks: Vec<Track>) {
        if tracks.is_empty() {
            return;
        }
        if self.shuffle {
            self.linear.extend(tracks.iter().cloned());
        }
        self.active_mut().extend(tracks);
    }

    // ===== Navigation =====

    /// Move forward one track, wrapping to the start
    pub fn advance(&mut self) -> usize {
        let len = self.len();
        if len > 0 {
            self.index = (self.index + 1) % len;
        }
        self.index
    }

    /// Move back one track, wrapping to the end
    pub fn retreat(&mut self) -> usize {
        let len = self.len();
        if len > 0 {
            self.index = (self.index + len - 1) % len;
        }
        self.index
    }

    /// Jump to an index in the active projection
    pub fn set_index(&mut self, index: usize) -> Result<()> {
        let len = self.len();
        if index >= len {
            return Err(PlaybackError::QueueIndexOutOfBounds { index, len });
        }
        self.index = index;
        Ok(())
    }
}
