//! Persisted playback snapshot
//!
//! Single line of space separated integers:
//!
//! ```text
//! <seekMs> <activeIndex> <n> <id_1> ... <id_n> [<shuffledId_1> ... <shuffledId_n>]
//! ```
//!
//! The shuffled block is written only while shuffle is on. Files without
//! it (shuffle off, or written before shuffle was persisted) are valid.

use crate::error::{PlaybackError, Result};
use cadence_core::TrackId;
use serde::{Deserialize, Serialize};

/// Capture of queue and position sufficient to resume after a restart
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Not part of the text format; decoded snapshots are always paused
    pub is_playing: bool,
    pub active_index: usize,
    pub queue: Vec<TrackId>,
    /// Present iff shuffle was on
    pub shuffled_queue: Option<Vec<TrackId>>,
    pub seek_position_ms: u64,
}

impl PlayerSnapshot {
    /// Render the text form
    pub fn encode(&self) -> String {
        let mut fields = vec![
            self.seek_position_ms.to_string(),
            self.active_index.to_string(),
            self.queue.len().to_string(),
        ];
        fields.extend(self.queue.iter().map(ToString::to_string));
        if let Some(shuffled) = &self.shuffled_queue {
            fields.extend(shuffled.iter().map(ToString::to_string));
        }
        fields.join(" ")
    }

    /// Parse the text form
    ///
    /// # Errors
    /// `MalformedSnapshot` for non-numeric tokens, a truncated id list, a
    /// partial shuffled block or an index outside the queue.
    pub fn decode(contents: &str) -> Result<Self> {
        let mut tokens = contents.split_whitespace();

        let seek_position_ms: u64 = parse_field(tokens.next(), "seek position")?;
        let active_index: usize = parse_field(tokens.next(), "active index")?;
        let len: usize = parse_field(tokens.next(), "queue length")?;

        let rest = tokens
            .map(|token| {
                token
                    .parse::<TrackId>()
                    .map_err(|_| PlaybackError::malformed(format!("bad track id {token:?}")))
            })
            .collect::<Result<Vec<_>>>()?;

        if rest.len() < len {
            return Err(PlaybackError::malformed(format!(
                "expected {len} track ids, found {}",
                rest.len()
            )));
        }
        let (queue, shuffled) = rest.split_at(len);
        let shuffled_queue = match shuffled.len() {
            0 => None,
            n if n == len => Some(shuffled.to_vec()),
            n => {
                return Err(PlaybackError::malformed(format!(
                    "shuffled block has {n} ids, expected {len}"
                )))
            }
        };

        if len > 0 && active_index >= len {
            return Err(PlaybackError::malformed(format!(
                "active index {active_index} outside queue of {len}"
            )));
        }

        Ok(Self {
            is_playing: false,
            active_index: if len == 0 { 0 } else { active_index },
            queue: queue.to_vec(),
            shuffled_queue,
            seek_position_ms,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

fn parse_field<T: std::str::FromStr>(token: Option<&str>, name: &str) -> Result<T> {
    let token = token.ok_or_else(|| PlaybackError::malformed(format!("missing {name}")))?;
    token
        .parse()
        .map_err(|_| PlaybackError::malformed(format!("bad {name} {token:?}")))
}
