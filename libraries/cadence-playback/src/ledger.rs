//! Play and skip counting
//!
//! Every record is written through to the key-value store as soon as it
//! changes. Values are stored as `"plays,skips,lastPlayed"` keyed by the
//! decimal track id; older two-field values read with `lastPlayed = 0`.

use crate::error::Result;
use crate::types::PlaybackConfig;
use cadence_core::{KeyValueStore, TrackId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Counters for one track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlayCountRecord {
    pub play_count: u32,
    pub skip_count: u32,
    /// Epoch seconds of the last counted play, 0 when never played
    pub last_played: u64,
}

impl PlayCountRecord {
    /// Parse a stored value, treating missing or unreadable fields as 0
    pub fn parse(value: &str) -> Self {
        let mut fields = value.split(',').map(str::trim);
        let mut next = |name: &'static str| -> u64 {
            match fields.next() {
                None | Some("") => 0,
                Some(field) => field.parse().unwrap_or_else(|_| {
                    warn!(field, name, "Unreadable play count field, using 0");
                    0
                }),
            }
        };

        let play_count = next("plays");
        let skip_count = next("skips");
        let last_played = next("last_played");
        Self {
            play_count: u32::try_from(play_count).unwrap_or(u32::MAX),
            skip_count: u32::try_from(skip_count).unwrap_or(u32::MAX),
            last_played,
        }
    }
}

impl fmt::Display for PlayCountRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.play_count, self.skip_count, self.last_played)
    }
}

/// How far a track got before it was left
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Played,
    Skipped,
}

impl PlayOutcome {
    /// Classify a track being left at `position_ms`
    ///
    /// Past the play threshold or past half the duration counts as a play;
    /// otherwise anything under the skip threshold counts as a skip. The
    /// band between the two thresholds is not counted. An unknown duration
    /// never satisfies the half-way rule.
    pub fn classify(
        position_ms: u64,
        duration_ms: Option<u64>,
        config: &PlaybackConfig,
    ) -> Option<Self> {
        let past_half = duration_ms.is_some_and(|d| position_ms > d / 2);
        if position_ms > config.play_threshold_ms || past_half {
            Some(Self::Played)
        } else if position_ms < config.skip_threshold_ms {
            Some(Self::Skipped)
        } else {
            None
        }
    }
}

/// Wall clock in epoch seconds
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

fn system_clock() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

/// Per-track play/skip ledger
pub struct PlayCountLedger {
    store: Box<dyn KeyValueStore>,
    /// Records touched this session
    cache: HashMap<TrackId, PlayCountRecord>,
    clock: Clock,
}

impl PlayCountLedger {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self::with_clock(store, Arc::new(system_clock))
    }

    pub fn with_clock(store: Box<dyn KeyValueStore>, clock: Clock) -> Self {
        Self {
            store,
            cache: HashMap::new(),
            clock,
        }
    }

    /// Current record for a track; all zero when unseen
    pub fn record(&self, id: TrackId) -> PlayCountRecord {
        if let Some(record) = self.cache.get(&id) {
            return *record;
        }
        match self.store.get(&id.to_string()) {
            Ok(Some(value)) => PlayCountRecord::parse(&value),
            Ok(None) => PlayCountRecord::default(),
            Err(e) => {
                warn!(track_id = %id, error = %e, "Failed to read play count");
                PlayCountRecord::default()
            }
        }
    }

    pub fn play_count(&self, id: TrackId) -> u32 {
        self.record(id).play_count
    }

    pub fn skip_count(&self, id: TrackId) -> u32 {
        self.record(id).skip_count
    }

    pub fn last_played(&self, id: TrackId) -> u64 {
        self.record(id).last_played
    }

    /// Count a play and stamp the play time
    pub fn record_play(&mut self, id: TrackId) -> Result<()> {
        let now = (self.clock)();
        self.update(id, |record| {
            record.play_count = record.play_count.saturating_add(1);
            record.last_played = now;
        })
    }

    /// Count a skip
    pub fn record_skip(&mut self, id: TrackId) -> Result<()> {
        self.update(id, |record| {
            record.skip_count = record.skip_count.saturating_add(1);
        })
    }

    pub fn record_outcome(&mut self, id: TrackId, outcome: PlayOutcome) -> Result<()> {
        match outcome {
            PlayOutcome::Played => self.record_play(id),
            PlayOutcome::Skipped => self.record_skip(id),
        }
    }

    fn update(&mut self, id: TrackId, f: impl FnOnce(&mut PlayCountRecord)) -> Result<()> {
        let mut record = self.record(id);
        f(&mut record);
        self.cache.insert(id, record);

        self.store.put(&id.to_string(), &record.to_string())?;
        self.store.flush()?;
        debug!(track_id = %id, %record, "Play count updated");
        Ok(())
    }
}

impl fmt::Debug for PlayCountLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayCountLedger")
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::MemoryStore;

    fn ledger_at(now: u64) -> PlayCountLedger {
        PlayCountLedger::with_clock(Box::new(MemoryStore::new()), Arc::new(move || now))
    }

    #[test]
    fn classification_thresholds() {
        let config = PlaybackConfig::default();
        let duration = Some(100_000);

        assert_eq!(
            PlayOutcome::classify(30_000, duration, &config),
            Some(PlayOutcome::Played)
        );
        assert_eq!(
            PlayOutcome::classify(10_000, duration, &config),
            Some(PlayOutcome::Skipped)
        );
        assert_eq!(
            PlayOutcome::classify(60_000, duration, &config),
            Some(PlayOutcome::Played)
        );
        assert_eq!(PlayOutcome::classify(22_000, duration, &config), None);
    }

    #[test]
    fn short_track_past_half_counts_as_play() {
        let config = PlaybackConfig::default();
        assert_eq!(
            PlayOutcome::classify(16_000, Some(30_000), &config),
            Some(PlayOutcome::Played)
        );
    }

    #[test]
    fn unknown_duration_never_uses_half_rule() {
        let config = PlaybackConfig::default();
        assert_eq!(
            PlayOutcome::classify(1, None, &config),
            Some(PlayOutcome::Skipped)
        );
    }

    #[test]
    fn parse_is_forward_compatible() {
        assert_eq!(
            PlayCountRecord::parse("3,1"),
            PlayCountRecord {
                play_count: 3,
                skip_count: 1,
                last_played: 0
            }
        );
        assert_eq!(PlayCountRecord::parse(""), PlayCountRecord::default());
        assert_eq!(PlayCountRecord::parse("x,2,5").skip_count, 2);
        assert_eq!(PlayCountRecord::parse("1,2,3,extra").last_played, 3);
    }

    #[test]
    fn play_stamps_time_and_skip_does_not() {
        let mut ledger = ledger_at(1_700_000_000);
        let id = TrackId::new(4);

        ledger.record_skip(id).unwrap();
        assert_eq!(ledger.last_played(id), 0);

        ledger.record_play(id).unwrap();
        assert_eq!(ledger.play_count(id), 1);
        assert_eq!(ledger.skip_count(id), 1);
        assert_eq!(ledger.last_played(id), 1_700_000_000);
    }

    #[test]
    fn unseen_ids_read_zero() {
        let ledger = ledger_at(0);
        assert_eq!(ledger.record(TrackId::new(99)), PlayCountRecord::default());
    }
}
