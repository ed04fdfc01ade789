//! Core types for playback orchestration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Repeat mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Stop at the end of the queue
    #[default]
    None,

    /// Wrap around to the start of the queue
    All,

    /// Loop the current track
    One,
}

/// Audio focus change delivered by the host platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FocusChange {
    /// Focus (re)gained
    Gain,

    /// Another player took focus permanently
    Loss,

    /// Focus lost for a short interruption
    LossTransient,

    /// Short interruption during which playback may continue quietly
    LossTransientCanDuck,
}

/// Configuration for the playback orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Initial shuffle state (default: off)
    pub shuffle: bool,

    /// Initial repeat mode (default: None)
    pub repeat: RepeatMode,

    /// Position after which a skipped track still counts as played (default: 24s)
    pub play_threshold_ms: u64,

    /// Position under which a skipped track counts as skipped (default: 20s)
    pub skip_threshold_ms: u64,

    /// Position after which "previous" restarts the track instead (default: 5s)
    pub restart_threshold_ms: u64,

    /// Volume while ducked (default: 0.5)
    pub duck_volume: f32,

    /// Position polling interval while playing (default: 200ms)
    pub position_tick_ms: u64,

    /// Window in which media-button clicks are counted together (default: 300ms)
    pub multi_click_window_ms: u64,

    /// Start playing when headphones are plugged in (default: false)
    pub resume_on_headphones_connect: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            shuffle: false,
            repeat: RepeatMode::None,
            play_threshold_ms: 24_000,
            skip_threshold_ms: 20_000,
            restart_threshold_ms: 5_000,
            duck_volume: 0.5,
            position_tick_ms: 200,
            multi_click_window_ms: 300,
            resume_on_headphones_connect: false,
        }
    }
}

impl PlaybackConfig {
    pub fn position_tick(&self) -> Duration {
        Duration::from_millis(self.position_tick_ms.max(1))
    }

    pub fn multi_click_window(&self) -> Duration {
        Duration::from_millis(self.multi_click_window_ms)
    }
}
