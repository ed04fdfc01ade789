//! Player lifecycle states and their capability table

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of the wrapped decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerState {
    Idle,
    Initialized,
    Preparing,
    Prepared,
    Started,
    Paused,
    Stopped,
    Completed,
    Error,
    Released,
}

/// Operations a state permits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct Capabilities {
    pub set_source: bool,
    pub prepare: bool,
    pub start: bool,
    pub pause: bool,
    pub stop: bool,
    pub seek: bool,
    /// Covers both duration and position queries
    pub query_timing: bool,
    pub set_volume: bool,
    pub reset: bool,
}

const NONE: Capabilities = Capabilities {
    set_source: false,
    prepare: false,
    start: false,
    pause: false,
    stop: false,
    seek: false,
    query_timing: false,
    set_volume: false,
    reset: false,
};

/// Started and Paused share a row
const PLAYING: Capabilities = Capabilities {
    start: true,
    pause: true,
    stop: true,
    seek: true,
    query_timing: true,
    set_volume: true,
    reset: true,
    ..NONE
};

impl PlayerState {
    /// Capability row for this state
    pub const fn capabilities(self) -> Capabilities {
        match self {
            Self::Idle => Capabilities {
                set_source: true,
                set_volume: true,
                reset: true,
                ..NONE
            },
            Self::Initialized => Capabilities {
                prepare: true,
                set_volume: true,
                reset: true,
                ..NONE
            },
            Self::Preparing => Capabilities {
                reset: true,
                ..NONE
            },
            Self::Prepared => Capabilities {
                start: true,
                seek: true,
                query_timing: true,
                set_volume: true,
                reset: true,
                ..NONE
            },
            Self::Started | Self::Paused => PLAYING,
            Self::Stopped => Capabilities {
                prepare: true,
                set_volume: true,
                reset: true,
                ..NONE
            },
            Self::Completed => Capabilities { pause: false, ..PLAYING },
            Self::Error => Capabilities {
                reset: true,
                ..NONE
            },
            Self::Released => NONE,
        }
    }

    /// Whether the backend holds a prepared source
    pub const fn is_prepared(self) -> bool {
        matches!(
            self,
            Self::Prepared | Self::Started | Self::Paused | Self::Completed
        )
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
