//! Daemon error types

use cadence_core::CoreError;
use cadence_playback::PlaybackError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// A stdin line that does not parse
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DaemonError {
    pub fn invalid_command(msg: impl Into<String>) -> Self {
        Self::InvalidCommand(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, DaemonError>;
