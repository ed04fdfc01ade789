//! Error types for playback orchestration

use cadence_core::CoreError;
use std::sync::Arc;
use thiserror::Error;

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Queue index outside the active projection
    #[error("Queue index {index} out of bounds for queue of length {len}")]
    QueueIndexOutOfBounds { index: usize, len: usize },

    /// Persisted snapshot could not be parsed
    #[error("Malformed playback snapshot: {0}")]
    MalformedSnapshot(String),

    /// The playback service thread is no longer running
    #[error("Playback service has stopped")]
    ServiceStopped,

    /// Command rejected in the current state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Collaborator (store, library) failure
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Thread or channel setup failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlaybackError {
    /// Create an invalid operation error
    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    /// Create a malformed snapshot error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedSnapshot(msg.into())
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;

/// Decoder failure reported by a `MediaDecoderBackend`
///
/// Cloneable so it can travel inside backend events; the I/O cause is kept
/// behind an `Arc`.
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    /// The source location does not exist
    #[error("Source not found: {uri}")]
    NotFound { uri: String },

    /// Reading the source failed
    #[error("I/O error reading {uri}: {source}")]
    Io {
        uri: String,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The decoder rejected the stream
    #[error("Decoder error: {0}")]
    Codec(String),
}

impl DecodeError {
    pub fn not_found(uri: impl Into<String>) -> Self {
        Self::NotFound { uri: uri.into() }
    }

    pub fn io(uri: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            uri: uri.into(),
            source: Arc::new(source),
        }
    }

    pub fn codec(msg: impl Into<String>) -> Self {
        Self::Codec(msg.into())
    }

    /// Whether the source was missing rather than unreadable
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            Self::Codec(_) => false,
        }
    }
}
