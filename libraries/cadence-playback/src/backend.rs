//! Decoder backend abstraction
//!
//! The engine never decodes audio itself. A platform provides a
//! `MediaDecoderBackend` that renders one source at a time and reports
//! asynchronous progress through a `BackendEventSink`.

use crate::error::DecodeError;
use std::fmt;
use std::sync::Arc;

/// What happened inside the backend
#[derive(Debug, Clone)]
pub enum BackendEventKind {
    /// Asynchronous prepare finished
    Prepared,

    /// Playback reached the end of the source
    Completed,

    /// Decoding failed
    Error(DecodeError),
}

/// Event reported by a backend, tagged with the generation of the
/// `prepare_async` call it belongs to
#[derive(Debug, Clone)]
pub struct BackendEvent {
    pub generation: u64,
    pub kind: BackendEventKind,
}

impl BackendEvent {
    pub fn prepared(generation: u64) -> Self {
        Self {
            generation,
            kind: BackendEventKind::Prepared,
        }
    }

    pub fn completed(generation: u64) -> Self {
        Self {
            generation,
            kind: BackendEventKind::Completed,
        }
    }

    pub fn error(generation: u64, error: DecodeError) -> Self {
        Self {
            generation,
            kind: BackendEventKind::Error(error),
        }
    }
}

/// Callback a backend uses to report events
///
/// May be invoked from any thread, including synchronously from inside a
/// backend method.
#[derive(Clone)]
pub struct BackendEventSink(Arc<dyn Fn(BackendEvent) + Send + Sync>);

impl BackendEventSink {
    pub fn new(f: impl Fn(BackendEvent) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Sink that drops every event
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    pub fn emit(&self, event: BackendEvent) {
        (self.0)(event);
    }
}

impl fmt::Debug for BackendEventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BackendEventSink")
    }
}

/// Single-source decode/render capability
///
/// Implementations do not enforce call ordering; `PlayerStateMachine` only
/// forwards calls that are legal in its current state.
pub trait MediaDecoderBackend: Send {
    /// Install the event callback. Called once before any other method.
    fn set_event_sink(&mut self, sink: BackendEventSink);

    /// Point the backend at a source
    ///
    /// # Errors
    /// Fails synchronously when the source cannot be opened.
    fn set_source(&mut self, uri: &str) -> Result<(), DecodeError>;

    /// Begin preparing; completion is reported as `Prepared` (or `Error`)
    /// stamped with `generation`, and later events of this source carry the
    /// same generation.
    fn prepare_async(&mut self, generation: u64);

    fn start(&mut self);

    fn pause(&mut self);

    fn stop(&mut self);

    fn seek_to(&mut self, position_ms: u64);

    /// Linear gain, 0.0 to 1.0
    fn set_volume(&mut self, volume: f32);

    fn position_ms(&self) -> u64;

    /// `None` while the duration is not known
    fn duration_ms(&self) -> Option<u64>;

    /// Drop the current source and return to an unconfigured state
    fn reset(&mut self);

    /// Free all resources; the backend is not used afterwards
    fn release(&mut self);

    fn audio_session_id(&self) -> i32;
}
