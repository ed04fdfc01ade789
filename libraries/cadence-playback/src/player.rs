//! Capability-gated player state machine
//!
//! Wraps one `MediaDecoderBackend` and only forwards operations the
//! current `PlayerState` permits. A denied operation is logged and ignored,
//! so callers must not infer success from having made a call.

use crate::backend::{BackendEvent, BackendEventKind, BackendEventSink, MediaDecoderBackend};
use crate::error::DecodeError;
use crate::state::PlayerState;
use tracing::{debug, warn};

/// Lifecycle notification produced from an accepted backend event
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    Prepared,
    Completed,
    Error(DecodeError),
}

/// State machine around a single decoder backend
pub struct PlayerStateMachine {
    backend: Box<dyn MediaDecoderBackend>,
    state: PlayerState,
    /// Bumped on every prepare, reset and release; backend events carrying
    /// an older value are stale.
    generation: u64,
    source: Option<String>,
}

impl PlayerStateMachine {
    /// Wrap a backend, routing its events to `sink`
    pub fn new(mut backend: Box<dyn MediaDecoderBackend>, sink: BackendEventSink) -> Self {
        backend.set_event_sink(sink);
        Self {
            backend,
            state: PlayerState::Idle,
            generation: 0,
            source: None,
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Location of the configured source, if any
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayerState::Started
    }

    pub fn is_prepared(&self) -> bool {
        self.state.is_prepared()
    }

    pub fn is_complete(&self) -> bool {
        self.state == PlayerState::Completed
    }

    pub fn has_error(&self) -> bool {
        self.state == PlayerState::Error
    }

    pub fn audio_session_id(&self) -> i32 {
        self.backend.audio_session_id()
    }

    fn permitted(&self, operation: &'static str, allowed: bool) -> bool {
        if !allowed {
            debug!(operation, state = ?self.state, "Ignoring operation not permitted in current state");
        }
        allowed
    }

    // ===== Lifecycle =====

    /// Configure the source (Idle -> Initialized)
    ///
    /// A synchronous open failure moves the machine to `Error` and is
    /// returned to the caller.
    pub fn set_data_source(&mut self, uri: &str) -> Result<(), DecodeError> {
        if !self.permitted("set_data_source", self.state.capabilities().set_source) {
            return Ok(());
        }

        match self.backend.set_source(uri) {
            Ok(()) => {
                self.state = PlayerState::Initialized;
                self.source = Some(uri.to_string());
                Ok(())
            }
            Err(e) => {
                warn!(uri, error = %e, "Failed to set data source");
                self.state = PlayerState::Error;
                Err(e)
            }
        }
    }

    /// Start asynchronous preparation (Initialized|Stopped -> Preparing)
    pub fn prepare(&mut self) {
        if !self.permitted("prepare", self.state.capabilities().prepare) {
            return;
        }
        self.generation += 1;
        self.state = PlayerState::Preparing;
        self.backend.prepare_async(self.generation);
    }

    pub fn start(&mut self) {
        if !self.permitted("start", self.state.capabilities().start) {
            return;
        }
        self.backend.start();
        self.state = PlayerState::Started;
    }

    pub fn pause(&mut self) {
        if !self.permitted("pause", self.state.capabilities().pause) {
            return;
        }
        self.backend.pause();
        self.state = PlayerState::Paused;
    }

    pub fn stop(&mut self) {
        if !self.permitted("stop", self.state.capabilities().stop) {
            return;
        }
        self.backend.stop();
        self.state = PlayerState::Stopped;
    }

    /// Seek within the prepared source
    ///
    /// From `Completed` the backend is restarted and paused first so the
    /// new position sticks.
    pub fn seek_to(&mut self, position_ms: u64) {
        if !self.permitted("seek_to", self.state.capabilities().seek) {
            return;
        }
        if self.state == PlayerState::Completed {
            self.backend.start();
            self.backend.pause();
            self.state = PlayerState::Paused;
        }
        self.backend.seek_to(position_ms);
    }

    pub fn set_volume(&mut self, volume: f32) {
        if !self.permitted("set_volume", self.state.capabilities().set_volume) {
            return;
        }
        self.backend.set_volume(volume.clamp(0.0, 1.0));
    }

    /// Return to `Idle` from any state but `Released`
    pub fn reset(&mut self) {
        if !self.permitted("reset", self.state.capabilities().reset) {
            return;
        }
        self.backend.reset();
        self.generation += 1;
        self.state = PlayerState::Idle;
        self.source = None;
    }

    /// Free the backend; terminal
    pub fn release(&mut self) {
        if self.state == PlayerState::Released {
            return;
        }
        self.backend.release();
        self.generation += 1;
        self.state = PlayerState::Released;
        self.source = None;
    }

    // ===== Timing =====

    /// Current position in milliseconds
    ///
    /// Full duration once completed, 0 when no source is prepared.
    pub fn position(&self) -> u64 {
        match self.state {
            PlayerState::Completed => self.duration().unwrap_or(0),
            state if state.capabilities().query_timing => self.backend.position_ms(),
            _ => 0,
        }
    }

    /// Duration in milliseconds, `None` while unknown
    pub fn duration(&self) -> Option<u64> {
        if self.state.capabilities().query_timing {
            self.backend.duration_ms()
        } else {
            None
        }
    }

    // ===== Backend events =====

    /// Apply a backend event
    ///
    /// Returns the lifecycle notification to act on, or `None` when the
    /// event is stale or meaningless in the current state.
    pub fn handle_backend_event(&mut self, event: BackendEvent) -> Option<PlayerEvent> {
        if event.generation != self.generation {
            debug!(
                event_generation = event.generation,
                current_generation = self.generation,
                "Discarding stale backend event"
            );
            return None;
        }

        match event.kind {
            BackendEventKind::Prepared if self.state == PlayerState::Preparing => {
                self.state = PlayerState::Prepared;
                Some(PlayerEvent::Prepared)
            }
            BackendEventKind::Completed
                if matches!(
                    self.state,
                    PlayerState::Prepared | PlayerState::Started | PlayerState::Paused
                ) =>
            {
                self.state = PlayerState::Completed;
                Some(PlayerEvent::Completed)
            }
            BackendEventKind::Error(e) if self.state != PlayerState::Released => {
                warn!(error = %e, state = ?self.state, "Backend reported an error");
                self.state = PlayerState::Error;
                Some(PlayerEvent::Error(e))
            }
            kind => {
                debug!(?kind, state = ?self.state, "Ignoring backend event in current state");
                None
            }
        }
    }
}

impl std::fmt::Debug for PlayerStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerStateMachine")
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Backend that records calls and fakes a fixed-length source
    #[derive(Default, Clone)]
    struct RecordingBackend {
        calls: Arc<Mutex<Vec<String>>>,
        position: Arc<Mutex<u64>>,
    }

    impl RecordingBackend {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn log(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }
    }

    impl MediaDecoderBackend for RecordingBackend {
        fn set_event_sink(&mut self, _sink: BackendEventSink) {}

        fn set_source(&mut self, uri: &str) -> Result<(), DecodeError> {
            if uri.starts_with("missing") {
                return Err(DecodeError::not_found(uri));
            }
            self.log(format!("set_source {uri}"));
            Ok(())
        }

        fn prepare_async(&mut self, generation: u64) {
            self.log(format!("prepare {generation}"));
        }

        fn start(&mut self) {
            self.log("start");
        }

        fn pause(&mut self) {
            self.log("pause");
        }

        fn stop(&mut self) {
            self.log("stop");
        }

        fn seek_to(&mut self, position_ms: u64) {
            *self.position.lock().unwrap() = position_ms;
            self.log(format!("seek {position_ms}"));
        }

        fn set_volume(&mut self, volume: f32) {
            self.log(format!("volume {volume}"));
        }

        fn position_ms(&self) -> u64 {
            *self.position.lock().unwrap()
        }

        fn duration_ms(&self) -> Option<u64> {
            Some(100_000)
        }

        fn reset(&mut self) {
            self.log("reset");
        }

        fn release(&mut self) {
            self.log("release");
        }

        fn audio_session_id(&self) -> i32 {
            7
        }
    }

    fn machine() -> (PlayerStateMachine, RecordingBackend) {
        let backend = RecordingBackend::default();
        let player = PlayerStateMachine::new(Box::new(backend.clone()), BackendEventSink::noop());
        (player, backend)
    }

    fn prepared_machine() -> (PlayerStateMachine, RecordingBackend) {
        let (mut player, backend) = machine();
        player.set_data_source("a.mp3").unwrap();
        player.prepare();
        let generation = player.generation();
        player.handle_backend_event(BackendEvent::prepared(generation));
        (player, backend)
    }

    #[test]
    fn seek_in_idle_is_a_no_op() {
        let (mut player, backend) = machine();
        player.seek_to(5_000);

        assert_eq!(player.state(), PlayerState::Idle);
        assert_eq!(player.position(), 0);
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn full_lifecycle() {
        let (mut player, backend) = prepared_machine();
        assert_eq!(player.state(), PlayerState::Prepared);

        player.start();
        assert!(player.is_playing());
        player.pause();
        assert_eq!(player.state(), PlayerState::Paused);
        player.stop();
        assert_eq!(player.state(), PlayerState::Stopped);
        player.prepare();
        assert_eq!(player.state(), PlayerState::Preparing);

        assert_eq!(
            backend.calls(),
            vec!["set_source a.mp3", "prepare 1", "start", "pause", "stop", "prepare 2"]
        );
    }

    #[test]
    fn pause_before_start_is_ignored() {
        let (mut player, backend) = prepared_machine();
        player.pause();

        assert_eq!(player.state(), PlayerState::Prepared);
        assert!(!backend.calls().contains(&"pause".to_string()));
    }

    #[test]
    fn duration_unknown_until_prepared() {
        let (mut player, _) = machine();
        assert_eq!(player.duration(), None);
        player.set_data_source("a.mp3").unwrap();
        player.prepare();
        assert_eq!(player.duration(), None);

        let generation = player.generation();
        player.handle_backend_event(BackendEvent::prepared(generation));
        assert_eq!(player.duration(), Some(100_000));
    }

    #[test]
    fn completed_position_reads_full_duration() {
        let (mut player, _) = prepared_machine();
        player.start();
        let event = player.handle_backend_event(BackendEvent::completed(player.generation()));

        assert!(matches!(event, Some(PlayerEvent::Completed)));
        assert_eq!(player.position(), 100_000);
    }

    #[test]
    fn seek_from_completed_goes_through_paused() {
        let (mut player, backend) = prepared_machine();
        player.start();
        player.handle_backend_event(BackendEvent::completed(player.generation()));
        player.seek_to(0);

        assert_eq!(player.state(), PlayerState::Paused);
        assert_eq!(player.position(), 0);
        assert!(backend.calls().ends_with(&[
            "start".to_string(),
            "pause".to_string(),
            "seek 0".to_string()
        ]));
    }

    #[test]
    fn stale_events_are_discarded() {
        let (mut player, _) = machine();
        player.set_data_source("a.mp3").unwrap();
        player.prepare();
        let old_generation = player.generation();
        player.reset();
        player.set_data_source("b.mp3").unwrap();
        player.prepare();

        assert!(player
            .handle_backend_event(BackendEvent::prepared(old_generation))
            .is_none());
        assert_eq!(player.state(), PlayerState::Preparing);
    }

    #[test]
    fn source_failure_enters_error_and_reset_recovers() {
        let (mut player, _) = machine();
        let err = player.set_data_source("missing.mp3").unwrap_err();

        assert!(err.is_not_found());
        assert!(player.has_error());

        player.start();
        assert!(player.has_error());

        player.reset();
        assert_eq!(player.state(), PlayerState::Idle);
    }

    #[test]
    fn backend_error_event_enters_error() {
        let (mut player, _) = prepared_machine();
        player.start();
        let event = player.handle_backend_event(BackendEvent::error(
            player.generation(),
            DecodeError::codec("bad frame"),
        ));

        assert!(matches!(event, Some(PlayerEvent::Error(DecodeError::Codec(_)))));
        assert_eq!(player.state(), PlayerState::Error);
        assert_eq!(player.position(), 0);
    }

    #[test]
    fn release_is_terminal() {
        let (mut player, backend) = prepared_machine();
        player.release();
        player.release();
        player.reset();
        player.start();

        assert_eq!(player.state(), PlayerState::Released);
        assert_eq!(
            backend.calls().iter().filter(|c| *c == "release").count(),
            1
        );
    }

    #[test]
    fn volume_is_clamped() {
        let (mut player, backend) = machine();
        player.set_volume(3.0);
        assert_eq!(backend.calls(), vec!["volume 1"]);
    }
}
