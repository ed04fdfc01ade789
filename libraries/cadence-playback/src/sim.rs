//! In-process decoder backend
//!
//! Stands in for a real decoder in tests and in the daemon. Sources are
//! registered by URI with a duration; nothing is actually decoded.
//!
//! - `Manual` mode: position only moves through `seek_to` or the handle,
//!   and completion happens when the handle says so.
//! - `Realtime` mode: position follows the wall clock while started and a
//!   timer reports completion when the end is reached.

use crate::backend::{BackendEvent, BackendEventSink, MediaDecoderBackend};
use crate::error::DecodeError;
use crate::timer::OneShot;
use cadence_core::Track;
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// How simulated time advances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimulationMode {
    #[default]
    Manual,
    Realtime,
}

#[derive(Debug, Clone)]
enum Media {
    Playable { duration_ms: Option<u64> },
    /// Opens fine, fails while preparing
    Corrupt,
    /// Fails to open
    Unreadable,
}

#[derive(Debug)]
struct SimState {
    media: HashMap<String, Media>,
    sink: BackendEventSink,
    mode: SimulationMode,
    auto_prepare: bool,

    source: Option<String>,
    duration_ms: Option<u64>,
    generation: u64,
    prepared: bool,
    playing: bool,
    /// Position at `resumed_at` (or the frozen position while paused)
    position_ms: u64,
    resumed_at: Option<Instant>,
    volume: f32,
    completion: Option<OneShot>,
    /// Bumped per armed completion so a superseded timer stays quiet
    completion_epoch: u64,
    calls: Vec<String>,
}

impl SimState {
    fn position(&self) -> u64 {
        let elapsed = match (self.mode, self.playing, self.resumed_at) {
            (SimulationMode::Realtime, true, Some(at)) => u64::try_from(at.elapsed().as_millis()).unwrap_or(u64::MAX),
            _ => 0,
        };
        let position = self.position_ms.saturating_add(elapsed);
        match self.duration_ms {
            Some(duration) => position.min(duration),
            None => position,
        }
    }

    /// Fold elapsed wall time into `position_ms`
    fn freeze(&mut self) {
        self.position_ms = self.position();
        self.resumed_at = None;
        if let Some(mut timer) = self.completion.take() {
            timer.cancel();
        }
    }
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Simulated `MediaDecoderBackend`
#[derive(Debug)]
pub struct SimulatedBackend {
    state: Arc<Mutex<SimState>>,
    session_id: i32,
}

/// Test and daemon control over a `SimulatedBackend`
#[derive(Debug, Clone)]
pub struct SimulatedBackendHandle {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedBackend {
    /// Create a backend and its control handle
    pub fn new(mode: SimulationMode) -> (Self, SimulatedBackendHandle) {
        let state = Arc::new(Mutex::new(SimState {
            media: HashMap::new(),
            sink: BackendEventSink::noop(),
            mode,
            auto_prepare: true,
            source: None,
            duration_ms: None,
            generation: 0,
            prepared: false,
            playing: false,
            position_ms: 0,
            resumed_at: None,
            volume: 1.0,
            completion: None,
            completion_epoch: 0,
            calls: Vec::new(),
        }));

        let handle = SimulatedBackendHandle {
            state: Arc::clone(&state),
        };
        (
            Self {
                state,
                session_id: 1,
            },
            handle,
        )
    }

    fn record(&self, call: impl Into<String>) -> MutexGuard<'_, SimState> {
        let mut state = lock(&self.state);
        let call = call.into();
        trace!(call = %call, "Simulated backend call");
        state.calls.push(call);
        state
    }

    /// Arm the completion timer for the remaining play time
    fn schedule_completion(shared: &Arc<Mutex<SimState>>, state: &mut SimState) {
        if state.mode != SimulationMode::Realtime || !state.playing {
            return;
        }
        let Some(duration) = state.duration_ms else {
            return;
        };

        let remaining = duration.saturating_sub(state.position());
        let generation = state.generation;
        state.completion_epoch += 1;
        let epoch = state.completion_epoch;
        let shared = Arc::clone(shared);
        state.completion = Some(OneShot::schedule(
            Duration::from_millis(remaining),
            move || {
                let sink = {
                    let mut state = lock(&shared);
                    if state.completion_epoch != epoch || !state.playing {
                        return;
                    }
                    state.position_ms = duration;
                    state.resumed_at = None;
                    state.playing = false;
                    state.completion = None;
                    state.sink.clone()
                };
                sink.emit(BackendEvent::completed(generation));
            },
        ));
    }
}

impl MediaDecoderBackend for SimulatedBackend {
    fn set_event_sink(&mut self, sink: BackendEventSink) {
        lock(&self.state).sink = sink;
    }

    fn set_source(&mut self, uri: &str) -> Result<(), DecodeError> {
        let mut state = self.record(format!("set_source {uri}"));
        match state.media.get(uri).cloned() {
            None => Err(DecodeError::not_found(uri)),
            Some(Media::Unreadable) => Err(DecodeError::io(
                uri,
                io::Error::new(io::ErrorKind::PermissionDenied, "simulated read failure"),
            )),
            Some(Media::Playable { duration_ms }) => {
                state.source = Some(uri.to_string());
                state.duration_ms = duration_ms;
                Ok(())
            }
            Some(Media::Corrupt) => {
                state.source = Some(uri.to_string());
                state.duration_ms = None;
                Ok(())
            }
        }
    }

    fn prepare_async(&mut self, generation: u64) {
        let (event, sink) = {
            let mut state = self.record(format!("prepare {generation}"));
            state.generation = generation;
            state.prepared = false;
            state.position_ms = 0;

            let corrupt = state
                .source
                .as_ref()
                .and_then(|uri| state.media.get(uri))
                .is_some_and(|media| matches!(media, Media::Corrupt));

            let event = if corrupt {
                let uri = state.source.clone().unwrap_or_default();
                Some(BackendEvent::error(
                    generation,
                    DecodeError::codec(format!("unsupported stream in {uri}")),
                ))
            } else if state.auto_prepare {
                state.prepared = true;
                Some(BackendEvent::prepared(generation))
            } else {
                None
            };
            (event, state.sink.clone())
        };

        if let Some(event) = event {
            sink.emit(event);
        }
    }

    fn start(&mut self) {
        let mut state = self.record("start");
        if state.duration_ms.is_some_and(|d| state.position_ms >= d) {
            state.position_ms = 0;
        }
        state.playing = true;
        state.resumed_at = Some(Instant::now());
        Self::schedule_completion(&self.state, &mut state);
    }

    fn pause(&mut self) {
        let mut state = self.record("pause");
        state.freeze();
        state.playing = false;
    }

    fn stop(&mut self) {
        let mut state = self.record("stop");
        state.freeze();
        state.playing = false;
        state.prepared = false;
    }

    fn seek_to(&mut self, position_ms: u64) {
        let mut state = self.record(format!("seek {position_ms}"));
        state.freeze();
        state.position_ms = match state.duration_ms {
            Some(duration) => position_ms.min(duration),
            None => position_ms,
        };
        if state.playing {
            state.resumed_at = Some(Instant::now());
            Self::schedule_completion(&self.state, &mut state);
        }
    }

    fn set_volume(&mut self, volume: f32) {
        lock(&self.state).volume = volume;
    }

    fn position_ms(&self) -> u64 {
        lock(&self.state).position()
    }

    fn duration_ms(&self) -> Option<u64> {
        lock(&self.state).duration_ms
    }

    fn reset(&mut self) {
        let mut state = self.record("reset");
        state.freeze();
        state.source = None;
        state.duration_ms = None;
        state.prepared = false;
        state.playing = false;
        state.position_ms = 0;
    }

    fn release(&mut self) {
        let mut state = self.record("release");
        state.freeze();
        state.playing = false;
        state.prepared = false;
        state.sink = BackendEventSink::noop();
        debug!("Simulated backend released");
    }

    fn audio_session_id(&self) -> i32 {
        self.session_id
    }
}

impl SimulatedBackendHandle {
    // ===== Media registry =====

    /// Make `uri` playable with a known duration
    pub fn register(&self, uri: impl Into<String>, duration_ms: u64) {
        lock(&self.state).media.insert(
            uri.into(),
            Media::Playable {
                duration_ms: Some(duration_ms),
            },
        );
    }

    /// Make `uri` playable without ever reporting a duration
    pub fn register_unknown_duration(&self, uri: impl Into<String>) {
        lock(&self.state)
            .media
            .insert(uri.into(), Media::Playable { duration_ms: None });
    }

    /// `uri` opens but fails while preparing
    pub fn register_corrupt(&self, uri: impl Into<String>) {
        lock(&self.state).media.insert(uri.into(), Media::Corrupt);
    }

    /// `uri` exists but cannot be read
    pub fn register_unreadable(&self, uri: impl Into<String>) {
        lock(&self.state).media.insert(uri.into(), Media::Unreadable);
    }

    /// Register every track's location with its duration
    pub fn register_tracks<'a>(&self, tracks: impl IntoIterator<Item = &'a Track>) {
        for track in tracks {
            self.register(track.location.clone(), track.duration_ms);
        }
    }

    /// Forget a source; the next `set_source` for it fails as not found
    pub fn remove(&self, uri: &str) {
        lock(&self.state).media.remove(uri);
    }

    // ===== Driving events =====

    /// When off, `prepare_async` waits for `finish_prepare`
    pub fn set_auto_prepare(&self, enabled: bool) {
        lock(&self.state).auto_prepare = enabled;
    }

    /// Report the pending preparation as done
    pub fn finish_prepare(&self) {
        let (generation, sink) = {
            let mut state = lock(&self.state);
            state.prepared = true;
            (state.generation, state.sink.clone())
        };
        sink.emit(BackendEvent::prepared(generation));
    }

    /// Move the playhead without a seek call
    pub fn set_position(&self, position_ms: u64) {
        let mut state = lock(&self.state);
        state.position_ms = position_ms;
        if state.resumed_at.is_some() {
            state.resumed_at = Some(Instant::now());
        }
    }

    /// Play to the end of the current source
    pub fn complete(&self) {
        self.emit_for_current(|state| {
            state.freeze();
            if let Some(duration) = state.duration_ms {
                state.position_ms = duration;
            }
            state.playing = false;
            BackendEvent::completed(state.generation)
        });
    }

    /// Fail the current source
    pub fn fail(&self, error: DecodeError) {
        self.emit_for_current(move |state| {
            state.freeze();
            state.playing = false;
            BackendEvent::error(state.generation, error)
        });
    }

    /// Emit an event stamped with an arbitrary generation
    pub fn emit(&self, event: BackendEvent) {
        let sink = lock(&self.state).sink.clone();
        sink.emit(event);
    }

    fn emit_for_current(&self, f: impl FnOnce(&mut SimState) -> BackendEvent) {
        let (event, sink) = {
            let mut state = lock(&self.state);
            let event = f(&mut state);
            (event, state.sink.clone())
        };
        sink.emit(event);
    }

    // ===== Inspection =====

    pub fn position(&self) -> u64 {
        lock(&self.state).position()
    }

    pub fn is_playing(&self) -> bool {
        lock(&self.state).playing
    }

    pub fn volume(&self) -> f32 {
        lock(&self.state).volume
    }

    pub fn source(&self) -> Option<String> {
        lock(&self.state).source.clone()
    }

    pub fn generation(&self) -> u64 {
        lock(&self.state).generation
    }

    /// Backend calls in order, e.g. `"start"` or `"seek 1000"`
    pub fn calls(&self) -> Vec<String> {
        lock(&self.state).calls.clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }
}
