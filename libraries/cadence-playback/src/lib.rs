//! Cadence Playback - Playback Orchestration
//!
//! Drives a queue of tracks through a single media decoder.
//!
//! This crate provides:
//! - A capability-gated player state machine over any decoder backend
//! - A queue with linear and shuffled projections
//! - Repeat modes (None, All, One) and counted multi-repeat
//! - A per-track play/skip ledger
//! - A persisted queue snapshot in a compact text format
//! - Audio focus, sleep timer and remote-control handling
//! - A single-consumer command service with a cloneable handle
//!
//! # Architecture
//!
//! `cadence-playback` never decodes audio itself. Decoding sits behind
//! [`MediaDecoderBackend`]; tracks come from a `TrackRepository`; counters
//! and snapshots go to `KeyValueStore` and `SnapshotStore` implementations
//! from `cadence-core`. [`SimulatedBackend`] stands in for a real decoder.
//!
//! # Example
//!
//! ```rust
//! use cadence_core::{Library, Track, TrackId};
//! use cadence_playback::{PlaybackOrchestrator, PlayerState, SimulatedBackend, SimulationMode};
//! use std::sync::Arc;
//!
//! let tracks = vec![
//!     Track::new(TrackId::new(1), "Intro", "/music/01.flac").with_duration_ms(90_000),
//!     Track::new(TrackId::new(2), "Outro", "/music/02.flac").with_duration_ms(120_000),
//! ];
//!
//! let (backend, sim) = SimulatedBackend::new(SimulationMode::Manual);
//! sim.register_tracks(&tracks);
//!
//! let library = Arc::new(Library::from_tracks(tracks.clone()));
//! let mut player = PlaybackOrchestrator::builder(backend, library).build();
//!
//! player.set_queue(tracks, 0).unwrap();
//! player.play();
//! player.process_pending();
//! assert_eq!(player.state(), PlayerState::Started);
//!
//! sim.complete();
//! player.process_pending();
//! assert_eq!(player.now_playing().unwrap().id, TrackId::new(2));
//! assert_eq!(player.ledger().play_count(TrackId::new(1)), 1);
//! ```

#![forbid(unsafe_code)]

pub mod backend;
pub mod error;
pub mod events;
pub mod focus;
pub mod ledger;
pub mod orchestrator;
pub mod player;
pub mod queue;
pub mod remote;
pub mod service;
pub mod shuffle;
pub mod sim;
pub mod snapshot;
pub mod state;
pub mod timer;
pub mod types;

pub use backend::{BackendEvent, BackendEventKind, BackendEventSink, MediaDecoderBackend};
pub use error::{DecodeError, PlaybackError, Result};
pub use events::{EventBus, Listeners, NowPlaying, PositionUpdate, Subscription};
pub use focus::{AlwaysGranted, AudioFocus};
pub use ledger::{PlayCountLedger, PlayCountRecord, PlayOutcome};
pub use orchestrator::{OrchestratorBuilder, PlaybackOrchestrator, Signal, WallClock};
pub use player::{PlayerEvent, PlayerStateMachine};
pub use queue::QueueEngine;
pub use remote::RemoteAction;
pub use service::{PlaybackCommand, PlaybackHandle, PlaybackService};
pub use sim::{SimulatedBackend, SimulatedBackendHandle, SimulationMode};
pub use snapshot::PlayerSnapshot;
pub use state::{Capabilities, PlayerState};
pub use types::{FocusChange, PlaybackConfig, RepeatMode};
