//! Integration tests for the playback service thread

use cadence_core::{Library, Track, TrackId};
use cadence_playback::{
    PlaybackCommand, PlaybackError, PlaybackHandle, PlaybackOrchestrator, PlaybackService, PlayerState,
    SimulatedBackend, SimulatedBackendHandle, SimulationMode,
};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

fn create_test_track(id: i64) -> Track {
    Track::new(id, format!("Track {}", id), format!("/music/{}.flac", id))
        .with_duration_ms(100_000)
}

fn spawn(count: i64, mode: SimulationMode) -> (PlaybackService, SimulatedBackendHandle, Vec<Track>) {
    let tracks: Vec<Track> = (1..=count).map(create_test_track).collect();
    let (backend, sim) = SimulatedBackend::new(mode);
    sim.register_tracks(&tracks);

    let library = Arc::new(Library::from_tracks(tracks.clone()));
    let orchestrator = PlaybackOrchestrator::builder(backend, library).build();
    let service = PlaybackService::spawn(orchestrator).unwrap();
    (service, sim, tracks)
}

/// Poll until the player reaches `state`
fn wait_for_state(handle: &PlaybackHandle, state: PlayerState) {
    for _ in 0..200 {
        if handle.now_playing().unwrap().state == state {
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("player never reached {state}");
}

#[test]
fn commands_apply_in_order() {
    let (service, _sim, tracks) = spawn(3, SimulationMode::Manual);
    let handle = service.handle();

    handle.set_queue(tracks, 1).unwrap();
    handle.play().unwrap();
    let snapshot = handle.snapshot().unwrap();

    assert!(snapshot.is_playing);
    assert_eq!(snapshot.active_index, 1);
    assert_eq!(snapshot.queue, vec![TrackId::new(1), TrackId::new(2), TrackId::new(3)]);
    assert_eq!(snapshot.shuffled_queue, None);
}

#[test]
fn failing_command_is_reported_and_loop_continues() {
    let (service, _sim, tracks) = spawn(2, SimulationMode::Manual);
    let handle = service.handle();

    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    let _subscription = handle.subscribe_errors(move |message| {
        sink.lock().unwrap().push(message.clone());
    });

    handle.set_queue(tracks, 0).unwrap();
    handle.send(PlaybackCommand::ChangeSong(9)).unwrap();
    let now_playing = handle.now_playing().unwrap();

    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("out of bounds"), "unexpected error {}", errors[0]);
    assert_eq!(now_playing.queue_index, 0);
    assert_eq!(now_playing.queue_len, 2);
}

#[test]
fn play_counts_are_queryable() {
    let (service, sim, tracks) = spawn(2, SimulationMode::Manual);
    let handle = service.handle();

    handle.set_queue(tracks, 0).unwrap();
    handle.play().unwrap();
    wait_for_state(&handle, PlayerState::Started);
    sim.set_position(40_000);
    handle.skip().unwrap();

    let record = handle.play_count(TrackId::new(1)).unwrap();
    assert_eq!(record.play_count, 1);
    assert_eq!(record.skip_count, 0);
}

#[test]
fn realtime_playback_advances_on_its_own() {
    let tracks = vec![
        create_test_track(1).with_duration_ms(40),
        create_test_track(2).with_duration_ms(60_000),
    ];
    let (backend, sim) = SimulatedBackend::new(SimulationMode::Realtime);
    sim.register_tracks(&tracks);
    let library = Arc::new(Library::from_tracks(tracks.clone()));
    let orchestrator = PlaybackOrchestrator::builder(backend, library).build();
    let service = PlaybackService::spawn(orchestrator).unwrap();
    let handle = service.handle();

    let (tx, rx) = crossbeam_channel::unbounded();
    let _subscription = handle.subscribe_now_playing(move |info| {
        if info.state == PlayerState::Started {
            let _ = tx.send(info.track.as_ref().map(|t| t.id));
        }
    });

    handle.set_queue(tracks, 0).unwrap();
    handle.play().unwrap();

    let deadline = Duration::from_secs(3);
    let mut seen = Vec::new();
    while let Ok(id) = rx.recv_timeout(deadline) {
        seen.push(id);
        if id == Some(TrackId::new(2)) {
            break;
        }
    }
    assert_eq!(seen.last(), Some(&Some(TrackId::new(2))));
    assert_eq!(handle.play_count(TrackId::new(1)).unwrap().play_count, 1);
}

#[test]
fn handle_fails_after_shutdown() {
    let (service, _sim, _tracks) = spawn(1, SimulationMode::Manual);
    let handle = service.handle();

    service.shutdown();

    assert!(matches!(handle.play(), Err(PlaybackError::ServiceStopped)));
    assert!(matches!(handle.snapshot(), Err(PlaybackError::ServiceStopped)));
}
