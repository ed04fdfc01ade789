//! Integration tests for the playback orchestrator
//!
//! Drives `PlaybackOrchestrator` against the simulated backend in manual
//! mode, so every position and completion is explicit.

use cadence_core::{FileStore, Library, MemorySnapshotStore, Track, TrackId};
use cadence_playback::{
    BackendEventSink, Listeners, PlayCountLedger, PlaybackConfig, PlaybackOrchestrator, PlayerSnapshot,
    PlayerState, PlayerStateMachine, RepeatMode, SimulatedBackend, SimulatedBackendHandle,
    SimulationMode, Subscription,
};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

const NOW_MS: i64 = 1_700_000_000_000;

// ===== Helpers =====

fn create_test_track(id: i64) -> Track {
    Track::new(id, format!("Track {}", id), format!("/music/{}.flac", id))
        .with_album("Test Artist", "Test Album")
        .with_duration_ms(100_000)
}

struct Fixture {
    orchestrator: PlaybackOrchestrator,
    sim: SimulatedBackendHandle,
    tracks: Vec<Track>,
    snapshots: MemorySnapshotStore,
}

fn fixture_with(count: i64, snapshots: MemorySnapshotStore, config: PlaybackConfig) -> Fixture {
    let tracks: Vec<Track> = (1..=count).map(create_test_track).collect();
    let (backend, sim) = SimulatedBackend::new(SimulationMode::Manual);
    sim.register_tracks(&tracks);

    let library = Arc::new(Library::from_tracks(tracks.clone()));
    let orchestrator = PlaybackOrchestrator::builder(backend, library)
        .config(config)
        .snapshot_store(snapshots.clone())
        .shuffle_seed(42)
        .wall_clock(Arc::new(|| NOW_MS))
        .build();

    Fixture {
        orchestrator,
        sim,
        tracks,
        snapshots,
    }
}

fn fixture(count: i64) -> Fixture {
    fixture_with(count, MemorySnapshotStore::new(), PlaybackConfig::default())
}

/// Queue all tracks from `index` and start playing
fn playing(count: i64, index: usize) -> Fixture {
    let mut f = fixture(count);
    f.orchestrator.set_queue(f.tracks.clone(), index).unwrap();
    f.orchestrator.play();
    f.orchestrator.process_pending();
    assert_eq!(f.orchestrator.state(), PlayerState::Started);
    f
}

type Collected = (Arc<Mutex<Vec<String>>>, Subscription);

fn collect(listeners: &Listeners<String>) -> Collected {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let subscription = listeners.subscribe(move |message: &String| {
        sink.lock().unwrap().push(message.clone());
    });
    (seen, subscription)
}

// ===== State machine =====

#[test]
fn seek_in_idle_is_a_no_op() {
    let (backend, sim) = SimulatedBackend::new(SimulationMode::Manual);
    let mut player = PlayerStateMachine::new(Box::new(backend), BackendEventSink::noop());

    player.seek_to(5_000);

    assert_eq!(player.state(), PlayerState::Idle);
    assert_eq!(player.position(), 0);
    assert!(sim.calls().iter().all(|call| !call.starts_with("seek")));
}

// ===== Play counting =====

#[test]
fn skip_classifies_outgoing_track() {
    let cases = [
        (30_000, 1, 0), // past the play threshold
        (10_000, 0, 1), // under the skip threshold
        (60_000, 1, 0), // past half the duration
        (22_000, 0, 0), // between thresholds
    ];

    for (position, plays, skips) in cases {
        let mut f = playing(3, 0);
        f.sim.set_position(position);

        f.orchestrator.skip();
        f.orchestrator.process_pending();

        let first = TrackId::new(1);
        assert_eq!(f.orchestrator.ledger().play_count(first), plays, "position {position}");
        assert_eq!(f.orchestrator.ledger().skip_count(first), skips, "position {position}");
        assert_eq!(f.orchestrator.queue().index(), 1);
    }
}

#[test]
fn play_counts_persist_in_file_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("playcount.json");

    {
        let tracks = vec![create_test_track(1), create_test_track(2)];
        let (backend, sim) = SimulatedBackend::new(SimulationMode::Manual);
        sim.register_tracks(&tracks);
        let mut orchestrator =
            PlaybackOrchestrator::builder(backend, Arc::new(Library::from_tracks(tracks.clone())))
                .ledger_store(FileStore::open(&path).unwrap())
                .build();

        orchestrator.set_queue(tracks, 0).unwrap();
        orchestrator.play();
        orchestrator.process_pending();
        sim.complete();
        orchestrator.process_pending();
    }

    let ledger = PlayCountLedger::new(Box::new(FileStore::open(&path).unwrap()));
    assert_eq!(ledger.play_count(TrackId::new(1)), 1);
    assert_eq!(ledger.play_count(TrackId::new(2)), 0);
    assert!(ledger.last_played(TrackId::new(1)) > 0);
}

// ===== Repeat =====

#[test]
fn multi_repeat_downgrades_all_to_none() {
    let mut f = playing(1, 0);
    f.orchestrator.set_repeat_mode(RepeatMode::All);
    f.orchestrator.set_multi_repeat(3);
    assert_eq!(f.orchestrator.repeat_mode(), RepeatMode::One);

    for _ in 0..3 {
        f.sim.complete();
        f.orchestrator.process_pending();
    }

    assert_eq!(f.orchestrator.repeat_mode(), RepeatMode::None);
    assert_eq!(f.orchestrator.ledger().play_count(TrackId::new(1)), 3);
    assert_eq!(f.orchestrator.state(), PlayerState::Completed);
}

#[test]
fn multi_repeat_restores_one() {
    let mut f = playing(2, 0);
    f.orchestrator.set_repeat_mode(RepeatMode::One);
    f.orchestrator.set_multi_repeat(2);

    f.sim.complete();
    f.orchestrator.process_pending();

    assert_eq!(f.orchestrator.repeat_mode(), RepeatMode::One);
    assert_eq!(f.orchestrator.queue().index(), 0);
    assert_eq!(f.orchestrator.state(), PlayerState::Started);
}

#[test]
fn skip_clears_multi_repeat() {
    let mut f = playing(3, 0);
    f.orchestrator.set_multi_repeat(4);

    f.orchestrator.skip();
    f.orchestrator.process_pending();

    assert_eq!(f.orchestrator.multi_repeat(), 0);
    assert_eq!(f.orchestrator.repeat_mode(), RepeatMode::None);
    assert_eq!(f.orchestrator.queue().index(), 1);
}

#[test]
fn repeat_one_restarts_on_completion() {
    let mut f = playing(2, 0);
    f.orchestrator.set_repeat_mode(RepeatMode::One);

    f.sim.complete();
    f.orchestrator.process_pending();

    assert_eq!(f.orchestrator.queue().index(), 0);
    assert_eq!(f.orchestrator.state(), PlayerState::Started);
    assert_eq!(f.sim.position(), 0);
}

// ===== Snapshots =====

#[test]
fn snapshot_round_trips_through_fresh_orchestrator() {
    let store = MemorySnapshotStore::new();
    let mut first = fixture_with(5, store.clone(), PlaybackConfig::default());
    first.orchestrator.set_queue(first.tracks.clone(), 0).unwrap();
    first.orchestrator.set_shuffle(true);
    first.orchestrator.change_song(2).unwrap();
    first.orchestrator.process_pending();
    first.orchestrator.pause();
    first.orchestrator.seek_to(45_000);
    first.orchestrator.save_state().unwrap();
    let saved = first.orchestrator.snapshot();

    let contents = store.contents().unwrap();
    assert!(contents.starts_with("45000 2 5 "), "unexpected snapshot {contents}");

    let mut second = fixture_with(5, store, PlaybackConfig::default());
    second.orchestrator.load_state().unwrap();
    second.orchestrator.process_pending();

    assert_eq!(second.orchestrator.snapshot(), saved);
    assert!(second.orchestrator.is_shuffled());
    assert_eq!(second.orchestrator.state(), PlayerState::Prepared);
    assert_eq!(second.sim.position(), 45_000);
    assert_eq!(
        second.orchestrator.now_playing().map(|t| t.id),
        first.orchestrator.now_playing().map(|t| t.id)
    );
}

#[test]
fn deletion_while_shuffled_survives_save_and_load() {
    let store = MemorySnapshotStore::new();
    let mut first = fixture_with(5, store.clone(), PlaybackConfig::default());
    first.orchestrator.set_queue(first.tracks.clone(), 0).unwrap();
    first.orchestrator.set_shuffle(true);
    first.orchestrator.process_pending();

    let edited: Vec<Track> = first
        .orchestrator
        .queue()
        .shuffled()
        .iter()
        .filter(|t| t.id != TrackId::new(3))
        .cloned()
        .collect();
    first.orchestrator.edit_queue(edited, 0).unwrap();
    first.orchestrator.save_state().unwrap();

    let contents = store.contents().unwrap();
    assert!(contents.starts_with("0 0 4 "), "unexpected snapshot {contents}");

    let mut second = fixture_with(5, store, PlaybackConfig::default());
    second.orchestrator.load_state().unwrap();
    second.orchestrator.process_pending();

    assert_eq!(second.orchestrator.queue().len(), 4);
    assert!(second.orchestrator.is_shuffled());
    assert_eq!(
        second.orchestrator.now_playing().map(|t| t.id),
        first.orchestrator.now_playing().map(|t| t.id)
    );

    second.orchestrator.set_shuffle(false);
    let linear: Vec<i64> = second.orchestrator.queue().linear().iter().map(|t| t.id.get()).collect();
    assert_eq!(linear, vec![1, 2, 4, 5]);
}

#[test]
fn snapshot_without_shuffled_block_restores_linear() {
    let store = MemorySnapshotStore::with_contents("1500 1 3 3 1 2");
    let mut f = fixture_with(3, store, PlaybackConfig::default());

    f.orchestrator.load_state().unwrap();
    f.orchestrator.process_pending();

    assert!(!f.orchestrator.is_shuffled());
    assert_eq!(f.orchestrator.now_playing().map(|t| t.id), Some(TrackId::new(1)));
    assert_eq!(f.orchestrator.position(), 1_500);
    assert!(!f.orchestrator.is_playing());
}

#[test]
fn unusable_snapshots_degrade_to_empty_queue() {
    for contents in ["not a snapshot", "0 0 2 1 999", "0 5 2 1 2"] {
        let mut f = fixture_with(
            3,
            MemorySnapshotStore::with_contents(contents),
            PlaybackConfig::default(),
        );
        f.orchestrator.set_queue(f.tracks.clone(), 0).unwrap();
        let (errors, _subscription) = collect(&f.orchestrator.events().error);

        f.orchestrator.load_state().unwrap();

        assert!(f.orchestrator.queue().is_empty(), "contents {contents:?}");
        assert!(f.orchestrator.now_playing().is_none());
        assert!(errors.lock().unwrap().is_empty());
    }
}

#[test]
fn missing_snapshot_leaves_queue_alone() {
    let mut f = fixture(2);
    f.orchestrator.set_queue(f.tracks.clone(), 1).unwrap();

    f.orchestrator.load_state().unwrap();

    assert_eq!(f.orchestrator.queue().len(), 2);
    assert_eq!(f.orchestrator.queue().index(), 1);
    assert!(f.snapshots.contents().is_none());
}

#[test]
fn in_process_restore_keeps_playing() {
    let mut f = fixture(3);
    let snapshot = PlayerSnapshot {
        is_playing: true,
        active_index: 2,
        queue: vec![TrackId::new(1), TrackId::new(2), TrackId::new(3)],
        shuffled_queue: None,
        seek_position_ms: 0,
    };

    f.orchestrator.restore_snapshot(snapshot).unwrap();
    f.orchestrator.process_pending();

    assert_eq!(f.orchestrator.state(), PlayerState::Started);
    assert_eq!(f.orchestrator.now_playing().map(|t| t.id), Some(TrackId::new(3)));
}

// ===== Timers =====

#[test]
fn cancelled_sleep_timer_never_pauses() {
    let mut f = playing(1, 0);
    let (info, _subscription) = collect(&f.orchestrator.events().info);

    f.orchestrator.set_sleep_timer(NOW_MS + 50);
    assert_eq!(f.orchestrator.sleep_timer_end(), Some(NOW_MS + 50));
    f.orchestrator.set_sleep_timer(0);
    assert_eq!(f.orchestrator.sleep_timer_end(), None);

    thread::sleep(Duration::from_millis(200));
    f.orchestrator.process_pending();

    assert!(f.orchestrator.is_playing());
    assert!(info.lock().unwrap().is_empty());
}

#[test]
fn sleep_timer_pauses_when_it_fires() {
    let mut f = playing(1, 0);
    let (info, _subscription) = collect(&f.orchestrator.events().info);
    let signals = f.orchestrator.signals();

    f.orchestrator.set_sleep_timer(NOW_MS + 20);
    let signal = signals.recv_timeout(Duration::from_secs(2)).unwrap();
    f.orchestrator.handle_signal(signal);

    assert!(!f.orchestrator.is_playing());
    assert_eq!(f.orchestrator.state(), PlayerState::Paused);
    assert_eq!(f.orchestrator.sleep_timer_end(), None);
    assert_eq!(info.lock().unwrap().len(), 1);
}

#[test]
fn double_click_skips() {
    let config = PlaybackConfig {
        multi_click_window_ms: 20,
        ..PlaybackConfig::default()
    };
    let mut f = fixture_with(3, MemorySnapshotStore::new(), config);
    f.orchestrator.set_queue(f.tracks.clone(), 0).unwrap();
    f.orchestrator.process_pending();

    f.orchestrator.on_media_button_click();
    f.orchestrator.on_media_button_click();
    thread::sleep(Duration::from_millis(150));
    f.orchestrator.process_pending();

    assert_eq!(f.orchestrator.queue().index(), 1);
    assert_eq!(f.orchestrator.state(), PlayerState::Started);
}

#[test]
fn position_updates_flow_while_playing() {
    let mut f = fixture(1);
    let updates = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&updates);
    let _subscription = f
        .orchestrator
        .events()
        .position
        .subscribe(move |update| sink.lock().unwrap().push(*update));
    let signals = f.orchestrator.signals();

    f.orchestrator.set_queue(f.tracks.clone(), 0).unwrap();
    f.orchestrator.play();
    f.orchestrator.process_pending();
    f.sim.set_position(3_000);

    let signal = signals.recv_timeout(Duration::from_secs(2)).unwrap();
    f.orchestrator.handle_signal(signal);

    let updates = updates.lock().unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].position_ms, 3_000);
    assert_eq!(updates[0].duration_ms, Some(100_000));
}

// ===== Errors =====

#[test]
fn corrupt_track_reports_and_waits_for_retry() {
    let mut f = fixture(2);
    f.sim.register_corrupt("/music/1.flac");
    let (errors, _subscription) = collect(&f.orchestrator.events().error);

    f.orchestrator.set_queue(f.tracks.clone(), 0).unwrap();
    f.orchestrator.play();
    f.orchestrator.process_pending();

    assert_eq!(f.orchestrator.state(), PlayerState::Idle);
    assert_eq!(f.orchestrator.queue().index(), 0);
    assert_eq!(errors.lock().unwrap().as_slice(), ["Couldn't play Track 1"]);
}

#[test]
fn skipping_a_failed_track_records_nothing() {
    let mut f = fixture(3);
    f.sim.remove("/music/1.flac");
    f.orchestrator.set_queue(f.tracks.clone(), 0).unwrap();
    f.orchestrator.play();
    f.orchestrator.process_pending();
    assert_eq!(f.orchestrator.state(), PlayerState::Idle);

    f.orchestrator.skip();
    f.orchestrator.process_pending();

    let broken = TrackId::new(1);
    assert_eq!(f.orchestrator.ledger().skip_count(broken), 0);
    assert_eq!(f.orchestrator.ledger().play_count(broken), 0);
    assert_eq!(f.orchestrator.queue().index(), 1);
    assert_eq!(f.orchestrator.state(), PlayerState::Started);

    // A healthy track left early still counts as skipped
    f.orchestrator.skip();
    f.orchestrator.process_pending();
    assert_eq!(f.orchestrator.ledger().skip_count(TrackId::new(2)), 1);
}

#[test]
fn going_back_from_a_failed_track_records_nothing() {
    let mut f = fixture(3);
    f.sim.register_corrupt("/music/2.flac");
    f.orchestrator.set_queue(f.tracks.clone(), 1).unwrap();
    f.orchestrator.play();
    f.orchestrator.process_pending();
    assert_eq!(f.orchestrator.state(), PlayerState::Idle);

    f.orchestrator.skip_previous();
    f.orchestrator.process_pending();

    assert_eq!(f.orchestrator.ledger().skip_count(TrackId::new(2)), 0);
    assert_eq!(f.orchestrator.queue().index(), 0);
    assert_eq!(f.orchestrator.now_playing().map(|t| t.id), Some(TrackId::new(1)));
}

#[test]
fn edit_queue_keeps_position_of_unchanged_track() {
    let mut f = playing(3, 1);
    f.sim.set_position(12_000);
    let reordered = vec![f.tracks[1].clone(), f.tracks[2].clone(), f.tracks[0].clone()];

    f.orchestrator.edit_queue(reordered, 0).unwrap();
    f.orchestrator.process_pending();

    assert_eq!(f.orchestrator.now_playing().map(|t| t.id), Some(TrackId::new(2)));
    assert_eq!(f.sim.position(), 12_000);
    assert!(f.orchestrator.is_playing());
}
