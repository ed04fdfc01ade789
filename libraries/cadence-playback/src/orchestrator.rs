//! Playback orchestration
//!
//! `PlaybackOrchestrator` ties the queue, the player state machine, the
//! play-count ledger and the persisted snapshot together. It is a plain
//! single-threaded object: every mutation goes through `&mut self`, and
//! anything asynchronous (backend events, timers) arrives as a [`Signal`]
//! in its inbox. Hosts either drain the inbox themselves with
//! [`PlaybackOrchestrator::process_pending`] or hand the orchestrator to
//! [`crate::PlaybackService`], which selects over commands and signals.

use crate::backend::{BackendEvent, BackendEventSink, MediaDecoderBackend};
use crate::error::{DecodeError, Result};
use crate::events::{EventBus, NowPlaying, PositionUpdate};
use crate::focus::{AlwaysGranted, AudioFocus};
use crate::ledger::{self, PlayCountLedger, PlayOutcome};
use crate::player::{PlayerEvent, PlayerStateMachine};
use crate::queue::QueueEngine;
use crate::remote::{ClickCounter, RemoteAction};
use crate::snapshot::PlayerSnapshot;
use crate::state::PlayerState;
use crate::timer::{OneShot, Ticker};
use crate::types::{FocusChange, PlaybackConfig, RepeatMode};
use cadence_core::{KeyValueStore, MemorySnapshotStore, MemoryStore, SnapshotStore, Track, TrackId, TrackRepository};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Wall clock in epoch milliseconds, used for sleep timer deadlines
pub type WallClock = Arc<dyn Fn() -> i64 + Send + Sync>;

fn system_wall_clock() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Asynchronous input to the orchestrator
#[derive(Debug, Clone)]
pub enum Signal {
    /// Event from the decoder backend
    Backend(BackendEvent),
    /// Sleep timer deadline reached
    SleepTimerElapsed { token: u64 },
    /// Media-button click window closed
    ClickWindowElapsed { token: u64 },
    /// Position report due
    PositionTick,
}

/// Builder for [`PlaybackOrchestrator`]
pub struct OrchestratorBuilder {
    backend: Box<dyn MediaDecoderBackend>,
    repository: Arc<dyn TrackRepository>,
    config: PlaybackConfig,
    ledger_store: Box<dyn KeyValueStore>,
    snapshot_store: Box<dyn SnapshotStore>,
    focus: Box<dyn AudioFocus>,
    events: EventBus,
    shuffle_seed: Option<u64>,
    wall_clock: WallClock,
    ledger_clock: Option<ledger::Clock>,
}

impl OrchestratorBuilder {
    pub fn config(mut self, config: PlaybackConfig) -> Self {
        self.config = config;
        self
    }

    /// Store backing the play-count ledger (in memory by default)
    pub fn ledger_store(mut self, store: impl KeyValueStore + 'static) -> Self {
        self.ledger_store = Box::new(store);
        self
    }

    /// Store for the persisted queue snapshot (in memory by default)
    pub fn snapshot_store(mut self, store: impl SnapshotStore + 'static) -> Self {
        self.snapshot_store = Box::new(store);
        self
    }

    pub fn focus(mut self, focus: impl AudioFocus + 'static) -> Self {
        self.focus = Box::new(focus);
        self
    }

    /// Share an existing event bus instead of creating one
    pub fn events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Deterministic shuffles
    pub fn shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    pub fn wall_clock(mut self, clock: WallClock) -> Self {
        self.wall_clock = clock;
        self
    }

    pub fn ledger_clock(mut self, clock: ledger::Clock) -> Self {
        self.ledger_clock = Some(clock);
        self
    }

    pub fn build(self) -> PlaybackOrchestrator {
        let (signal_tx, signal_rx) = unbounded();

        let backend_tx = signal_tx.clone();
        let sink = BackendEventSink::new(move |event| {
            // Receiver lives as long as the orchestrator
            let _ = backend_tx.send(Signal::Backend(event));
        });

        let queue = match self.shuffle_seed {
            Some(seed) => QueueEngine::with_seed(self.config.shuffle, seed),
            None => QueueEngine::new(self.config.shuffle),
        };
        let ledger = match self.ledger_clock {
            Some(clock) => PlayCountLedger::with_clock(self.ledger_store, clock),
            None => PlayCountLedger::new(self.ledger_store),
        };

        PlaybackOrchestrator {
            player: PlayerStateMachine::new(self.backend, sink),
            queue,
            ledger,
            snapshots: self.snapshot_store,
            repository: self.repository,
            focus: self.focus,
            events: self.events,
            signal_tx,
            signal_rx,
            repeat: self.config.repeat,
            multi_repeat: 0,
            repeat_before_multi: None,
            focused: false,
            resume_on_focus_gain: false,
            volume: 1.0,
            play_when_prepared: false,
            pending_seek: None,
            current_failed: false,
            artwork_key: None,
            sleep_timer: None,
            sleep_timer_end: None,
            sleep_token: 0,
            clicks: ClickCounter::new(self.config.multi_click_window()),
            ticker: Ticker::new(),
            wall_clock: self.wall_clock,
            released: false,
            config: self.config,
        }
    }
}

/// Drives playback of a queue through one decoder backend
pub struct PlaybackOrchestrator {
    config: PlaybackConfig,
    player: PlayerStateMachine,
    queue: QueueEngine,
    ledger: PlayCountLedger,
    snapshots: Box<dyn SnapshotStore>,
    repository: Arc<dyn TrackRepository>,
    focus: Box<dyn AudioFocus>,
    events: EventBus,
    signal_tx: Sender<Signal>,
    signal_rx: Receiver<Signal>,

    repeat: RepeatMode,
    /// Remaining plays of the current track; 0 or 1 means inactive
    multi_repeat: u32,
    /// Repeat mode to fall back to when the multi-repeat runs out
    repeat_before_multi: Option<RepeatMode>,
    focused: bool,
    resume_on_focus_gain: bool,
    volume: f32,
    play_when_prepared: bool,
    /// Seek requested before the current source was prepared
    pending_seek: Option<u64>,
    /// The now-playing track failed to load; the player is back to Idle
    current_failed: bool,
    artwork_key: Option<String>,

    sleep_timer: Option<OneShot>,
    sleep_timer_end: Option<i64>,
    sleep_token: u64,
    clicks: ClickCounter,
    ticker: Ticker,
    wall_clock: WallClock,
    released: bool,
}

impl PlaybackOrchestrator {
    /// Start building an orchestrator around `backend`
    pub fn builder(
        backend: impl MediaDecoderBackend + 'static,
        repository: Arc<dyn TrackRepository>,
    ) -> OrchestratorBuilder {
        OrchestratorBuilder {
            backend: Box::new(backend),
            repository,
            config: PlaybackConfig::default(),
            ledger_store: Box::new(MemoryStore::new()),
            snapshot_store: Box::new(MemorySnapshotStore::new()),
            focus: Box::new(AlwaysGranted),
            events: EventBus::new(),
            shuffle_seed: None,
            wall_clock: Arc::new(system_wall_clock),
            ledger_clock: None,
        }
    }

    // ===== Queries =====

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn queue(&self) -> &QueueEngine {
        &self.queue
    }

    pub fn now_playing(&self) -> Option<&Track> {
        self.queue.now_playing()
    }

    pub fn state(&self) -> PlayerState {
        self.player.state()
    }

    /// Playing, or about to play once preparation finishes
    pub fn is_playing(&self) -> bool {
        self.player.is_playing()
            || (self.play_when_prepared && self.player.state() == PlayerState::Preparing)
    }

    /// Position in milliseconds; a deferred seek counts before preparation
    pub fn position(&self) -> u64 {
        match self.pending_seek {
            Some(seek) if !self.player.is_prepared() => seek,
            _ => self.player.position(),
        }
    }

    pub fn duration(&self) -> Option<u64> {
        self.player.duration()
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat
    }

    pub fn multi_repeat(&self) -> u32 {
        self.multi_repeat
    }

    pub fn is_shuffled(&self) -> bool {
        self.queue.is_shuffled()
    }

    pub fn has_focus(&self) -> bool {
        self.focused
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Sleep timer deadline in epoch milliseconds
    pub fn sleep_timer_end(&self) -> Option<i64> {
        self.sleep_timer_end
    }

    pub fn audio_session_id(&self) -> i32 {
        self.player.audio_session_id()
    }

    pub fn artwork_key(&self) -> Option<&str> {
        self.artwork_key.as_deref()
    }

    pub fn ledger(&self) -> &PlayCountLedger {
        &self.ledger
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Receiving end of the signal inbox, for hosts that select over it
    pub fn signals(&self) -> Receiver<Signal> {
        self.signal_rx.clone()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn now_playing_info(&self) -> NowPlaying {
        NowPlaying {
            track: self.queue.now_playing().cloned(),
            state: self.player.state(),
            is_playing: self.is_playing(),
            queue_index: self.queue.index(),
            queue_len: self.queue.len(),
            shuffle: self.queue.is_shuffled(),
            repeat: self.repeat,
            multi_repeat: self.multi_repeat,
            position_ms: self.position(),
            duration_ms: self.player.duration(),
            artwork_key: self.artwork_key.clone(),
        }
    }

    // ===== Playback control =====

    /// Start or resume the current track
    pub fn play(&mut self) {
        if self.released || self.queue.is_empty() {
            return;
        }
        if !self.request_focus() {
            debug!("Audio focus denied, not starting playback");
            return;
        }

        match self.player.state() {
            PlayerState::Prepared
            | PlayerState::Started
            | PlayerState::Paused
            | PlayerState::Completed => self.player.start(),
            PlayerState::Preparing => self.play_when_prepared = true,
            PlayerState::Initialized | PlayerState::Stopped => {
                self.play_when_prepared = true;
                self.player.prepare();
            }
            PlayerState::Idle | PlayerState::Error => self.load_current(true),
            PlayerState::Released => return,
        }

        self.refresh_ticker();
        self.notify_now_playing();
    }

    /// Pause and forget any pending resume
    pub fn pause(&mut self) {
        self.resume_on_focus_gain = false;
        self.pause_playback();
    }

    /// Pause; the backend stays prepared
    pub fn stop(&mut self) {
        self.pause();
    }

    pub fn toggle_play(&mut self) {
        if self.is_playing() {
            self.pause();
        } else if self.player.is_complete() {
            if self.queue.set_index(0).is_ok() {
                self.load_current(true);
            }
            self.notify_now_playing();
        } else {
            self.play();
        }
    }

    /// Move to the next track
    ///
    /// At the end of a non-repeating queue this pauses on the final frame
    /// instead of wrapping.
    pub fn skip(&mut self) {
        if self.released || self.queue.is_empty() {
            return;
        }
        if !self.player.is_complete() && !self.current_failed {
            self.log_outgoing();
        }
        self.apply_multi_repeat(0);

        if !self.queue.is_last() || self.repeat == RepeatMode::All {
            self.queue.advance();
            self.load_current(true);
        } else {
            self.pause_playback();
            if let Some(duration) = self.player.duration() {
                self.player.seek_to(duration);
            }
        }
        self.notify_now_playing();
    }

    /// Restart the current track, or move to the previous one near its start
    pub fn skip_previous(&mut self) {
        if self.released || self.queue.is_empty() {
            return;
        }

        let position = self.position();
        let restart = (self.queue.index() == 0 && self.repeat != RepeatMode::All)
            || position > self.config.restart_threshold_ms
            || self.player.duration().is_some_and(|d| position > d / 2);

        if restart {
            self.seek_to(0);
            self.play();
            return;
        }

        if !self.player.is_complete() && !self.current_failed {
            self.log_outgoing();
        }
        self.apply_multi_repeat(0);
        self.queue.retreat();
        self.load_current(true);
        self.notify_now_playing();
    }

    /// Seek within the current track
    ///
    /// Before preparation finishes the position is remembered and applied
    /// once the track is prepared.
    pub fn seek_to(&mut self, position_ms: u64) {
        let state = self.player.state();
        if state.capabilities().seek {
            self.player.seek_to(position_ms);
        } else if matches!(state, PlayerState::Initialized | PlayerState::Preparing) {
            self.pending_seek = Some(position_ms);
        } else {
            debug!(position_ms, %state, "Ignoring seek without a loaded track");
        }
    }

    /// Jump to an index of the active projection and play it
    pub fn change_song(&mut self, index: usize) -> Result<()> {
        self.queue.set_index(index)?;
        self.apply_multi_repeat(0);
        self.load_current(true);
        self.notify_now_playing();
        Ok(())
    }

    // ===== Queue =====

    /// Replace the queue and start from `index`
    ///
    /// Playback continues with the new track if it was active.
    pub fn set_queue(&mut self, tracks: Vec<Track>, index: usize) -> Result<()> {
        let previous = self.current_id();
        let was_playing = self.is_playing();

        self.queue.set_queue(tracks, index)?;

        if self.current_id() == previous && self.player.is_prepared() {
            self.seek_to(0);
        } else {
            self.load_current(was_playing);
        }
        self.notify_now_playing();
        Ok(())
    }

    /// Edit the queue in place, keeping the position when the current track
    /// is unchanged
    pub fn edit_queue(&mut self, tracks: Vec<Track>, index: usize) -> Result<()> {
        let previous = self.current_id();
        let was_playing = self.is_playing();

        self.queue.edit_queue(tracks, index)?;

        if self.current_id() != previous {
            self.load_current(was_playing);
        }
        self.notify_now_playing();
        Ok(())
    }

    /// Insert tracks right after the current one
    pub fn queue_next(&mut self, tracks: Vec<Track>) {
        let was_empty = self.queue.is_empty();
        self.queue.insert_next(tracks);
        self.after_insert(was_empty);
    }

    /// Append tracks to the end of the queue
    pub fn queue_last(&mut self, tracks: Vec<Track>) {
        let was_empty = self.queue.is_empty();
        self.queue.append_last(tracks);
        self.after_insert(was_empty);
    }

    fn after_insert(&mut self, was_empty: bool) {
        if was_empty && !self.queue.is_empty() {
            self.load_current(false);
        }
        self.notify_now_playing();
    }

    pub fn set_shuffle(&mut self, enabled: bool) {
        if enabled {
            self.queue.enable_shuffle();
        } else {
            self.queue.disable_shuffle();
        }
        info!(enabled, "Shuffle changed");
        self.notify_now_playing();
    }

    // ===== Repeat =====

    /// Set the repeat mode; an active multi-repeat is dropped
    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        if self.repeat_before_multi.take().is_some() {
            debug!("Explicit repeat mode cancels multi-repeat");
        }
        self.multi_repeat = 0;
        self.repeat = mode;
        self.notify_now_playing();
    }

    /// Play the current track `count` more times
    ///
    /// While active the repeat mode is One. When the counter runs out the
    /// previous mode comes back, except that All falls back to None.
    pub fn set_multi_repeat(&mut self, count: u32) {
        self.apply_multi_repeat(count);
        self.notify_now_playing();
    }

    fn apply_multi_repeat(&mut self, count: u32) {
        self.multi_repeat = count;
        if count > 1 {
            if self.repeat_before_multi.is_none() {
                self.repeat_before_multi = Some(self.repeat);
            }
            self.repeat = RepeatMode::One;
        } else if let Some(previous) = self.repeat_before_multi.take() {
            self.repeat = match previous {
                RepeatMode::All => RepeatMode::None,
                other => other,
            };
        }
    }

    // ===== Sleep timer =====

    /// Pause at `end_epoch_ms`; a deadline not in the future cancels
    pub fn set_sleep_timer(&mut self, end_epoch_ms: i64) {
        self.cancel_sleep_timer();

        let now = (self.wall_clock)();
        if end_epoch_ms <= now {
            info!("Sleep timer cancelled");
            return;
        }

        self.sleep_token += 1;
        let token = self.sleep_token;
        let inbox = self.signal_tx.clone();
        let delay = Duration::from_millis(u64::try_from(end_epoch_ms - now).unwrap_or(0));

        self.sleep_timer = Some(OneShot::schedule(delay, move || {
            let _ = inbox.send(Signal::SleepTimerElapsed { token });
        }));
        self.sleep_timer_end = Some(end_epoch_ms);
        info!(end_epoch_ms, "Sleep timer set");
    }

    fn cancel_sleep_timer(&mut self) {
        if let Some(mut timer) = self.sleep_timer.take() {
            timer.cancel();
        }
        self.sleep_timer_end = None;
        self.sleep_token += 1;
    }

    fn on_sleep_timer_elapsed(&mut self, token: u64) {
        if token != self.sleep_token || self.sleep_timer_end.is_none() {
            debug!(token, "Ignoring stale sleep timer");
            return;
        }
        self.sleep_timer = None;
        self.sleep_timer_end = None;

        self.pause();
        info!("Sleep timer ended");
        self.events.info.publish(&"Sleep timer ended, playback paused".to_string());
    }

    // ===== Focus and remote =====

    pub fn on_focus_change(&mut self, change: FocusChange) {
        debug!(?change, "Audio focus change");
        match change {
            FocusChange::Loss => {
                self.focused = false;
                self.pause();
            }
            FocusChange::LossTransient => {
                self.focused = false;
                self.resume_on_focus_gain = self.is_playing() || self.resume_on_focus_gain;
                self.pause_playback();
            }
            FocusChange::LossTransientCanDuck => self.apply_volume(self.config.duck_volume),
            FocusChange::Gain => {
                self.focused = true;
                self.apply_volume(1.0);
                if std::mem::take(&mut self.resume_on_focus_gain) {
                    self.play();
                }
            }
        }
    }

    /// Count a media-button click; the action runs when the window closes
    pub fn on_media_button_click(&mut self) {
        if self.released {
            return;
        }
        self.clicks.click(&self.signal_tx);
    }

    fn on_click_window_elapsed(&mut self, token: u64) {
        match self.clicks.window_elapsed(token) {
            Some(RemoteAction::TogglePlay) => self.toggle_play(),
            Some(RemoteAction::Skip) => self.skip(),
            Some(RemoteAction::SkipPrevious) => self.skip_previous(),
            None => {}
        }
    }

    /// Audio output became noisy (headphones pulled)
    pub fn on_headphones_unplugged(&mut self) {
        if self.is_playing() {
            info!("Headphones unplugged, pausing");
            self.pause();
        }
    }

    pub fn on_headphones_plugged(&mut self) {
        if self.config.resume_on_headphones_connect && self.focused && !self.is_playing() {
            info!("Headphones connected, resuming");
            self.play();
        }
    }

    // ===== Persistence =====

    /// Current state as a snapshot
    ///
    /// While shuffled, edits made to the shuffled view are folded into the
    /// linear ids so both blocks hold the same tracks.
    pub fn snapshot(&self) -> PlayerSnapshot {
        let ids = |tracks: &[Track]| tracks.iter().map(|t| t.id).collect::<Vec<_>>();
        PlayerSnapshot {
            is_playing: self.is_playing(),
            active_index: self.queue.index(),
            queue: ids(&self.queue.reconciled_linear()),
            shuffled_queue: self
                .queue
                .is_shuffled()
                .then(|| ids(self.queue.shuffled())),
            seek_position_ms: self.position(),
        }
    }

    /// Write the snapshot to the snapshot store
    pub fn save_state(&mut self) -> Result<()> {
        let snapshot = self.snapshot();
        self.snapshots.save(&snapshot.encode())?;
        info!(
            tracks = snapshot.queue.len(),
            index = snapshot.active_index,
            "Saved playback state"
        );
        Ok(())
    }

    /// Restore from the snapshot store
    ///
    /// A missing snapshot leaves the queue untouched. Unusable content is
    /// logged and results in an empty queue. Saved state always restores
    /// paused.
    pub fn load_state(&mut self) -> Result<()> {
        let Some(contents) = self.snapshots.load()? else {
            debug!("No saved playback state");
            return Ok(());
        };

        let restored = PlayerSnapshot::decode(&contents).and_then(|snapshot| {
            let snapshot = PlayerSnapshot {
                is_playing: false,
                ..snapshot
            };
            self.restore_snapshot(snapshot)
        });

        if let Err(e) = restored {
            warn!(error = %e, "Discarding unusable playback state");
            self.clear_queue();
        }
        Ok(())
    }

    /// Apply a snapshot taken in this process
    ///
    /// Ids are resolved through the track repository; on failure the
    /// current queue is left unchanged.
    pub fn restore_snapshot(&mut self, snapshot: PlayerSnapshot) -> Result<()> {
        let linear = self.repository.resolve_tracks_by_ids(&snapshot.queue)?;
        let shuffled = snapshot
            .shuffled_queue
            .as_deref()
            .map(|ids| self.repository.resolve_tracks_by_ids(ids))
            .transpose()?;

        self.queue.restore(linear, shuffled, snapshot.active_index)?;
        self.apply_multi_repeat(0);
        self.load_current(false);
        if snapshot.seek_position_ms > 0 && !self.queue.is_empty() {
            self.pending_seek = Some(snapshot.seek_position_ms);
        }
        if snapshot.is_playing {
            self.play();
        }

        info!(
            tracks = self.queue.len(),
            index = self.queue.index(),
            shuffled = self.queue.is_shuffled(),
            "Restored playback state"
        );
        self.notify_now_playing();
        Ok(())
    }

    fn clear_queue(&mut self) {
        // An empty queue always has a valid index
        let _ = self.queue.set_queue(Vec::new(), 0);
        self.load_current(false);
        self.notify_now_playing();
    }

    // ===== Lifecycle =====

    /// Tear down; later commands are no-ops
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.cancel_sleep_timer();
        self.clicks.cancel();
        self.ticker.stop();
        self.focus.abandon();
        self.focused = false;
        self.player.release();
        self.released = true;
        info!("Playback released");
    }

    /// Report a failure to error listeners
    pub fn report_error(&self, message: impl Into<String>) {
        self.events.error.publish(&message.into());
    }

    // ===== Signals =====

    /// Handle every signal already waiting in the inbox
    ///
    /// Returns how many were handled. Signals produced while handling (for
    /// example a backend that prepares synchronously) are handled too.
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(signal) = self.signal_rx.try_recv() {
            self.handle_signal(signal);
            handled += 1;
        }
        handled
    }

    pub fn handle_signal(&mut self, signal: Signal) {
        if self.released {
            return;
        }
        match signal {
            Signal::Backend(event) => match self.player.handle_backend_event(event) {
                Some(PlayerEvent::Prepared) => self.on_prepared(),
                Some(PlayerEvent::Completed) => self.on_completion(),
                Some(PlayerEvent::Error(e)) => self.on_decode_error(&e),
                None => {}
            },
            Signal::SleepTimerElapsed { token } => self.on_sleep_timer_elapsed(token),
            Signal::ClickWindowElapsed { token } => self.on_click_window_elapsed(token),
            Signal::PositionTick => self.on_position_tick(),
        }
    }

    fn on_prepared(&mut self) {
        debug!(source = ?self.player.source(), "Track prepared");
        self.player.set_volume(self.volume);
        if let Some(seek) = self.pending_seek.take() {
            self.player.seek_to(seek);
        }
        if std::mem::take(&mut self.play_when_prepared) {
            self.play();
        } else {
            self.notify_now_playing();
        }
    }

    fn on_completion(&mut self) {
        if let Some(id) = self.current_id() {
            if let Err(e) = self.ledger.record_play(id) {
                warn!(track_id = %id, error = %e, "Failed to record play");
            }
        }
        self.ticker.stop();

        if self.multi_repeat > 1 {
            self.apply_multi_repeat(self.multi_repeat - 1);
            self.restart_current();
        } else if self.repeat == RepeatMode::One {
            self.restart_current();
        } else if !self.queue.is_last() || self.repeat == RepeatMode::All {
            self.skip();
        } else {
            debug!("Reached the end of the queue");
            self.notify_now_playing();
        }
    }

    fn restart_current(&mut self) {
        self.seek_to(0);
        self.play();
    }

    fn on_decode_error(&mut self, error: &DecodeError) {
        let title = self
            .queue
            .now_playing()
            .map_or_else(|| "track".to_string(), |t| t.title.clone());
        let message = if error.is_not_found() {
            format!("Couldn't find {title}")
        } else {
            format!("Couldn't play {title}")
        };
        error!(error = %error, title = %title, "Playback failed");

        self.player.reset();
        self.current_failed = true;
        self.play_when_prepared = false;
        self.pending_seek = None;
        self.ticker.stop();

        self.events.error.publish(&message);
        self.notify_now_playing();
    }

    fn on_position_tick(&mut self) {
        if self.player.is_playing() && !self.events.position.is_empty() {
            self.events.position.publish(&PositionUpdate {
                position_ms: self.player.position(),
                duration_ms: self.player.duration(),
            });
        } else {
            self.ticker.stop();
        }
    }

    /// Start or stop the position ticker to match playing state and
    /// subscriber count
    pub fn refresh_ticker(&mut self) {
        let wanted = self.player.is_playing() && !self.events.position.is_empty();
        if !wanted {
            self.ticker.stop();
            return;
        }
        if self.ticker.is_running() {
            return;
        }

        let listeners = self.events.position.clone();
        let inbox = self.signal_tx.clone();
        self.ticker.start(self.config.position_tick(), move || {
            !listeners.is_empty() && inbox.send(Signal::PositionTick).is_ok()
        });
    }

    // ===== Internals =====

    fn current_id(&self) -> Option<TrackId> {
        self.queue.now_playing().map(|t| t.id)
    }

    fn request_focus(&mut self) -> bool {
        if !self.focused {
            self.focused = self.focus.request();
        }
        self.focused
    }

    fn apply_volume(&mut self, volume: f32) {
        self.volume = volume;
        self.player.set_volume(volume);
    }

    fn pause_playback(&mut self) {
        self.play_when_prepared = false;
        self.player.pause();
        self.ticker.stop();
        self.notify_now_playing();
    }

    /// Classify the track being left and record it
    fn log_outgoing(&mut self) {
        let Some(id) = self.current_id() else {
            return;
        };
        let position = self.position();
        let Some(outcome) = PlayOutcome::classify(position, self.player.duration(), &self.config)
        else {
            return;
        };
        debug!(track_id = %id, position, ?outcome, "Logging outgoing track");
        if let Err(e) = self.ledger.record_outcome(id, outcome) {
            warn!(track_id = %id, error = %e, "Failed to record play count");
        }
    }

    /// Reset the player and begin decoding the now-playing track
    fn load_current(&mut self, play_when_prepared: bool) {
        self.ticker.stop();
        self.player.reset();
        self.current_failed = false;
        self.pending_seek = None;
        self.play_when_prepared = false;
        self.artwork_key = self.queue.now_playing().map(Track::artwork_key);

        let Some(track) = self.queue.now_playing().cloned() else {
            return;
        };
        match self.player.set_data_source(&track.location) {
            Ok(()) => {
                self.player.set_volume(self.volume);
                self.play_when_prepared = play_when_prepared;
                self.player.prepare();
            }
            Err(e) => self.on_decode_error(&e),
        }
    }

    fn notify_now_playing(&self) {
        self.events.now_playing.publish(&self.now_playing_info());
    }
}

impl std::fmt::Debug for PlaybackOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackOrchestrator")
            .field("state", &self.player.state())
            .field("queue_len", &self.queue.len())
            .field("index", &self.queue.index())
            .field("repeat", &self.repeat)
            .field("multi_repeat", &self.multi_repeat)
            .field("released", &self.released)
            .finish()
    }
}
