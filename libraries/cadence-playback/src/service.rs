//! Playback service thread
//!
//! One thread owns the `PlaybackOrchestrator` and services commands in the
//! order they were sent, interleaved with the orchestrator's own signals.
//! Callers hold a cloneable [`PlaybackHandle`]; sending never blocks.

use crate::error::{PlaybackError, Result};
use crate::events::{EventBus, NowPlaying, PositionUpdate, Subscription};
use crate::ledger::PlayCountRecord;
use crate::orchestrator::PlaybackOrchestrator;
use crate::snapshot::PlayerSnapshot;
use crate::types::{FocusChange, RepeatMode};
use cadence_core::{Track, TrackId};
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

/// Commands accepted by the playback service
#[derive(Debug)]
pub enum PlaybackCommand {
    Play,
    Pause,
    TogglePlay,
    Stop,
    Skip,
    SkipPrevious,
    SeekTo(u64),
    SetQueue { tracks: Vec<Track>, index: usize },
    EditQueue { tracks: Vec<Track>, index: usize },
    ChangeSong(usize),
    QueueNext(Vec<Track>),
    QueueLast(Vec<Track>),
    SetShuffle(bool),
    SetRepeatMode(RepeatMode),
    SetMultiRepeat(u32),
    /// Deadline in epoch milliseconds; a past deadline cancels
    SetSleepTimer(i64),
    FocusChanged(FocusChange),
    MediaButtonClick,
    HeadphonesUnplugged,
    HeadphonesPlugged,
    RefreshPositionTicker,
    SaveState,
    LoadState,
    Snapshot(Sender<PlayerSnapshot>),
    NowPlaying(Sender<NowPlaying>),
    PlayCount(TrackId, Sender<PlayCountRecord>),
    SleepTimerEnd(Sender<Option<i64>>),
    /// Stop the service thread
    Shutdown,
}

impl PlaybackCommand {
    fn name(&self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::TogglePlay => "toggle_play",
            Self::Stop => "stop",
            Self::Skip => "skip",
            Self::SkipPrevious => "skip_previous",
            Self::SeekTo(_) => "seek_to",
            Self::SetQueue { .. } => "set_queue",
            Self::EditQueue { .. } => "edit_queue",
            Self::ChangeSong(_) => "change_song",
            Self::QueueNext(_) => "queue_next",
            Self::QueueLast(_) => "queue_last",
            Self::SetShuffle(_) => "set_shuffle",
            Self::SetRepeatMode(_) => "set_repeat_mode",
            Self::SetMultiRepeat(_) => "set_multi_repeat",
            Self::SetSleepTimer(_) => "set_sleep_timer",
            Self::FocusChanged(_) => "focus_changed",
            Self::MediaButtonClick => "media_button_click",
            Self::HeadphonesUnplugged => "headphones_unplugged",
            Self::HeadphonesPlugged => "headphones_plugged",
            Self::RefreshPositionTicker => "refresh_position_ticker",
            Self::SaveState => "save_state",
            Self::LoadState => "load_state",
            Self::Snapshot(_) => "snapshot",
            Self::NowPlaying(_) => "now_playing",
            Self::PlayCount(..) => "play_count",
            Self::SleepTimerEnd(_) => "sleep_timer_end",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Running playback service
///
/// Dropping it shuts the thread down and releases the orchestrator.
#[derive(Debug)]
pub struct PlaybackService {
    handle: PlaybackHandle,
    thread: Option<JoinHandle<()>>,
}

impl PlaybackService {
    /// Move `orchestrator` onto a new service thread
    pub fn spawn(orchestrator: PlaybackOrchestrator) -> Result<Self> {
        let (command_tx, command_rx) = unbounded();
        let events = orchestrator.events().clone();

        let thread = thread::Builder::new()
            .name("cadence-playback".into())
            .spawn(move || run(orchestrator, &command_rx))?;

        Ok(Self {
            handle: PlaybackHandle {
                commands: command_tx,
                events,
            },
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> PlaybackHandle {
        self.handle.clone()
    }

    /// Stop the thread after the commands already queued
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        // Already stopped if the send fails
        let _ = self.handle.commands.send(PlaybackCommand::Shutdown);
        if thread.join().is_err() {
            error!("Playback service thread panicked");
        }
    }
}

impl Drop for PlaybackService {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(mut orchestrator: PlaybackOrchestrator, commands: &Receiver<PlaybackCommand>) {
    let signals = orchestrator.signals();
    info!("Playback service started");

    loop {
        select! {
            recv(commands) -> command => match command {
                Ok(PlaybackCommand::Shutdown) | Err(_) => break,
                Ok(command) => execute(&mut orchestrator, command),
            },
            recv(signals) -> signal => {
                if let Ok(signal) = signal {
                    guarded(&mut orchestrator, "signal", |o| {
                        o.handle_signal(signal);
                        Ok(())
                    });
                }
            }
        }
    }

    orchestrator.release();
    info!("Playback service stopped");
}

/// Run one unit of work, reporting errors and panics instead of dying
fn guarded(
    orchestrator: &mut PlaybackOrchestrator,
    label: &'static str,
    work: impl FnOnce(&mut PlaybackOrchestrator) -> Result<()>,
) {
    match panic::catch_unwind(AssertUnwindSafe(|| work(orchestrator))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!(command = label, error = %e, "Playback command failed");
            orchestrator.report_error(e.to_string());
        }
        Err(_) => {
            error!(command = label, "Playback command panicked");
            orchestrator.report_error(format!("Internal error while handling {label}"));
        }
    }
}

fn execute(orchestrator: &mut PlaybackOrchestrator, command: PlaybackCommand) {
    let label = command.name();
    debug!(command = label, "Executing playback command");
    guarded(orchestrator, label, move |o| apply(o, command));
}

fn apply(o: &mut PlaybackOrchestrator, command: PlaybackCommand) -> Result<()> {
    match command {
        PlaybackCommand::Play => o.play(),
        PlaybackCommand::Pause => o.pause(),
        PlaybackCommand::TogglePlay => o.toggle_play(),
        PlaybackCommand::Stop => o.stop(),
        PlaybackCommand::Skip => o.skip(),
        PlaybackCommand::SkipPrevious => o.skip_previous(),
        PlaybackCommand::SeekTo(position_ms) => o.seek_to(position_ms),
        PlaybackCommand::SetQueue { tracks, index } => o.set_queue(tracks, index)?,
        PlaybackCommand::EditQueue { tracks, index } => o.edit_queue(tracks, index)?,
        PlaybackCommand::ChangeSong(index) => o.change_song(index)?,
        PlaybackCommand::QueueNext(tracks) => o.queue_next(tracks),
        PlaybackCommand::QueueLast(tracks) => o.queue_last(tracks),
        PlaybackCommand::SetShuffle(enabled) => o.set_shuffle(enabled),
        PlaybackCommand::SetRepeatMode(mode) => o.set_repeat_mode(mode),
        PlaybackCommand::SetMultiRepeat(count) => o.set_multi_repeat(count),
        PlaybackCommand::SetSleepTimer(end) => o.set_sleep_timer(end),
        PlaybackCommand::FocusChanged(change) => o.on_focus_change(change),
        PlaybackCommand::MediaButtonClick => o.on_media_button_click(),
        PlaybackCommand::HeadphonesUnplugged => o.on_headphones_unplugged(),
        PlaybackCommand::HeadphonesPlugged => o.on_headphones_plugged(),
        PlaybackCommand::RefreshPositionTicker => o.refresh_ticker(),
        PlaybackCommand::SaveState => o.save_state()?,
        PlaybackCommand::LoadState => o.load_state()?,
        // A dropped reply channel means the caller stopped waiting
        PlaybackCommand::Snapshot(reply) => {
            let _ = reply.send(o.snapshot());
        }
        PlaybackCommand::NowPlaying(reply) => {
            let _ = reply.send(o.now_playing_info());
        }
        PlaybackCommand::PlayCount(id, reply) => {
            let _ = reply.send(o.ledger().record(id));
        }
        PlaybackCommand::SleepTimerEnd(reply) => {
            let _ = reply.send(o.sleep_timer_end());
        }
        PlaybackCommand::Shutdown => {}
    }
    Ok(())
}

/// Cloneable sender side of the playback service
#[derive(Debug, Clone)]
pub struct PlaybackHandle {
    commands: Sender<PlaybackCommand>,
    events: EventBus,
}

impl PlaybackHandle {
    /// Queue a command
    ///
    /// # Errors
    /// `ServiceStopped` once the service thread has exited.
    pub fn send(&self, command: PlaybackCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| PlaybackError::ServiceStopped)
    }

    fn request<T>(&self, command: impl FnOnce(Sender<T>) -> PlaybackCommand) -> Result<T> {
        let (reply_tx, reply_rx) = bounded(1);
        self.send(command(reply_tx))?;
        reply_rx.recv().map_err(|_| PlaybackError::ServiceStopped)
    }

    // ===== Convenience commands =====

    pub fn play(&self) -> Result<()> {
        self.send(PlaybackCommand::Play)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(PlaybackCommand::Pause)
    }

    pub fn toggle_play(&self) -> Result<()> {
        self.send(PlaybackCommand::TogglePlay)
    }

    pub fn skip(&self) -> Result<()> {
        self.send(PlaybackCommand::Skip)
    }

    pub fn skip_previous(&self) -> Result<()> {
        self.send(PlaybackCommand::SkipPrevious)
    }

    pub fn seek_to(&self, position_ms: u64) -> Result<()> {
        self.send(PlaybackCommand::SeekTo(position_ms))
    }

    pub fn set_queue(&self, tracks: Vec<Track>, index: usize) -> Result<()> {
        self.send(PlaybackCommand::SetQueue { tracks, index })
    }

    // ===== Requests =====

    /// Current snapshot, answered after every command sent before it
    pub fn snapshot(&self) -> Result<PlayerSnapshot> {
        self.request(PlaybackCommand::Snapshot)
    }

    pub fn now_playing(&self) -> Result<NowPlaying> {
        self.request(PlaybackCommand::NowPlaying)
    }

    pub fn play_count(&self, id: TrackId) -> Result<PlayCountRecord> {
        self.request(|reply| PlaybackCommand::PlayCount(id, reply))
    }

    pub fn sleep_timer_end(&self) -> Result<Option<i64>> {
        self.request(PlaybackCommand::SleepTimerEnd)
    }

    // ===== Subscriptions =====

    pub fn subscribe_now_playing(
        &self,
        callback: impl Fn(&NowPlaying) + Send + Sync + 'static,
    ) -> Subscription {
        self.events.now_playing.subscribe(callback)
    }

    pub fn subscribe_info(&self, callback: impl Fn(&String) + Send + Sync + 'static) -> Subscription {
        self.events.info.subscribe(callback)
    }

    pub fn subscribe_errors(
        &self,
        callback: impl Fn(&String) + Send + Sync + 'static,
    ) -> Subscription {
        self.events.error.subscribe(callback)
    }

    /// Subscribe to position reports; ticking starts if something is playing
    pub fn subscribe_position(
        &self,
        callback: impl Fn(&PositionUpdate) + Send + Sync + 'static,
    ) -> Subscription {
        let subscription = self.events.position.subscribe(callback);
        if self.send(PlaybackCommand::RefreshPositionTicker).is_err() {
            debug!("Position subscription on a stopped service");
        }
        subscription
    }
}
