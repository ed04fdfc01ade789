//! Remote-control click counting
//!
//! Headset and lock-screen buttons send bare clicks. Clicks arriving within
//! the window of each other are grouped, and the group size picks the action
//! once the window closes.

use crate::orchestrator::Signal;
use crate::timer::OneShot;
use crossbeam_channel::Sender;
use std::time::Duration;

/// What a group of clicks asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteAction {
    TogglePlay,
    Skip,
    SkipPrevious,
}

impl RemoteAction {
    /// Map a click count; zero clicks mean nothing
    pub fn from_clicks(clicks: u32) -> Option<Self> {
        match clicks {
            0 => None,
            1 => Some(Self::TogglePlay),
            2 => Some(Self::Skip),
            _ => Some(Self::SkipPrevious),
        }
    }
}

/// Groups clicks and reports the window closing through the signal inbox
#[derive(Debug)]
pub struct ClickCounter {
    window: Duration,
    clicks: u32,
    token: u64,
    timer: Option<OneShot>,
}

impl ClickCounter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            clicks: 0,
            token: 0,
            timer: None,
        }
    }

    pub fn pending_clicks(&self) -> u32 {
        self.clicks
    }

    /// Count a click and restart the window
    pub fn click(&mut self, inbox: &Sender<Signal>) {
        self.clicks += 1;
        self.token += 1;

        let token = self.token;
        let inbox = inbox.clone();
        self.timer = Some(OneShot::schedule(self.window, move || {
            // Inbox gone means the engine is shutting down
            let _ = inbox.send(Signal::ClickWindowElapsed { token });
        }));
    }

    /// Close the window identified by `token`
    ///
    /// Returns `None` for a stale token (a later click reopened the window).
    pub fn window_elapsed(&mut self, token: u64) -> Option<RemoteAction> {
        if token != self.token {
            return None;
        }
        self.timer = None;
        RemoteAction::from_clicks(std::mem::take(&mut self.clicks))
    }

    /// Drop pending clicks without acting on them
    pub fn cancel(&mut self) {
        if let Some(mut timer) = self.timer.take() {
            timer.cancel();
        }
        self.clicks = 0;
        self.token += 1;
    }
}
