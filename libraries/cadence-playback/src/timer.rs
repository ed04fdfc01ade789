//! Cancellable background timers
//!
//! Each timer owns a thread that waits on a `crossbeam_channel` timer and a
//! cancellation channel. Cancelling drops the sender side, which wakes the
//! thread immediately; cancelling twice is harmless. Timers never touch
//! engine state themselves: they post a signal back to the single
//! consumer, which decides whether the signal is still current.

use crossbeam_channel::{after, bounded, select, tick, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error};

/// One-shot deferred callback
#[derive(Debug, Default)]
pub struct OneShot {
    cancel: Option<Sender<()>>,
}

impl OneShot {
    /// Run `fire` on a timer thread after `delay` unless cancelled first
    pub fn schedule(delay: Duration, fire: impl FnOnce() + Send + 'static) -> Self {
        let (cancel_tx, cancel_rx): (Sender<()>, Receiver<()>) = bounded(1);
        let spawned = thread::Builder::new()
            .name("cadence-timer".into())
            .spawn(move || {
                select! {
                    recv(cancel_rx) -> _ => debug!("Timer cancelled"),
                    recv(after(delay)) -> _ => fire(),
                }
            });

        match spawned {
            Ok(_) => Self {
                cancel: Some(cancel_tx),
            },
            Err(e) => {
                error!(error = %e, "Failed to spawn timer thread");
                Self::default()
            }
        }
    }

    /// Cancel if still pending
    pub fn cancel(&mut self) {
        self.cancel.take();
    }

    /// Whether the timer was scheduled and not cancelled
    ///
    /// Stays true after firing; callers track that through their signal.
    pub fn is_armed(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for OneShot {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Periodic callback that stops itself when the callback returns `false`
#[derive(Debug, Default)]
pub struct Ticker {
    stop: Option<Sender<()>>,
    alive: Arc<AtomicBool>,
}

impl Ticker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start ticking every `interval`; any previous run is stopped first
    pub fn start(&mut self, interval: Duration, mut on_tick: impl FnMut() -> bool + Send + 'static) {
        self.stop();

        let (stop_tx, stop_rx): (Sender<()>, Receiver<()>) = bounded(1);
        let alive = Arc::new(AtomicBool::new(true));
        let thread_alive = Arc::clone(&alive);

        let spawned = thread::Builder::new()
            .name("cadence-ticker".into())
            .spawn(move || {
                let ticks = tick(interval);
                loop {
                    select! {
                        recv(stop_rx) -> _ => break,
                        recv(ticks) -> _ => {
                            if !on_tick() {
                                break;
                            }
                        }
                    }
                }
                thread_alive.store(false, Ordering::Release);
                debug!("Ticker stopped");
            });

        match spawned {
            Ok(_) => {
                self.stop = Some(stop_tx);
                self.alive = alive;
            }
            Err(e) => error!(error = %e, "Failed to spawn ticker thread"),
        }
    }

    /// Stop ticking; safe to call when already stopped
    pub fn stop(&mut self) {
        if self.stop.take().is_some() {
            self.alive.store(false, Ordering::Release);
        }
    }

    pub fn is_running(&self) -> bool {
        self.stop.is_some() && self.alive.load(Ordering::Acquire)
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn one_shot_fires() {
        let (tx, rx) = unbounded();
        let _timer = OneShot::schedule(Duration::from_millis(10), move || {
            tx.send(()).unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_secs(2)).is_ok());
    }

    #[test]
    fn cancelled_one_shot_never_fires() {
        let (tx, rx) = unbounded::<()>();
        let mut timer = OneShot::schedule(Duration::from_millis(50), move || {
            tx.send(()).ok();
        });
        timer.cancel();
        timer.cancel();

        assert!(!timer.is_armed());
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn ticker_stops_when_callback_declines() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let mut ticker = Ticker::new();
        ticker.start(Duration::from_millis(5), move || {
            seen.fetch_add(1, Ordering::SeqCst) < 2
        });

        thread::sleep(Duration::from_millis(200));
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(!ticker.is_running());
    }

    #[test]
    fn ticker_stop_is_idempotent() {
        let mut ticker = Ticker::new();
        ticker.start(Duration::from_millis(5), || true);
        assert!(ticker.is_running());

        ticker.stop();
        ticker.stop();
        assert!(!ticker.is_running());
    }
}
