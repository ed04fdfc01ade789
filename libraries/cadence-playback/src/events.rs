//! Playback notifications
//!
//! Publish/subscribe lists for the signals the engine exposes:
//! - now playing (every state-affecting change)
//! - info messages (e.g. sleep timer ended)
//! - error messages (e.g. a track could not be played)
//! - position updates (periodic, only while someone listens)
//!
//! A subscription lasts as long as its `Subscription` guard.

use crate::state::PlayerState;
use crate::types::RepeatMode;
use cadence_core::Track;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Registry<T> {
    next_id: u64,
    entries: Vec<(u64, Callback<T>)>,
}

/// Subscriber list for one kind of notification
pub struct Listeners<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T> Clone for Listeners<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }
}

impl<T: 'static> Listeners<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback until the returned guard is dropped
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = {
            let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
            let id = registry.next_id;
            registry.next_id += 1;
            registry.entries.push((id, Arc::new(callback)));
            id
        };

        let weak: Weak<Mutex<Registry<T>>> = Arc::downgrade(&self.registry);
        Subscription {
            unsubscribe: Some(Box::new(move || {
                if let Some(registry) = weak.upgrade() {
                    registry
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .entries
                        .retain(|(entry, _)| *entry != id);
                }
            })),
        }
    }

    /// Deliver `value` to every subscriber
    ///
    /// Callbacks run outside the lock, so they may subscribe or drop
    /// subscriptions themselves.
    pub fn publish(&self, value: &T) {
        let callbacks: Vec<Callback<T>> = self
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in callbacks {
            callback(value);
        }
    }

    pub fn len(&self) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> fmt::Debug for Listeners<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Listeners")
    }
}

/// Guard that keeps a callback registered
///
/// Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Unsubscribe now
    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

/// Full picture of what is playing, published on every change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NowPlaying {
    pub track: Option<Track>,
    pub state: PlayerState,
    pub is_playing: bool,
    pub queue_index: usize,
    pub queue_len: usize,
    pub shuffle: bool,
    pub repeat: RepeatMode,
    pub multi_repeat: u32,
    pub position_ms: u64,
    pub duration_ms: Option<u64>,
    pub artwork_key: Option<String>,
}

/// Periodic position report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PositionUpdate {
    pub position_ms: u64,
    pub duration_ms: Option<u64>,
}

/// All notification channels of one engine
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    pub now_playing: Listeners<NowPlaying>,
    pub info: Listeners<String>,
    pub error: Listeners<String>,
    pub position: Listeners<PositionUpdate>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }
}
