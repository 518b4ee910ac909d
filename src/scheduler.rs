//! Visibility-aware periodic refresh
//!
//! A `Scheduler` is either Idle (no timer) or Armed (one background task
//! owning one interval timer and one visibility subscription, released
//! together on disarm). While armed, a tick runs the registered callback
//! only if the consumer is currently visible; hidden ticks are dropped
//! outright so no backlog accumulates. Becoming visible fires one
//! immediate out-of-band refresh without resetting the timer cadence.
//! The scheduler never looks at the callback's outcome; the next tick is
//! the retry mechanism.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use log::debug;
use tokio::sync::{mpsc, watch};

/// Async callback invoked on each effective refresh
pub type RefreshCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Publisher side of the "is the consumer's view foregrounded" signal
///
/// The surrounding UI layer owns one gate and flips it as the view gains
/// and loses the foreground; the scheduler only ever subscribes.
#[derive(Debug, Clone)]
pub struct VisibilityGate {
    tx: Arc<watch::Sender<bool>>,
}

impl VisibilityGate {
    /// Creates a gate with the given initial visibility
    pub fn new(initially_visible: bool) -> Self {
        let (tx, _rx) = watch::channel(initially_visible);
        Self { tx: Arc::new(tx) }
    }

    /// Publishes a visibility change
    pub fn set_visible(&self, visible: bool) {
        // send_if_modified so repeated "visible" updates do not register
        // as hidden->visible transitions
        self.tx.send_if_modified(|current| {
            if *current == visible {
                false
            } else {
                *current = visible;
                true
            }
        });
    }

    /// Current visibility
    pub fn is_visible(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for VisibilityGate {
    fn default() -> Self {
        Self::new(true)
    }
}

struct ArmedState {
    callback: RefreshCallback,
    shutdown_tx: mpsc::Sender<()>,
}

/// Timer-driven refresh driver with two states: Idle and Armed
pub struct Scheduler {
    gate: VisibilityGate,
    armed: Option<ArmedState>,
}

impl Scheduler {
    /// Creates an idle scheduler observing the given visibility gate
    pub fn new(gate: VisibilityGate) -> Self {
        Self { gate, armed: None }
    }

    /// Whether a timer is currently running
    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Arms the scheduler: Idle -> Armed
    ///
    /// Spawns the background task. Arming an already-armed scheduler
    /// disarms the previous timer first.
    pub fn arm(&mut self, callback: RefreshCallback, interval: Duration) {
        self.disarm();

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let mut visibility = self.gate.subscribe();
        let task_callback = callback.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // Ticks missed while a refresh is still running are dropped,
            // never replayed as a burst
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // Skip the first tick (immediate)
            ticker.tick().await;

            let mut was_visible = *visibility.borrow_and_update();
            let mut visibility_open = true;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if was_visible {
                            debug!("auto-refresh tick");
                            task_callback().await;
                        } else {
                            debug!("consumer not visible, skipping refresh");
                        }
                    }
                    changed = visibility.changed(), if visibility_open => {
                        match changed {
                            Ok(()) => {
                                let now_visible = *visibility.borrow_and_update();
                                if now_visible && !was_visible {
                                    debug!("became visible, refreshing immediately");
                                    task_callback().await;
                                }
                                was_visible = now_visible;
                            }
                            // Gate dropped: visibility stays at its last value
                            Err(_) => visibility_open = false,
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        self.armed = Some(ArmedState {
            callback,
            shutdown_tx,
        });
    }

    /// Disarms the scheduler: Armed -> Idle
    ///
    /// Stops the background task, releasing the timer and the visibility
    /// subscription together. Idempotent.
    pub fn disarm(&mut self) {
        if let Some(armed) = self.armed.take() {
            let _ = armed.shutdown_tx.try_send(());
        }
    }

    /// Runs the registered callback right now
    ///
    /// Bypasses both the visibility check and the timer. No-op while idle.
    pub async fn manual_trigger(&self) {
        if let Some(armed) = &self.armed {
            (armed.callback)().await;
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.disarm();
    }
}
