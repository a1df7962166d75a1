//! Confirmation gate for viewability geometry events.
//!
//! A geometry event at or above the visibility threshold opens a qualifying
//! window and arms a one-shot timer. If nothing drops the view below the
//! threshold before the timer fires, the event that opened the window is
//! reported, once. A below-threshold event closes the window: the pending
//! timer is cancelled and the window's "reported" flag is cleared, so the next
//! qualifying window can report again.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use viewbeacon_types::EventValue;

use crate::host::{TimerHandle, TimerHost};

/// Tunables for the gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateConfig {
    /// Minimum `percentageInView` for an event to qualify.
    pub threshold: f64,
    /// How long visibility must hold before the event is reported.
    pub confirm_delay: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            threshold: 50.0,
            confirm_delay: Duration::from_millis(1000),
        }
    }
}

/// Observable state of the gate for the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// No timer pending and nothing reported yet.
    Idle,
    /// A confirmation timer is running.
    Pending,
    /// The window has been reported; further qualifying events are ignored
    /// until the view drops below the threshold.
    Reported,
}

/// What the gate did with a geometry event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// A confirmation timer was started for this event.
    Armed,
    /// A timer is already pending; the earlier event stays authoritative.
    AlreadyPending,
    /// The current window was already reported.
    AlreadyReported,
    /// The event left the qualifying window; any pending timer was cancelled.
    Reset,
}

#[derive(Debug, Clone, Copy)]
struct Armed {
    seq: u64,
    handle: Option<TimerHandle>,
}

#[derive(Debug, Default)]
struct Window {
    armed: Option<Armed>,
    reported: bool,
    next_seq: u64,
}

/// Per-router debounce state for geometry events.
pub struct DebounceGate {
    config: GateConfig,
    timers: Arc<dyn TimerHost>,
    window: Mutex<Window>,
}

impl std::fmt::Debug for DebounceGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebounceGate")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

impl DebounceGate {
    /// Creates an idle gate scheduling its timers on `timers`.
    pub fn new(timers: Arc<dyn TimerHost>, config: GateConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            timers,
            window: Mutex::new(Window::default()),
        })
    }

    /// Returns the gate's settings.
    pub fn config(&self) -> GateConfig {
        self.config
    }

    /// Returns the current window state.
    pub fn state(&self) -> GateState {
        let window = self.window.lock().unwrap_or_else(|e| e.into_inner());
        if window.armed.is_some() {
            GateState::Pending
        } else if window.reported {
            GateState::Reported
        } else {
            GateState::Idle
        }
    }

    /// Whether `event` keeps the ad in the qualifying window. A missing or
    /// non-numeric percentage does not qualify.
    pub fn qualifies(&self, event: &EventValue) -> bool {
        event
            .percentage_in_view()
            .is_some_and(|percent| percent >= self.config.threshold)
    }

    /// Feeds a geometry event through the gate.
    ///
    /// When the event arms the timer, `on_confirm` runs with that event after
    /// the confirmation delay, unless the window is reset first. In every
    /// other case `on_confirm` is dropped without being called.
    pub fn observe<F>(self: &Arc<Self>, event: &EventValue, on_confirm: F) -> GateDecision
    where
        F: FnOnce(EventValue) + Send + 'static,
    {
        if !self.qualifies(event) {
            self.reset();
            return GateDecision::Reset;
        }

        let seq = {
            let mut window = self.window.lock().unwrap_or_else(|e| e.into_inner());
            if window.armed.is_some() {
                return GateDecision::AlreadyPending;
            }
            if window.reported {
                return GateDecision::AlreadyReported;
            }
            let seq = window.next_seq;
            window.next_seq += 1;
            window.armed = Some(Armed { seq, handle: None });
            seq
        };

        let gate: Weak<Self> = Arc::downgrade(self);
        let captured = event.clone();
        let handle = self.timers.set_timer(
            self.config.confirm_delay,
            Box::new(move || {
                if let Some(gate) = gate.upgrade() {
                    if gate.confirm(seq) {
                        on_confirm(captured);
                    }
                }
            }),
        );

        // The timer may already have fired, or been reset, while unlocked.
        let mut window = self.window.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(armed) = window.armed.as_mut().filter(|armed| armed.seq == seq) {
            armed.handle = Some(handle);
        }
        tracing::debug!(seq, "geometry window opened, confirmation timer armed");
        GateDecision::Armed
    }

    /// Closes the current window: cancels any pending timer and clears the
    /// reported flag.
    pub fn reset(&self) {
        let armed = {
            let mut window = self.window.lock().unwrap_or_else(|e| e.into_inner());
            window.reported = false;
            window.armed.take()
        };
        if let Some(armed) = armed {
            tracing::debug!(seq = armed.seq, "geometry window closed, cancelling timer");
            if let Some(handle) = armed.handle {
                self.timers.clear_timer(handle);
            }
        }
    }

    /// Timer completion. Returns `true` if the captured event should be
    /// reported now.
    fn confirm(&self, seq: u64) -> bool {
        let mut window = self.window.lock().unwrap_or_else(|e| e.into_inner());
        match window.armed {
            Some(armed) if armed.seq == seq => {
                window.armed = None;
                if window.reported {
                    return false;
                }
                window.reported = true;
                true
            }
            _ => {
                tracing::trace!(seq, "dropping stale confirmation timer");
                false
            }
        }
    }
}
