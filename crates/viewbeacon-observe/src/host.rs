//! Collaborator interfaces: the measurement SDK and the host timer facility.

use std::sync::Arc;
use std::time::Duration;

use viewbeacon_types::{AdEventType, EventValue};

/// Callback invoked with a session or ad event.
pub type EventCallback = Arc<dyn Fn(&EventValue) + Send + Sync>;

/// One-shot callback run when a timer fires.
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Identifier of a scheduled timer, issued by a [`TimerHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u64);

/// The measurement SDK as seen by the relay.
pub trait VerificationClient: Send + Sync {
    /// Version identifier of the SDK client library.
    fn version(&self) -> String;

    /// Whether measurement is available in the current environment.
    fn is_supported(&self) -> bool;

    /// Registers `observer` for session lifecycle notifications. The
    /// `vendor_key` must match the one used when the session is started.
    fn register_session_observer(&self, observer: EventCallback, vendor_key: &str);

    /// Registers `listener` for every event of `event_type`.
    fn add_event_listener(&self, event_type: AdEventType, listener: EventCallback);

    /// Dispatches a GET beacon to `url`. Fire-and-forget.
    fn send_url(&self, url: &str);
}

/// A timer facility able to run a callback after a delay.
///
/// Scheduling is infallible. Clearing an already-fired or unknown handle is
/// a no-op.
pub trait TimerHost: Send + Sync {
    /// Schedules `callback` to run once after `delay`.
    fn set_timer(&self, delay: Duration, callback: TimerCallback) -> TimerHandle;

    /// Cancels a pending timer.
    fn clear_timer(&self, handle: TimerHandle);
}
