//! Event-shaping core for the viewbeacon relay.
//!
//! Subscribes to a measurement SDK, filters and debounces its notifications,
//! and forwards each qualifying event to a remote log server as a GET beacon
//! whose query string is a flattened, URL-encoded copy of the event.
//!
//! # Pipeline
//!
//! | Stage | Type | Behaviour |
//! |-------|------|-----------|
//! | Subscription | [`ValidationClient`] | Session observer plus one listener per non-media [`AdEventType`]. |
//! | Debounce | [`DebounceGate`] | A geometry event at or above the threshold is reported once visibility has held for the confirmation delay. |
//! | Serialization | [`serialize`] | Ordered `key=value` pairs with bracketed paths for nested fields. |
//! | Dispatch | [`VerificationClient::send_url`] | Fire-and-forget beacon. |
//!
//! The SDK and the host timer are collaborators, modelled by the
//! [`VerificationClient`] and [`TimerHost`] traits.
//!
//! # Usage
//!
//! ```rust,ignore
//! use viewbeacon_observe::{RouterConfig, ValidationClient};
//!
//! let router = ValidationClient::new(sdk, timers, "vendor-key", RouterConfig::default())?;
//! assert!(router.is_supported());
//! ```
//!
//! [`AdEventType`]: viewbeacon_types::AdEventType

mod client;
mod debounce;
mod error;
mod host;
mod serialize;

pub use client::{format_log_line, RouterConfig, ValidationClient, DEFAULT_LOG_SERVER};
pub use debounce::{DebounceGate, GateConfig, GateDecision, GateState};
pub use error::ObserveError;
pub use host::{EventCallback, TimerCallback, TimerHandle, TimerHost, VerificationClient};
pub use serialize::{
    encode_component, serialize, SLOT_ELEMENT_KEY, SLOT_ELEMENT_PLACEHOLDER, VIDEO_ELEMENT_KEY,
    VIDEO_ELEMENT_PLACEHOLDER,
};
