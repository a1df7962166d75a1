//! Shared types for the viewbeacon workspace.
//!
//! This crate provides the event value model delivered by the measurement SDK
//! ([`EventValue`]), the fixed set of ad-event categories a client can
//! subscribe to ([`AdEventType`]), and the error types for decoding events.
//!
//! No crate in the workspace depends on anything *except* `viewbeacon-types`
//! for cross-cutting type definitions.

mod error;
mod value;

pub use error::EventError;
pub use value::{EventValue, HostRef};

/// Event `type` value carried by viewability geometry notifications.
pub const GEOMETRY_CHANGE: &str = "geometryChange";

/// Ad-event categories published by the measurement SDK.
///
/// Each variant maps to the `type` string carried by events of that
/// category. [`AdEventType::ALL`] is the fixed enumeration used when
/// subscribing to every category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdEventType {
    /// The ad was rendered and counted as an impression.
    Impression,
    /// The ad finished loading.
    Loaded,
    /// The on-screen geometry or visibility of the ad changed.
    GeometryChange,
    /// An ad session started.
    SessionStart,
    /// An ad session reported an error.
    SessionError,
    /// An ad session finished.
    SessionFinish,
    /// Media playback notifications (volume, buffering, quartiles).
    Media,
    /// Legacy video playback notifications.
    Video,
    /// Playback started.
    Start,
    /// Playback reached the first quartile.
    FirstQuartile,
    /// Playback reached the midpoint.
    Midpoint,
    /// Playback reached the third quartile.
    ThirdQuartile,
    /// Playback completed.
    Complete,
    /// Playback paused.
    Pause,
    /// Playback resumed.
    Resume,
    /// The player started buffering.
    BufferStart,
    /// The player finished buffering.
    BufferFinish,
    /// The ad was skipped.
    Skipped,
    /// The player volume changed.
    VolumeChange,
    /// The player state (fullscreen, minimized, ...) changed.
    PlayerStateChange,
    /// The user interacted with the ad.
    AdUserInteraction,
    /// The ad container state changed.
    StateChange,
}

impl AdEventType {
    /// Every known category, in declaration order.
    pub const ALL: [AdEventType; 22] = [
        Self::Impression,
        Self::Loaded,
        Self::GeometryChange,
        Self::SessionStart,
        Self::SessionError,
        Self::SessionFinish,
        Self::Media,
        Self::Video,
        Self::Start,
        Self::FirstQuartile,
        Self::Midpoint,
        Self::ThirdQuartile,
        Self::Complete,
        Self::Pause,
        Self::Resume,
        Self::BufferStart,
        Self::BufferFinish,
        Self::Skipped,
        Self::VolumeChange,
        Self::PlayerStateChange,
        Self::AdUserInteraction,
        Self::StateChange,
    ];

    /// Returns the wire string for this category, as found in an event's
    /// `type` field.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Impression => "impression",
            Self::Loaded => "loaded",
            Self::GeometryChange => GEOMETRY_CHANGE,
            Self::SessionStart => "sessionStart",
            Self::SessionError => "sessionError",
            Self::SessionFinish => "sessionFinish",
            Self::Media => "media",
            Self::Video => "video",
            Self::Start => "start",
            Self::FirstQuartile => "firstQuartile",
            Self::Midpoint => "midpoint",
            Self::ThirdQuartile => "thirdQuartile",
            Self::Complete => "complete",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::BufferStart => "bufferStart",
            Self::BufferFinish => "bufferFinish",
            Self::Skipped => "skipped",
            Self::VolumeChange => "volumeChange",
            Self::PlayerStateChange => "playerStateChange",
            Self::AdUserInteraction => "adUserInteraction",
            Self::StateChange => "stateChange",
        }
    }

    /// Whether this category is one of the media-playback umbrella tags.
    pub fn is_media(self) -> bool {
        matches!(self, Self::Media | Self::Video)
    }

    /// Whether events of this category are session lifecycle notifications,
    /// delivered to session observers rather than per-type listeners.
    pub fn is_session_lifecycle(self) -> bool {
        matches!(
            self,
            Self::SessionStart | Self::SessionError | Self::SessionFinish
        )
    }
}

impl std::fmt::Display for AdEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AdEventType {
    type Err = ParseAdEventTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ParseAdEventTypeError(s.to_string()))
    }
}

/// Error returned when parsing an unknown ad-event category string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown ad event type: {0}")]
pub struct ParseAdEventTypeError(pub String);
