//! Error types for event decoding.

/// Errors that can occur while decoding an event payload.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// The payload was not valid JSON.
    #[error("event decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The payload decoded, but its top level was not an object.
    #[error("event payload must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}
