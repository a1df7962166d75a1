//! Error types for the event-shaping core.

/// Errors raised when a router is built from invalid settings.
#[derive(Debug, thiserror::Error)]
pub enum ObserveError {
    /// The log server base URL is empty.
    #[error("observe config error: log server URL must not be empty")]
    EmptyLogServer,

    /// The visibility threshold is not a percentage.
    #[error("observe config error: visibility threshold {0} is outside 0..=100")]
    InvalidThreshold(f64),
}
