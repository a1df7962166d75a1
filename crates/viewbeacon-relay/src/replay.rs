//! A measurement SDK that replays recorded events from an NDJSON log.
//!
//! Each line of the log is one JSON event object. Session lifecycle events
//! (`sessionStart`, `sessionError`, `sessionFinish`) go to the registered
//! session observers; every other event goes to the listeners registered for
//! its `type`. Events with a missing or unknown `type` reach nobody.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use viewbeacon_observe::{EventCallback, VerificationClient};
use viewbeacon_types::{AdEventType, EventValue};

use crate::sender::BeaconSink;

/// Longest pause between two replayed events. Larger timestamp jumps are
/// shortened to this.
pub const MAX_REPLAY_GAP: Duration = Duration::from_secs(30);

/// Errors that can occur while replaying an event log.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// The event log could not be opened.
    #[error("failed to open event log {path}: {source}")]
    Open {
        /// Path of the log.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Reading the event log failed midway.
    #[error("failed to read event log: {0}")]
    Read(#[from] std::io::Error),
}

/// Counters for one replay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Non-empty lines read.
    pub lines: usize,
    /// Events handed to at least one callback.
    pub delivered: usize,
    /// Events nobody was subscribed to.
    pub unrouted: usize,
    /// Lines that failed to decode.
    pub malformed: usize,
}

/// In-process stand-in for the measurement SDK.
pub struct ReplaySdk {
    version: String,
    supported: bool,
    sink: Arc<dyn BeaconSink>,
    observers: Mutex<Vec<(EventCallback, String)>>,
    listeners: Mutex<HashMap<AdEventType, Vec<EventCallback>>>,
}

impl std::fmt::Debug for ReplaySdk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplaySdk")
            .field("version", &self.version)
            .field("supported", &self.supported)
            .finish_non_exhaustive()
    }
}

impl ReplaySdk {
    /// Creates an SDK reporting `version` and `supported`, dispatching
    /// beacons to `sink`.
    pub fn new(version: impl Into<String>, supported: bool, sink: Arc<dyn BeaconSink>) -> Self {
        Self {
            version: version.into(),
            supported,
            sink,
            observers: Mutex::new(Vec::new()),
            listeners: Mutex::new(HashMap::new()),
        }
    }

    /// Vendor keys of the registered session observers.
    pub fn observer_vendor_keys(&self) -> Vec<String> {
        self.observers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, key)| key.clone())
            .collect()
    }

    /// Categories with at least one registered listener.
    pub fn subscribed_categories(&self) -> Vec<AdEventType> {
        let listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        AdEventType::ALL
            .into_iter()
            .filter(|kind| listeners.contains_key(kind))
            .collect()
    }

    /// Routes one event to its callbacks. Returns how many were invoked.
    pub fn deliver(&self, event: &EventValue) -> usize {
        let Some(kind) = event.event_type().and_then(|t| t.parse::<AdEventType>().ok()) else {
            tracing::debug!(event_type = ?event.event_type(), "event has no known type");
            return 0;
        };

        // Callbacks run outside the locks: they may call back into the SDK.
        let callbacks: Vec<EventCallback> = if kind.is_session_lifecycle() {
            self.observers
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .iter()
                .map(|(cb, _)| Arc::clone(cb))
                .collect()
        } else {
            self.listeners
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .get(&kind)
                .cloned()
                .unwrap_or_default()
        };

        for cb in &callbacks {
            cb(event);
        }
        callbacks.len()
    }

    /// Reads NDJSON events from `reader` and delivers them in order.
    ///
    /// With `honor_timestamps`, sleeps between events by the increase in
    /// their `timestamp` fields so timers see realistic gaps. Fractional
    /// milliseconds are kept and each pause is capped at [`MAX_REPLAY_GAP`].
    /// Malformed lines are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns `ReplayError::Read` if reading from `reader` fails.
    pub async fn replay<R>(
        &self,
        reader: R,
        honor_timestamps: bool,
    ) -> Result<ReplayStats, ReplayError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut stats = ReplayStats::default();
        let mut last_timestamp: Option<f64> = None;
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            stats.lines += 1;

            let event = match EventValue::from_json_str(line) {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(error = %e, line = stats.lines, "skipping malformed event");
                    stats.malformed += 1;
                    continue;
                }
            };

            if honor_timestamps {
                if let Some(ts) = event.timestamp() {
                    let gap = last_timestamp.map(|last| ts - last).unwrap_or(0.0);
                    if gap > 0.0 {
                        tokio::time::sleep(replay_pause(gap)).await;
                    }
                    last_timestamp = Some(ts);
                }
            }

            if self.deliver(&event) > 0 {
                stats.delivered += 1;
            } else {
                stats.unrouted += 1;
            }
        }

        tracing::info!(
            lines = stats.lines,
            delivered = stats.delivered,
            unrouted = stats.unrouted,
            malformed = stats.malformed,
            "event log replay finished"
        );
        Ok(stats)
    }
}

/// Pause for a timestamp gap of `gap_ms` milliseconds.
fn replay_pause(gap_ms: f64) -> Duration {
    let pause = Duration::try_from_secs_f64(gap_ms / 1000.0).unwrap_or(MAX_REPLAY_GAP);
    if pause > MAX_REPLAY_GAP {
        tracing::debug!(gap_ms, "timestamp gap exceeds replay cap, shortening");
        return MAX_REPLAY_GAP;
    }
    pause
}

impl VerificationClient for ReplaySdk {
    fn version(&self) -> String {
        self.version.clone()
    }

    fn is_supported(&self) -> bool {
        self.supported
    }

    fn register_session_observer(&self, observer: EventCallback, vendor_key: &str) {
        self.observers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((observer, vendor_key.to_string()));
    }

    fn add_event_listener(&self, event_type: AdEventType, listener: EventCallback) {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(event_type)
            .or_default()
            .push(listener);
    }

    fn send_url(&self, url: &str) {
        self.sink.send(url);
    }
}
