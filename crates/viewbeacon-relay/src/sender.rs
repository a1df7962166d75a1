//! Fire-and-forget HTTP beacon dispatch.

use std::sync::Mutex;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinSet;

/// Destination for outbound beacon URLs.
pub trait BeaconSink: Send + Sync {
    /// Dispatches a GET beacon to `url`. Never blocks and never fails.
    fn send(&self, url: &str);
}

/// Sends beacons as HTTP GET requests on background tasks.
///
/// Responses are ignored and failures are logged, never retried. Call
/// [`HttpBeaconSender::flush`] before shutdown to let in-flight requests
/// finish.
pub struct HttpBeaconSender {
    client: reqwest::Client,
    runtime: Handle,
    in_flight: Mutex<JoinSet<()>>,
}

impl HttpBeaconSender {
    /// Builds a sender on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `reqwest::Error` if the HTTP client cannot be built.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("viewbeacon-relay/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            runtime: Handle::current(),
            in_flight: Mutex::new(JoinSet::new()),
        })
    }

    /// Number of beacons that have not completed yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Waits for every beacon sent so far to complete.
    pub async fn flush(&self) {
        let mut pending = {
            let mut guard = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *guard)
        };
        let count = pending.len();
        while let Some(result) = pending.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "beacon task panicked or was cancelled");
            }
        }
        if count > 0 {
            tracing::debug!(count, "flushed in-flight beacons");
        }
    }
}

impl BeaconSink for HttpBeaconSender {
    fn send(&self, url: &str) {
        let client = self.client.clone();
        let url = url.to_string();
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        // Reap finished requests so the set does not grow without bound.
        while in_flight.try_join_next().is_some() {}
        in_flight.spawn_on(
            async move {
                match client.get(&url).send().await {
                    Ok(response) => {
                        tracing::debug!(status = %response.status(), %url, "beacon delivered");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, %url, "beacon dispatch failed");
                    }
                }
            },
            &self.runtime,
        );
    }
}
