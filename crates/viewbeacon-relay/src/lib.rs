//! Runnable host for the viewbeacon core.
//!
//! Wires a [`ValidationClient`] to real collaborators: beacons go out over
//! HTTP through [`HttpBeaconSender`], confirmation timers run on
//! [`TokioTimerHost`], and events come from an NDJSON log replayed by
//! [`ReplaySdk`].

pub mod config;
pub mod replay;
pub mod sender;
pub mod timer;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;
use viewbeacon_observe::{ObserveError, ValidationClient};

use crate::config::{Config, ConfigError, LoggingConfig};
use crate::replay::{ReplayError, ReplaySdk, ReplayStats};
use crate::sender::HttpBeaconSender;
use crate::timer::TokioTimerHost;

/// Extra wait after the confirmation delay before shutting down, so a timer
/// armed by the last event can still fire.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

/// Errors that abort a relay run.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The router rejected its settings.
    #[error(transparent)]
    Observe(#[from] ObserveError),

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    /// The event log could not be replayed.
    #[error(transparent)]
    Replay(#[from] ReplayError),
}

/// Installs the global `tracing` subscriber described by `logging`.
pub fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Replays the configured event log through a router and waits for every
/// resulting beacon to be dispatched.
///
/// # Errors
///
/// Returns `RelayError` if the configuration is invalid, the HTTP client
/// cannot be built, or the event log cannot be read.
pub async fn run(config: &Config) -> Result<ReplayStats, RelayError> {
    let router_config = config.relay.router_config()?;
    let confirm_delay = router_config.gate.confirm_delay;

    let sender = Arc::new(HttpBeaconSender::new(Duration::from_millis(
        config.relay.request_timeout_ms,
    ))?);
    let timers = Arc::new(TokioTimerHost::new());
    let sdk = Arc::new(ReplaySdk::new(
        config.relay.sdk_version.clone(),
        config.replay.supported,
        sender.clone(),
    ));

    let router = ValidationClient::new(
        sdk.clone(),
        timers.clone(),
        &config.relay.vendor_key,
        router_config,
    )?;

    let honor = config.replay.honor_timestamps;
    let stats = match &config.replay.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .map_err(|source| ReplayError::Open {
                    path: path.clone(),
                    source,
                })?;
            sdk.replay(BufReader::new(file), honor).await?
        }
        None => sdk.replay(BufReader::new(tokio::io::stdin()), honor).await?,
    };

    if timers.pending() > 0 {
        tracing::debug!("waiting for pending confirmation timer");
        tokio::time::sleep(confirm_delay + SHUTDOWN_GRACE).await;
    }
    sender.flush().await;
    drop(router);

    Ok(stats)
}
