//! The event router: subscribes to the SDK and dispatches beacons.

use std::sync::{Arc, Weak};

use chrono::{DateTime, Local, Utc};
use viewbeacon_types::{AdEventType, EventValue};

use crate::debounce::{DebounceGate, GateConfig, GateDecision};
use crate::error::ObserveError;
use crate::host::{EventCallback, TimerHost, VerificationClient};
use crate::serialize::{encode_component, serialize};

/// Log server used when none is configured.
pub const DEFAULT_LOG_SERVER: &str = "http://mercadolibre.com/sendMessage?";

/// Router settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RouterConfig {
    /// Base URL every query string is appended to.
    pub log_server: String,
    /// Debounce settings for geometry events.
    pub gate: GateConfig,
    /// Categories to listen to. `Media` and `Video` are skipped even when
    /// listed here.
    pub categories: Vec<AdEventType>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            log_server: DEFAULT_LOG_SERVER.to_string(),
            gate: GateConfig::default(),
            categories: AdEventType::ALL.to_vec(),
        }
    }
}

impl RouterConfig {
    /// Checks the settings.
    ///
    /// # Errors
    ///
    /// Returns `ObserveError` if the log server is empty or the threshold is
    /// not a percentage.
    pub fn validate(&self) -> Result<(), ObserveError> {
        if self.log_server.trim().is_empty() {
            return Err(ObserveError::EmptyLogServer);
        }
        let threshold = self.gate.threshold;
        if !(0.0..=100.0).contains(&threshold) {
            return Err(ObserveError::InvalidThreshold(threshold));
        }
        Ok(())
    }
}

/// Subscribes to a measurement SDK and relays its notifications as beacons.
///
/// On construction the router sends two startup beacons (the SDK version and
/// whether measurement is supported). When supported, it registers a session
/// observer and a listener for every configured non-media category. Session
/// events and non-geometry ad events are reported immediately; geometry
/// events go through a [`DebounceGate`].
pub struct ValidationClient {
    sdk: Arc<dyn VerificationClient>,
    gate: Arc<DebounceGate>,
    log_server: String,
    supported: bool,
}

impl std::fmt::Debug for ValidationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationClient")
            .field("log_server", &self.log_server)
            .field("supported", &self.supported)
            .field("gate", &self.gate)
            .finish()
    }
}

impl ValidationClient {
    /// Builds a router over `sdk`, sends the startup beacons and, if the SDK
    /// is supported, registers all subscriptions.
    ///
    /// # Errors
    ///
    /// Returns `ObserveError` if `config` fails validation. Nothing is sent
    /// in that case.
    pub fn new(
        sdk: Arc<dyn VerificationClient>,
        timers: Arc<dyn TimerHost>,
        vendor_key: &str,
        config: RouterConfig,
    ) -> Result<Arc<Self>, ObserveError> {
        config.validate()?;

        let version = sdk.version();
        let supported = sdk.is_supported();
        let router = Arc::new(Self {
            gate: DebounceGate::new(timers, config.gate),
            log_server: config.log_server,
            supported,
            sdk,
        });

        router.send_query(&serialize(
            &EventValue::map([("omidVersion", EventValue::from(version.as_str()))]),
            None,
        ));
        router.send_query(&serialize(
            &EventValue::map([("supported", EventValue::from(yes_no(supported)))]),
            None,
        ));
        tracing::info!(%version, supported, "measurement client initialised");

        if supported {
            router.subscribe(vendor_key, &config.categories);
        }
        Ok(router)
    }

    fn subscribe(self: &Arc<Self>, vendor_key: &str, categories: &[AdEventType]) {
        let router = Arc::downgrade(self);
        self.sdk
            .register_session_observer(callback(&router, Self::on_session_event), vendor_key);

        let mut subscribed = 0usize;
        for &kind in categories.iter().filter(|kind| !kind.is_media()) {
            self.sdk
                .add_event_listener(kind, callback(&router, Self::on_ad_event));
            subscribed += 1;
        }
        tracing::debug!(subscribed, "registered ad event listeners");
    }

    /// Whether the SDK reported measurement as supported.
    pub fn is_supported(&self) -> bool {
        self.supported
    }

    /// The debounce gate used for geometry events.
    pub fn gate(&self) -> &Arc<DebounceGate> {
        &self.gate
    }

    /// Session observer callback: reports unconditionally.
    pub fn on_session_event(self: &Arc<Self>, event: &EventValue) {
        self.report(event);
    }

    /// Ad-event listener callback.
    pub fn on_ad_event(self: &Arc<Self>, event: &EventValue) {
        if !event.is_geometry_change() {
            self.report(event);
            return;
        }

        let router = Arc::downgrade(self);
        let decision = self.gate.observe(event, move |confirmed| {
            if let Some(router) = router.upgrade() {
                router.report(&confirmed);
            }
        });
        if decision != GateDecision::Armed {
            tracing::trace!(?decision, "geometry event not armed");
        }
    }

    /// Serializes `event`, appends a `rawJSON` copy, and sends the beacon.
    pub fn report(&self, event: &EventValue) {
        let raw = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "failed to dump event as JSON");
                String::new()
            }
        };
        tracing::debug!("{}", format_log_line(&raw, event.timestamp()));

        let mut query = serialize(event, None);
        if !query.is_empty() {
            query.push('&');
        }
        query.push_str("rawJSON=");
        query.push_str(&encode_component(&raw));
        self.send_query(&query);
    }

    fn send_query(&self, query: &str) {
        let url = format!("{}{}", self.log_server, query);
        tracing::debug!(%url, "sending beacon");
        self.sdk.send_url(&url);
    }
}

fn callback(
    router: &Weak<ValidationClient>,
    handler: fn(&Arc<ValidationClient>, &EventValue),
) -> EventCallback {
    let router = router.clone();
    Arc::new(move |event: &EventValue| {
        if let Some(router) = router.upgrade() {
            handler(&router, event);
        }
    })
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

/// Formats a diagnostic line as `<local date>::<message>`, for example
/// `10/8/2017, 10:41:11 AM::{"type":"impression"}`.
///
/// Falls back to the current time when `timestamp_ms` is missing or out of
/// range.
pub fn format_log_line(message: &str, timestamp_ms: Option<f64>) -> String {
    let at = timestamp_ms
        .and_then(|ms| DateTime::<Utc>::from_timestamp_millis(ms as i64))
        .map(|utc| utc.with_timezone(&Local))
        .unwrap_or_else(Local::now);
    format!("{}::{}", at.format("%-m/%-d/%Y, %-I:%M:%S %p"), message)
}
