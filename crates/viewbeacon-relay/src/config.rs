//! Relay configuration loading from file and environment variables.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use viewbeacon_observe::{GateConfig, RouterConfig, DEFAULT_LOG_SERVER};
use viewbeacon_types::AdEventType;

/// Top-level relay configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Beacon and debounce settings.
    #[serde(default)]
    pub relay: RelaySettings,

    /// Event log replay settings.
    #[serde(default)]
    pub replay: ReplaySettings,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings for the router and the outbound beacons.
#[derive(Debug, Clone, Deserialize)]
pub struct RelaySettings {
    /// Base URL that serialized query strings are appended to.
    #[serde(default = "default_log_server")]
    pub log_server: String,

    /// Vendor key bound to the session observer.
    #[serde(default = "default_vendor_key")]
    pub vendor_key: String,

    /// Version string the replayed SDK reports.
    #[serde(default = "default_sdk_version")]
    pub sdk_version: String,

    /// How long visibility must hold before a geometry event is reported.
    #[serde(default = "default_confirm_delay_ms")]
    pub confirm_delay_ms: u64,

    /// Minimum `percentageInView` for a geometry event to qualify.
    #[serde(default = "default_visibility_threshold")]
    pub visibility_threshold: f64,

    /// Timeout for a single beacon request, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Ad-event categories to subscribe to. Empty means all of them.
    #[serde(default)]
    pub categories: Vec<String>,
}

/// Settings for the NDJSON event log replay.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplaySettings {
    /// Path of the event log. Reads stdin when unset.
    #[serde(default)]
    pub input: Option<String>,

    /// Sleep between events by the gap between their timestamps. Each pause
    /// is capped at `replay::MAX_REPLAY_GAP` (30 s).
    #[serde(default = "default_true")]
    pub honor_timestamps: bool,

    /// Whether the replayed SDK reports measurement as supported.
    #[serde(default = "default_true")]
    pub supported: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "viewbeacon_observe=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_log_server() -> String {
    DEFAULT_LOG_SERVER.to_string()
}

fn default_vendor_key() -> String {
    "viewbeacon".to_string()
}

fn default_sdk_version() -> String {
    concat!("viewbeacon-replay/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_confirm_delay_ms() -> u64 {
    1000
}

fn default_visibility_threshold() -> f64 {
    50.0
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            log_server: default_log_server(),
            vendor_key: default_vendor_key(),
            sdk_version: default_sdk_version(),
            confirm_delay_ms: default_confirm_delay_ms(),
            visibility_threshold: default_visibility_threshold(),
            request_timeout_ms: default_request_timeout_ms(),
            categories: Vec::new(),
        }
    }
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            input: None,
            honor_timestamps: true,
            supported: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// The log server is not an absolute URL.
    #[error("invalid log server URL {url:?}: {source}")]
    InvalidLogServer {
        /// The configured value.
        url: String,
        /// Why it failed to parse.
        source: url::ParseError,
    },

    /// A listed category is not a known ad-event type.
    #[error("unknown ad event category in config: {0}")]
    UnknownCategory(String),
}

impl RelaySettings {
    /// Builds the router settings, validating the log server URL and the
    /// category names.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the URL does not parse or a category is unknown.
    pub fn router_config(&self) -> Result<RouterConfig, ConfigError> {
        url::Url::parse(&self.log_server).map_err(|source| ConfigError::InvalidLogServer {
            url: self.log_server.clone(),
            source,
        })?;

        let categories = if self.categories.is_empty() {
            AdEventType::ALL.to_vec()
        } else {
            self.categories
                .iter()
                .map(|name| {
                    name.parse::<AdEventType>()
                        .map_err(|e| ConfigError::UnknownCategory(e.0))
                })
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(RouterConfig {
            log_server: self.log_server.clone(),
            gate: GateConfig {
                threshold: self.visibility_threshold,
                confirm_delay: Duration::from_millis(self.confirm_delay_ms),
            },
            categories,
        })
    }
}

/// Config file used when neither the command line nor the environment
/// names one.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Environment variable naming the config file.
pub const CONFIG_PATH_VAR: &str = "VIEWBEACON_CONFIG_PATH";

/// Where the config file path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// First command-line argument.
    CliArg,
    /// The `VIEWBEACON_CONFIG_PATH` variable.
    EnvVar,
    /// [`DEFAULT_CONFIG_PATH`].
    Default,
}

impl ConfigSource {
    /// Label used in startup logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CliArg => "cli-arg",
            Self::EnvVar => "env-var",
            Self::Default => "default",
        }
    }
}

/// Picks the config file from `args` (program name already skipped), then
/// `env` lookups of [`CONFIG_PATH_VAR`], then [`DEFAULT_CONFIG_PATH`].
/// Blank values are ignored.
pub fn resolve_config_path<I, F>(args: I, env: F) -> (String, ConfigSource)
where
    I: IntoIterator<Item = String>,
    F: Fn(&str) -> Option<String>,
{
    let present = |value: &String| !value.trim().is_empty();

    if let Some(path) = args.into_iter().next().filter(present) {
        return (path, ConfigSource::CliArg);
    }
    if let Some(path) = env(CONFIG_PATH_VAR).filter(present) {
        return (path, ConfigSource::EnvVar);
    }
    (DEFAULT_CONFIG_PATH.to_string(), ConfigSource::Default)
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `VIEWBEACON_LOG_SERVER` overrides `relay.log_server`
/// - `VIEWBEACON_VENDOR_KEY` overrides `relay.vendor_key`
/// - `VIEWBEACON_CONFIRM_DELAY_MS` overrides `relay.confirm_delay_ms`
/// - `VIEWBEACON_THRESHOLD` overrides `relay.visibility_threshold`
/// - `VIEWBEACON_INPUT` overrides `replay.input`
/// - `VIEWBEACON_LOG_LEVEL` overrides `logging.level`
/// - `VIEWBEACON_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    // Environment variable overrides
    if let Ok(log_server) = std::env::var("VIEWBEACON_LOG_SERVER") {
        config.relay.log_server = log_server;
    }
    if let Ok(vendor_key) = std::env::var("VIEWBEACON_VENDOR_KEY") {
        config.relay.vendor_key = vendor_key;
    }
    if let Ok(delay) = std::env::var("VIEWBEACON_CONFIRM_DELAY_MS") {
        if let Ok(parsed) = delay.parse() {
            config.relay.confirm_delay_ms = parsed;
        }
    }
    if let Ok(threshold) = std::env::var("VIEWBEACON_THRESHOLD") {
        if let Ok(parsed) = threshold.parse() {
            config.relay.visibility_threshold = parsed;
        }
    }
    if let Ok(input) = std::env::var("VIEWBEACON_INPUT") {
        if !input.trim().is_empty() {
            config.replay.input = Some(input);
        }
    }
    if let Ok(level) = std::env::var("VIEWBEACON_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("VIEWBEACON_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    Ok(config)
}
