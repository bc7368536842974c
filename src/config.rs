//! Configuration types for netrias-client
//!
//! [`Settings`] is an immutable snapshot. A client never edits it in place:
//! [`Settings::apply`] validates a [`ConfigUpdate`] and builds a brand-new
//! snapshot, which the client then publishes in a single assignment.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, time::Duration};
use tracing::level_filters::LevelFilter;
use url::Url;

/// Default service endpoint for harmonization jobs
pub const DEFAULT_HARMONIZATION_URL: &str = "https://api.netriasbdf.cloud";

/// Log verbosity of a client instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Only the most severe errors (maps to `tracing` ERROR)
    Critical,
    /// Errors
    Error,
    /// Warnings and errors
    Warning,
    /// Progress information (default)
    #[default]
    Info,
    /// Everything, including per-request details
    Debug,
}

impl LogLevel {
    /// The `tracing` filter this level lets through
    pub fn level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Critical | LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
        }
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "CRITICAL" => Ok(LogLevel::Critical),
            "ERROR" => Ok(LogLevel::Error),
            "WARNING" | "WARN" => Ok(LogLevel::Warning),
            "INFO" => Ok(LogLevel::Info),
            "DEBUG" => Ok(LogLevel::Debug),
            _ => Err(Error::config(
                "log_level",
                format!("unsupported log_level: {value}"),
            )),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Critical => "CRITICAL",
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARNING",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        })
    }
}

/// Routing flags for calling the recommendation function directly instead of
/// going through the API gateway
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayBypass {
    /// Whether the bypass is enabled (default: false)
    #[serde(default)]
    pub enabled: bool,

    /// Function name (default: "cde-recommendation")
    #[serde(default = "default_bypass_function")]
    pub function: String,

    /// Function alias (default: "prod")
    #[serde(default = "default_bypass_alias")]
    pub alias: String,

    /// Cloud region (default: "us-east-2")
    #[serde(default = "default_bypass_region")]
    pub region: String,

    /// Named credentials profile, if any
    #[serde(default)]
    pub profile: Option<String>,
}

impl Default for GatewayBypass {
    fn default() -> Self {
        Self {
            enabled: false,
            function: default_bypass_function(),
            alias: default_bypass_alias(),
            region: default_bypass_region(),
            profile: None,
        }
    }
}

impl GatewayBypass {
    /// Trim identifiers, falling back to defaults for blank values
    fn normalized(self) -> Self {
        Self {
            enabled: self.enabled,
            function: identifier_or(self.function, default_bypass_function),
            alias: identifier_or(self.alias, default_bypass_alias),
            region: identifier_or(self.region, default_bypass_region),
            profile: self
                .profile
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
        }
    }
}

/// Immutable configuration snapshot for one client instance
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Bearer credential attached to submit and status requests
    pub api_key: String,

    /// Base URL of the harmonization service
    #[serde(default = "default_harmonization_url")]
    pub harmonization_url: Url,

    /// Overall job budget and per-request timeout (default: 6 hours)
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Interval between status polls (default: 3 seconds)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// Log verbosity (default: INFO)
    #[serde(default)]
    pub log_level: LogLevel,

    /// Optional gateway bypass routing
    #[serde(default)]
    pub gateway_bypass: GatewayBypass,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &"<redacted>")
            .field("harmonization_url", &self.harmonization_url.as_str())
            .field("timeout", &self.timeout)
            .field("poll_interval", &self.poll_interval)
            .field("log_level", &self.log_level)
            .field("gateway_bypass", &self.gateway_bypass)
            .finish()
    }
}

impl Settings {
    /// Create settings with the given credential and defaults for everything else
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            api_key: validated_api_key(&api_key.into())?,
            harmonization_url: default_harmonization_url(),
            timeout: default_timeout(),
            poll_interval: default_poll_interval(),
            log_level: LogLevel::default(),
            gateway_bypass: GatewayBypass::default(),
        })
    }

    /// Build a new snapshot from this one plus `update`
    ///
    /// Only the fields present in `update` are validated; the others are copied
    /// unchanged. On error nothing is returned, so the caller's current snapshot
    /// stays in effect.
    pub fn apply(&self, update: &ConfigUpdate) -> Result<Self> {
        let mut next = self.clone();

        if let Some(key) = &update.api_key {
            next.api_key = validated_api_key(key)?;
        }
        if let Some(url) = &update.harmonization_url {
            next.harmonization_url = validated_url(url)?;
        }
        if let Some(timeout) = update.timeout {
            next.timeout = validated_positive("timeout", timeout)?;
        }
        if let Some(interval) = update.poll_interval {
            next.poll_interval = validated_positive("poll_interval", interval)?;
        }
        if let Some(level) = &update.log_level {
            next.log_level = level.parse()?;
        }
        if let Some(bypass) = &update.gateway_bypass {
            next.gateway_bypass = bypass.clone().normalized();
        }

        Ok(next)
    }

    /// Full URL of the job submission endpoint
    pub fn submit_url(&self) -> String {
        format!("{}/v1/jobs/harmonize", self.base())
    }

    /// Full URL of the status endpoint for `job_id`
    pub fn status_url(&self, job_id: &str) -> String {
        format!("{}/v1/jobs/{}", self.base(), job_id)
    }

    fn base(&self) -> &str {
        self.harmonization_url.as_str().trim_end_matches('/')
    }
}

/// Incremental configuration update
///
/// Every field is optional; `None` keeps the current value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigUpdate {
    /// New credential
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// New service endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub harmonization_url: Option<String>,

    /// New job budget / request timeout
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "optional_duration_serde"
    )]
    pub timeout: Option<Duration>,

    /// New poll interval
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "optional_duration_serde"
    )]
    pub poll_interval: Option<Duration>,

    /// New log level ("CRITICAL", "ERROR", "WARNING", "INFO" or "DEBUG")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// New gateway bypass flags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_bypass: Option<GatewayBypass>,
}

fn validated_api_key(key: &str) -> Result<String> {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return Err(Error::config(
            "api_key",
            "api_key must be a non-empty string",
        ));
    }
    Ok(trimmed.to_string())
}

fn validated_url(value: &str) -> Result<Url> {
    let invalid = || {
        Error::config(
            "harmonization_url",
            format!("harmonization_url must be an absolute http(s) URL: {value}"),
        )
    };
    let url = Url::parse(value.trim()).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(invalid());
    }
    Ok(url)
}

fn validated_positive(key: &str, value: Duration) -> Result<Duration> {
    if value.is_zero() {
        return Err(Error::config(key, format!("{key} must be positive")));
    }
    Ok(value)
}

fn identifier_or(value: String, default: fn() -> String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        default()
    } else {
        trimmed.to_string()
    }
}

// The constant is a valid absolute URL
#[allow(clippy::expect_used)]
fn default_harmonization_url() -> Url {
    Url::parse(DEFAULT_HARMONIZATION_URL).expect("default harmonization URL is valid")
}

fn default_timeout() -> Duration {
    Duration::from_secs(6 * 60 * 60)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(3)
}

fn default_bypass_function() -> String {
    "cde-recommendation".to_string()
}

fn default_bypass_alias() -> String {
    "prod".to_string()
}

fn default_bypass_region() -> String {
    "us-east-2".to_string()
}

// Durations are written as (fractional) seconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<f64>::deserialize(deserializer)?;
        secs.map(|s| Duration::try_from_secs_f64(s).map_err(D::Error::custom))
            .transpose()
    }
}
