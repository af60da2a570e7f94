//! Invocation configuration.
//!
//! Everything the reporter needs is read once at startup into an immutable
//! [`Config`]. Values come from the process environment, optionally layered
//! over a TOML file for local runs (see [`parser`]).

pub mod parser;

use std::path::Path;
use std::time::Duration;

use url::Url;

pub use parser::{ConfigError, keys};

/// Default pause between two describe rounds of the readiness poller.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default number of webhook attempts before a transport error is final.
pub const DEFAULT_DELIVERY_ATTEMPTS: u32 = 3;

/// Default per-request HTTP timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Fully validated configuration for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Parent stack whose nested stacks are awaited.
    pub stack_id: String,
    pub region: String,
    pub account_id: String,
    pub endpoint: EndpointSettings,
    /// Domain used when neither organizations nor alternate contacts yield one.
    pub fallback_email_domain: String,
    /// Present only when the tracker is enabled.
    pub tracker: Option<TrackerSettings>,
    pub log_level: String,
    pub transport_log_level: String,
    pub poll: PollSettings,
    pub delivery: DeliverySettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stack_id: String::new(),
            region: String::new(),
            account_id: String::new(),
            endpoint: EndpointSettings::default(),
            fallback_email_domain: String::new(),
            tracker: None,
            log_level: "info".to_string(),
            transport_log_level: "warn".to_string(),
            poll: PollSettings::default(),
            delivery: DeliverySettings::default(),
        }
    }
}

impl Config {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        parser::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// Keys are the environment variable names listed in [`keys`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        parser::from_lookup(lookup)
    }

    /// Load a TOML file and overlay the process environment on top of it.
    pub fn from_file_and_env(path: &Path) -> Result<Self, ConfigError> {
        Self::from_file_and_lookup(path, |key| std::env::var(key).ok())
    }

    /// Load a TOML file and overlay `lookup` on top of it. Blank overrides
    /// leave the file value in place.
    pub fn from_file_and_lookup<F>(path: &Path, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = parser::read_file_values(path)?;
        parser::from_lookup(|key| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .or_else(|| file.get(key).cloned())
        })
    }

    pub fn tracker_enabled(&self) -> bool {
        self.tracker.is_some()
    }
}

/// Raw webhook endpoint settings.
///
/// Both values are kept unvalidated here; the delivery gate decides whether
/// they describe a usable destination so that a bad endpoint is reported back
/// to the orchestrator instead of aborting startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointSettings {
    pub kind: Option<String>,
    pub url: Option<String>,
}

/// Jira Cloud connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerSettings {
    pub cloud_url: Url,
    pub auth_email: String,
    pub api_token: String,
    pub project_key: String,
    pub default_labels: Vec<String>,
}

/// Budget for the readiness poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_attempts: Option<u32>,
    pub deadline: Option<Duration>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: None,
            deadline: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliverySettings {
    pub max_attempts: u32,
    pub timeout: Duration,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_DELIVERY_ATTEMPTS,
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}
