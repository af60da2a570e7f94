//! Environment and TOML parsing for [`Config`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use super::{Config, DeliverySettings, EndpointSettings, PollSettings, TrackerSettings};

/// Environment variable names understood by the reporter.
pub mod keys {
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
    pub const TRANSPORT_LOG_LEVEL: &str = "TRANSPORT_LOG_LEVEL";
    pub const ENDPOINT_TYPE: &str = "ENDPOINT_TYPE";
    pub const ENDPOINT_URL: &str = "ENDPOINT_URL";
    pub const STACK_ID: &str = "STACK_ID";
    pub const REGION: &str = "REGION";
    pub const AWS_ACCOUNT_ID: &str = "AWS_ACCOUNT_ID";
    pub const END_USER_EMAIL_DOMAIN: &str = "END_USER_EMAIL_DOMAIN";
    pub const JIRA_ENABLED: &str = "JIRA_ENABLED";
    pub const JIRA_CLOUD_URL: &str = "JIRA_CLOUD_URL";
    pub const JIRA_AUTH_EMAIL: &str = "JIRA_AUTH_EMAIL";
    pub const JIRA_API_TOKEN: &str = "JIRA_API_TOKEN";
    pub const JIRA_PROJECT_KEY: &str = "JIRA_PROJECT_KEY";
    pub const JIRA_DEFAULT_LABELS: &str = "JIRA_DEFAULT_LABELS";
    pub const POLL_INTERVAL_SECONDS: &str = "POLL_INTERVAL_SECONDS";
    pub const POLL_MAX_ATTEMPTS: &str = "POLL_MAX_ATTEMPTS";
    pub const POLL_DEADLINE_SECONDS: &str = "POLL_DEADLINE_SECONDS";
    pub const DELIVERY_MAX_ATTEMPTS: &str = "DELIVERY_MAX_ATTEMPTS";
    pub const HTTP_TIMEOUT_SECONDS: &str = "HTTP_TIMEOUT_SECONDS";
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("{key} is required when JIRA_ENABLED is set")]
    MissingTrackerSetting { key: &'static str },

    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}

/// Build a [`Config`] from a key lookup. Empty values count as unset.
pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let defaults = Config::default();

    let poll = PollSettings {
        interval: parse_interval(keys::POLL_INTERVAL_SECONDS, get(keys::POLL_INTERVAL_SECONDS))?
            .unwrap_or(defaults.poll.interval),
        max_attempts: parse_number(keys::POLL_MAX_ATTEMPTS, get(keys::POLL_MAX_ATTEMPTS))?,
        deadline: parse_seconds(keys::POLL_DEADLINE_SECONDS, get(keys::POLL_DEADLINE_SECONDS))?,
    };

    let delivery = DeliverySettings {
        max_attempts: parse_number(keys::DELIVERY_MAX_ATTEMPTS, get(keys::DELIVERY_MAX_ATTEMPTS))?
            .unwrap_or(defaults.delivery.max_attempts)
            .max(1),
        timeout: parse_interval(keys::HTTP_TIMEOUT_SECONDS, get(keys::HTTP_TIMEOUT_SECONDS))?
            .unwrap_or(defaults.delivery.timeout),
    };

    let tracker_enabled = match get(keys::JIRA_ENABLED) {
        Some(value) => parse_bool(keys::JIRA_ENABLED, &value)?,
        None => false,
    };
    let tracker = if tracker_enabled {
        Some(tracker_settings(&get)?)
    } else {
        None
    };

    Ok(Config {
        stack_id: get(keys::STACK_ID).unwrap_or_default(),
        region: get(keys::REGION).unwrap_or_default(),
        account_id: get(keys::AWS_ACCOUNT_ID).unwrap_or_default(),
        endpoint: EndpointSettings {
            kind: get(keys::ENDPOINT_TYPE),
            url: get(keys::ENDPOINT_URL),
        },
        fallback_email_domain: get(keys::END_USER_EMAIL_DOMAIN).unwrap_or_default(),
        tracker,
        log_level: get(keys::LOG_LEVEL)
            .map(|v| v.to_lowercase())
            .unwrap_or(defaults.log_level),
        transport_log_level: get(keys::TRANSPORT_LOG_LEVEL)
            .map(|v| v.to_lowercase())
            .unwrap_or(defaults.transport_log_level),
        poll,
        delivery,
    })
}

fn tracker_settings<G>(get: &G) -> Result<TrackerSettings, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let required = |key: &'static str| get(key).ok_or(ConfigError::MissingTrackerSetting { key });

    let raw_url = required(keys::JIRA_CLOUD_URL)?;
    let cloud_url = Url::parse(&raw_url).map_err(|e| ConfigError::InvalidValue {
        key: keys::JIRA_CLOUD_URL,
        value: raw_url.clone(),
        reason: e.to_string(),
    })?;

    let auth_email = required(keys::JIRA_AUTH_EMAIL)?;
    if !auth_email.contains('@') {
        return Err(ConfigError::InvalidValue {
            key: keys::JIRA_AUTH_EMAIL,
            value: auth_email,
            reason: "not an email address".to_string(),
        });
    }

    let default_labels = get(keys::JIRA_DEFAULT_LABELS)
        .map(|labels| {
            labels
                .split(',')
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    Ok(TrackerSettings {
        cloud_url,
        auth_email,
        api_token: required(keys::JIRA_API_TOKEN)?,
        project_key: required(keys::JIRA_PROJECT_KEY)?,
        default_labels,
    })
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

fn parse_number(key: &'static str, value: Option<String>) -> Result<Option<u32>, ConfigError> {
    value
        .map(|v| {
            v.parse::<u32>().map_err(|e| ConfigError::InvalidValue {
                key,
                value: v.clone(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn parse_seconds(key: &'static str, value: Option<String>) -> Result<Option<Duration>, ConfigError> {
    Ok(parse_number(key, value)?.map(|secs| Duration::from_secs(u64::from(secs))))
}

/// Like [`parse_seconds`], but zero is rejected.
fn parse_interval(key: &'static str, value: Option<String>) -> Result<Option<Duration>, ConfigError> {
    match parse_seconds(key, value)? {
        Some(duration) if duration.is_zero() => Err(ConfigError::InvalidValue {
            key,
            value: "0".to_string(),
            reason: "must be at least 1 second".to_string(),
        }),
        other => Ok(other),
    }
}

/// On-disk layout of a local configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    stack_id: Option<String>,
    region: Option<String>,
    account_id: Option<String>,
    endpoint_type: Option<String>,
    endpoint_url: Option<String>,
    end_user_email_domain: Option<String>,
    log_level: Option<String>,
    transport_log_level: Option<String>,
    #[serde(default)]
    poll: PollSection,
    #[serde(default)]
    delivery: DeliverySection,
    #[serde(default)]
    jira: JiraSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PollSection {
    interval_seconds: Option<u32>,
    max_attempts: Option<u32>,
    deadline_seconds: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeliverySection {
    max_attempts: Option<u32>,
    timeout_seconds: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct JiraSection {
    enabled: Option<bool>,
    cloud_url: Option<String>,
    auth_email: Option<String>,
    api_token: Option<String>,
    project_key: Option<String>,
    #[serde(default)]
    default_labels: Vec<String>,
}

/// Read a TOML config file and flatten it into environment-style keys.
pub fn read_file_values(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_file_values(&content).map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

fn parse_file_values(content: &str) -> Result<HashMap<String, String>, String> {
    let file: ConfigFile = toml::from_str(content).map_err(|e| enhance_toml_error(e, content))?;

    let mut values = HashMap::new();
    let mut put = |key: &str, value: Option<String>| {
        if let Some(value) = value {
            values.insert(key.to_string(), value);
        }
    };

    put(keys::STACK_ID, file.stack_id);
    put(keys::REGION, file.region);
    put(keys::AWS_ACCOUNT_ID, file.account_id);
    put(keys::ENDPOINT_TYPE, file.endpoint_type);
    put(keys::ENDPOINT_URL, file.endpoint_url);
    put(keys::END_USER_EMAIL_DOMAIN, file.end_user_email_domain);
    put(keys::LOG_LEVEL, file.log_level);
    put(keys::TRANSPORT_LOG_LEVEL, file.transport_log_level);
    put(keys::POLL_INTERVAL_SECONDS, file.poll.interval_seconds.map(|v| v.to_string()));
    put(keys::POLL_MAX_ATTEMPTS, file.poll.max_attempts.map(|v| v.to_string()));
    put(keys::POLL_DEADLINE_SECONDS, file.poll.deadline_seconds.map(|v| v.to_string()));
    put(keys::DELIVERY_MAX_ATTEMPTS, file.delivery.max_attempts.map(|v| v.to_string()));
    put(keys::HTTP_TIMEOUT_SECONDS, file.delivery.timeout_seconds.map(|v| v.to_string()));
    put(keys::JIRA_ENABLED, file.jira.enabled.map(|v| v.to_string()));
    put(keys::JIRA_CLOUD_URL, file.jira.cloud_url);
    put(keys::JIRA_AUTH_EMAIL, file.jira.auth_email);
    put(keys::JIRA_API_TOKEN, file.jira.api_token);
    put(keys::JIRA_PROJECT_KEY, file.jira.project_key);
    if !file.jira.default_labels.is_empty() {
        put(keys::JIRA_DEFAULT_LABELS, Some(file.jira.default_labels.join(",")));
    }

    Ok(values)
}

/// Add the offending line to a TOML error when the message names one.
fn enhance_toml_error(error: toml::de::Error, content: &str) -> String {
    let error_msg = error.to_string();

    let line_hint = error_msg
        .lines()
        .find(|line| line.contains("line "))
        .and_then(|line| {
            line.split("line ")
                .nth(1)
                .and_then(|s| s.split_whitespace().next())
                .and_then(|s| s.parse::<usize>().ok())
        });

    match line_hint.and_then(|n| content.lines().nth(n.saturating_sub(1)).map(|l| (n, l))) {
        Some((line_num, line)) => format!("line {}: `{}`: {}", line_num, line.trim(), error_msg),
        None => error_msg,
    }
}
