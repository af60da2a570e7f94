//! Tracing subscriber setup.

use stackreport_core::config::{Config, keys};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Targets whose verbosity follows `TRANSPORT_LOG_LEVEL`.
const TRANSPORT_TARGETS: [&str; 4] = ["hyper", "reqwest", "aws_smithy_runtime", "aws_config"];

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set. Otherwise the levels come from the configuration,
/// or straight from the environment when the configuration is invalid.
pub fn init(config: Option<&Config>) {
    let defaults = Config::default();
    let (level, transport_level) = match config {
        Some(config) => (config.log_level.clone(), config.transport_log_level.clone()),
        None => (
            env_or(keys::LOG_LEVEL, &defaults.log_level),
            env_or(keys::TRANSPORT_LOG_LEVEL, &defaults.transport_log_level),
        ),
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directives(&level, &transport_level)))
        .unwrap_or_else(|_| {
            EnvFilter::new(directives(&defaults.log_level, &defaults.transport_log_level))
        });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn directives(level: &str, transport_level: &str) -> String {
    let transport_level = normalize(transport_level);
    let mut directives = vec![normalize(level)];
    directives.extend(
        TRANSPORT_TARGETS
            .iter()
            .map(|target| format!("{}={}", target, transport_level)),
    );
    directives.join(",")
}

/// Accept the level names of other logging libraries.
fn normalize(level: &str) -> String {
    match level.trim().to_ascii_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "critical" | "fatal" => "error".to_string(),
        other => other.to_string(),
    }
}
