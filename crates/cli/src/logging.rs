//! Structured logging setup.
//!
//! Log lines go to stderr so that stdout carries only command output.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingSection};

/// Environment variable overriding the configured log filter.
pub(crate) const LOG_ENV: &str = "ORDERFLOW_LOG";

const DEFAULT_FILTER: &str = "warn";

/// Pick the filter directive: environment first, then config, then `warn`.
fn resolve_filter(env: Option<String>, configured: Option<&str>) -> String {
    env.filter(|v| !v.trim().is_empty())
        .or_else(|| configured.map(str::to_string))
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Install the global subscriber.
pub(crate) fn init_logging(config: &LoggingSection) -> Result<(), String> {
    let directive = resolve_filter(std::env::var(LOG_ENV).ok(), config.filter.as_deref());
    let filter = EnvFilter::try_new(&directive)
        .map_err(|e| format!("invalid log filter '{}': {}", directive, e))?;

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.format {
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    installed.map_err(|e| format!("could not install log subscriber: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_wins_over_config() {
        assert_eq!(
            resolve_filter(Some("debug".into()), Some("info")),
            "debug"
        );
    }

    #[test]
    fn config_used_when_env_unset_or_blank() {
        assert_eq!(resolve_filter(None, Some("info")), "info");
        assert_eq!(resolve_filter(Some("  ".into()), Some("info")), "info");
    }

    #[test]
    fn defaults_to_warn() {
        assert_eq!(resolve_filter(None, None), "warn");
    }
}
