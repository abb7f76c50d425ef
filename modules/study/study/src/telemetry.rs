//! Global `tracing` subscriber setup.

use anyhow::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

/// `RUST_LOG` when set, otherwise the configured directives.
pub fn build_filter(config: &LoggingConfig) -> anyhow::Result<EnvFilter> {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => {
            EnvFilter::try_new(&directives).context("invalid RUST_LOG directives")
        }
        _ => EnvFilter::try_new(&config.level)
            .with_context(|| format!("invalid logging.level '{}'", config.level)),
    }
}

/// Installs the process-wide subscriber. Fails if one is already set.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = build_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Text => registry.with(fmt::layer().with_target(true)).try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init(),
    }
    .context("failed to install tracing subscriber")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_level_is_used_without_rust_log() {
        temp_env::with_var_unset("RUST_LOG", || {
            let config = LoggingConfig {
                level: "warn,study=debug".to_owned(),
                ..LoggingConfig::default()
            };
            let filter = build_filter(&config).unwrap();
            assert!(filter.to_string().contains("study=debug"));
        });
    }

    #[test]
    fn rust_log_takes_precedence() {
        temp_env::with_var("RUST_LOG", Some("study=trace"), || {
            let filter = build_filter(&LoggingConfig::default()).unwrap();
            assert_eq!(filter.to_string(), "study=trace");
        });
    }
}
