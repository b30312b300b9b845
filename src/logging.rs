//! Tracing initialization for embedders and the test suite.

use std::sync::Once;

use tracing::Level;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::error::ArkivError;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: Level,
    /// Whether to emit structured JSON output
    pub structured: bool,
    /// Environment filter override (e.g., "arkiv=debug,reqwest=warn")
    pub env_filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            structured: false,
            env_filter: None,
        }
    }
}

static INIT: Once = Once::new();

/// Initialize the global tracing subscriber. Safe to call more than once;
/// only the first call takes effect.
pub fn init_logging(config: LoggingConfig) -> Result<(), ArkivError> {
    INIT.call_once(|| {
        if let Err(e) = setup_tracing(config) {
            eprintln!("Failed to initialize logging: {}", e);
        }
    });
    Ok(())
}

fn setup_tracing(config: LoggingConfig) -> Result<(), ArkivError> {
    let env_filter = if let Some(filter) = config.env_filter {
        EnvFilter::try_new(filter).map_err(|e| ArkivError::Configuration {
            message: format!("invalid log filter: {e}"),
        })?
    } else {
        EnvFilter::from_default_env().add_directive(
            format!("arkiv={}", config.level)
                .parse()
                .map_err(|e| ArkivError::Configuration {
                    message: format!("invalid log directive: {e}"),
                })?,
        )
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(UtcTime::rfc_3339())
        .with_target(true);

    let registry = Registry::default().with(env_filter);
    if config.structured {
        registry.with(fmt_layer.json().with_ansi(false)).init();
    } else {
        registry.with(fmt_layer.with_ansi(true)).init();
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        structured = config.structured,
        "logging initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_plain_info() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert!(!config.structured);
        assert!(config.env_filter.is_none());
    }

    #[test]
    fn init_is_idempotent() {
        let _ = init_logging(LoggingConfig::default());
        let _ = init_logging(LoggingConfig {
            level: Level::DEBUG,
            ..Default::default()
        });
    }
}
