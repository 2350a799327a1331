//! Tracing subscriber setup.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LoggingConfig;

/// Filter directives used when `RUST_LOG` is unset: the configured level
/// with sqlx statement noise capped at warn.
fn default_directives(config: &LoggingConfig) -> String {
    format!("{},sqlx=warn", config.level)
}

/// Level filter for the subscriber. `RUST_LOG` wins when set.
fn level_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(config)))
}

/// Installs the global tracing subscriber.
///
/// JSON output flattens event fields and emits span-close events so request
/// spans carry their timing; any other format gets the compact human layout.
pub fn init_logging(config: &LoggingConfig) {
    let registry = tracing_subscriber::registry().with(level_filter(config));

    if config.format == "json" {
        registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_target(true))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_quiets_sqlx() {
        let config = LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        };
        assert_eq!(default_directives(&config), "debug,sqlx=warn");
    }
}
