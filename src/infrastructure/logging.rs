//! Tracing subscriber setup
//!
//! `RUST_LOG` takes precedence over the configured level. The `json` format
//! emits one JSON object per event; anything else uses the pretty printer.

use crate::config::LoggingSettings;
use tracing_subscriber::EnvFilter;

pub const JSON_FORMAT: &str = "json";

/// Filter from `RUST_LOG`, falling back to the configured level
pub fn env_filter(settings: &LoggingSettings) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber; later calls are ignored
pub fn init_tracing(settings: &LoggingSettings) {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter(settings));

    let installed = if settings.format.eq_ignore_ascii_case(JSON_FORMAT) {
        builder.json().with_current_span(false).try_init()
    } else {
        builder.pretty().try_init()
    };

    if let Err(error) = installed {
        tracing::debug!(error = %error, "Tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(level: &str, format: &str) -> LoggingSettings {
        LoggingSettings {
            level: level.to_string(),
            format: format.to_string(),
        }
    }

    #[test]
    fn test_invalid_level_falls_back() {
        // must not panic on garbage directives
        let _ = env_filter(&settings("[[not a directive", "pretty"));
    }

    #[test]
    fn test_init_is_idempotent() {
        init_tracing(&settings("debug", "json"));
        init_tracing(&settings("info", "pretty"));
    }
}
