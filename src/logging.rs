//! # Tracing Module
//!
//! Environment-aware console logging using the tracing ecosystem. Logs go to
//! stdout, which suits both a foreground CLI and a containerized daemon.
//!
//! Level resolution, first match wins:
//!
//! 1. `RUST_LOG`
//! 2. the explicit level passed to [`init_tracing`] (the CLI `--log-level`)
//! 3. the environment default (`DYNAMIC_BATCHER_ENV` / `APP_ENV`):
//!    `debug` for development and test, `info` for production

use std::io::IsTerminal;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static TRACING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Output format of the console layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Initialize console tracing once per process
///
/// Safe to call repeatedly; a global subscriber installed elsewhere (for
/// instance by a test harness) is left in place.
pub fn init_tracing(level: Option<&str>, format: LogFormat) {
    TRACING_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = build_filter(level, &environment);
        let use_ansi = IsTerminal::is_terminal(&std::io::stdout());

        let console_layer = match format {
            LogFormat::Text => fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(use_ansi)
                .with_filter(filter)
                .boxed(),
            LogFormat::Json => fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_filter(filter)
                .boxed(),
        };

        let subscriber = tracing_subscriber::registry().with(console_layer);

        if subscriber.try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        } else {
            tracing::info!(
                environment = %environment,
                ansi_colors = use_ansi,
                format = ?format,
                "Console logging initialized"
            );
        }
    });
}

fn build_filter(level: Option<&str>, environment: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let directive = level
        .map(normalize_level)
        .unwrap_or_else(|| get_log_level(environment).to_string());
    EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Accept upper-case and syslog-style level names (`INFO`, `WARNING`, ...)
fn normalize_level(level: &str) -> String {
    match level.trim().to_ascii_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "critical" | "fatal" => "error".to_string(),
        other => other.to_string(),
    }
}

fn get_environment() -> String {
    std::env::var("DYNAMIC_BATCHER_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_level() {
        assert_eq!(normalize_level("INFO"), "info");
        assert_eq!(normalize_level("WARNING"), "warn");
        assert_eq!(normalize_level("critical"), "error");
        assert_eq!(normalize_level("dynamic_batcher=trace"), "dynamic_batcher=trace");
    }

    #[test]
    fn test_environment_levels() {
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("test"), "debug");
    }

    #[test]
    fn test_init_is_idempotent() {
        init_tracing(Some("debug"), LogFormat::Text);
        init_tracing(Some("info"), LogFormat::Json);
    }
}
