//! # Structured Logging Module
//!
//! Environment-aware structured logging that outputs to both console and a
//! per-run JSON log file for debugging scheduled batch runs after the fact.

use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::{Arc, OnceLock};

use chrono::Utc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// Console output is human-readable; the file layer under `logs/` is JSON so
/// post-mortem tooling can parse state transitions. Safe to call more than
/// once; later calls are no-ops.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);

        let console_layer = fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_ansi(true)
            .with_filter(EnvFilter::new(log_level.clone()));

        let file_layer = open_log_file(&environment).map(|file| {
            fmt::layer()
                .with_writer(Arc::new(file))
                .with_target(true)
                .with_level(true)
                .with_ansi(false)
                .json()
                .with_filter(EnvFilter::new(log_level))
        });

        let subscriber = tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer);

        // A global subscriber may already be installed (e.g. by a test
        // harness); that is not an error.
        if subscriber.try_init().is_err() {
            tracing::debug!("global tracing subscriber already initialized");
        }
    });
}

/// Create the per-run log file, named by environment, PID and timestamp.
fn open_log_file(environment: &str) -> Option<fs::File> {
    let log_dir = PathBuf::from("logs");
    if fs::create_dir_all(&log_dir).is_err() {
        return None;
    }

    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let log_path = log_dir.join(format!("pipeline.{}.{}.{}.log", environment, process::id(), timestamp));
    fs::File::create(log_path).ok()
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("PIPELINE_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("test"), "debug");
        assert_eq!(get_log_level("unknown"), "debug");
    }
}
