//! # Structured Logging Module
//!
//! Environment-aware structured logging for session lifecycle, units of work and scenario
//! outcomes. Console output by default, JSON lines when `HARNESS_LOG_FORMAT=json`.

use std::sync::OnceLock;

use chrono::Utc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::ConfigManager;
use crate::constants::env as env_vars;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = ConfigManager::detect_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));
        let json = use_json_format();

        let layer = if json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_test_writer()
                .with_filter(filter)
                .boxed()
        };

        // A subscriber may already be installed by the embedding test binary
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            json = json,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

fn use_json_format() -> bool {
    std::env::var(env_vars::LOG_FORMAT)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        "ci" => "info,ephemeral_harness=debug".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log a session lifecycle transition
pub fn log_session_phase(session_id: &str, from: &str, to: &str, details: Option<&str>) {
    tracing::info!(
        session_id = %session_id,
        from = %from,
        to = %to,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "🔄 SESSION_PHASE"
    );
}

/// Log the end of a unit of work
pub fn log_unit_of_work(operation: &str, read_only: bool, managed: usize, status: &str) {
    tracing::debug!(
        operation = %operation,
        read_only = read_only,
        managed_entities = managed,
        status = %status,
        timestamp = %Utc::now().to_rfc3339(),
        "💾 UNIT_OF_WORK"
    );
}

/// Log the outcome of one scenario
pub fn log_scenario_outcome(scenario: &str, status: &str, duration_ms: u64, details: Option<&str>) {
    tracing::info!(
        scenario = %scenario,
        status = %status,
        duration_ms = duration_ms,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "🧪 SCENARIO"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(get_log_level("test"), "debug");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("ci"), "info,ephemeral_harness=debug");
    }

    #[test]
    fn test_init_is_idempotent() {
        init_structured_logging();
        init_structured_logging();
        log_scenario_outcome("noop", "passed", 0, None);
    }
}
