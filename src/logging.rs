//! # Structured Logging Module
//!
//! Environment-aware structured logging for the collector service and for
//! tests that want to see broker traffic.

use crate::config::LoggingConfig;
use crate::constants::{BrokerType, QueryStatus};
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// `environment` is the loaded `FeasibilityConfig::environment`. Safe to
/// call more than once; only the first call installs a subscriber.
pub fn init_structured_logging(environment: &str, config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = resolve_filter(config, std::env::var("RUST_LOG").ok(), environment);

        let layer = if config.json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .json()
                .with_filter(EnvFilter::new(filter.clone()))
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(EnvFilter::new(filter.clone()))
                .boxed()
        };

        // Use try_init to avoid panic if global subscriber already set
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            environment = %environment,
            filter = %filter,
            json = config.json,
            "Structured logging initialized"
        );
    });
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Configured level, then `RUST_LOG`, then the environment default
fn resolve_filter(config: &LoggingConfig, rust_log: Option<String>, environment: &str) -> String {
    config
        .level
        .clone()
        .or(rust_log)
        .unwrap_or_else(|| get_log_level(environment))
}

/// Log a query status transition reported by a broker
pub fn log_status_change(
    broker_type: BrokerType,
    broker_query_id: &str,
    site_id: &str,
    status: QueryStatus,
) {
    tracing::info!(
        broker_type = %broker_type,
        broker_query_id = %broker_query_id,
        site_id = %site_id,
        status = %status,
        "query '{}' of broker client with type '{}' to site '{}' changed its status to '{}'",
        broker_query_id,
        broker_type,
        site_id,
        status
    );
}
