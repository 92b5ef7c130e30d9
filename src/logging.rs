//! # Structured Logging Module
//!
//! Environment-aware structured logging: human-readable console output in
//! development and test, JSON lines in production.

use crate::config::DedupConfig;
use crate::idempotent::{ExecutionPhase, IdempotentStrategy};
use chrono::Utc;
use std::sync::OnceLock;
use std::time::Duration;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging from configuration
///
/// `RUST_LOG` wins over `config.log_level` when set. Safe to call more
/// than once; only the first call installs a subscriber.
pub fn init_structured_logging(config: &DedupConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(log_level(config)));

        let layer = if config.is_production() {
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
                .with_level(true)
                .with_ansi(true)
                .compact()
                .with_filter(filter)
                .boxed()
        };

        // Another subscriber (an embedding application's) may already be set
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            environment = %config.environment,
            backend = %config.store.backend,
            "STRUCTURED LOGGING: Initialized"
        );
    });
}

fn log_level(config: &DedupConfig) -> String {
    if !config.log_level.trim().is_empty() {
        return config.log_level.clone();
    }
    match config.environment.as_str() {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log one completed protected call
pub fn log_idempotent_operation(
    strategy: IdempotentStrategy,
    key: &str,
    outcome: ExecutionPhase,
    duration: Duration,
) {
    tracing::info!(
        strategy = %strategy,
        key = %key,
        outcome = %outcome,
        duration_ms = duration.as_millis() as u64,
        timestamp = %Utc::now().to_rfc3339(),
        "IDEMPOTENT_OPERATION"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_falls_back_to_environment() {
        let mut config = DedupConfig::default();
        config.log_level = String::new();
        config.environment = "production".to_string();
        assert_eq!(log_level(&config), "info");
        config.environment = "test".to_string();
        assert_eq!(log_level(&config), "debug");
        config.log_level = "warn".to_string();
        assert_eq!(log_level(&config), "warn");
    }

    #[test]
    fn test_init_is_idempotent() {
        let config = DedupConfig::for_tests();
        init_structured_logging(&config);
        init_structured_logging(&config);
        log_idempotent_operation(
            IdempotentStrategy::Param,
            "k",
            ExecutionPhase::Commit,
            Duration::from_millis(3),
        );
    }
}
