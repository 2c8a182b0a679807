//! Structured logging with tracing
//!
//! Installs the global subscriber and flags slow queries.

use crate::config::{LogFormat, LoggingSettings};
use anyhow::{Context, Result};
use std::time::{Duration, Instant};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Fails if a global
/// subscriber is already installed.
pub fn init_logging(settings: &LoggingSettings) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.level.as_directive()));

    let subscriber = Registry::default().with(env_filter);

    match settings.format {
        LogFormat::Json => subscriber
            .with(fmt::layer().json().with_current_span(true).with_target(true))
            .try_init(),
        LogFormat::Text => subscriber
            .with(fmt::layer().with_target(true).compact())
            .try_init(),
    }
    .context("Failed to install tracing subscriber")?;

    tracing::info!(
        level = settings.level.as_directive(),
        format = ?settings.format,
        "Logging initialized"
    );
    Ok(())
}

/// Logs queries that run for at least a threshold
#[derive(Debug, Clone, Copy)]
pub struct SlowQueryLogger {
    threshold: Option<Duration>,
}

/// Running query started by [`SlowQueryLogger::start`]
#[derive(Debug)]
pub struct QueryTracker {
    start_time: Instant,
}

impl SlowQueryLogger {
    /// Create a logger; a zero threshold disables it
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold: (!threshold.is_zero()).then_some(threshold),
        }
    }

    /// Create a logger from logging settings
    pub fn from_settings(settings: &LoggingSettings) -> Self {
        Self::new(Duration::from_millis(settings.slow_query_threshold_ms))
    }

    /// Start timing a query
    pub fn start(&self) -> QueryTracker {
        QueryTracker {
            start_time: Instant::now(),
        }
    }

    /// Finish timing a query; returns true when it was logged as slow
    pub fn finish(&self, tracker: QueryTracker, bucket: &str, query: &dyn std::fmt::Display) -> bool {
        let threshold = match self.threshold {
            Some(threshold) => threshold,
            None => return false,
        };

        let duration = tracker.start_time.elapsed();
        if duration < threshold {
            return false;
        }

        tracing::warn!(
            target: "slow_query",
            duration_ms = duration.as_millis() as u64,
            bucket,
            query = %query,
            "Slow query detected"
        );
        true
    }
}
