//! Tracing initialization for the trade bot.
//!
//! [`init_tracing`] configures structured logging in one of two modes:
//! - **JSON mode** (`json = true`): machine-readable output with nanosecond
//!   timestamps, suitable for log aggregation.
//! - **Pretty mode** (`json = false`): human-readable colored output for
//!   local runs.
//!
//! Both modes respect the `RUST_LOG` environment variable for filtering
//! (e.g., `RUST_LOG=tb_ledger=debug,tb_trading=info`).

use std::fmt;

use anyhow::{anyhow, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// Returns an error if a global subscriber is already installed.
///
/// # Examples
///
/// ```
/// tb_core::logging::init_tracing(false).unwrap();
/// ```
pub fn init_tracing(json: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if json {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_timer(NanosecondTimer)
            .with_target(true)
            .with_thread_names(true);

        registry.with(json_layer).try_init()
    } else {
        let pretty_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_names(true);

        registry.with(pretty_layer).try_init()
    };

    installed.map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}

/// Emits RFC 3339 UTC timestamps with nanosecond precision.
#[derive(Debug, Clone)]
struct NanosecondTimer;

impl tracing_subscriber::fmt::time::FormatTime for NanosecondTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> fmt::Result {
        write!(w, "{}", format_timestamp(chrono::Utc::now()))
    }
}

fn format_timestamp(now: chrono::DateTime<chrono::Utc>) -> String {
    now.format("%Y-%m-%dT%H:%M:%S%.9fZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_has_nanosecond_precision() {
        let ts = chrono::Utc
            .timestamp_opt(1_706_000_000, 123_456_789)
            .single()
            .unwrap();
        assert_eq!(format_timestamp(ts), "2024-01-23T08:53:20.123456789Z");
    }

    #[test]
    fn test_second_init_is_rejected() {
        assert!(init_tracing(false).is_ok());
        assert!(init_tracing(true).is_err());
    }
}
