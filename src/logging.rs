//! Tracing subscriber setup

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LoggerConfig};

/// Build the filter: `RUST_LOG` wins, otherwise the configured level
/// plus request traces from tower-http.
pub fn env_filter(config: &LoggerConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("keel={0},tower_http={0},sqlx=warn", config.level).into())
}

/// Install the global subscriber.
///
/// Returns an error if a global subscriber is already set.
pub fn init(config: &LoggerConfig) -> anyhow::Result<()> {
    let registry = tracing_subscriber::registry().with(env_filter(config));

    match config.format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init()?,
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(false),
            )
            .try_init()?,
    }

    Ok(())
}
