//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global tracing subscriber for the binary
//! - Configure log level from the environment or the config file
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Compact format for terminals, pretty format for step-by-step debugging
//! - `RUST_LOG` wins over the configured level
//! - The library never installs a subscriber itself

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::schema::{LogFormat, LoggingConfig};

/// Build the filter: `RUST_LOG` when set and valid, else the configured level.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let registry = tracing_subscriber::registry().with(env_filter(config));
    match config.format {
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
    }
}
