//! Structured logging setup.
//!
//! The first call installs a global `tracing` subscriber; later calls are no-ops.
//! `RUST_LOG` takes precedence over the configured level when set.

use crate::config::LoggingConfig;
use crate::error::{ProtocolError, Result};
use once_cell::sync::OnceCell;
use std::io;
use tracing::Subscriber;
use tracing_subscriber::{fmt, EnvFilter};

static LOGGING: OnceCell<()> = OnceCell::new();

/// Install the global subscriber described by `config`
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    LOGGING
        .get_or_try_init(|| install(config))
        .map(|_| ())
}

/// Filter expression used when `RUST_LOG` is not set
pub fn default_filter(config: &LoggingConfig) -> String {
    let level = config.log_level.to_string().to_lowercase();
    let crate_target = env!("CARGO_PKG_NAME").replace('-', "_");
    format!("{level},{crate_target}={level}")
}

fn install(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter(config))
            .map_err(|e| ProtocolError::ConfigError(format!("invalid log filter: {e}")))?,
    };

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .with_writer(io::stderr);

    let subscriber: Box<dyn Subscriber + Send + Sync> = if config.json_format {
        Box::new(builder.json().flatten_event(true).finish())
    } else {
        Box::new(builder.compact().finish())
    };

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| ProtocolError::ConfigError(format!("failed to install subscriber: {e}")))?;
    tracing::info!(app = %config.app_name, json = config.json_format, "Logging initialized");
    Ok(())
}
