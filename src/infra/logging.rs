use tracing_subscriber::EnvFilter;

use crate::infra::{config::LogConfig, error::AppError};

/// Installs the process-wide tracing subscriber from the logging config.
///
/// `RUST_LOG` overrides the configured level. Hosts that install their own
/// subscriber should skip this call; a second initialization fails.
pub fn init(config: &LogConfig) -> Result<(), AppError> {
    let fallback = format!("tradewind_messaging={}", config.level);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&fallback)),
        )
        .with_target(true)
        .try_init()
        .map_err(AppError::LoggingInit)
}
