//! Tracing subscriber setup.

use switchyard_types::models::LoggingConfig;
use tracing_subscriber::EnvFilter;

use crate::error::{AppError, AppResult};

/// Install the global fmt subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. A second call keeps
/// the first subscriber and still returns `Ok(())`.
pub fn init_logging(config: &LoggingConfig) -> AppResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| AppError::Config(format!("invalid log level {:?}: {e}", config.level)))?,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .with_target(true)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("Global subscriber already installed");
    }
    Ok(())
}
