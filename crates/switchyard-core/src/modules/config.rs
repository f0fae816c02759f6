//! Gateway configuration file loading.

use std::fs;
use std::path::Path;
use validator::Validate;

use crate::error::{AppError, AppResult};
use switchyard_types::GatewayConfig;

pub const DATABASE_URL_ENV: &str = "SWITCHYARD_DATABASE_URL";
pub const LOG_LEVEL_ENV: &str = "SWITCHYARD_LOG_LEVEL";

/// Load configuration from a JSON file, apply env overrides, then validate.
///
/// A missing file yields the defaults.
pub fn load_config(path: &Path) -> AppResult<GatewayConfig> {
    let mut config = if path.exists() {
        let content = fs::read_to_string(path)?;
        serde_json::from_str::<GatewayConfig>(&content)?
    } else {
        tracing::info!(path = %path.display(), "Config file not found, using defaults");
        GatewayConfig::default()
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    config.validate().map_err(|e| AppError::Config(e.to_string()))?;
    Ok(config)
}

/// Persist configuration atomically (temp file, then rename).
pub fn save_config(path: &Path, config: &GatewayConfig) -> AppResult<()> {
    let content = serde_json::to_string_pretty(config)?;
    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, content)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(DATABASE_URL_ENV).filter(|v| !v.is_empty()) {
        config.database_url = Some(url);
    }
    if let Some(level) = lookup(LOG_LEVEL_ENV).filter(|v| !v.is_empty()) {
        config.logging.level = level;
    }
}
