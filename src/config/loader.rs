// src/config/loader.rs

use crate::config::{ClientConfig, ConfigValidator, EnvironmentConfig};
use crate::error::Result;
use std::path::Path;
use tracing::{debug, info};

/// Load configuration from file (if present), apply environment overrides and validate.
pub fn load_config(config_path: &Path) -> Result<ClientConfig> {
    let mut config = if config_path.exists() {
        info!("Loading configuration from file: {}", config_path.display());
        load_from_file(config_path)?
    } else {
        info!("Configuration file not found, using defaults");
        ClientConfig::default()
    };

    apply_overrides(&mut config, &EnvironmentConfig::from_env());

    ConfigValidator::validate(&config)?;

    debug!("Configuration loaded and validated successfully");
    Ok(config)
}

fn load_from_file(config_path: &Path) -> Result<ClientConfig> {
    let content = std::fs::read_to_string(config_path)?;
    Ok(serde_yaml::from_str(&content)?)
}

pub fn apply_overrides(config: &mut ClientConfig, overrides: &EnvironmentConfig) {
    if !overrides.has_overrides() {
        return;
    }
    debug!(variables = ?overrides.override_summary(), "Applying environment overrides");
    if let Some(base_url) = &overrides.base_url {
        info!("Overriding base URL from environment variable");
        config.base_url = base_url.clone();
    }
    if let Some(model) = &overrides.default_model {
        info!(model = %model, "Overriding default model from environment variable");
        config.default_model = model.clone();
    }
    if let Some(timeout) = overrides.request_timeout {
        info!("Overriding request timeout from environment: {}s", timeout);
        config.request_timeout_secs = timeout;
    }
    if let Some(base_ms) = overrides.backoff_base_ms {
        config.backoff.base_ms = base_ms;
    }
    if let Some(cap_ms) = overrides.backoff_cap_ms {
        config.backoff.cap_ms = cap_ms;
    }
}
