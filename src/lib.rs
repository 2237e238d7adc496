// src/lib.rs

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod key_manager;
pub mod rules;

use std::path::{Path, PathBuf};
use tracing::{error, info};

pub use client::{ClientStats, GenerativeClient, RotatingClient};
pub use config::ClientConfig;
pub use error::{ClientError, Result, RuleError};
pub use rules::{LogicEngine, Rule, RuleSynthesizer};

/// Default location of the optional configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "gemini-quota.yaml";

/// Config path from the argument, else `GEMINI_QUOTA_CONFIG`, else the default.
pub fn resolve_config_path(path_override: Option<PathBuf>) -> PathBuf {
    path_override.unwrap_or_else(|| {
        std::env::var("GEMINI_QUOTA_CONFIG")
            .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
    })
}

/// Loads, validates and logs the client configuration.
pub fn setup_configuration(config_path: &Path) -> Result<ClientConfig> {
    let config_path_display = config_path.display().to_string();
    if config_path.exists() {
        info!(config.path = %config_path_display, "Using configuration file");
    } else {
        info!(
            config.path = %config_path_display,
            "Optional configuration file not found. Using defaults and environment variables."
        );
    }

    let config = config::load_config(config_path).map_err(|e| {
        error!(
            config.path = %config_path_display,
            error = %e,
            "Failed to load or validate configuration"
        );
        e
    })?;

    info!(
        config.base_url = %config.base_url,
        config.model = %config.default_model,
        config.file_keys = config.api_keys.len(),
        backoff.base_ms = config.backoff.base_ms,
        backoff.cap_ms = config.backoff.cap_ms,
        "Configuration loaded and validated successfully."
    );
    Ok(config)
}
