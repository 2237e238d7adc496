//! Environment-based configuration

use crate::error::{ClientError, Result};
use std::env;
use tracing::{info, warn};

/// Highest numbered `GEMINI_KEY_<n>` variable that is looked up.
pub const MAX_NUMBERED_KEYS: usize = 10;

/// Environment overrides applied on top of the file-based config.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvironmentConfig {
    pub base_url: Option<String>,
    pub default_model: Option<String>,
    pub request_timeout: Option<u64>,
    pub backoff_base_ms: Option<u64>,
    pub backoff_cap_ms: Option<u64>,
}

impl EnvironmentConfig {
    /// Load overrides from environment variables
    pub fn from_env() -> Self {
        Self {
            base_url: non_blank_var("GEMINI_BASE_URL"),
            default_model: non_blank_var("GEMINI_MODEL"),
            request_timeout: parsed_var("GEMINI_REQUEST_TIMEOUT"),
            backoff_base_ms: parsed_var("GEMINI_BACKOFF_BASE_MS"),
            backoff_cap_ms: parsed_var("GEMINI_BACKOFF_CAP_MS"),
        }
    }

    pub fn has_overrides(&self) -> bool {
        !self.override_summary().is_empty()
    }

    /// Names of the variables that are currently overriding the config.
    pub fn override_summary(&self) -> Vec<&'static str> {
        let mut overrides = Vec::new();
        if self.base_url.is_some() {
            overrides.push("GEMINI_BASE_URL");
        }
        if self.default_model.is_some() {
            overrides.push("GEMINI_MODEL");
        }
        if self.request_timeout.is_some() {
            overrides.push("GEMINI_REQUEST_TIMEOUT");
        }
        if self.backoff_base_ms.is_some() {
            overrides.push("GEMINI_BACKOFF_BASE_MS");
        }
        if self.backoff_cap_ms.is_some() {
            overrides.push("GEMINI_BACKOFF_CAP_MS");
        }
        overrides
    }
}

fn non_blank_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed_var(name: &str) -> Option<u64> {
    let raw = non_blank_var(name)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = name, value = %raw, "Ignoring non-numeric environment override");
            None
        }
    }
}

/// Load API keys from the environment.
///
/// Looks for `GEMINI_KEY_1` .. `GEMINI_KEY_10` (gaps are allowed, blank
/// values skipped) and falls back to a single `GEMINI_API_KEY`.
pub fn load_credentials_from_env() -> Result<Vec<String>> {
    let mut keys: Vec<String> = (1..=MAX_NUMBERED_KEYS)
        .filter_map(|i| non_blank_var(&format!("GEMINI_KEY_{i}")))
        .collect();

    if keys.is_empty() {
        if let Some(key) = non_blank_var("GEMINI_API_KEY") {
            warn!("No GEMINI_KEY_* found, using single GEMINI_API_KEY");
            keys.push(key);
        }
    }

    if keys.is_empty() {
        return Err(ClientError::configuration(
            "No API keys found. Set GEMINI_KEY_1, GEMINI_KEY_2, ... or GEMINI_API_KEY environment variables.",
        ));
    }

    info!(keys.count = keys.len(), "Loaded API keys from environment");
    Ok(keys)
}
