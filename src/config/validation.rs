// src/config/validation.rs

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use tracing::{debug, warn};
use url::Url;

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &ClientConfig) -> Result<()> {
        debug!("Starting configuration validation");

        if let Err(e) = Self::validate_endpoint(config) {
            warn!("Endpoint validation failed: {}", e);
            return Err(e);
        }

        if let Err(e) = Self::validate_timeouts(config) {
            warn!("Timeout validation failed: {}", e);
            return Err(e);
        }

        if let Err(e) = Self::validate_backoff(config) {
            warn!("Backoff validation failed: {}", e);
            return Err(e);
        }

        debug!("Configuration validation completed successfully");
        Ok(())
    }

    fn validate_endpoint(config: &ClientConfig) -> Result<()> {
        let url = Url::parse(&config.base_url).map_err(|e| {
            ClientError::configuration(format!(
                "Invalid URL in base_url: {} - {}",
                config.base_url, e
            ))
        })?;

        match url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(ClientError::configuration(format!(
                    "Unsupported scheme '{scheme}' in base_url. Supported: http, https"
                )))
            }
        }

        if config.default_model.trim().is_empty() {
            return Err(ClientError::configuration("default_model cannot be empty"));
        }
        Ok(())
    }

    fn validate_timeouts(config: &ClientConfig) -> Result<()> {
        if config.connect_timeout_secs == 0 {
            return Err(ClientError::configuration("Connect timeout cannot be 0"));
        }
        if config.request_timeout_secs == 0 {
            return Err(ClientError::configuration("Request timeout cannot be 0"));
        }
        Ok(())
    }

    fn validate_backoff(config: &ClientConfig) -> Result<()> {
        let backoff = config.backoff;
        if backoff.base_ms > backoff.cap_ms {
            return Err(ClientError::configuration(format!(
                "Backoff base ({} ms) cannot exceed cap ({} ms)",
                backoff.base_ms, backoff.cap_ms
            )));
        }
        Ok(())
    }
}
