//! Error conversions

use super::{ClientError, RuleError};

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Configuration {
            message: format!("IO error: {err}"),
        }
    }
}

impl From<serde_yaml::Error> for ClientError {
    fn from(err: serde_yaml::Error) -> Self {
        let location = err
            .location()
            .map(|loc| format!(" at line {}", loc.line()))
            .unwrap_or_default();
        Self::Configuration {
            message: format!("Failed to parse config file{location}: {err}"),
        }
    }
}

/// Only raised while building the HTTP client; request-time reqwest errors
/// are classified as recoverable transport failures instead.
impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Configuration {
            message: format!("HTTP client build error: {err}"),
        }
    }
}

impl From<serde_json::Error> for RuleError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation {
            message: err.to_string(),
        }
    }
}
