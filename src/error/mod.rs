//! Error handling for the rotating client and the rule engine.
//!
//! Only terminal conditions cross the client boundary. Recoverable
//! outcomes (quota, server, transport, decode) are represented by
//! [`AttemptFailure`] and stay inside the retry loop.

pub mod types;

use reqwest::StatusCode;
use thiserror::Error;
use tracing::{error, warn};

/// Terminal errors surfaced by [`crate::client::RotatingClient`].
#[derive(Error, Debug)]
pub enum ClientError {
    /// No usable credentials, or an invalid configuration value.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The caller passed something the client refuses to send.
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// The remote service rejected the request itself (4xx other than 429).
    #[error("Client request error: {status} - {body}")]
    ClientRequest { status: StatusCode, body: String },

    /// Every attempt got a response that could not be decoded.
    #[error("Failed to decode response after {attempts} attempts: {message}")]
    Decode { attempts: usize, message: String },

    /// Every credential failed recoverably within one call.
    #[error("All {credentials} API keys exhausted or failed after {attempts} attempts")]
    CredentialsExhausted { credentials: usize, attempts: usize },
}

impl ClientError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Whether the same call could succeed later without changes on the caller side.
    ///
    /// Quota windows reset and model output varies between calls, so
    /// exhaustion and decode failures are worth retrying after a pause.
    pub fn is_retryable_later(&self) -> bool {
        matches!(self, Self::CredentialsExhausted { .. } | Self::Decode { .. })
    }

    /// Short machine-readable kind, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::ClientRequest { .. } => "client_request",
            Self::Decode { .. } => "decode",
            Self::CredentialsExhausted { .. } => "credentials_exhausted",
        }
    }

    /// Log the error with a level matching who is at fault.
    pub fn log(&self) {
        match self {
            Self::Configuration { .. } | Self::CredentialsExhausted { .. } => {
                error!(error = %self, error.kind = self.kind(), "Client operation failed");
            }
            _ => {
                warn!(error = %self, error.kind = self.kind(), "Client request rejected");
            }
        }
    }
}

/// Recoverable outcome of a single attempt. Triggers rotation and backoff.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    #[error("quota exceeded (429)")]
    RateLimited,

    #[error("server error ({status})")]
    Server { status: StatusCode },

    #[error("request failed: {message}")]
    Transport { message: String },

    #[error("undecodable response: {message}")]
    Decode { message: String },
}

impl AttemptFailure {
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

/// Errors raised while parsing, validating or evaluating rules.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleError {
    #[error("Parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("Evaluation error: {message}")]
    Eval { message: String },

    #[error("Invalid rule definition: {message}")]
    Validation { message: String },
}

impl RuleError {
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    pub fn eval(message: impl Into<String>) -> Self {
        Self::Eval {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Why a rule could not be synthesized from a description.
#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("generation failed: {0}")]
    Client(#[from] ClientError),

    #[error("generated rule rejected: {0}")]
    Rule(#[from] RuleError),
}

/// Result type alias for the crate.
pub type Result<T, E = ClientError> = std::result::Result<T, E>;
