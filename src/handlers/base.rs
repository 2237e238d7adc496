// src/handlers/base.rs

use crate::error::AttemptFailure;
use reqwest::StatusCode;

/// Defines the next action to be taken by the retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// The response is usable; decode it and return to the caller.
    Accept,
    /// Recoverable failure on the current key. Rotate, back off, try again.
    Rotate(AttemptFailure),
    /// The request itself was rejected. Surface it immediately.
    Terminal,
}

/// A trait for classifying responses from the upstream service.
/// Each implementation is responsible for one case (e.g. success, rate limit).
pub trait ResponseHandler: Send + Sync {
    /// Examines the response and decides on the next action.
    ///
    /// Returns `None` if this handler does not recognise the response,
    /// letting the next handler in the chain try.
    fn handle(&self, status: StatusCode, body: &str) -> Option<Action>;
}
