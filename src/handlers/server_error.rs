// src/handlers/server_error.rs

use super::base::{Action, ResponseHandler};
use crate::error::AttemptFailure;
use reqwest::StatusCode;
use tracing::warn;

/// Handler for server errors that should trigger key rotation
pub struct ServerErrorHandler;

impl ResponseHandler for ServerErrorHandler {
    fn handle(&self, status: StatusCode, body: &str) -> Option<Action> {
        if status.is_server_error() {
            warn!(
                status = status.as_u16(),
                response_body = %body,
                "Server error detected, will retry with next key"
            );
            return Some(Action::Rotate(AttemptFailure::Server { status }));
        }

        None
    }
}
