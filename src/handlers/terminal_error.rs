// src/handlers/terminal_error.rs

use super::base::{Action, ResponseHandler};
use reqwest::StatusCode;

/// Last in the chain: anything not claimed earlier is a request the
/// upstream will keep rejecting no matter which key is used.
pub struct TerminalErrorHandler;

impl ResponseHandler for TerminalErrorHandler {
    fn handle(&self, status: StatusCode, _body: &str) -> Option<Action> {
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() || status.is_success()
        {
            None
        } else {
            Some(Action::Terminal)
        }
    }
}
