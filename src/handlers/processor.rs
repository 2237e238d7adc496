// src/handlers/processor.rs

use crate::handlers::{
    base::{Action, ResponseHandler},
    rate_limit::RateLimitHandler,
    server_error::ServerErrorHandler,
    success::SuccessHandler,
    terminal_error::TerminalErrorHandler,
};
use reqwest::StatusCode;

/// Runs a response through a chain of handlers.
pub struct ResponseProcessor {
    handlers: Vec<Box<dyn ResponseHandler>>,
}

impl ResponseProcessor {
    /// Creates a new `ResponseProcessor` with a given chain of handlers.
    pub fn new(handlers: Vec<Box<dyn ResponseHandler>>) -> Self {
        Self { handlers }
    }

    /// Determines the next action. A response no handler claims is terminal.
    pub fn process(&self, status: StatusCode, body: &str) -> Action {
        self.handlers
            .iter()
            .find_map(|handler| handler.handle(status, body))
            .unwrap_or(Action::Terminal)
    }
}

impl Default for ResponseProcessor {
    fn default() -> Self {
        Self::new(vec![
            Box::new(SuccessHandler),
            Box::new(RateLimitHandler),
            Box::new(ServerErrorHandler),
            Box::new(TerminalErrorHandler),
        ])
    }
}

impl std::fmt::Debug for ResponseProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseProcessor")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
