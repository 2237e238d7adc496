// src/handlers/rate_limit.rs

use super::base::{Action, ResponseHandler};
use crate::error::AttemptFailure;
use reqwest::StatusCode;

pub struct RateLimitHandler;

impl ResponseHandler for RateLimitHandler {
    fn handle(&self, status: StatusCode, _body: &str) -> Option<Action> {
        if status == StatusCode::TOO_MANY_REQUESTS {
            Some(Action::Rotate(AttemptFailure::RateLimited))
        } else {
            None
        }
    }
}
