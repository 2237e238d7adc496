// src/handlers/mod.rs

pub mod base;
pub mod processor;
pub mod rate_limit;
pub mod server_error;
pub mod success;
pub mod terminal_error;

pub use base::{Action, ResponseHandler};
pub use processor::ResponseProcessor;
