// src/config/mod.rs

pub mod app;
pub mod environment;
pub mod loader;
pub mod validation;

pub use app::{BackoffConfig, ClientConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use environment::{load_credentials_from_env, EnvironmentConfig};
pub use loader::{apply_overrides, load_config};
pub use validation::ConfigValidator;
