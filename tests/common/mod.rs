//! Common test utilities and fixtures
#![allow(dead_code)]

use gemini_quota_client::config::BackoffConfig;
use gemini_quota_client::{ClientConfig, RotatingClient};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const API_KEY_HEADER: &str = "x-goog-api-key";
pub const GENERATE_PATH: &str = r"^/models/[^/]+:generateContent$";

/// Test configuration builder. Backoff is disabled unless asked for.
pub struct TestConfigBuilder {
    config: ClientConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        let mut config = ClientConfig::with_base_url("http://127.0.0.1:1");
        config.backoff = BackoffConfig {
            base_ms: 0,
            cap_ms: 0,
        };
        config.request_timeout_secs = 5;
        Self { config }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    pub fn with_backoff(mut self, base_ms: u64, cap_ms: u64) -> Self {
        self.config.backoff = BackoffConfig { base_ms, cap_ms };
        self
    }

    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn client_for(server: &MockServer, keys: &[&str]) -> RotatingClient {
    client_with(TestConfigBuilder::new().with_base_url(server.uri()), keys)
}

pub fn client_with(builder: TestConfigBuilder, keys: &[&str]) -> RotatingClient {
    RotatingClient::new(keys.iter().copied(), builder.build()).expect("test client")
}

/// A `generateContent` response body carrying `text` as the first candidate.
pub fn gemini_body(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }]
    })
}

pub fn ok_text(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(gemini_body(text))
}

/// Answers every request made with `key` using `template`.
pub async fn mount_for_key(server: &MockServer, key: &str, template: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path_regex(GENERATE_PATH))
        .and(header(API_KEY_HEADER, key))
        .respond_with(template)
        .mount(server)
        .await;
}

/// Keys in the order the server saw them.
pub async fn keys_used(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| {
            request
                .headers
                .get(API_KEY_HEADER)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_string()
        })
        .collect()
}
