// src/client/mod.rs

//! Quota-aware Gemini client that rotates through API keys.
//!
//! Every call walks the key ring at most once. Quota errors (429),
//! server errors (5xx), transport failures and undecodable bodies move
//! the cursor to the next key and back off; any other 4xx is returned
//! to the caller untouched. The cursor stays where it is after a
//! success, so the next call starts on the key that last worked.

pub mod backoff;
pub mod stats;
pub mod traits;
pub mod wire;

pub use backoff::BackoffPolicy;
pub use stats::ClientStats;
pub use traits::GenerativeClient;
pub use wire::{extract_text, GenerateRequest, ResponseShape};

use crate::config::{load_credentials_from_env, ClientConfig};
use crate::error::{AttemptFailure, ClientError, Result};
use crate::handlers::{Action, ResponseProcessor};
use crate::key_manager::KeyRing;
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Round-robin multi-key client for the `generateContent` endpoint.
///
/// Calls are serialized: one call, including its backoff sleeps, holds the
/// call gate until it returns. Statistics can be read at any time.
#[derive(Debug)]
pub struct RotatingClient {
    http: Client,
    config: ClientConfig,
    backoff: BackoffPolicy,
    processor: ResponseProcessor,
    ring: RwLock<KeyRing>,
    call_gate: tokio::sync::Mutex<()>,
}

impl RotatingClient {
    pub fn new<I, S>(keys: I, config: ClientConfig) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ring = KeyRing::new(keys)?;
        let http = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .pool_max_idle_per_host(ring.len())
            .build()?;

        info!(
            keys.count = ring.len(),
            base_url = %config.base_url,
            model = %config.default_model,
            "Rotating client initialized"
        );

        Ok(Self {
            http,
            backoff: BackoffPolicy::from_config(&config.backoff),
            config,
            processor: ResponseProcessor::default(),
            ring: RwLock::new(ring),
            call_gate: tokio::sync::Mutex::new(()),
        })
    }

    /// Keys from the environment first, then any listed in the config file.
    pub fn from_env(config: ClientConfig) -> Result<Self> {
        let mut keys = match load_credentials_from_env() {
            Ok(keys) => keys,
            Err(e) if !config.api_keys.is_empty() => {
                debug!(error = %e, "No keys in environment, using keys from config");
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        keys.extend(config.api_keys.iter().cloned());
        Self::new(keys, config)
    }

    /// Replaces the backoff schedule.
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn credential_count(&self) -> usize {
        self.ring.read().len()
    }

    pub fn default_model(&self) -> &str {
        &self.config.default_model
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Sends `prompt` and returns the full decoded response body.
    ///
    /// A blank prompt fails with [`ClientError::InvalidRequest`] before any I/O.
    #[instrument(level = "debug", skip(self, prompt))]
    pub async fn call(&self, prompt: &str, model: Option<&str>) -> Result<Value> {
        ensure_prompt(prompt)?;
        self.execute(model, &GenerateRequest::text(prompt), ResponseShape::Full)
            .await
    }

    /// Like [`call`](Self::call) with a system instruction in front of the prompt.
    /// A blank instruction is left out of the request.
    #[instrument(level = "debug", skip(self, system_instruction, prompt))]
    pub async fn call_with_system(
        &self,
        system_instruction: &str,
        prompt: &str,
        model: Option<&str>,
    ) -> Result<Value> {
        ensure_prompt(prompt)?;
        let mut request = GenerateRequest::text(prompt);
        if !system_instruction.trim().is_empty() {
            request = request.with_system(system_instruction);
        }
        self.execute(model, &request, ResponseShape::Full).await
    }

    /// Sends `prompt` with `schema` as the response schema and returns the
    /// generated text parsed as JSON. Undecodable output counts as a
    /// recoverable failure of the key that produced it. A blank prompt fails
    /// with [`ClientError::InvalidRequest`] before any I/O.
    #[instrument(level = "debug", skip(self, prompt, schema))]
    pub async fn call_structured(
        &self,
        prompt: &str,
        schema: &Value,
        model: Option<&str>,
    ) -> Result<Value> {
        ensure_prompt(prompt)?;
        self.execute(
            model,
            &GenerateRequest::structured(prompt, schema),
            ResponseShape::EmbeddedJson,
        )
        .await
    }

    /// Best-effort snapshot of the counters; never blocks on an in-flight call.
    pub fn stats(&self) -> ClientStats {
        ClientStats::from_ring(&self.ring.read())
    }

    /// Zeroes all counters and moves the cursor back to the first key.
    pub fn reset_stats(&self) {
        self.ring.write().reset();
    }

    async fn execute(
        &self,
        model: Option<&str>,
        request: &GenerateRequest,
        shape: ResponseShape,
    ) -> Result<Value> {
        let _gate = self.call_gate.lock().await;

        let model = model.unwrap_or(&self.config.default_model);
        let url = self.config.generate_url(model);
        let credentials = self.credential_count();
        let mut attempts = 0;
        let mut decode_failures = 0;
        let mut last_failure: Option<AttemptFailure> = None;

        while attempts < credentials {
            let (key, preview, label) = {
                let ring = self.ring.read();
                (
                    ring.current().expose_secret().clone(),
                    KeyRing::preview(ring.current()),
                    ring.label(),
                )
            };

            let failure = match self.send_once(&url, &key, request).await {
                Err(failure) => failure,
                Ok((status, body)) => match self.processor.process(status, &body) {
                    Action::Accept => match shape.decode(&body) {
                        Ok(payload) => {
                            let total = {
                                let mut ring = self.ring.write();
                                ring.record_success();
                                ring.total_requests()
                            };
                            debug!(
                                key = %label,
                                api_key.preview = %preview,
                                total_requests = total,
                                "Request successful"
                            );
                            return Ok(payload);
                        }
                        Err(failure) => failure,
                    },
                    Action::Rotate(failure) => failure,
                    Action::Terminal => {
                        warn!(
                            key = %label,
                            api_key.preview = %preview,
                            status = status.as_u16(),
                            "Request rejected by upstream, not retrying"
                        );
                        return Err(ClientError::ClientRequest { status, body });
                    }
                },
            };

            {
                let mut ring = self.ring.write();
                ring.record_failure();
                ring.rotate();
            }
            attempts += 1;
            if failure.is_decode() {
                decode_failures += 1;
            }
            warn!(
                key = %label,
                api_key.preview = %preview,
                attempt = attempts,
                error = %failure,
                "Recoverable failure, rotating to next key"
            );
            last_failure = Some(failure);

            self.backoff.wait(attempts).await;
        }

        let err = match last_failure {
            Some(AttemptFailure::Decode { message }) if decode_failures == attempts => {
                ClientError::Decode { attempts, message }
            }
            _ => ClientError::CredentialsExhausted {
                credentials,
                attempts,
            },
        };
        err.log();
        Err(err)
    }

    async fn send_once(
        &self,
        url: &str,
        key: &str,
        request: &GenerateRequest,
    ) -> std::result::Result<(StatusCode, String), AttemptFailure> {
        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, key)
            .json(request)
            .send()
            .await
            .map_err(transport_failure)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_failure)?;
        Ok((status, body))
    }
}

#[async_trait]
impl GenerativeClient for RotatingClient {
    async fn call(&self, prompt: &str, model: Option<&str>) -> Result<Value> {
        RotatingClient::call(self, prompt, model).await
    }

    async fn call_structured(
        &self,
        prompt: &str,
        schema: &Value,
        model: Option<&str>,
    ) -> Result<Value> {
        RotatingClient::call_structured(self, prompt, schema, model).await
    }
}

fn ensure_prompt(prompt: &str) -> Result<()> {
    if prompt.trim().is_empty() {
        return Err(ClientError::invalid_request("prompt cannot be empty"));
    }
    Ok(())
}

fn transport_failure(err: reqwest::Error) -> AttemptFailure {
    let kind = if err.is_timeout() {
        "timeout"
    } else if err.is_connect() {
        "connect"
    } else {
        "request"
    };
    AttemptFailure::Transport {
        message: format!("{kind}: {err}"),
    }
}
