// src/key_manager.rs

use crate::error::{ClientError, Result};
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, Secret};
use tracing::{debug, info, instrument};

/// Ordered, immutable set of API keys with a round-robin cursor and
/// per-key counters indexed by position.
pub struct KeyRing {
    keys: Vec<Secret<String>>,
    cursor: usize,
    request_counts: Vec<u64>,
    error_counts: Vec<u64>,
    total_requests: u64,
    since: DateTime<Utc>,
}

impl std::fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRing")
            .field("keys", &self.keys.len())
            .field("cursor", &self.cursor)
            .field("request_counts", &self.request_counts)
            .field("error_counts", &self.error_counts)
            .field("total_requests", &self.total_requests)
            .finish()
    }
}

impl KeyRing {
    /// Builds the ring from raw keys. Blank entries are discarded; an
    /// empty result is a configuration error.
    #[instrument(skip(keys), name = "key_ring_init")]
    pub fn new<I, S>(keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys: Vec<Secret<String>> = keys
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .map(Secret::new)
            .collect();

        if keys.is_empty() {
            return Err(ClientError::configuration(
                "RotatingClient requires at least one API key",
            ));
        }

        info!(keys.count = keys.len(), "Key ring initialized");
        let len = keys.len();
        Ok(Self {
            keys,
            cursor: 0,
            request_counts: vec![0; len],
            error_counts: vec![0; len],
            total_requests: 0,
            since: Utc::now(),
        })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Key the next attempt will use.
    pub fn current(&self) -> &Secret<String> {
        &self.keys[self.cursor]
    }

    /// Human-facing 1-based label, e.g. `Key 2/3`.
    pub fn label(&self) -> String {
        format!("Key {}/{}", self.cursor + 1, self.keys.len())
    }

    /// Advances the cursor one step, wrapping at the end.
    pub fn rotate(&mut self) {
        self.cursor = (self.cursor + 1) % self.keys.len();
        debug!(cursor = self.cursor, "Rotated to next API key");
    }

    pub fn record_success(&mut self) {
        self.request_counts[self.cursor] += 1;
        self.total_requests += 1;
    }

    pub fn record_failure(&mut self) {
        self.error_counts[self.cursor] += 1;
    }

    pub fn request_counts(&self) -> &[u64] {
        &self.request_counts
    }

    pub fn error_counts(&self) -> &[u64] {
        &self.error_counts
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests
    }

    pub fn since(&self) -> DateTime<Utc> {
        self.since
    }

    /// Zeroes every counter and moves the cursor back to the first key.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.request_counts.iter_mut().for_each(|c| *c = 0);
        self.error_counts.iter_mut().for_each(|c| *c = 0);
        self.total_requests = 0;
        self.since = Utc::now();
        info!("Key ring statistics reset");
    }

    /// Masked form of a key that is safe to log.
    pub fn preview(key: &Secret<String>) -> String {
        let key = key.expose_secret();
        let chars: Vec<char> = key.chars().collect();
        if chars.len() > 8 {
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("{head}...{tail}")
        } else {
            "***".to_string()
        }
    }
}
