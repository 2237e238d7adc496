// src/client/stats.rs

use crate::key_manager::KeyRing;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Point-in-time snapshot of the client's counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientStats {
    /// 0-based index of the key the next attempt will use.
    pub cursor: usize,
    pub total_keys: usize,
    pub request_counts: Vec<u64>,
    pub error_counts: Vec<u64>,
    pub total_requests: u64,
    pub total_errors: u64,
    /// `(total_requests - total_errors) / total_requests`; `None` before the first success.
    pub success_rate: Option<f64>,
    pub since: DateTime<Utc>,
}

impl ClientStats {
    pub fn from_ring(ring: &KeyRing) -> Self {
        let total_requests = ring.total_requests();
        let total_errors: u64 = ring.error_counts().iter().sum();
        let success_rate = (total_requests > 0)
            .then(|| (total_requests as f64 - total_errors as f64) / total_requests as f64);

        Self {
            cursor: ring.cursor(),
            total_keys: ring.len(),
            request_counts: ring.request_counts().to_vec(),
            error_counts: ring.error_counts().to_vec(),
            total_requests,
            total_errors,
            success_rate,
            since: ring.since(),
        }
    }

    /// Success rate as a percentage with one decimal, or `N/A`.
    pub fn success_rate_display(&self) -> String {
        self.success_rate
            .map_or_else(|| "N/A".to_string(), |rate| format!("{:.1}%", rate * 100.0))
    }
}

impl fmt::Display for ClientStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- API Quota Stats ---")?;
        writeln!(f, "   Current: Key {}/{}", self.cursor + 1, self.total_keys)?;
        writeln!(f, "   Total Requests: {}", self.total_requests)?;
        writeln!(f, "   Total Errors: {}", self.total_errors)?;
        writeln!(f, "   Success Rate: {}", self.success_rate_display())?;
        writeln!(f, "   Since: {}", self.since.to_rfc3339())?;
        writeln!(f, "   Per-key breakdown:")?;
        for (i, (requests, errors)) in self
            .request_counts
            .iter()
            .zip(&self.error_counts)
            .enumerate()
        {
            writeln!(f, "     Key {}: {} requests, {} errors", i + 1, requests, errors)?;
        }
        write!(f, "------------------------")
    }
}
