// src/client/traits.rs

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// The two request shapes consumers of the rotating client rely on.
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    /// Free-form generation. Returns the decoded response body.
    async fn call(&self, prompt: &str, model: Option<&str>) -> Result<Value>;

    /// Schema-constrained generation. Returns the generated text parsed as JSON.
    async fn call_structured(
        &self,
        prompt: &str,
        schema: &Value,
        model: Option<&str>,
    ) -> Result<Value>;
}
