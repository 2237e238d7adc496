// src/client/wire.rs

//! Request and response shapes of the `generateContent` endpoint.

use crate::error::AttemptFailure;
use serde::Serialize;
use serde_json::Value;

/// JSON pointer to the generated text inside a response body.
const TEXT_POINTER: &str = "/candidates/0/content/parts/0/text";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Part {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Content {
    pub parts: Vec<Part>,
}

impl Content {
    fn from_text(text: &str) -> Self {
        Self {
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: String,
    pub response_schema: Value,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

impl GenerateRequest {
    pub fn text(prompt: &str) -> Self {
        Self {
            system_instruction: None,
            contents: vec![Content::from_text(prompt)],
            generation_config: None,
        }
    }

    pub fn with_system(mut self, instruction: &str) -> Self {
        self.system_instruction = Some(Content::from_text(instruction));
        self
    }

    /// Asks the service for JSON output shaped by `schema`. The schema is
    /// forwarded as-is.
    pub fn structured(prompt: &str, schema: &Value) -> Self {
        Self {
            generation_config: Some(GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: schema.clone(),
            }),
            ..Self::text(prompt)
        }
    }
}

/// How a 2xx body is turned into the caller's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// The whole body, parsed as JSON.
    Full,
    /// The generated text of the first candidate, parsed as JSON.
    EmbeddedJson,
}

impl ResponseShape {
    pub fn decode(self, body: &str) -> Result<Value, AttemptFailure> {
        let envelope: Value = serde_json::from_str(body).map_err(|e| AttemptFailure::Decode {
            message: format!("response body is not JSON: {e}"),
        })?;

        match self {
            Self::Full => Ok(envelope),
            Self::EmbeddedJson => {
                let text = extract_text(&envelope).ok_or_else(|| AttemptFailure::Decode {
                    message: "response has no candidate text".to_string(),
                })?;
                serde_json::from_str(text).map_err(|e| AttemptFailure::Decode {
                    message: format!("candidate text is not JSON: {e}"),
                })
            }
        }
    }
}

/// Generated text of the first candidate, if the payload has one.
pub fn extract_text(payload: &Value) -> Option<&str> {
    payload.pointer(TEXT_POINTER)?.as_str()
}
