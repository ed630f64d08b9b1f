//! Multimodal inference boundary.
//!
//! The pipeline only ever talks to an [`InferenceClient`]; the Gemini HTTP
//! client and the offline mock both implement it.

pub mod gemini;
pub mod mock;

pub use gemini::{GeminiClient, GeminiConfig};
pub use mock::MockInferenceClient;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

/// Errors surfaced by an inference call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InferenceError {
    /// The media reference no longer resolves.
    #[error("media not found: {0}")]
    NotFound(String),

    /// The service asked us to slow down.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Network failure, timeout or 5xx.
    #[error("transient failure: {0}")]
    Transient(String),

    /// The response did not fit the requested schema.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The service refused the request (4xx other than 404/429).
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl InferenceError {
    /// Returns `true` for errors worth retrying after a back-off delay.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            InferenceError::RateLimited(_) | InferenceError::Transient(_)
        )
    }
}

/// Per-video structured extraction request.
#[derive(Debug, Clone)]
pub struct ExtractRequest {
    pub media_reference: String,
    pub prompt: String,
    /// JSON schema the response must satisfy.
    pub schema: Value,
}

/// Text-only cross-item synthesis request.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub prompt: String,
    pub schema: Value,
}

/// Stateless request/response access to a multimodal reasoning service.
///
/// Both calls are idempotent from the caller's side and safe to retry.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Extracts structured JSON from one video.
    async fn extract(&self, request: &ExtractRequest) -> Result<Value, InferenceError>;

    /// Synthesizes structured JSON from text only.
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Value, InferenceError>;
}

/// Response schema for the five creative dimensions.
pub fn dimension_schema() -> Value {
    string_object_schema(&[
        "hook_design",
        "emotional_appeal",
        "content_structure",
        "core_payoff",
        "copy_features",
    ])
}

/// Response schema for the strategic summary sections.
pub fn synthesis_schema() -> Value {
    string_object_schema(&[
        "cross_creative_patterns",
        "competitor_tactics",
        "next_week_recommendations",
    ])
}

fn string_object_schema(fields: &[&str]) -> Value {
    let properties: serde_json::Map<String, Value> = fields
        .iter()
        .map(|f| ((*f).to_string(), json!({ "type": "STRING" })))
        .collect();

    json!({
        "type": "OBJECT",
        "properties": properties,
        "required": fields,
    })
}
