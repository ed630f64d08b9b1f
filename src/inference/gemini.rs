//! Gemini `generateContent` client.
//!
//! Video extraction passes the media reference as `file_data`, asks for a
//! JSON response constrained by a schema, and walks an ordered list of
//! models when one is not available.

use super::{ExtractRequest, InferenceClient, InferenceError, SynthesisRequest};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Connection settings for the Gemini API.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub endpoint: String,
    pub api_key: String,
    /// Tried in order for per-video extraction.
    pub extraction_models: Vec<String>,
    /// Tried in order for the synthesis call.
    pub synthesis_models: Vec<String>,
    pub timeout_seconds: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com".to_string(),
            api_key: String::new(),
            extraction_models: vec![
                "gemini-3-flash-preview".to_string(),
                "gemini-2.5-flash".to_string(),
            ],
            synthesis_models: vec![
                "gemini-3.1-pro-preview".to_string(),
                "gemini-2.5-pro".to_string(),
            ],
            timeout_seconds: 120,
        }
    }
}

/// `generateContent` request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_schema: Value,
}

/// `generateContent` response body (the parts we read).
#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// HTTP client for the Gemini API.
pub struct GeminiClient {
    config: GeminiConfig,
    http_client: reqwest::Client,
}

impl GeminiClient {
    /// Create a client with the configured request timeout.
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Check that the media still resolves before spending a model call on it.
    async fn probe_media(&self, media_reference: &str) -> Result<(), InferenceError> {
        if !media_reference.starts_with("http://") && !media_reference.starts_with("https://") {
            return Ok(());
        }

        let response = self
            .http_client
            .head(media_reference)
            .send()
            .await
            .map_err(|e| self.map_send_error(&e))?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => Err(InferenceError::NotFound(format!(
                "{} returned {}",
                media_reference,
                response.status()
            ))),
            status if status.is_server_error() => Err(InferenceError::Transient(format!(
                "media host returned {status}"
            ))),
            status => {
                debug!(status = %status, "media probe passed");
                Ok(())
            }
        }
    }

    /// Send one request, walking the model list on 404.
    async fn generate(&self, models: &[String], body: &GenerateContentRequest) -> Result<Value, InferenceError> {
        for model in models {
            let url = format!(
                "{}/v1beta/models/{}:generateContent",
                self.config.endpoint.trim_end_matches('/'),
                model
            );

            let response = self
                .http_client
                .post(&url)
                .header("x-goog-api-key", &self.config.api_key)
                .json(body)
                .send()
                .await
                .map_err(|e| self.map_send_error(&e))?;

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                warn!(model = %model, "model not available, falling back to next model");
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(map_status(status, &body));
            }

            let parsed: GenerateContentResponse = response
                .json()
                .await
                .map_err(|e| InferenceError::Malformed(format!("unreadable response body: {e}")))?;

            debug!(model = %model, "model call succeeded");
            return parse_candidate_json(parsed);
        }

        Err(InferenceError::Transient(format!(
            "none of the configured models are available: {}",
            models.join(", ")
        )))
    }

    fn map_send_error(&self, e: &reqwest::Error) -> InferenceError {
        if e.is_timeout() {
            InferenceError::Transient(format!(
                "request timed out after {}s",
                self.config.timeout_seconds
            ))
        } else if e.is_connect() {
            InferenceError::Transient(format!("cannot connect: {e}"))
        } else {
            InferenceError::Transient(format!("failed to send request: {e}"))
        }
    }
}

/// Map a non-success HTTP status to the error taxonomy.
fn map_status(status: StatusCode, body: &str) -> InferenceError {
    let message = format!("{status}: {body}");
    if status == StatusCode::TOO_MANY_REQUESTS {
        InferenceError::RateLimited(message)
    } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        InferenceError::Transient(message)
    } else {
        InferenceError::Rejected(message)
    }
}

/// Pull the JSON document out of the first candidate's text parts.
fn parse_candidate_json(response: GenerateContentResponse) -> Result<Value, InferenceError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(InferenceError::Malformed("response has no text".to_string()));
    }

    serde_json::from_str(strip_code_fence(&text))
        .map_err(|e| InferenceError::Malformed(format!("response is not JSON: {e}")))
}

/// Models occasionally wrap JSON in a markdown fence despite the mime type.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map_or(trimmed, str::trim)
}

#[async_trait]
impl InferenceClient for GeminiClient {
    async fn extract(&self, request: &ExtractRequest) -> Result<Value, InferenceError> {
        self.probe_media(&request.media_reference).await?;

        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    json!({
                        "file_data": {
                            "mime_type": "video/mp4",
                            "file_uri": request.media_reference,
                        }
                    }),
                    json!({ "text": request.prompt }),
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: request.schema.clone(),
            },
        };

        self.generate(&self.config.extraction_models, &body).await
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Value, InferenceError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![json!({ "text": request.prompt })],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: request.schema.clone(),
            },
        };

        self.generate(&self.config.synthesis_models, &body).await
    }
}
