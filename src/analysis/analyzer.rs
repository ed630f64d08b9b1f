//! Per-video analysis with retry and fallback.
//!
//! [`VideoAnalyzer::analyze`] never fails: every error class ends in an
//! [`AnalysisResult`], degraded when inference could not produce one.

use crate::inference::{dimension_schema, ExtractRequest, InferenceClient, InferenceError};
use crate::models::{AnalysisResult, CreativeDimensions, DegradationReason, VideoItem};
use crate::retry::RetryPolicy;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Drives one extraction call per video.
pub struct VideoAnalyzer {
    client: Arc<dyn InferenceClient>,
    retry: RetryPolicy,
}

impl VideoAnalyzer {
    pub fn new(client: Arc<dyn InferenceClient>, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    /// Analyze one video. Always returns exactly one result for `item`.
    pub async fn analyze(&self, item: &VideoItem) -> AnalysisResult {
        info!(key = %item.key, rank = item.rank, platform = %item.platform, "analyzing {}", item.label());

        if item.media_reference.trim().is_empty() {
            return Self::fallback(item, DegradationReason::DeadMedia, "empty media reference");
        }

        let request = build_request(item);
        let outcome = self
            .retry
            .run(&item.key, || self.client.extract(&request))
            .await;

        match outcome {
            Ok(value) => match parse_dimensions(value) {
                Ok(dimensions) => {
                    debug!(key = %item.key, "analysis complete");
                    AnalysisResult::analyzed(item, dimensions)
                }
                Err(e) => Self::fallback(item, reason_for(&e), e.to_string()),
            },
            Err(failure) => Self::fallback(
                item,
                reason_for(&failure.error),
                format!("{} (after {} attempt(s))", failure.error, failure.attempts),
            ),
        }
    }

    /// Build the placeholder result and log it as degraded.
    pub fn fallback(item: &VideoItem, reason: DegradationReason, detail: impl Into<String>) -> AnalysisResult {
        let detail = detail.into();
        warn!(key = %item.key, reason = %reason, detail = %detail, "analysis degraded");
        AnalysisResult::fallback(item, reason, detail)
    }
}

/// Maps the error taxonomy onto degradation reasons.
pub fn reason_for(error: &InferenceError) -> DegradationReason {
    match error {
        InferenceError::NotFound(_) => DegradationReason::DeadMedia,
        InferenceError::RateLimited(_) => DegradationReason::RateLimited,
        InferenceError::Transient(_) => DegradationReason::TransientFailure,
        InferenceError::Malformed(_) => DegradationReason::ParseFailure,
        InferenceError::Rejected(_) => DegradationReason::RequestRejected,
    }
}

fn build_request(item: &VideoItem) -> ExtractRequest {
    let network = item
        .metadata_str("ad_network")
        .map_or_else(|| item.platform.to_string(), str::to_string);

    let prompt = format!(
        "You are a senior analyst of mobile game video advertising.\n\
         Analyze the attached video ad.\n\
         App: {app}\n\
         Network: {network}\n\
         Current rank: {rank}\n\n\
         Answer strictly as JSON with these five fields, each at most 50 words:\n\
         1. hook_design - how the first 3 seconds grab attention\n\
         2. emotional_appeal - the emotion the ad plays on (anxiety, relief, frustration...)\n\
         3. content_structure - the order of story beats or gameplay shown\n\
         4. core_payoff - the single most spectacular or satisfying moment\n\
         5. copy_features - on-screen text, voice-over lines and the call to action",
        app = item.label(),
        network = network,
        rank = item.rank,
    );

    ExtractRequest {
        media_reference: item.media_reference.clone(),
        prompt,
        schema: dimension_schema(),
    }
}

/// Validate a model response against the dimension shape.
fn parse_dimensions(value: serde_json::Value) -> Result<CreativeDimensions, InferenceError> {
    let dimensions: CreativeDimensions = serde_json::from_value(value)
        .map_err(|e| InferenceError::Malformed(format!("response does not match schema: {e}")))?;

    let blank = dimensions.blank_fields();
    if !blank.is_empty() {
        return Err(InferenceError::Malformed(format!(
            "empty dimensions: {}",
            blank.join(", ")
        )));
    }

    Ok(dimensions)
}
