//! Offline inference client for dry runs.
//!
//! Returns canned analyses so the whole pipeline (dispatch, synthesis,
//! trends, archive) can be exercised without network access or API cost.

use super::{ExtractRequest, InferenceClient, InferenceError, SynthesisRequest};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

/// Canned-response client.
#[derive(Debug, Clone)]
pub struct MockInferenceClient {
    latency: Duration,
}

impl Default for MockInferenceClient {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(250),
        }
    }
}

impl MockInferenceClient {
    /// Mock with a custom simulated latency per call.
    #[cfg(test)]
    pub fn with_latency(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl InferenceClient for MockInferenceClient {
    async fn extract(&self, _request: &ExtractRequest) -> Result<Value, InferenceError> {
        tokio::time::sleep(self.latency).await;
        Ok(json!({
            "hook_design": "Opens on a failed mini-game caused by picking the wrong item, baiting the viewer to try.",
            "emotional_appeal": "Mild anxiety, then relief and satisfaction once the base is upgraded.",
            "content_structure": "Crisis (zombie siege, freezing) -> clumsy failure -> base upgrade -> screen-clearing ultimate.",
            "core_payoff": "A dense horde wiped out in one area attack.",
            "copy_features": "'Only 1% can pass!' / 'Download to save them!' with a countdown timer."
        }))
    }

    async fn synthesize(&self, _request: &SynthesisRequest) -> Result<Value, InferenceError> {
        tokio::time::sleep(self.latency).await;
        Ok(json!({
            "cross_creative_patterns": "Most top creatives lean on staged failure: easy puzzles lost on purpose to invite 'I could do better' clicks.",
            "competitor_tactics": "Leaders graft hyper-casual puzzle hooks onto 4X strategy settings, lowering the entry barrier and CPA.",
            "next_week_recommendations": "Test binary-choice pressure scenes (A or B) that resolve the crisis within the first five seconds."
        }))
    }
}
