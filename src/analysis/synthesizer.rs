//! Cross-video strategic synthesis.
//!
//! Sends the compressed text of every per-video result (never the media) in
//! one request and maps the answer onto [`StrategicSummary`]. Any failure
//! yields [`SummaryRecord::Unavailable`] instead of an error.

use super::aggregator::{degraded_ratio, group_by_platform};
use crate::inference::{synthesis_schema, InferenceClient, InferenceError, SynthesisRequest};
use crate::models::{StrategicSummary, SummaryRecord, WeeklySnapshot};
use crate::retry::RetryPolicy;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Degraded share at which the summary carries a coverage note.
pub const DEFAULT_COVERAGE_THRESHOLD: f64 = 0.25;

/// Model answer for the synthesis call.
#[derive(Debug, Deserialize)]
struct SynthesisPayload {
    #[serde(alias = "hit_patterns")]
    cross_creative_patterns: String,
    competitor_tactics: String,
    #[serde(alias = "actionable_advice")]
    next_week_recommendations: String,
}

/// Produces the macro summary for a snapshot.
pub struct AggregationSynthesizer {
    client: Arc<dyn InferenceClient>,
    retry: RetryPolicy,
    coverage_threshold: f64,
}

impl AggregationSynthesizer {
    pub fn new(client: Arc<dyn InferenceClient>, retry: RetryPolicy) -> Self {
        Self {
            client,
            retry,
            coverage_threshold: DEFAULT_COVERAGE_THRESHOLD,
        }
    }

    /// Synthesize the summary; failures are recorded, not raised.
    pub async fn synthesize(&self, snapshot: &WeeklySnapshot) -> SummaryRecord {
        if snapshot.results.is_empty() {
            return SummaryRecord::Unavailable {
                reason: "no analyses to synthesize".to_string(),
            };
        }

        info!(items = snapshot.results.len(), "generating strategic summary");
        let request = SynthesisRequest {
            prompt: build_prompt(snapshot),
            schema: synthesis_schema(),
        };

        let outcome = self
            .retry
            .run("synthesis", || self.client.synthesize(&request))
            .await;

        let parsed = match outcome {
            Ok(value) => parse_summary(value),
            Err(failure) => Err(failure.error),
        };

        match parsed {
            Ok(mut summary) => {
                summary.coverage_note = self.coverage_note(snapshot);
                SummaryRecord::Available(summary)
            }
            Err(e) => {
                warn!(error = %e, "strategic summary unavailable");
                SummaryRecord::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn coverage_note(&self, snapshot: &WeeklySnapshot) -> Option<String> {
        let degraded = snapshot.degraded_count();
        let total = snapshot.results.len();
        if degraded == 0 || degraded_ratio(degraded, total) < self.coverage_threshold {
            return None;
        }
        Some(format!(
            "Reduced coverage: {degraded} of {total} creatives could not be analyzed; patterns are drawn from the remaining {}.",
            total - degraded
        ))
    }
}

/// Build the text-only synthesis prompt, grouped by platform and ordered by rank.
pub fn build_prompt(snapshot: &WeeklySnapshot) -> String {
    let total = snapshot.results.len();
    let analyzed = total - snapshot.degraded_count();

    let mut prompt = String::new();
    prompt.push_str(
        "You are the user-acquisition strategy director for a mobile strategy game studio.\n\
         Below are structured analyses of this week's top-performing competitor video ads, grouped by ad network.\n\
         Higher-ranked creatives represent the current mainstream of their network; note any differences between networks.\n\n",
    );
    prompt.push_str(&format!(
        "Coverage: {analyzed}/{total} creatives analyzed. Entries marked DEGRADED have no analysis; mention reduced coverage if it matters.\n\n"
    ));

    for (platform, results) in group_by_platform(&snapshot.results) {
        prompt.push_str(&format!("=== {platform} top creatives ===\n"));
        for result in results {
            if result.degraded {
                let reason = result
                    .degradation_reason
                    .map_or_else(|| "unknown".to_string(), |r| r.to_string());
                prompt.push_str(&format!(
                    "[{platform} rank {}] {} [DEGRADED: {reason}]\n",
                    result.rank, result.label
                ));
            } else {
                prompt.push_str(&format!(
                    "[{platform} rank {}] {}: {}\n",
                    result.rank,
                    result.label,
                    result.dimensions.compact()
                ));
            }
        }
        prompt.push('\n');
    }

    prompt.push_str(
        "Answer strictly as JSON with three fields:\n\
         1. cross_creative_patterns - the shared mechanics behind these hits\n\
         2. competitor_tactics - how leading competitors are shifting, and how networks differ\n\
         3. next_week_recommendations - concrete creative tests our art and UA teams should run next week",
    );

    prompt
}

fn parse_summary(value: serde_json::Value) -> Result<StrategicSummary, InferenceError> {
    let payload: SynthesisPayload = serde_json::from_value(value)
        .map_err(|e| InferenceError::Malformed(format!("summary does not match schema: {e}")))?;

    let sections = [
        &payload.cross_creative_patterns,
        &payload.competitor_tactics,
        &payload.next_week_recommendations,
    ];
    if sections.iter().any(|s| s.trim().is_empty()) {
        return Err(InferenceError::Malformed(
            "summary has an empty section".to_string(),
        ));
    }

    Ok(StrategicSummary {
        cross_creative_patterns: payload.cross_creative_patterns,
        competitor_tactics: payload.competitor_tactics,
        next_week_recommendations: payload.next_week_recommendations,
        coverage_note: None,
    })
}
