//! Data models for the weekly creative report.
//!
//! This module contains the core data structures that flow through the
//! pipeline: the week's video items, their per-item analyses, the archived
//! snapshot, the strategic summary and the trend deltas.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Sentinel written into every dimension of a fallback result.
pub const UNAVAILABLE: &str = "unavailable";

/// Distribution channel a creative was ranked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
    Facebook,
    Applovin,
    /// Any network the source reports that we do not model explicitly.
    Other,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Ios => write!(f, "iOS"),
            Platform::Android => write!(f, "Android"),
            Platform::Facebook => write!(f, "Facebook"),
            Platform::Applovin => write!(f, "Applovin"),
            Platform::Other => write!(f, "Other"),
        }
    }
}

impl From<&str> for Platform {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "ios" => Platform::Ios,
            "android" => Platform::Android,
            "facebook" | "meta" => Platform::Facebook,
            "applovin" => Platform::Applovin,
            _ => Platform::Other,
        }
    }
}

/// One ranked video creative for the current week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoItem {
    /// Stable creative ID used to match the same ad across weeks.
    pub key: String,
    /// Channel the ad was ranked on.
    pub platform: Platform,
    /// Current-week rank (1 = best placement).
    pub rank: u32,
    /// Opaque handle to the video (normally a URL).
    pub media_reference: String,
    /// Whatever else the source attached (app name, first seen, duration...).
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl VideoItem {
    /// Returns a metadata value as a string, if present and textual.
    pub fn metadata_str(&self, name: &str) -> Option<&str> {
        self.metadata.get(name).and_then(|v| v.as_str())
    }

    /// Human label for logs and prompts: the app name when known, otherwise the key.
    pub fn label(&self) -> &str {
        self.metadata_str("app_name").unwrap_or(&self.key)
    }
}

/// The five creative dimensions extracted per video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreativeDimensions {
    /// How the first seconds grab attention.
    pub hook_design: String,
    /// Emotion the ad plays on.
    pub emotional_appeal: String,
    /// Narrative or gameplay sequence.
    pub content_structure: String,
    /// The single most satisfying moment.
    #[serde(alias = "wow_factor")]
    pub core_payoff: String,
    /// On-screen text, voice-over and call to action.
    #[serde(alias = "copywriting_features")]
    pub copy_features: String,
}

impl CreativeDimensions {
    /// All five dimensions set to the [`UNAVAILABLE`] sentinel.
    pub fn unavailable() -> Self {
        Self {
            hook_design: UNAVAILABLE.to_string(),
            emotional_appeal: UNAVAILABLE.to_string(),
            content_structure: UNAVAILABLE.to_string(),
            core_payoff: UNAVAILABLE.to_string(),
            copy_features: UNAVAILABLE.to_string(),
        }
    }

    /// Returns the names of dimensions that are blank.
    pub fn blank_fields(&self) -> Vec<&'static str> {
        [
            ("hook_design", &self.hook_design),
            ("emotional_appeal", &self.emotional_appeal),
            ("content_structure", &self.content_structure),
            ("core_payoff", &self.core_payoff),
            ("copy_features", &self.copy_features),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    /// One-line compressed form used as synthesis input.
    pub fn compact(&self) -> String {
        format!(
            "hook: {} | emotion: {} | structure: {} | payoff: {} | copy: {}",
            self.hook_design,
            self.emotional_appeal,
            self.content_structure,
            self.core_payoff,
            self.copy_features
        )
    }
}

/// Why an analysis fell back to the placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DegradationReason {
    /// The media reference no longer resolves.
    DeadMedia,
    /// Rate limit persisted through every retry.
    RateLimited,
    /// Network/server failure persisted through every retry, or the task timed out.
    TransientFailure,
    /// The model answered with something that does not fit the schema.
    ParseFailure,
    /// The service refused the request outright.
    RequestRejected,
}

impl fmt::Display for DegradationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradationReason::DeadMedia => write!(f, "dead-media"),
            DegradationReason::RateLimited => write!(f, "rate-limited"),
            DegradationReason::TransientFailure => write!(f, "transient-failure"),
            DegradationReason::ParseFailure => write!(f, "parse-failure"),
            DegradationReason::RequestRejected => write!(f, "request-rejected"),
        }
    }
}

/// The normalized analysis of exactly one [`VideoItem`].
///
/// Successful and fallback results share one shape; only `degraded`,
/// `degradation_reason` and `degradation_detail` differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Identity key of the originating item.
    pub key: String,
    pub platform: Platform,
    pub rank: u32,
    /// Label carried over for the digest (app name or key).
    pub label: String,
    pub dimensions: CreativeDimensions,
    pub degraded: bool,
    pub degradation_reason: Option<DegradationReason>,
    /// Free-text error context for operators.
    pub degradation_detail: Option<String>,
}

impl AnalysisResult {
    /// Creates a successful result.
    pub fn analyzed(item: &VideoItem, dimensions: CreativeDimensions) -> Self {
        Self {
            key: item.key.clone(),
            platform: item.platform,
            rank: item.rank,
            label: item.label().to_string(),
            dimensions,
            degraded: false,
            degradation_reason: None,
            degradation_detail: None,
        }
    }

    /// Creates a fallback result with sentinel dimensions.
    pub fn fallback(item: &VideoItem, reason: DegradationReason, detail: impl Into<String>) -> Self {
        Self {
            key: item.key.clone(),
            platform: item.platform,
            rank: item.rank,
            label: item.label().to_string(),
            dimensions: CreativeDimensions::unavailable(),
            degraded: true,
            degradation_reason: Some(reason),
            degradation_detail: Some(detail.into()),
        }
    }
}

/// One entry of the ordered rank list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedKey {
    pub key: String,
    pub platform: Platform,
    pub rank: u32,
}

/// All analyses of one weekly run, plus the rank list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySnapshot {
    pub run_date: NaiveDate,
    /// Results in input order, one per item.
    pub results: Vec<AnalysisResult>,
    /// Rank list ordered by platform then rank.
    pub ranking: Vec<RankedKey>,
}

impl WeeklySnapshot {
    /// Builds a snapshot and derives its rank list from the results.
    pub fn new(run_date: NaiveDate, results: Vec<AnalysisResult>) -> Self {
        let mut ranking: Vec<RankedKey> = results
            .iter()
            .map(|r| RankedKey {
                key: r.key.clone(),
                platform: r.platform,
                rank: r.rank,
            })
            .collect();
        ranking.sort_by(|a, b| {
            a.platform
                .cmp(&b.platform)
                .then_with(|| a.rank.cmp(&b.rank))
                .then_with(|| a.key.cmp(&b.key))
        });

        Self {
            run_date,
            results,
            ranking,
        }
    }

    /// Looks up the rank of a key in this snapshot.
    pub fn rank_of(&self, key: &str) -> Option<&RankedKey> {
        self.ranking.iter().find(|r| r.key == key)
    }

    /// Results that went through the fallback path.
    pub fn degraded(&self) -> impl Iterator<Item = &AnalysisResult> {
        self.results.iter().filter(|r| r.degraded)
    }

    pub fn degraded_count(&self) -> usize {
        self.degraded().count()
    }
}

/// Macro strategic insight synthesized from one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategicSummary {
    /// Mechanics shared by the winning creatives.
    pub cross_creative_patterns: String,
    /// Shifts and differences in competitor tactics across channels.
    pub competitor_tactics: String,
    /// Concrete tests to run next week.
    pub next_week_recommendations: String,
    /// Set when a meaningful share of items was degraded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage_note: Option<String>,
}

/// The archived form of the summary: present, or explicitly absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SummaryRecord {
    Available(StrategicSummary),
    Unavailable { reason: String },
}

impl SummaryRecord {
    pub fn summary(&self) -> Option<&StrategicSummary> {
        match self {
            SummaryRecord::Available(s) => Some(s),
            SummaryRecord::Unavailable { .. } => None,
        }
    }
}

/// Week-over-week movement classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendStatus {
    New,
    Up,
    Down,
    Stable,
    Dropped,
}

impl fmt::Display for TrendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendStatus::New => write!(f, "new"),
            TrendStatus::Up => write!(f, "up"),
            TrendStatus::Down => write!(f, "down"),
            TrendStatus::Stable => write!(f, "stable"),
            TrendStatus::Dropped => write!(f, "dropped"),
        }
    }
}

impl TrendStatus {
    /// Returns an arrow for the digest table.
    pub fn arrow(&self) -> &'static str {
        match self {
            TrendStatus::New => "🆕",
            TrendStatus::Up => "⬆️",
            TrendStatus::Down => "⬇️",
            TrendStatus::Stable => "➡️",
            TrendStatus::Dropped => "❌",
        }
    }
}

/// Rank movement of one current-week creative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendDelta {
    pub key: String,
    pub previous_rank: Option<u32>,
    pub current_rank: u32,
    pub status: TrendStatus,
}

impl TrendDelta {
    /// Places gained (positive) or lost (negative) since last week.
    pub fn places_gained(&self) -> Option<i64> {
        self.previous_rank
            .map(|prev| i64::from(prev) - i64::from(self.current_rank))
    }
}

/// A creative present in the prior snapshot but missing this week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedItem {
    pub key: String,
    pub platform: Platform,
    pub previous_rank: u32,
}

/// Output of rank tracking for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendReport {
    /// Date of the snapshot compared against; `None` on a cold start.
    pub baseline_date: Option<NaiveDate>,
    /// One delta per current item, in current snapshot order.
    pub deltas: Vec<TrendDelta>,
    pub dropped: Vec<DroppedItem>,
}

impl TrendReport {
    pub fn is_cold_start(&self) -> bool {
        self.baseline_date.is_none()
    }

    pub fn delta_for(&self, key: &str) -> Option<&TrendDelta> {
        self.deltas.iter().find(|d| d.key == key)
    }
}

/// Everything one run hands to the renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub snapshot: WeeklySnapshot,
    pub summary: SummaryRecord,
    pub trend: TrendReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(key: &str, rank: u32) -> VideoItem {
        VideoItem {
            key: key.to_string(),
            platform: Platform::Facebook,
            rank,
            media_reference: format!("https://cdn.example.com/{key}.mp4"),
            metadata: BTreeMap::new(),
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_platform_from_str() {
        assert_eq!(Platform::from("Applovin"), Platform::Applovin);
        assert_eq!(Platform::from("FACEBOOK"), Platform::Facebook);
        assert_eq!(Platform::from("ios"), Platform::Ios);
        assert_eq!(Platform::from("tiktok"), Platform::Other);
    }

    #[test]
    fn test_fallback_has_same_shape_as_success() {
        let video = item("ad-1", 1);
        let ok = AnalysisResult::analyzed(
            &video,
            CreativeDimensions {
                hook_design: "a".into(),
                emotional_appeal: "b".into(),
                content_structure: "c".into(),
                core_payoff: "d".into(),
                copy_features: "e".into(),
            },
        );
        let failed = AnalysisResult::fallback(&video, DegradationReason::DeadMedia, "404");

        let ok_json = serde_json::to_value(&ok).unwrap();
        let failed_json = serde_json::to_value(&failed).unwrap();
        let ok_keys: Vec<_> = ok_json.as_object().unwrap().keys().collect();
        let failed_keys: Vec<_> = failed_json.as_object().unwrap().keys().collect();
        assert_eq!(ok_keys, failed_keys);

        let dims_ok: Vec<_> = ok_json["dimensions"].as_object().unwrap().keys().collect();
        let dims_failed: Vec<_> = failed_json["dimensions"]
            .as_object()
            .unwrap()
            .keys()
            .collect();
        assert_eq!(dims_ok, dims_failed);
        assert_eq!(failed.dimensions.hook_design, UNAVAILABLE);
        assert_eq!(failed_json["degradation_reason"], "dead-media");
    }

    #[test]
    fn test_blank_fields() {
        let mut dims = CreativeDimensions::unavailable();
        assert!(dims.blank_fields().is_empty());
        dims.core_payoff = "  ".into();
        assert_eq!(dims.blank_fields(), vec!["core_payoff"]);
    }

    #[test]
    fn test_snapshot_ranking_sorted() {
        let mut applovin = item("ad-3", 1);
        applovin.platform = Platform::Applovin;
        let results = vec![
            AnalysisResult::analyzed(&item("ad-2", 2), CreativeDimensions::unavailable()),
            AnalysisResult::analyzed(&item("ad-1", 1), CreativeDimensions::unavailable()),
            AnalysisResult::analyzed(&applovin, CreativeDimensions::unavailable()),
        ];
        let snapshot = WeeklySnapshot::new(date("2026-10-19"), results);

        let keys: Vec<_> = snapshot.ranking.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["ad-1", "ad-2", "ad-3"]);
        assert_eq!(snapshot.rank_of("ad-2").map(|r| r.rank), Some(2));
        assert_eq!(snapshot.results[0].key, "ad-2");
    }

    #[test]
    fn test_summary_record_tagging() {
        let record = SummaryRecord::Unavailable {
            reason: "synthesis failed".into(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "unavailable");
        assert!(record.summary().is_none());
    }

    #[test]
    fn test_places_gained() {
        let delta = TrendDelta {
            key: "x".into(),
            previous_rank: Some(10),
            current_rank: 3,
            status: TrendStatus::Up,
        };
        assert_eq!(delta.places_gained(), Some(7));
    }

    #[test]
    fn test_label_prefers_app_name() {
        let mut video = item("ad-9", 9);
        assert_eq!(video.label(), "ad-9");
        video
            .metadata
            .insert("app_name".into(), serde_json::json!("Last War"));
        assert_eq!(video.label(), "Last War");
    }
}
