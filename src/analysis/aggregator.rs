//! Result grouping and run statistics.
//!
//! Utilities for grouping per-video results and computing the counts shown
//! in the digest and the final log line.

use crate::models::{AnalysisResult, DegradationReason, Platform, TrendReport, TrendStatus, WeeklySnapshot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counts describing one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub total: usize,
    pub analyzed: usize,
    pub degraded: usize,
    pub by_platform: BTreeMap<Platform, usize>,
    pub by_reason: BTreeMap<DegradationReason, usize>,
    pub by_trend: BTreeMap<TrendStatus, usize>,
}

impl RunStats {
    /// Compute statistics from a snapshot and its trend report.
    pub fn compute(snapshot: &WeeklySnapshot, trend: &TrendReport) -> Self {
        let mut stats = Self {
            total: snapshot.results.len(),
            ..Self::default()
        };

        for result in &snapshot.results {
            *stats.by_platform.entry(result.platform).or_insert(0) += 1;
            match result.degradation_reason {
                Some(reason) if result.degraded => {
                    stats.degraded += 1;
                    *stats.by_reason.entry(reason).or_insert(0) += 1;
                }
                _ => stats.analyzed += 1,
            }
        }

        for delta in &trend.deltas {
            *stats.by_trend.entry(delta.status).or_insert(0) += 1;
        }
        if !trend.dropped.is_empty() {
            stats.by_trend.insert(TrendStatus::Dropped, trend.dropped.len());
        }

        stats
    }

    /// Share of items that went through the fallback path.
    pub fn degraded_ratio(&self) -> f64 {
        degraded_ratio(self.degraded, self.total)
    }
}

#[allow(clippy::cast_precision_loss)]
pub fn degraded_ratio(degraded: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        degraded as f64 / total as f64
    }
}

/// Group results by platform, each group sorted by rank.
pub fn group_by_platform(results: &[AnalysisResult]) -> BTreeMap<Platform, Vec<&AnalysisResult>> {
    let mut grouped: BTreeMap<Platform, Vec<&AnalysisResult>> = BTreeMap::new();

    for result in results {
        grouped.entry(result.platform).or_default().push(result);
    }

    for group in grouped.values_mut() {
        group.sort_by_key(|r| r.rank);
    }

    grouped
}

/// Degraded results sorted by platform then rank.
pub fn degraded_results(results: &[AnalysisResult]) -> Vec<&AnalysisResult> {
    let mut degraded: Vec<&AnalysisResult> = results.iter().filter(|r| r.degraded).collect();
    degraded.sort_by(|a, b| a.platform.cmp(&b.platform).then_with(|| a.rank.cmp(&b.rank)));
    degraded
}

/// One-line summary for the end-of-run log.
pub fn generate_summary_text(stats: &RunStats) -> String {
    let mut parts = vec![format!(
        "{} videos: {} analyzed, {} degraded",
        stats.total, stats.analyzed, stats.degraded
    )];

    if !stats.by_reason.is_empty() {
        let reasons: Vec<String> = stats
            .by_reason
            .iter()
            .map(|(reason, count)| format!("{reason}={count}"))
            .collect();
        parts.push(format!("reasons: {}", reasons.join(", ")));
    }

    if !stats.by_trend.is_empty() {
        let trends: Vec<String> = stats
            .by_trend
            .iter()
            .map(|(status, count)| format!("{status}={count}"))
            .collect();
        parts.push(format!("trend: {}", trends.join(", ")));
    }

    parts.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::testing::video;
    use crate::models::{CreativeDimensions, DroppedItem, TrendDelta};
    use chrono::NaiveDate;

    fn snapshot() -> WeeklySnapshot {
        let mut applovin = video("ad-3", 1);
        applovin.platform = Platform::Applovin;
        WeeklySnapshot::new(
            NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            vec![
                AnalysisResult::analyzed(&video("ad-1", 2), CreativeDimensions::unavailable()),
                AnalysisResult::fallback(&video("ad-2", 1), DegradationReason::RateLimited, "429"),
                AnalysisResult::fallback(&applovin, DegradationReason::DeadMedia, "404"),
            ],
        )
    }

    #[test]
    fn test_compute_stats() {
        let trend = TrendReport {
            baseline_date: None,
            deltas: vec![TrendDelta {
                key: "ad-1".into(),
                previous_rank: None,
                current_rank: 2,
                status: TrendStatus::New,
            }],
            dropped: vec![DroppedItem {
                key: "old".into(),
                platform: Platform::Facebook,
                previous_rank: 4,
            }],
        };
        let stats = RunStats::compute(&snapshot(), &trend);

        assert_eq!(stats.total, 3);
        assert_eq!(stats.analyzed, 1);
        assert_eq!(stats.degraded, 2);
        assert_eq!(stats.by_platform.get(&Platform::Facebook), Some(&2));
        assert_eq!(stats.by_reason.get(&DegradationReason::DeadMedia), Some(&1));
        assert_eq!(stats.by_trend.get(&TrendStatus::Dropped), Some(&1));
        assert!((stats.degraded_ratio() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_group_by_platform_sorted_by_rank() {
        let snapshot = snapshot();
        let grouped = group_by_platform(&snapshot.results);

        let facebook: Vec<_> = grouped[&Platform::Facebook].iter().map(|r| r.rank).collect();
        assert_eq!(facebook, vec![1, 2]);
        assert_eq!(grouped[&Platform::Applovin].len(), 1);
    }

    #[test]
    fn test_degraded_results_order() {
        let snapshot = snapshot();
        let degraded = degraded_results(&snapshot.results);
        let keys: Vec<_> = degraded.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["ad-2", "ad-3"]);
    }

    #[test]
    fn test_summary_text() {
        let stats = RunStats::compute(&snapshot(), &TrendReport::default());
        let text = generate_summary_text(&stats);
        assert!(text.contains("3 videos: 1 analyzed, 2 degraded"));
        assert!(text.contains("rate-limited=1"));
    }

    #[test]
    fn test_ratio_of_empty_run() {
        assert_eq!(degraded_ratio(0, 0), 0.0);
    }
}
