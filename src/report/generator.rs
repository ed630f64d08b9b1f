//! Run digest generation.
//!
//! Renders one run as Markdown for operators, or as the JSON payload the
//! HTML renderer consumes.

use crate::analysis::aggregator::{degraded_results, group_by_platform};
use crate::analysis::RunStats;
use crate::models::{RunOutcome, StrategicSummary, SummaryRecord, TrendReport, TrendStatus, WeeklySnapshot};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Facts about the run itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestMetadata {
    pub run_date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    /// Models used, or "mock".
    pub inference: String,
    pub duration_seconds: f64,
}

/// Everything the digest shows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunDigest {
    pub metadata: DigestMetadata,
    pub stats: RunStats,
    #[serde(flatten)]
    pub outcome: RunOutcome,
}

impl RunDigest {
    pub fn new(metadata: DigestMetadata, outcome: RunOutcome) -> Self {
        let stats = RunStats::compute(&outcome.snapshot, &outcome.trend);
        Self {
            metadata,
            stats,
            outcome,
        }
    }
}

/// Generate the Markdown digest.
pub fn generate_markdown_digest(digest: &RunDigest) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "# Weekly Creative Digest - {}\n\n",
        digest.metadata.run_date
    ));
    output.push_str(&generate_metadata_section(&digest.metadata, &digest.stats));
    output.push_str(&generate_degraded_section(&digest.outcome.snapshot));
    output.push_str(&generate_strategy_section(&digest.outcome.summary));
    output.push_str(&generate_creatives_section(&digest.outcome.snapshot));
    output.push_str(&generate_trend_section(
        &digest.outcome.snapshot,
        &digest.outcome.trend,
    ));
    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(metadata: &DigestMetadata, stats: &RunStats) -> String {
    let mut section = String::new();

    section.push_str("## Run\n\n");
    section.push_str(&format!("- **Run Date:** {}\n", metadata.run_date));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Inference:** `{}`\n", metadata.inference));
    section.push_str(&format!(
        "- **Videos:** {} ({} analyzed, {} degraded, {:.0}%)\n",
        stats.total,
        stats.analyzed,
        stats.degraded,
        stats.degraded_ratio() * 100.0
    ));
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n\n",
        metadata.duration_seconds
    ));

    if !stats.by_platform.is_empty() {
        section.push_str("| Platform | Videos |\n");
        section.push_str("|:---|:---:|\n");
        for (platform, count) in &stats.by_platform {
            section.push_str(&format!("| {platform} | {count} |\n"));
        }
        section.push('\n');
    }

    section
}

fn generate_degraded_section(snapshot: &WeeklySnapshot) -> String {
    let degraded = degraded_results(&snapshot.results);
    if degraded.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str(&format!("## Degraded Videos ({})\n\n", degraded.len()));
    section.push_str("| Platform | Rank | Creative | Reason | Detail |\n");
    section.push_str("|:---|:---:|:---|:---|:---|\n");

    for result in degraded {
        let reason = result
            .degradation_reason
            .map_or_else(|| "unknown".to_string(), |r| r.to_string());
        let detail = table_cell(result.degradation_detail.as_deref().unwrap_or(""));
        section.push_str(&format!(
            "| {} | {} | {} (`{}`) | {} | {} |\n",
            result.platform,
            result.rank,
            table_cell(&result.label),
            table_cell(&result.key),
            reason,
            detail
        ));
    }
    section.push('\n');

    section
}

fn generate_strategy_section(summary: &SummaryRecord) -> String {
    let mut section = String::new();
    section.push_str("## Strategic Summary\n\n");

    match summary {
        SummaryRecord::Available(summary) => section.push_str(&generate_summary_body(summary)),
        SummaryRecord::Unavailable { reason } => {
            section.push_str(&format!("*Strategic summary unavailable: {reason}*\n\n"));
        }
    }

    section
}

fn generate_summary_body(summary: &StrategicSummary) -> String {
    let mut body = String::new();

    if let Some(note) = &summary.coverage_note {
        body.push_str(&format!("> **Note:** {note}\n\n"));
    }
    body.push_str("### Cross-Creative Patterns\n\n");
    body.push_str(&format!("{}\n\n", summary.cross_creative_patterns));
    body.push_str("### Competitor Tactics\n\n");
    body.push_str(&format!("{}\n\n", summary.competitor_tactics));
    body.push_str("### Next Week\n\n");
    body.push_str(&format!("{}\n\n", summary.next_week_recommendations));

    body
}

fn generate_creatives_section(snapshot: &WeeklySnapshot) -> String {
    let analyzed: Vec<_> = snapshot.results.iter().filter(|r| !r.degraded).collect();
    if analyzed.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Creative Breakdown\n\n");

    for (platform, results) in group_by_platform(&snapshot.results) {
        let results: Vec<_> = results.into_iter().filter(|r| !r.degraded).collect();
        if results.is_empty() {
            continue;
        }
        section.push_str(&format!("### {platform}\n\n"));
        for result in results {
            let dims = &result.dimensions;
            section.push_str(&format!("#### #{} {}\n\n", result.rank, result.label));
            section.push_str(&format!("- **Hook:** {}\n", dims.hook_design));
            section.push_str(&format!("- **Emotion:** {}\n", dims.emotional_appeal));
            section.push_str(&format!("- **Structure:** {}\n", dims.content_structure));
            section.push_str(&format!("- **Payoff:** {}\n", dims.core_payoff));
            section.push_str(&format!("- **Copy:** {}\n\n", dims.copy_features));
        }
    }

    section
}

fn generate_trend_section(snapshot: &WeeklySnapshot, trend: &TrendReport) -> String {
    let mut section = String::new();
    section.push_str("## Rank Trends\n\n");

    match trend.baseline_date {
        Some(date) => section.push_str(&format!("Compared with the run of {date}.\n\n")),
        None => section.push_str("No earlier run archived; every creative is new.\n\n"),
    }

    if !trend.deltas.is_empty() {
        section.push_str("| Creative | Platform | Previous | Current | Trend |\n");
        section.push_str("|:---|:---|:---:|:---:|:---:|\n");
        for result in group_by_platform(&snapshot.results).into_values().flatten() {
            let Some(delta) = trend.delta_for(&result.key) else {
                continue;
            };
            let previous = delta
                .previous_rank
                .map_or_else(|| "-".to_string(), |r| r.to_string());
            let movement = match delta.places_gained() {
                Some(gained) if gained != 0 => format!("{} {gained:+}", delta.status.arrow()),
                _ => format!("{} {}", delta.status.arrow(), delta.status),
            };
            section.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                table_cell(&result.label),
                result.platform,
                previous,
                delta.current_rank,
                movement
            ));
        }
        section.push('\n');
    }

    if !trend.dropped.is_empty() {
        section.push_str(&format!(
            "### {} Dropped Out ({})\n\n",
            TrendStatus::Dropped.arrow(),
            trend.dropped.len()
        ));
        for dropped in &trend.dropped {
            section.push_str(&format!(
                "- `{}` ({}, previously #{})\n",
                dropped.key, dropped.platform, dropped.previous_rank
            ));
        }
        section.push('\n');
    }

    section
}

/// Escape text placed inside a Markdown table cell.
fn table_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

fn generate_footer() -> String {
    "---\n\n*Digest generated by AdScope*\n".to_string()
}

/// Generate the JSON render payload.
pub fn generate_json_digest(digest: &RunDigest) -> Result<String> {
    serde_json::to_string_pretty(digest).map_err(Into::into)
}

/// Write a rendered digest to `path`.
pub fn write_digest(content: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write digest to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::testing::video;
    use crate::models::{
        AnalysisResult, CreativeDimensions, DegradationReason, DroppedItem, Platform, TrendDelta,
    };

    fn create_test_digest(summary: SummaryRecord) -> RunDigest {
        let run_date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let mut dims = CreativeDimensions::unavailable();
        dims.hook_design = "Castle burns in the first second".to_string();
        let results = vec![
            AnalysisResult::analyzed(&video("ad-1", 1), dims),
            AnalysisResult::fallback(&video("ad-2", 2), DegradationReason::DeadMedia, "HTTP 404"),
        ];
        let trend = TrendReport {
            baseline_date: Some(NaiveDate::from_ymd_opt(2026, 10, 12).unwrap()),
            deltas: vec![
                TrendDelta {
                    key: "ad-1".into(),
                    previous_rank: Some(4),
                    current_rank: 1,
                    status: TrendStatus::Up,
                },
                TrendDelta {
                    key: "ad-2".into(),
                    previous_rank: None,
                    current_rank: 2,
                    status: TrendStatus::New,
                },
            ],
            dropped: vec![DroppedItem {
                key: "ad-9".into(),
                platform: Platform::Facebook,
                previous_rank: 3,
            }],
        };

        RunDigest::new(
            DigestMetadata {
                run_date,
                generated_at: Utc::now(),
                inference: "mock".to_string(),
                duration_seconds: 1.5,
            },
            RunOutcome {
                snapshot: WeeklySnapshot::new(run_date, results),
                summary,
                trend,
            },
        )
    }

    fn available() -> SummaryRecord {
        SummaryRecord::Available(StrategicSummary {
            cross_creative_patterns: "Fail-state hooks dominate".into(),
            competitor_tactics: "Shift to live-action".into(),
            next_week_recommendations: "Test a burning-castle opener".into(),
            coverage_note: None,
        })
    }

    #[test]
    fn test_generate_markdown_digest() {
        let md = generate_markdown_digest(&create_test_digest(available()));

        assert!(md.contains("# Weekly Creative Digest - 2026-10-19"));
        assert!(md.contains("2 (1 analyzed, 1 degraded, 50%)"));
        assert!(md.contains("## Degraded Videos (1)"));
        assert!(md.contains("dead-media"));
        assert!(md.contains("Fail-state hooks dominate"));
        assert!(md.contains("Castle burns in the first second"));
        assert!(md.contains("Compared with the run of 2026-10-12"));
        assert!(md.contains("+3"));
        assert!(md.contains("`ad-9` (Facebook, previously #3)"));
    }

    #[test]
    fn test_pipes_in_names_are_escaped_in_tables() {
        let mut digest = create_test_digest(available());
        digest.outcome.snapshot.results[0].label = "Rise | Fall".into();
        digest.outcome.snapshot.results[1].label = "Clash | Kings".into();
        digest.outcome.snapshot.results[1].key = "fb|2".into();
        let md = generate_markdown_digest(&digest);

        assert!(md.contains("| Rise \\| Fall | Facebook | 4 | 1 |"));
        assert!(md.contains("Clash \\| Kings (`fb\\|2`)"));
    }

    #[test]
    fn test_unavailable_summary_is_stated() {
        let md = generate_markdown_digest(&create_test_digest(SummaryRecord::Unavailable {
            reason: "HTTP 503".into(),
        }));
        assert!(md.contains("Strategic summary unavailable: HTTP 503"));
        assert!(!md.contains("### Cross-Creative Patterns"));
    }

    #[test]
    fn test_generate_json_digest() {
        let json = generate_json_digest(&create_test_digest(available())).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["metadata"]["run_date"], "2026-10-19");
        assert_eq!(value["stats"]["degraded"], 1);
        assert_eq!(value["summary"]["status"], "available");
        assert_eq!(value["snapshot"]["results"].as_array().unwrap().len(), 2);
        assert_eq!(value["trend"]["dropped"][0]["key"], "ad-9");
    }

    #[test]
    fn test_write_digest_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/digest.md");
        write_digest("# hi\n", &path).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "# hi\n");
    }
}
