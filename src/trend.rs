//! Week-over-week rank tracking.
//!
//! Rank 1 is the best placement: a smaller number this week than last week is
//! `up`, a larger one is `down`. Creatives missing from the prior snapshot are
//! `new`; creatives missing from the current one are listed separately as dropped.

use crate::archive::{ArchiveError, ArchiveStore};
use crate::models::{DroppedItem, TrendDelta, TrendReport, TrendStatus, WeeklySnapshot};
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::info;

/// Classify a rank change.
pub fn classify(previous_rank: Option<u32>, current_rank: u32) -> TrendStatus {
    match previous_rank {
        None => TrendStatus::New,
        Some(previous) => match current_rank.cmp(&previous) {
            Ordering::Less => TrendStatus::Up,
            Ordering::Greater => TrendStatus::Down,
            Ordering::Equal => TrendStatus::Stable,
        },
    }
}

/// Compares a run against the archived history.
#[derive(Debug, Clone, Copy, Default)]
pub struct RankTracker;

impl RankTracker {
    /// Load the newest snapshot strictly older than `current` and compare.
    pub fn track(&self, store: &ArchiveStore, current: &WeeklySnapshot) -> Result<TrendReport, ArchiveError> {
        let prior = store.latest_before(current.run_date)?;
        match &prior {
            Some(entry) => info!("Comparing ranks against run of {}", entry.run_date),
            None => info!("No earlier run archived, treating as cold start"),
        }
        Ok(self.compare(prior.as_ref().map(|e| &e.snapshot), current))
    }

    /// Pure comparison of two snapshots. `None` means cold start.
    pub fn compare(&self, prior: Option<&WeeklySnapshot>, current: &WeeklySnapshot) -> TrendReport {
        let Some(prior) = prior else {
            return TrendReport {
                baseline_date: None,
                deltas: current
                    .results
                    .iter()
                    .map(|r| TrendDelta {
                        key: r.key.clone(),
                        previous_rank: None,
                        current_rank: r.rank,
                        status: TrendStatus::New,
                    })
                    .collect(),
                dropped: Vec::new(),
            };
        };

        let deltas = current
            .results
            .iter()
            .map(|r| {
                let previous_rank = prior.rank_of(&r.key).map(|p| p.rank);
                TrendDelta {
                    key: r.key.clone(),
                    previous_rank,
                    current_rank: r.rank,
                    status: classify(previous_rank, r.rank),
                }
            })
            .collect();

        let current_keys: HashSet<&str> = current.results.iter().map(|r| r.key.as_str()).collect();
        let dropped = prior
            .ranking
            .iter()
            .filter(|p| !current_keys.contains(p.key.as_str()))
            .map(|p| DroppedItem {
                key: p.key.clone(),
                platform: p.platform,
                previous_rank: p.rank,
            })
            .collect();

        TrendReport {
            baseline_date: Some(prior.run_date),
            deltas,
            dropped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::testing::video;
    use crate::models::{AnalysisResult, CreativeDimensions, Platform, SummaryRecord};
    use chrono::NaiveDate;

    fn snapshot(date: &str, ranked: &[(&str, u32)]) -> WeeklySnapshot {
        let results = ranked
            .iter()
            .map(|(key, rank)| {
                AnalysisResult::analyzed(&video(key, *rank), CreativeDimensions::unavailable())
            })
            .collect();
        WeeklySnapshot::new(NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(), results)
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(Some(10), 3), TrendStatus::Up);
        assert_eq!(classify(Some(3), 10), TrendStatus::Down);
        assert_eq!(classify(Some(4), 4), TrendStatus::Stable);
        assert_eq!(classify(None, 1), TrendStatus::New);
    }

    #[test]
    fn climbing_item_is_up_and_missing_item_is_dropped() {
        let prior = snapshot("2026-10-12", &[("x", 10), ("y", 2)]);
        let current = snapshot("2026-10-19", &[("x", 3)]);
        let report = RankTracker.compare(Some(&prior), &current);

        let x = report.delta_for("x").unwrap();
        assert_eq!(x.status, TrendStatus::Up);
        assert_eq!(x.previous_rank, Some(10));
        assert!(report.delta_for("y").is_none(), "dropped items are not deltas");
        assert_eq!(report.dropped.len(), 1);
        assert_eq!(report.dropped[0].key, "y");
        assert_eq!(report.dropped[0].previous_rank, 2);
    }

    #[test]
    fn cold_start_marks_everything_new() {
        let current = snapshot("2026-10-19", &[("a", 1), ("b", 2)]);
        let report = RankTracker.compare(None, &current);

        assert!(report.is_cold_start());
        assert!(report.deltas.iter().all(|d| d.status == TrendStatus::New));
        assert!(report.dropped.is_empty());
    }

    #[test]
    fn end_to_end_week_over_week() {
        let prior = snapshot("2026-10-12", &[("A", 2), ("B", 2), ("D", 1)]);
        let current = snapshot("2026-10-19", &[("A", 1), ("B", 2), ("C", 3)]);
        let report = RankTracker.compare(Some(&prior), &current);

        assert_eq!(report.delta_for("A").unwrap().status, TrendStatus::Up);
        assert_eq!(report.delta_for("B").unwrap().status, TrendStatus::Stable);
        assert_eq!(report.delta_for("C").unwrap().status, TrendStatus::New);
        let dropped: Vec<_> = report.dropped.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(dropped, vec!["D"]);
        assert_eq!(report.deltas.len(), 3);
    }

    #[test]
    fn same_ad_id_on_two_channels_is_tracked_per_channel() {
        let on = |platform: Platform, key: &str, rank: u32| {
            let mut item = video(key, rank);
            item.platform = platform;
            AnalysisResult::analyzed(&item, CreativeDimensions::unavailable())
        };
        let date = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        let prior = WeeklySnapshot::new(
            date("2026-10-12"),
            vec![on(Platform::Applovin, "applovin:AD_ID_0001", 5)],
        );
        let current = WeeklySnapshot::new(
            date("2026-10-19"),
            vec![
                on(Platform::Applovin, "applovin:AD_ID_0001", 2),
                on(Platform::Facebook, "facebook:AD_ID_0001", 1),
            ],
        );
        let report = RankTracker.compare(Some(&prior), &current);

        let applovin = report.delta_for("applovin:AD_ID_0001").unwrap();
        assert_eq!(applovin.status, TrendStatus::Up);
        assert_eq!(applovin.previous_rank, Some(5));
        let facebook = report.delta_for("facebook:AD_ID_0001").unwrap();
        assert_eq!(facebook.status, TrendStatus::New);
        assert!(report.dropped.is_empty());
    }

    #[test]
    fn track_uses_strictly_older_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArchiveStore::open(dir.path()).unwrap();
        let none = SummaryRecord::Unavailable { reason: "x".into() };

        let older = snapshot("2026-10-05", &[("a", 5)]);
        let prior = snapshot("2026-10-12", &[("a", 1)]);
        store.put(older.run_date, &older, &none).unwrap();
        store.put(prior.run_date, &prior, &none).unwrap();

        let current = snapshot("2026-10-19", &[("a", 3)]);
        let report = RankTracker.track(&store, &current).unwrap();

        assert_eq!(report.baseline_date, Some(prior.run_date));
        assert_eq!(report.delta_for("a").unwrap().status, TrendStatus::Down);
    }

    #[test]
    fn track_on_empty_archive_is_cold_start() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArchiveStore::open(dir.path()).unwrap();
        let report = RankTracker
            .track(&store, &snapshot("2026-10-19", &[("a", 1)]))
            .unwrap();
        assert!(report.is_cold_start());
    }
}
