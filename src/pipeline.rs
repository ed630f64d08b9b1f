//! Weekly run orchestration.
//!
//! 1. Refuse early if the run date is already archived.
//! 2. Dispatch per-video analysis (bounded, failure-isolated).
//! 3. Synthesize the strategic summary from the collected results.
//! 4. Compute rank trends against the newest older snapshot. An unreadable
//!    baseline is logged and treated as a cold start.
//! 5. Archive snapshot and summary.
//!
//! Stages 3 and 4 start only after every analysis has been collected.

use crate::analysis::{AggregationSynthesizer, AnalysisCache, TaskDispatcher};
use crate::archive::{ArchiveError, ArchiveStore};
use crate::models::{RunOutcome, SummaryRecord, VideoItem, WeeklySnapshot};
use crate::trend::RankTracker;
use chrono::NaiveDate;
use thiserror::Error;
use tracing::{error, info, warn};

/// Run-level failures. Per-item failures never surface here.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Every item and the synthesis call failed; nothing was archived.
    #[error("inference service unavailable: all {items} analyses and the synthesis failed")]
    InferenceUnavailable { items: usize },
}

/// The analysis-and-trend pipeline.
pub struct Pipeline {
    dispatcher: TaskDispatcher,
    synthesizer: AggregationSynthesizer,
    tracker: RankTracker,
    store: ArchiveStore,
}

impl Pipeline {
    pub fn new(dispatcher: TaskDispatcher, synthesizer: AggregationSynthesizer, store: ArchiveStore) -> Self {
        Self {
            dispatcher,
            synthesizer,
            tracker: RankTracker,
            store,
        }
    }

    /// Execute one weekly run. New successful analyses are merged into `cache`.
    pub async fn run(
        &self,
        run_date: NaiveDate,
        items: &[VideoItem],
        cache: &mut AnalysisCache,
    ) -> Result<RunOutcome, PipelineError> {
        if self.store.contains(run_date) {
            return Err(ArchiveError::Conflict { date: run_date }.into());
        }

        info!("Step 1: analyzing {} videos", items.len());
        let results = self.dispatcher.dispatch(items, cache).await;
        let snapshot = WeeklySnapshot::new(run_date, results);

        let degraded = snapshot.degraded_count();
        if degraded > 0 {
            let keys: Vec<&str> = snapshot.degraded().map(|r| r.key.as_str()).collect();
            warn!(degraded, "degraded items: {}", keys.join(", "));
        }

        info!("Step 2: generating strategic summary");
        let summary = self.synthesizer.synthesize(&snapshot).await;

        if !items.is_empty() && degraded == items.len() && summary.summary().is_none() {
            error!("every analysis and the synthesis failed; not archiving this run");
            return Err(PipelineError::InferenceUnavailable { items: items.len() });
        }

        info!("Step 3: computing rank trends");
        let trend = match self.tracker.track(&self.store, &snapshot) {
            Ok(trend) => trend,
            Err(e) => {
                warn!("previous run unreadable, reporting without a baseline: {}", e);
                self.tracker.compare(None, &snapshot)
            }
        };

        info!("Step 4: archiving run {}", run_date);
        self.store.put(run_date, &snapshot, &summary)?;

        let added = cache.record(items, &snapshot.results);
        if added > 0 {
            info!("Cached {} new analyses", added);
        }

        if let SummaryRecord::Unavailable { reason } = &summary {
            warn!("run archived without strategic summary: {}", reason);
        }

        Ok(RunOutcome {
            snapshot,
            summary,
            trend,
        })
    }
}
