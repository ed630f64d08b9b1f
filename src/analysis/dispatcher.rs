//! Bounded concurrent dispatch of per-video analysis.
//!
//! Every item gets its own spawned task and its own deadline. Results land in
//! a slot indexed by the item's input position, so completion order never
//! matters and no shared accumulator is needed.

use super::analyzer::VideoAnalyzer;
use super::cache::AnalysisCache;
use crate::models::{AnalysisResult, DegradationReason, VideoItem};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Default number of analyses in flight.
pub const DEFAULT_WORKERS: usize = 15;

/// Fans analysis out over a bounded pool.
pub struct TaskDispatcher {
    analyzer: Arc<VideoAnalyzer>,
    workers: usize,
    task_timeout: Duration,
    show_progress: bool,
}

impl TaskDispatcher {
    pub fn new(analyzer: Arc<VideoAnalyzer>, workers: usize, task_timeout: Duration) -> Self {
        Self {
            analyzer,
            workers: workers.max(1),
            task_timeout,
            show_progress: false,
        }
    }

    /// Show a progress bar while tasks complete.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Analyze every item; returns exactly one result per item, in input order.
    ///
    /// Items whose media reference is in `cache` are answered from it without
    /// an inference call.
    pub async fn dispatch(&self, items: &[VideoItem], cache: &AnalysisCache) -> Vec<AnalysisResult> {
        let mut slots: Vec<Option<AnalysisResult>> = vec![None; items.len()];
        let mut pending: Vec<(usize, VideoItem)> = Vec::new();

        for (index, item) in items.iter().enumerate() {
            match cache.get(&item.media_reference) {
                Some(dimensions) => {
                    debug!(key = %item.key, "using cached analysis");
                    slots[index] = Some(AnalysisResult::analyzed(item, dimensions.clone()));
                }
                None => pending.push((index, item.clone())),
            }
        }

        info!(
            total = items.len(),
            cached = items.len() - pending.len(),
            workers = self.workers,
            "dispatching video analyses"
        );

        let progress = self.progress_bar(pending.len());
        let task_timeout = self.task_timeout;

        let completed: Vec<(usize, AnalysisResult)> = stream::iter(pending)
            .map(|(index, item)| {
                let analyzer = Arc::clone(&self.analyzer);
                async move {
                    let task_item = item.clone();
                    let handle = tokio::spawn(async move {
                        match tokio::time::timeout(task_timeout, analyzer.analyze(&task_item)).await {
                            Ok(result) => result,
                            Err(_) => VideoAnalyzer::fallback(
                                &task_item,
                                DegradationReason::TransientFailure,
                                format!("timed out after {}s", task_timeout.as_secs_f64()),
                            ),
                        }
                    });

                    let result = match handle.await {
                        Ok(result) => result,
                        Err(e) => VideoAnalyzer::fallback(
                            &item,
                            DegradationReason::TransientFailure,
                            format!("analysis task aborted: {e}"),
                        ),
                    };
                    (index, result)
                }
            })
            .buffer_unordered(self.workers)
            .inspect(|_| progress.inc(1))
            .collect()
            .await;

        progress.finish_and_clear();

        for (index, result) in completed {
            slots[index] = Some(result);
        }

        let results: Vec<AnalysisResult> = slots.into_iter().flatten().collect();
        debug_assert_eq!(results.len(), items.len());
        results
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} videos ({eta})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::testing::{video, ScriptedClient};
    use crate::inference::InferenceError;
    use crate::models::CreativeDimensions;
    use crate::retry::RetryPolicy;
    use std::collections::HashSet;

    fn dispatcher(client: Arc<ScriptedClient>, workers: usize, timeout: Duration) -> TaskDispatcher {
        let analyzer = Arc::new(VideoAnalyzer::new(client, RetryPolicy::immediate(2)));
        TaskDispatcher::new(analyzer, workers, timeout)
    }

    fn items(n: u32) -> Vec<VideoItem> {
        (1..=n).map(|i| video(&format!("ad-{i}"), i)).collect()
    }

    #[tokio::test]
    async fn returns_one_result_per_item_in_input_order() {
        let client = Arc::new(ScriptedClient::default().with_latency(Duration::from_millis(5)));
        let items = items(20);
        let results = dispatcher(client, 4, Duration::from_secs(5))
            .dispatch(&items, &AnalysisCache::default())
            .await;

        assert_eq!(results.len(), 20);
        for (item, result) in items.iter().zip(&results) {
            assert_eq!(item.key, result.key);
            assert_eq!(result.dimensions.hook_design, format!("hook for {}", item.key));
        }
        let unique: HashSet<_> = results.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(unique.len(), 20);
    }

    #[tokio::test]
    async fn never_exceeds_worker_limit() {
        let client = Arc::new(ScriptedClient::default().with_latency(Duration::from_millis(20)));
        let results = dispatcher(client.clone(), 3, Duration::from_secs(5))
            .dispatch(&items(12), &AnalysisCache::default())
            .await;

        assert_eq!(results.len(), 12);
        assert!(client.max_in_flight() <= 3, "max in flight {}", client.max_in_flight());
        assert!(client.max_in_flight() >= 2);
    }

    #[tokio::test]
    async fn forced_failures_are_contained() {
        let client = Arc::new(
            ScriptedClient::default()
                .fail("ad-2", InferenceError::NotFound("404".into()))
                .fail("ad-4", InferenceError::RateLimited("429".into()))
                .hang("ad-6", Duration::from_secs(30)),
        );
        let results = dispatcher(client, 5, Duration::from_millis(200))
            .dispatch(&items(8), &AnalysisCache::default())
            .await;

        assert_eq!(results.len(), 8);
        let degraded: Vec<_> = results.iter().filter(|r| r.degraded).collect();
        assert_eq!(degraded.len(), 3);

        assert_eq!(results[1].degradation_reason, Some(DegradationReason::DeadMedia));
        assert_eq!(results[3].degradation_reason, Some(DegradationReason::RateLimited));
        assert_eq!(
            results[5].degradation_reason,
            Some(DegradationReason::TransientFailure)
        );
        assert!(results[5]
            .degradation_detail
            .as_deref()
            .is_some_and(|d| d.contains("timed out")));
        assert!(!results[0].degraded);
        assert!(!results[7].degraded);
    }

    #[tokio::test]
    async fn panicking_task_becomes_fallback() {
        let client = Arc::new(ScriptedClient::default().panic_on("ad-3"));
        let results = dispatcher(client, 2, Duration::from_secs(5))
            .dispatch(&items(4), &AnalysisCache::default())
            .await;

        assert_eq!(results.len(), 4);
        assert_eq!(results[2].key, "ad-3");
        assert!(results[2].degraded);
        assert_eq!(results.iter().filter(|r| r.degraded).count(), 1);
    }

    #[tokio::test]
    async fn cached_items_skip_inference() {
        let client = Arc::new(ScriptedClient::default());
        let items = items(3);
        let mut cache = AnalysisCache::default();
        let mut cached = CreativeDimensions::unavailable();
        cached.hook_design = "from cache".into();
        cache.insert(items[1].media_reference.clone(), cached);

        let results = dispatcher(client.clone(), 2, Duration::from_secs(5))
            .dispatch(&items, &cache)
            .await;

        assert_eq!(results[1].dimensions.hook_design, "from cache");
        assert!(!results[1].degraded);
        assert_eq!(client.calls_for("ad-2"), 0);
        assert_eq!(client.calls_for("ad-1"), 1);
    }

    #[tokio::test]
    async fn empty_input_yields_empty_output() {
        let client = Arc::new(ScriptedClient::default());
        let results = dispatcher(client, 15, Duration::from_secs(1))
            .dispatch(&[], &AnalysisCache::default())
            .await;
        assert!(results.is_empty());
    }
}
