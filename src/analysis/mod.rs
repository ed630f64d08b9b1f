//! Analysis modules.
//!
//! Per-video extraction, bounded concurrent dispatch, cross-video synthesis,
//! the analysis cache and run statistics.

pub mod aggregator;
pub mod analyzer;
pub mod cache;
pub mod dispatcher;
pub mod synthesizer;

pub use aggregator::RunStats;
pub use analyzer::VideoAnalyzer;
pub use cache::AnalysisCache;
pub use dispatcher::TaskDispatcher;
pub use synthesizer::AggregationSynthesizer;
