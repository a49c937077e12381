//! Result analysis: response metrics, variant summaries and flip tables

pub mod aggregator;
pub mod flips;
pub mod metrics;

pub use aggregator::{
    aggregate, baseline_map, discover_outputs, AggregateReport, BaselineMap, ResultAggregator,
    SubjectAccuracy, VariantAnalysis, VariantFiles, VariantSummary, UNKNOWN_SUBJECT,
};
pub use flips::{FlipClass, FlipCounts, FlipRow, FlipTable};
pub use metrics::{ratio, round_to, ResponseMetrics};
