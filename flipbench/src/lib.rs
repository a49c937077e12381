//! Prompt-Variant Flip Benchmark
//!
//! This crate evaluates LLM providers on a multiple-choice question set
//! (the MMLU test split) under interchangeable prompt strategies, and
//! explains accuracy differences between strategies as per-subject
//! correctness transitions ("flips") relative to the `standard` baseline.
//!
//! # Pipeline
//!
//! - [`runner::ShardRunner`] issues one request per question with bounded
//!   retries and appends results to a per-shard JSON-lines log
//! - [`merge::combine_variant`] folds shard logs into a canonical output
//!   (last write wins per index)
//! - [`merge::reconcile`] lists indices still missing and feeds them back
//!   into fill-missing runs
//! - [`analysis::aggregate`] writes per-variant summaries and flip tables
//!
//! # Example
//!
//! ```no_run
//! use flipbench::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_or_default();
//!     let layout = Layout::new(config.paths.clone());
//!     let dataset = load_dataset_from_file(layout.dataset())?;
//!
//!     let provider = ProviderRegistry::new().create("together", &config, None)?;
//!     let paths = ShardPaths {
//!         shard_log: layout.shard_log("20250503", "slow", 0),
//!         run_log: layout.run_log("20250503", "slow", 0),
//!         error_log: layout.error_log("20250503", "slow", 0),
//!     };
//!     let runner = ShardRunner::new(
//!         &dataset,
//!         PromptVariant::Slow,
//!         provider,
//!         RunnerConfig::default(),
//!         paths,
//!     );
//!     let outcome = runner.run(&TargetSet::Range { start: 0, end: 100 }).await?;
//!     println!("{} written, {} errors", outcome.written.len(), outcome.error_indices.len());
//!
//!     combine_variant(&layout, "20250503", "slow")?;
//!     let report = aggregate(&layout, &dataset, &["slow".to_string()])?;
//!     print_console_report(&report);
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod config;
pub mod dataset;
pub mod layout;
pub mod merge;
pub mod prompts;
pub mod providers;
pub mod records;
pub mod reporting;
pub mod runner;

pub use config::Config;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::analysis::{aggregate, FlipTable, ResultAggregator, VariantSummary};
    pub use crate::config::Config;
    pub use crate::dataset::{load_dataset_from_file, Dataset, Question};
    pub use crate::layout::Layout;
    pub use crate::merge::{combine_variant, merge_missing, reconcile, MissingManifest};
    pub use crate::prompts::PromptVariant;
    pub use crate::providers::{ProviderGateway, ProviderRegistry};
    pub use crate::records::{ResultRecord, TokenUsage};
    pub use crate::reporting::print_console_report;
    pub use crate::runner::{RunMode, RunnerConfig, ShardOutcome, ShardPaths, ShardRunner, TargetSet};
}
