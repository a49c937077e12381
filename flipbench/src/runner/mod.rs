//! Shard execution: prompt rendering, bounded retries, answer extraction and
//! append-only persistence of results

pub mod extract;
pub mod run_log;
pub mod shard;
pub mod targets;

pub use extract::extract_answer;
pub use run_log::{RunLog, RunMode};
pub use shard::{FailureBreakdown, RunError, RunnerConfig, ShardOutcome, ShardPaths, ShardRunner};
pub use targets::TargetSet;
