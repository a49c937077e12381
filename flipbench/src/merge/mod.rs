//! Shard combination and missing-index reconciliation

pub mod combiner;
pub mod reconcile;

pub use combiner::{combine, combine_variant, discover_shards, merge_missing, CombineReport};
pub use reconcile::{reconcile, MissingManifest};
