//! Target index sets for a shard run

use std::collections::BTreeSet;

use crate::merge::MissingManifest;

/// Which dataset indices a shard run should process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSet {
    /// Half-open range `start..end`; `end` is clamped to the dataset size
    Range { start: usize, end: usize },
    /// Explicit indices, processed in the given order
    List(Vec<usize>),
    /// Union of a missing manifest's three lists (a fill-missing run)
    FillMissing(MissingManifest),
}

impl TargetSet {
    /// Parse a comma-separated index list such as `100,102,105`
    pub fn parse_list(text: &str) -> Result<Self, String> {
        text.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<usize>()
                    .map_err(|e| format!("Invalid index '{}': {}", s, e))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(TargetSet::List)
    }

    /// Ordered indices to run against a dataset of `dataset_len` questions
    pub fn resolve(&self, dataset_len: usize) -> Vec<usize> {
        match self {
            TargetSet::Range { start, end } => (*start..(*end).min(dataset_len)).collect(),
            TargetSet::List(indices) => indices.clone(),
            TargetSet::FillMissing(manifest) => manifest.targets(),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            TargetSet::Range { start, end } => format!("range {}..{}", start, end),
            TargetSet::List(indices) => format!("{} listed indices", indices.len()),
            TargetSet::FillMissing(manifest) => {
                format!("{} missing indices", manifest.targets().len())
            }
        }
    }
}

/// Indices in `targets` that fall outside `[0, dataset_len)`, without repeats
pub fn out_of_range(targets: &[usize], dataset_len: usize) -> Vec<usize> {
    targets
        .iter()
        .copied()
        .filter(|idx| *idx >= dataset_len)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
