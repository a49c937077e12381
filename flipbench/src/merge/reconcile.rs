//! Gap detection between a canonical output and the dataset

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::layout::Layout;
use crate::records::{read_records, LinePolicy, ResultRecord, StoreError};

/// Indices a canonical output still lacks, persisted as
/// `{prompt}_missing.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingManifest {
    /// Dataset indices with no record at all
    #[serde(rename = "index_missing_list")]
    pub index_missing: Vec<usize>,
    /// Records with a response but no extracted answer
    #[serde(rename = "response_ans_missing_list")]
    pub response_ans_missing: Vec<usize>,
    /// Records with no response
    #[serde(rename = "response_missing_list")]
    pub response_missing: Vec<usize>,
}

impl MissingManifest {
    /// Compare `records` against a dataset of `dataset_len` questions.
    ///
    /// Records whose index falls outside the dataset are ignored.
    pub fn compute(dataset_len: usize, records: &[ResultRecord]) -> Self {
        let mut present = HashSet::new();
        let mut response_missing = BTreeSet::new();
        let mut response_ans_missing = BTreeSet::new();

        for record in records.iter().filter(|r| r.index < dataset_len) {
            present.insert(record.index);
            if record.response.is_none() {
                response_missing.insert(record.index);
            } else if record.response_ans.is_none() {
                response_ans_missing.insert(record.index);
            }
        }

        Self {
            index_missing: (0..dataset_len).filter(|i| !present.contains(i)).collect(),
            response_ans_missing: response_ans_missing.into_iter().collect(),
            response_missing: response_missing.into_iter().collect(),
        }
    }

    /// Sorted, de-duplicated union of the three lists
    pub fn targets(&self) -> Vec<usize> {
        self.index_missing
            .iter()
            .chain(&self.response_ans_missing)
            .chain(&self.response_missing)
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.index_missing.is_empty()
            && self.response_ans_missing.is_empty()
            && self.response_missing.is_empty()
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            line: 0,
            source,
        })?;
        std::fs::write(path, json).map_err(|e| StoreError::io(path, e))
    }

    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(path.to_path_buf())
            } else {
                StoreError::io(path, e)
            }
        })?;
        serde_json::from_str(&content).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            line: source.line(),
            source,
        })
    }
}

/// Recompute and persist the manifest of `prompt` from its canonical output
pub fn reconcile(layout: &Layout, prompt: &str, dataset_len: usize) -> Result<MissingManifest, StoreError> {
    let records = read_records(&layout.canonical_output(prompt), LinePolicy::SkipInvalid)?;
    let manifest = MissingManifest::compute(dataset_len, &records);
    let path = layout.missing_manifest(prompt);
    manifest.save(&path)?;

    tracing::info!(
        "{}: {} missing, {} without answer, {} without response -> {}",
        prompt,
        manifest.index_missing.len(),
        manifest.response_ans_missing.len(),
        manifest.response_missing.len(),
        path.display()
    );
    Ok(manifest)
}
