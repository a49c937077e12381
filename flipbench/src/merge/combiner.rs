//! Folding shard logs into one canonical output per prompt variant

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::layout::{parse_shard_id, Layout};
use crate::records::{read_records, write_records, LinePolicy, ResultRecord, StoreError};

/// Records keyed by dataset index; later inserts replace earlier ones
pub type IndexedResults = BTreeMap<usize, ResultRecord>;

/// Summary of a combine or merge
#[derive(Debug, Clone, PartialEq)]
pub struct CombineReport {
    pub output: PathBuf,
    /// Shard files that were actually read
    pub sources: Vec<PathBuf>,
    pub records: usize,
}

/// Fold one shard file over `acc`.
///
/// Returns false if the file does not exist. Lines that fail to parse
/// (typically a partial line from an interrupted worker) are skipped.
pub fn fold_file(acc: &mut IndexedResults, path: &Path) -> Result<bool, StoreError> {
    match read_records(path, LinePolicy::SkipInvalid) {
        Ok(records) => {
            tracing::debug!("Folding {} records from {}", records.len(), path.display());
            for record in records {
                acc.insert(record.index, record);
            }
            Ok(true)
        }
        Err(StoreError::NotFound(_)) => {
            tracing::warn!("Shard not found: {}, skipping", path.display());
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Merge shard files in the given order, resolving duplicate indices by
/// last-write-wins. The result is sorted by index.
pub fn combine<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<ResultRecord>, StoreError> {
    let mut acc = IndexedResults::new();
    for path in paths {
        fold_file(&mut acc, path.as_ref())?;
    }
    Ok(acc.into_values().collect())
}

/// Shard logs of `prompt` under run tag `tag`, ordered by numeric shard id
pub fn discover_shards(layout: &Layout, tag: &str, prompt: &str) -> Result<Vec<(u32, PathBuf)>, StoreError> {
    let dir = layout.shard_dir(tag);
    let entries = std::fs::read_dir(&dir).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound(dir.clone())
        } else {
            StoreError::io(&dir, e)
        }
    })?;

    let mut shards = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::io(&dir, e))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if let Some(id) = parse_shard_id(name, prompt) {
            shards.push((id, entry.path()));
        }
    }
    shards.sort();
    Ok(shards)
}

/// Rebuild the canonical output of `prompt` from every shard under `tag`
pub fn combine_variant(layout: &Layout, tag: &str, prompt: &str) -> Result<CombineReport, StoreError> {
    let shards = discover_shards(layout, tag, prompt)?;
    if shards.is_empty() {
        return Err(StoreError::NotFound(layout.shard_log(tag, prompt, 0)));
    }

    let mut acc = IndexedResults::new();
    let mut sources = Vec::new();
    for (_, path) in shards {
        if fold_file(&mut acc, &path)? {
            sources.push(path);
        }
    }

    let output = layout.canonical_output(prompt);
    write_records(&output, acc.values())?;
    tracing::info!(
        "Combined {} shard files ({} records) -> {}",
        sources.len(),
        acc.len(),
        output.display()
    );

    Ok(CombineReport {
        output,
        sources,
        records: acc.len(),
    })
}

/// Fold the fill-missing shards `shard_ids` of `tag` over the existing
/// canonical output of `prompt` and rewrite it.
///
/// The canonical output must already exist. An empty `shard_ids` means
/// shard 0 only. Absent shards are skipped.
pub fn merge_missing(
    layout: &Layout,
    prompt: &str,
    tag: &str,
    shard_ids: &[u32],
) -> Result<CombineReport, StoreError> {
    let output = layout.canonical_output(prompt);
    let mut acc: IndexedResults = read_records(&output, LinePolicy::SkipInvalid)?
        .into_iter()
        .map(|r| (r.index, r))
        .collect();
    tracing::info!("Loaded {} records from {}", acc.len(), output.display());

    let shard_ids = if shard_ids.is_empty() { &[0][..] } else { shard_ids };
    let mut sources = Vec::new();
    for &id in shard_ids {
        let path = layout.shard_log(tag, prompt, id);
        if fold_file(&mut acc, &path)? {
            tracing::info!("Merged shard {}", path.display());
            sources.push(path);
        }
    }

    write_records(&output, acc.values())?;
    tracing::info!("Merge complete. Total items: {}", acc.len());

    Ok(CombineReport {
        output,
        sources,
        records: acc.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Question;
    use crate::records::{RecordAppender, TokenUsage};
    use std::io::Write;
    use tempfile::tempdir;

    fn record(index: usize, response_ans: i64) -> ResultRecord {
        let q = Question::new(format!("q{}", index), "s", ["a", "b", "c", "d"], 1);
        ResultRecord::answered(
            index,
            &q,
            "p".into(),
            format!("The answer is ({})", (b'a' + response_ans as u8) as char),
            response_ans,
            0.5,
            TokenUsage::UNKNOWN,
        )
    }

    fn write_shard(path: &Path, records: &[ResultRecord]) {
        let mut appender = RecordAppender::open(path).unwrap();
        for r in records {
            appender.append(r).unwrap();
        }
    }

    fn answers(records: &[ResultRecord]) -> Vec<(usize, Option<i64>)> {
        records.iter().map(|r| (r.index, r.response_ans)).collect()
    }

    #[test]
    fn test_overlap_last_write_wins() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.jsonl");
        let b = dir.path().join("b.jsonl");
        write_shard(&a, &[record(0, 0), record(1, 0), record(2, 0)]);
        write_shard(&b, &[record(2, 1), record(3, 1)]);

        let combined = combine(&[&a, &b]).unwrap();
        assert_eq!(
            answers(&combined),
            vec![(0, Some(0)), (1, Some(0)), (2, Some(1)), (3, Some(1))]
        );

        let reversed = combine(&[&b, &a]).unwrap();
        assert_eq!(reversed[2].response_ans, Some(0));
    }

    #[test]
    fn test_duplicates_within_one_file() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.jsonl");
        write_shard(&a, &[record(5, 0), record(4, 2), record(5, 3)]);

        let combined = combine(&[&a]).unwrap();
        assert_eq!(answers(&combined), vec![(4, Some(2)), (5, Some(3))]);
    }

    #[test]
    fn test_missing_file_and_partial_line_skipped() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.jsonl");
        write_shard(&a, &[record(0, 1)]);
        let mut file = std::fs::OpenOptions::new().append(true).open(&a).unwrap();
        write!(file, "{{\"index\": 1, \"question\": \"tr").unwrap();

        let combined = combine(&[a, dir.path().join("absent.jsonl")]).unwrap();
        assert_eq!(answers(&combined), vec![(0, Some(1))]);
    }

    #[test]
    fn test_truncated_multibyte_tail_skipped() {
        let dir = tempdir().unwrap();
        let layout = Layout::rooted(dir.path());
        let shard = layout.shard_log("t", "slow", 0);
        write_shard(&shard, &[record(0, 1)]);
        let mut file = std::fs::OpenOptions::new().append(true).open(&shard).unwrap();
        file.write_all(b"{\"index\": 1, \"response\": \"caf\xC3").unwrap();

        let report = combine_variant(&layout, "t", "slow").unwrap();
        assert_eq!(report.records, 1);
        let output = read_records(&report.output, LinePolicy::Strict).unwrap();
        assert_eq!(answers(&output), vec![(0, Some(1))]);
    }

    #[test]
    fn test_shards_ordered_numerically() {
        let dir = tempdir().unwrap();
        let layout = Layout::rooted(dir.path());
        write_shard(&layout.shard_log("t", "slow", 10), &[record(7, 3)]);
        write_shard(&layout.shard_log("t", "slow", 2), &[record(7, 1)]);
        write_shard(&layout.shard_log("t", "slower", 1), &[record(7, 2)]);

        let shards = discover_shards(&layout, "t", "slow").unwrap();
        let ids: Vec<u32> = shards.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![2, 10]);

        let report = combine_variant(&layout, "t", "slow").unwrap();
        assert_eq!(report.sources.len(), 2);
        let output = read_records(&report.output, LinePolicy::Strict).unwrap();
        assert_eq!(answers(&output), vec![(7, Some(3))]);
    }

    #[test]
    fn test_zero_padded_shard_name_ignored() {
        let dir = tempdir().unwrap();
        let layout = Layout::rooted(dir.path());
        write_shard(&layout.shard_log("t", "slow", 1), &[record(4, 1)]);
        write_shard(&layout.shard_dir("t").join("slow_shard01.jsonl"), &[record(4, 2)]);

        let shards = discover_shards(&layout, "t", "slow").unwrap();
        assert_eq!(shards, vec![(1, layout.shard_log("t", "slow", 1))]);

        let report = combine_variant(&layout, "t", "slow").unwrap();
        let output = read_records(&report.output, LinePolicy::Strict).unwrap();
        assert_eq!(answers(&output), vec![(4, Some(1))]);
    }

    #[test]
    fn test_combine_is_idempotent() {
        let dir = tempdir().unwrap();
        let layout = Layout::rooted(dir.path());
        write_shard(&layout.shard_log("t", "quick", 0), &[record(3, 0), record(1, 1)]);
        write_shard(&layout.shard_log("t", "quick", 1), &[record(2, 2), record(1, 3)]);

        combine_variant(&layout, "t", "quick").unwrap();
        let first = std::fs::read(layout.canonical_output("quick")).unwrap();
        combine_variant(&layout, "t", "quick").unwrap();
        let second = std::fs::read(layout.canonical_output("quick")).unwrap();

        assert_eq!(first, second);
        let output = read_records(&layout.canonical_output("quick"), LinePolicy::Strict).unwrap();
        assert_eq!(
            answers(&output),
            vec![(1, Some(3)), (2, Some(2)), (3, Some(0))]
        );
    }

    #[test]
    fn test_combine_without_shards_fails() {
        let dir = tempdir().unwrap();
        let layout = Layout::rooted(dir.path());
        assert!(matches!(
            combine_variant(&layout, "t", "quick"),
            Err(StoreError::NotFound(_))
        ));
        std::fs::create_dir_all(layout.shard_dir("t")).unwrap();
        assert!(matches!(
            combine_variant(&layout, "t", "quick"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_merge_missing_overrides_canonical() {
        let dir = tempdir().unwrap();
        let layout = Layout::rooted(dir.path());
        let output = layout.canonical_output("smart");
        write_records(&output, &[record(0, 0), record(2, 0)]).unwrap();
        write_shard(&layout.shard_log("fill", "smart", 0), &[record(1, 1), record(2, 2)]);

        let report = merge_missing(&layout, "smart", "fill", &[]).unwrap();
        assert_eq!(report.sources.len(), 1);
        assert_eq!(report.records, 3);

        let merged = read_records(&output, LinePolicy::Strict).unwrap();
        assert_eq!(
            answers(&merged),
            vec![(0, Some(0)), (1, Some(1)), (2, Some(2))]
        );

        // absent shard ids are tolerated
        let report = merge_missing(&layout, "smart", "fill", &[4, 5]).unwrap();
        assert!(report.sources.is_empty());
        assert_eq!(report.records, 3);
    }

    #[test]
    fn test_merge_missing_requires_output() {
        let dir = tempdir().unwrap();
        let layout = Layout::rooted(dir.path());
        assert!(matches!(
            merge_missing(&layout, "smart", "fill", &[0]),
            Err(StoreError::NotFound(_))
        ));
    }
}
