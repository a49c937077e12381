//! On-disk naming of shard logs, run logs, manifests and outputs
//!
//! ```text
//! {temp_dir}/{tag}/{prompt}_shard{N}.jsonl               shard log
//! {log_dir}/{tag}/{prompt}_shard{N}.log                   run log
//! {log_dir}/{tag}/{prompt}_error_index_shard{N}.log       error indices
//! {missing_dir}/{prompt}_missing.json                     missing manifest
//! {output_dir}/{prompt}_output.jsonl                      canonical output
//! {stats_dir}/{prompt}_stats.json                         summary
//! {flip_dir}/{prompt}_flip.json                           flip table
//! ```

use std::path::{Path, PathBuf};

use crate::config::PathsConfig;

const SHARD_MARKER: &str = "_shard";
const SHARD_EXT: &str = "jsonl";
const OUTPUT_SUFFIX: &str = "_output.jsonl";

/// Resolves every path the pipeline reads or writes
#[derive(Debug, Clone)]
pub struct Layout {
    paths: PathsConfig,
}

impl Layout {
    pub fn new(paths: PathsConfig) -> Self {
        Self { paths }
    }

    /// Layout with every directory placed under `root` (used by tests)
    pub fn rooted(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self::new(PathsConfig {
            dataset: root.join("data/mmlu_test.jsonl"),
            temp_dir: root.join("temp"),
            log_dir: root.join("log"),
            output_dir: root.join("output"),
            missing_dir: root.join("log/missing_lists"),
            stats_dir: root.join("output/stats"),
            flip_dir: root.join("output/flips"),
        })
    }

    pub fn dataset(&self) -> &Path {
        &self.paths.dataset
    }

    pub fn shard_dir(&self, tag: &str) -> PathBuf {
        self.paths.temp_dir.join(tag)
    }

    pub fn shard_log(&self, tag: &str, prompt: &str, shard_id: u32) -> PathBuf {
        self.shard_dir(tag)
            .join(format!("{}{}{}.{}", prompt, SHARD_MARKER, shard_id, SHARD_EXT))
    }

    pub fn run_log(&self, tag: &str, prompt: &str, shard_id: u32) -> PathBuf {
        self.paths
            .log_dir
            .join(tag)
            .join(format!("{}{}{}.log", prompt, SHARD_MARKER, shard_id))
    }

    pub fn error_log(&self, tag: &str, prompt: &str, shard_id: u32) -> PathBuf {
        self.paths
            .log_dir
            .join(tag)
            .join(format!("{}_error_index{}{}.log", prompt, SHARD_MARKER, shard_id))
    }

    pub fn missing_manifest(&self, prompt: &str) -> PathBuf {
        self.paths.missing_dir.join(format!("{}_missing.json", prompt))
    }

    pub fn output_dir(&self) -> &Path {
        &self.paths.output_dir
    }

    pub fn canonical_output(&self, prompt: &str) -> PathBuf {
        self.paths
            .output_dir
            .join(format!("{}{}", prompt, OUTPUT_SUFFIX))
    }

    pub fn stats_file(&self, prompt: &str) -> PathBuf {
        self.paths.stats_dir.join(format!("{}_stats.json", prompt))
    }

    pub fn flip_file(&self, prompt: &str) -> PathBuf {
        self.paths.flip_dir.join(format!("{}_flip.json", prompt))
    }
}

/// Shard id encoded in a shard log file name for `prompt`, if it is one.
///
/// Only the form [`Layout::shard_log`] writes is accepted, so no two files
/// share an id (`slow_shard01.jsonl` is not shard 1).
pub fn parse_shard_id(file_name: &str, prompt: &str) -> Option<u32> {
    let digits = file_name
        .strip_prefix(prompt)?
        .strip_prefix(SHARD_MARKER)?
        .strip_suffix(SHARD_EXT)?
        .strip_suffix('.')?;
    let id: u32 = digits.parse().ok()?;
    (id.to_string() == digits).then_some(id)
}

/// Prompt name encoded in a canonical output file name, if it is one
pub fn parse_output_prompt(file_name: &str) -> Option<&str> {
    file_name
        .strip_suffix(OUTPUT_SUFFIX)
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_paths() {
        let layout = Layout::rooted("/work");
        assert_eq!(
            layout.shard_log("20250503", "slow", 3),
            PathBuf::from("/work/temp/20250503/slow_shard3.jsonl")
        );
        assert_eq!(
            layout.error_log("20250503", "slow", 3),
            PathBuf::from("/work/log/20250503/slow_error_index_shard3.log")
        );
        assert_eq!(
            layout.canonical_output("slow"),
            PathBuf::from("/work/output/slow_output.jsonl")
        );
    }

    #[test]
    fn test_parse_shard_id() {
        assert_eq!(parse_shard_id("slow_shard12.jsonl", "slow"), Some(12));
        assert_eq!(parse_shard_id("slow_shard.jsonl", "slow"), None);
        assert_eq!(parse_shard_id("slow_shard1.log", "slow"), None);
        assert_eq!(parse_shard_id("slow_shard0.jsonl", "slow"), Some(0));
        assert_eq!(parse_shard_id("slow_shard01.jsonl", "slow"), None);
        assert_eq!(parse_shard_id("slow_shard+1.jsonl", "slow"), None);
        // a prompt whose name extends another must not match
        assert_eq!(parse_shard_id("fast_thinking_shard0.jsonl", "fast"), None);
    }

    #[test]
    fn test_parse_output_prompt() {
        assert_eq!(parse_output_prompt("minimalist_output.jsonl"), Some("minimalist"));
        assert_eq!(parse_output_prompt("_output.jsonl"), None);
        assert_eq!(parse_output_prompt("notes.txt"), None);
    }
}
