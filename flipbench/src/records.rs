//! Result records and their line-delimited JSON store

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dataset::Question;

/// Token accounting reported by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt: i64,
    pub completion: i64,
    pub total: i64,
}

impl TokenUsage {
    /// Sentinel used when the provider does not report usage
    pub const UNKNOWN: TokenUsage = TokenUsage {
        prompt: -1,
        completion: -1,
        total: -1,
    };

    pub fn new(prompt: i64, completion: i64, total: i64) -> Self {
        Self {
            prompt,
            completion,
            total,
        }
    }

    pub fn is_known(&self) -> bool {
        *self != Self::UNKNOWN
    }
}

impl Default for TokenUsage {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl std::fmt::Display for TokenUsage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "prompt={} completion={} total={}",
            self.prompt, self.completion, self.total
        )
    }
}

/// One answered question, as persisted in shard logs and canonical outputs.
///
/// The runner always writes `response`, `response_ans` and `correct`; they
/// are optional here so canonical outputs carrying nulls still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub index: usize,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub choices: Vec<String>,
    #[serde(default)]
    pub answer: Option<u8>,
    pub response_ans: Option<i64>,
    pub correct: Option<bool>,
    #[serde(default)]
    pub prompt: String,
    pub response: Option<String>,
    #[serde(default)]
    pub time_usage: f64,
    #[serde(default)]
    pub token_usage: TokenUsage,
}

impl ResultRecord {
    /// Build the record for a successfully answered question
    pub fn answered(
        index: usize,
        question: &Question,
        prompt: String,
        response: String,
        response_ans: i64,
        time_usage: f64,
        token_usage: TokenUsage,
    ) -> Self {
        Self {
            index,
            question: question.question.clone(),
            choices: question.choices.to_vec(),
            answer: Some(question.answer),
            response_ans: Some(response_ans),
            correct: Some(response_ans == i64::from(question.answer)),
            prompt,
            response: Some(response),
            time_usage,
            token_usage,
        }
    }

    /// Response text, treating a null response as empty
    pub fn response_text(&self) -> &str {
        self.response.as_deref().unwrap_or("")
    }
}

/// Errors reading or writing result files
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path} line {line}: {source}")]
    Json {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid UTF-8 in {path} line {line}: {source}")]
    Utf8 {
        path: PathBuf,
        line: usize,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("Required file not found: {0}")]
    NotFound(PathBuf),
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// How to treat lines that fail to parse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinePolicy {
    /// Fail on the first bad line
    Strict,
    /// Log and skip bad lines (partial trailing writes from killed workers)
    SkipInvalid,
}

/// Read every record from a JSON-lines file
pub fn read_records(path: &Path, policy: LinePolicy) -> Result<Vec<ResultRecord>, StoreError> {
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound(path.to_path_buf())
        } else {
            StoreError::io(path, e)
        }
    })?;

    let mut records = Vec::new();
    // Raw bytes: a worker killed mid-write can leave a truncated UTF-8 sequence
    for (idx, bytes) in BufReader::new(file).split(b'\n').enumerate() {
        let bytes = bytes.map_err(|e| StoreError::io(path, e))?;
        let line_no = idx + 1;

        let err = match std::str::from_utf8(&bytes) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => match serde_json::from_str::<ResultRecord>(line) {
                Ok(record) => {
                    records.push(record);
                    continue;
                }
                Err(source) => StoreError::Json {
                    path: path.to_path_buf(),
                    line: line_no,
                    source,
                },
            },
            Err(source) => StoreError::Utf8 {
                path: path.to_path_buf(),
                line: line_no,
                source,
            },
        };

        match policy {
            LinePolicy::Strict => return Err(err),
            LinePolicy::SkipInvalid => {
                tracing::warn!("Skipping line {}: {}", line_no, err);
            }
        }
    }

    Ok(records)
}

/// Replace the contents of `path` with `records`, one per line.
///
/// The file is written to a temporary sibling and renamed into place, so a
/// reader never observes a half-written output.
pub fn write_records<'a>(
    path: &Path,
    records: impl IntoIterator<Item = &'a ResultRecord>,
) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }

    let tmp_path = tmp_sibling(path);
    {
        let file = File::create(&tmp_path).map_err(|e| StoreError::io(&tmp_path, e))?;
        let mut writer = BufWriter::new(file);
        for record in records {
            write_line(&mut writer, record, &tmp_path)?;
        }
        writer.flush().map_err(|e| StoreError::io(&tmp_path, e))?;
    }

    std::fs::rename(&tmp_path, path).map_err(|e| StoreError::io(path, e))
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_line(
    writer: &mut impl Write,
    record: &ResultRecord,
    path: &Path,
) -> Result<(), StoreError> {
    let line = serde_json::to_string(record).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        line: record.index,
        source,
    })?;
    writeln!(writer, "{}", line).map_err(|e| StoreError::io(path, e))
}

/// Append-only writer for a shard log
pub struct RecordAppender {
    path: PathBuf,
    file: File,
}

impl RecordAppender {
    /// Open (creating if needed) a shard log for appending
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StoreError::io(&path, e))?;
        Ok(Self { path, file })
    }

    /// Append one record and flush it, so a killed worker loses at most the
    /// line being written
    pub fn append(&mut self, record: &ResultRecord) -> Result<(), StoreError> {
        write_line(&mut self.file, record, &self.path)?;
        self.file.flush().map_err(|e| StoreError::io(&self.path, e))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample(index: usize, correct: bool) -> ResultRecord {
        let q = Question::new("q", "s", ["a", "b", "c", "d"], 0);
        let ans = if correct { 0 } else { 1 };
        ResultRecord::answered(index, &q, "p".into(), "r".into(), ans, 1.5, TokenUsage::UNKNOWN)
    }

    #[test]
    fn test_answered_sets_correctness() {
        assert_eq!(sample(0, true).correct, Some(true));
        assert_eq!(sample(0, false).correct, Some(false));
    }

    #[test]
    fn test_append_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/shard0.jsonl");

        let mut appender = RecordAppender::open(&path).unwrap();
        appender.append(&sample(3, true)).unwrap();
        appender.append(&sample(1, false)).unwrap();

        let records = read_records(&path, LinePolicy::Strict).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].index, 3);
        assert_eq!(records[1].correct, Some(false));
    }

    #[test]
    fn test_partial_line_policy() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shard.jsonl");
        let good = serde_json::to_string(&sample(0, true)).unwrap();
        std::fs::write(&path, format!("{}\n{{\"index\": 1, \"resp", good)).unwrap();

        assert!(matches!(
            read_records(&path, LinePolicy::Strict),
            Err(StoreError::Json { line: 2, .. })
        ));
        let records = read_records(&path, LinePolicy::SkipInvalid).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_truncated_utf8_line_policy() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shard.jsonl");
        let mut bytes = serde_json::to_vec(&sample(0, true)).unwrap();
        bytes.push(b'\n');
        bytes.extend_from_slice(b"{\"index\": 1, \"response\": \"caf\xC3");
        std::fs::write(&path, bytes).unwrap();

        assert!(matches!(
            read_records(&path, LinePolicy::Strict),
            Err(StoreError::Utf8 { line: 2, .. })
        ));
        let records = read_records(&path, LinePolicy::SkipInvalid).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].index, 0);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let err = read_records(&dir.path().join("absent.jsonl"), LinePolicy::Strict).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_null_fields_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        std::fs::write(
            &path,
            "{\"index\": 7, \"response\": null, \"response_ans\": null, \"correct\": null}\n",
        )
        .unwrap();

        let records = read_records(&path, LinePolicy::Strict).unwrap();
        assert_eq!(records[0].index, 7);
        assert_eq!(records[0].response_text(), "");
        assert!(!records[0].token_usage.is_known());
    }
}
