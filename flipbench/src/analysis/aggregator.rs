//! Per-variant summaries and flip tables against the baseline variant

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::flips::{FlipClass, FlipCounts, FlipTable};
use super::metrics::{ratio, ResponseMetrics};
use crate::dataset::Dataset;
use crate::layout::{parse_output_prompt, Layout};
use crate::merge::MissingManifest;
use crate::prompts::BASELINE_PROMPT;
use crate::records::{read_records, LinePolicy, ResultRecord, StoreError};
use crate::reporting::write_json;

/// Subject reported for indices the dataset does not know
pub const UNKNOWN_SUBJECT: &str = "Unknown";

/// Baseline correctness by dataset index
pub type BaselineMap = HashMap<usize, bool>;

/// Correctness of every record that has one
pub fn baseline_map(records: &[ResultRecord]) -> BaselineMap {
    records
        .iter()
        .filter_map(|r| r.correct.map(|c| (r.index, c)))
        .collect()
}

/// Summary statistics of one prompt variant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariantSummary {
    pub prompt: String,
    pub total: usize,
    pub total_correct: usize,
    pub accuracy: f64,
    pub total_words_avg: f64,
    /// Responses containing both reasoning markers
    pub think_responses: usize,
    pub think_words_avg: f64,
    pub total_wait_tokens: usize,
    pub wait_tokens_avg: f64,
    pub avg_time_s: f64,
    /// Completion tokens over records with known usage
    pub completion_tokens: i64,
    pub flip_success: usize,
    pub flip_failure: usize,
    pub stay_correct: usize,
    pub backfire: usize,
    pub index_missing_list: Vec<usize>,
    pub response_missing_list: Vec<usize>,
    pub response_ans_missing_list: Vec<usize>,
}

/// Accuracy within one subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectAccuracy {
    pub subject: String,
    pub total: usize,
    pub correct: usize,
    pub accuracy: f64,
}

/// Everything derived from one variant's canonical output
#[derive(Debug, Clone)]
pub struct VariantAnalysis {
    pub summary: VariantSummary,
    pub flips: FlipTable,
    pub subjects: Vec<SubjectAccuracy>,
    pub manifest: MissingManifest,
    /// This variant's own correctness map
    pub correct_map: BaselineMap,
}

#[derive(Default)]
struct Accumulator {
    total: usize,
    correct: usize,
    total_words: usize,
    think_responses: usize,
    think_words: usize,
    think_worded: usize,
    wait_tokens: usize,
    latency: f64,
    completion_tokens: i64,
}

impl Accumulator {
    fn add(&mut self, record: &ResultRecord, m: &ResponseMetrics) {
        self.total += 1;
        if record.correct == Some(true) {
            self.correct += 1;
        }
        self.total_words += m.total_words;
        if m.has_think {
            self.think_responses += 1;
            self.think_words += m.think_words;
            if m.think_words > 0 {
                self.think_worded += 1;
            }
        }
        self.wait_tokens += m.wait_tokens;
        self.latency += m.time_usage;
        if m.token_usage.is_known() {
            self.completion_tokens += m.token_usage.completion;
        }
    }
}

/// Computes variant summaries and flip tables over a dataset
pub struct ResultAggregator<'a> {
    dataset: &'a Dataset,
}

impl<'a> ResultAggregator<'a> {
    pub fn new(dataset: &'a Dataset) -> Self {
        Self { dataset }
    }

    fn subject(&self, index: usize) -> &str {
        self.dataset.subject(index).unwrap_or(UNKNOWN_SUBJECT)
    }

    /// Analyse one variant's records.
    ///
    /// Flips are only counted when `baseline` is given, and only for indices
    /// with a known correctness on both sides. A repeated index counts once,
    /// using its last record.
    pub fn analyze(
        &self,
        prompt: &str,
        records: &[ResultRecord],
        baseline: Option<&BaselineMap>,
    ) -> VariantAnalysis {
        let mut acc = Accumulator::default();
        let mut subjects: BTreeMap<String, (usize, usize)> = BTreeMap::new();
        let mut flips: BTreeMap<String, FlipCounts> = BTreeMap::new();

        let latest: BTreeMap<usize, &ResultRecord> = records.iter().map(|r| (r.index, r)).collect();
        for record in latest.into_values() {
            let metrics = ResponseMetrics::from_record(record);
            acc.add(record, &metrics);

            let subject = self.subject(record.index);
            let entry = subjects.entry(subject.to_string()).or_default();
            entry.0 += 1;
            if record.correct == Some(true) {
                entry.1 += 1;
            }

            let pair = baseline
                .and_then(|b| b.get(&record.index).copied())
                .zip(record.correct);
            if let Some((base, cand)) = pair {
                flips
                    .entry(subject.to_string())
                    .or_default()
                    .record(FlipClass::classify(base, cand));
            }
        }

        let flips = FlipTable::new(prompt, &flips);
        let totals = flips.totals();
        let manifest = MissingManifest::compute(self.dataset.len(), records);
        let total = acc.total as f64;

        let summary = VariantSummary {
            prompt: prompt.to_string(),
            total: acc.total,
            total_correct: acc.correct,
            accuracy: ratio(acc.correct as f64, total, 4),
            total_words_avg: ratio(acc.total_words as f64, total, 2),
            think_responses: acc.think_responses,
            think_words_avg: ratio(acc.think_words as f64, acc.think_worded as f64, 2),
            total_wait_tokens: acc.wait_tokens,
            wait_tokens_avg: ratio(acc.wait_tokens as f64, total, 2),
            avg_time_s: ratio(acc.latency, total, 2),
            completion_tokens: acc.completion_tokens,
            flip_success: totals.flip_success,
            flip_failure: totals.flip_failure,
            stay_correct: totals.stay_correct,
            backfire: totals.backfire,
            index_missing_list: manifest.index_missing.clone(),
            response_missing_list: manifest.response_missing.clone(),
            response_ans_missing_list: manifest.response_ans_missing.clone(),
        };

        let subjects = subjects
            .into_iter()
            .map(|(subject, (total, correct))| SubjectAccuracy {
                subject,
                total,
                correct,
                accuracy: ratio(correct as f64, total as f64, 4),
            })
            .collect();

        VariantAnalysis {
            summary,
            flips,
            subjects,
            manifest,
            correct_map: baseline_map(records),
        }
    }
}

/// Files written for one analysed variant
#[derive(Debug, Clone)]
pub struct VariantFiles {
    pub stats: PathBuf,
    pub flips: Option<PathBuf>,
    pub missing: PathBuf,
}

/// Output of an aggregation pass; the baseline comes first
#[derive(Debug)]
pub struct AggregateReport {
    pub analyses: Vec<(VariantAnalysis, VariantFiles)>,
}

/// Prompt names of every canonical output except the baseline, sorted
pub fn discover_outputs(layout: &Layout) -> Result<Vec<String>, StoreError> {
    let dir = layout.output_dir();
    let entries = std::fs::read_dir(dir).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound(dir.to_path_buf())
        } else {
            StoreError::io(dir, e)
        }
    })?;

    let mut prompts = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::io(dir, e))?;
        let name = entry.file_name();
        if let Some(prompt) = name.to_str().and_then(parse_output_prompt) {
            if prompt != BASELINE_PROMPT {
                prompts.push(prompt.to_string());
            }
        }
    }
    prompts.sort();
    Ok(prompts)
}

fn persist(
    layout: &Layout,
    analysis: &VariantAnalysis,
    write_flips: bool,
) -> Result<VariantFiles, StoreError> {
    let prompt = analysis.summary.prompt.as_str();

    let stats = layout.stats_file(prompt);
    write_json(&stats, &analysis.summary)?;

    let missing = layout.missing_manifest(prompt);
    analysis.manifest.save(&missing)?;

    let flips = if write_flips {
        let path = layout.flip_file(prompt);
        write_json(&path, &analysis.flips)?;
        Some(path)
    } else {
        None
    };

    Ok(VariantFiles {
        stats,
        flips,
        missing,
    })
}

/// Analyse the baseline and then each of `prompts`, writing the stats,
/// flip and missing files of each.
///
/// The baseline's canonical output must exist. A requested variant without
/// one is skipped with a warning.
pub fn aggregate(
    layout: &Layout,
    dataset: &Dataset,
    prompts: &[String],
) -> Result<AggregateReport, StoreError> {
    let aggregator = ResultAggregator::new(dataset);

    let baseline_records = read_records(&layout.canonical_output(BASELINE_PROMPT), LinePolicy::SkipInvalid)?;
    let baseline = aggregator.analyze(BASELINE_PROMPT, &baseline_records, None);
    let baseline_files = persist(layout, &baseline, false)?;
    tracing::info!(
        "Baseline {}: accuracy {} over {} records",
        BASELINE_PROMPT,
        baseline.summary.accuracy,
        baseline.summary.total
    );

    let baseline_map = baseline.correct_map.clone();
    let mut analyses = vec![(baseline, baseline_files)];

    for prompt in prompts.iter().filter(|p| p.as_str() != BASELINE_PROMPT) {
        let records = match read_records(&layout.canonical_output(prompt), LinePolicy::SkipInvalid) {
            Ok(records) => records,
            Err(StoreError::NotFound(path)) => {
                tracing::warn!("No canonical output for {} ({}), skipping", prompt, path.display());
                continue;
            }
            Err(e) => return Err(e),
        };

        let analysis = aggregator.analyze(prompt, &records, Some(&baseline_map));
        let files = persist(layout, &analysis, true)?;
        tracing::info!(
            "{}: accuracy {}, {} flip successes, {} backfires",
            prompt,
            analysis.summary.accuracy,
            analysis.summary.flip_success,
            analysis.summary.backfire
        );
        analyses.push((analysis, files));
    }

    Ok(AggregateReport { analyses })
}
