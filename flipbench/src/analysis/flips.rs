//! Correctness transitions between the baseline and a candidate variant

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::metrics::ratio;

/// Direction of a correctness change relative to the baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlipClass {
    StayCorrect,
    FlipSuccess,
    FlipFailure,
    Backfire,
}

impl FlipClass {
    pub fn classify(baseline_correct: bool, candidate_correct: bool) -> Self {
        match (baseline_correct, candidate_correct) {
            (false, true) => FlipClass::FlipSuccess,
            (false, false) => FlipClass::FlipFailure,
            (true, true) => FlipClass::StayCorrect,
            (true, false) => FlipClass::Backfire,
        }
    }
}

/// Flip counters for one subject (or for a whole variant)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlipCounts {
    pub stay_correct: usize,
    pub flip_success: usize,
    pub flip_failure: usize,
    pub backfire: usize,
}

impl FlipCounts {
    pub fn record(&mut self, class: FlipClass) {
        match class {
            FlipClass::StayCorrect => self.stay_correct += 1,
            FlipClass::FlipSuccess => self.flip_success += 1,
            FlipClass::FlipFailure => self.flip_failure += 1,
            FlipClass::Backfire => self.backfire += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.stay_correct + self.flip_success + self.flip_failure + self.backfire
    }

    /// Share of flip successes among all classified indices
    pub fn success_ratio(&self) -> f64 {
        ratio(self.flip_success as f64, self.total() as f64, 4)
    }

    pub fn merge(&mut self, other: &FlipCounts) {
        self.stay_correct += other.stay_correct;
        self.flip_success += other.flip_success;
        self.flip_failure += other.flip_failure;
        self.backfire += other.backfire;
    }
}

/// One row of a flip table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlipRow {
    pub subject: String,
    pub flip_success: usize,
    pub flip_failure: usize,
    pub stay_correct: usize,
    pub backfire: usize,
    pub total: usize,
    pub success_ratio: f64,
}

/// Per-subject flip breakdown of one variant, largest subjects first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlipTable {
    pub prompt: String,
    pub rows: Vec<FlipRow>,
}

impl FlipTable {
    pub fn new(prompt: impl Into<String>, by_subject: &BTreeMap<String, FlipCounts>) -> Self {
        let mut rows: Vec<FlipRow> = by_subject
            .iter()
            .map(|(subject, counts)| FlipRow {
                subject: subject.clone(),
                flip_success: counts.flip_success,
                flip_failure: counts.flip_failure,
                stay_correct: counts.stay_correct,
                backfire: counts.backfire,
                total: counts.total(),
                success_ratio: counts.success_ratio(),
            })
            .collect();
        rows.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.subject.cmp(&b.subject)));

        Self {
            prompt: prompt.into(),
            rows,
        }
    }

    /// Counters summed over every subject
    pub fn totals(&self) -> FlipCounts {
        self.rows.iter().fold(FlipCounts::default(), |mut acc, row| {
            acc.merge(&FlipCounts {
                stay_correct: row.stay_correct,
                flip_success: row.flip_success,
                flip_failure: row.flip_failure,
                backfire: row.backfire,
            });
            acc
        })
    }
}
