//! Results reporting

use std::path::Path;

use serde::Serialize;

use crate::analysis::{AggregateReport, VariantAnalysis};
use crate::records::StoreError;

/// Flip rows shown per variant on the console
const CONSOLE_FLIP_ROWS: usize = 10;

/// Write `value` as pretty JSON, creating parent directories
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    let json = serde_json::to_string_pretty(value).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        line: 0,
        source,
    })?;
    std::fs::write(path, json).map_err(|e| StoreError::io(path, e))
}

fn print_variant(analysis: &VariantAnalysis, with_flips: bool) {
    let s = &analysis.summary;
    println!("{}:", s.prompt);
    println!(
        "  Accuracy: {:.4} ({}/{})",
        s.accuracy, s.total_correct, s.total
    );
    println!(
        "  Words avg: {:.2}, think responses: {} ({:.2} words avg)",
        s.total_words_avg, s.think_responses, s.think_words_avg
    );
    println!(
        "  Wait tokens: {} ({:.2} avg), time: {:.2}s avg, completion tokens: {}",
        s.total_wait_tokens, s.wait_tokens_avg, s.avg_time_s, s.completion_tokens
    );
    println!(
        "  Missing: {} indices, {} responses, {} answers",
        s.index_missing_list.len(),
        s.response_missing_list.len(),
        s.response_ans_missing_list.len()
    );

    if !with_flips {
        return;
    }

    println!(
        "  Flips: success {}, failure {}, stay correct {}, backfire {}",
        s.flip_success, s.flip_failure, s.stay_correct, s.backfire
    );
    if analysis.flips.rows.is_empty() {
        return;
    }
    println!(
        "    {:<36} {:>7} {:>7} {:>7} {:>8} {:>6} {:>7}",
        "subject", "success", "failure", "stay", "backfire", "total", "ratio"
    );
    for row in analysis.flips.rows.iter().take(CONSOLE_FLIP_ROWS) {
        println!(
            "    {:<36} {:>7} {:>7} {:>7} {:>8} {:>6} {:>7.4}",
            row.subject,
            row.flip_success,
            row.flip_failure,
            row.stay_correct,
            row.backfire,
            row.total,
            row.success_ratio
        );
    }
    if analysis.flips.rows.len() > CONSOLE_FLIP_ROWS {
        println!("    ... {} more subjects", analysis.flips.rows.len() - CONSOLE_FLIP_ROWS);
    }
}

/// Generate a console report
pub fn print_console_report(report: &AggregateReport) {
    println!("\n=== Prompt Variant Results ===\n");

    let mut analyses = report.analyses.iter();
    if let Some((baseline, _)) = analyses.next() {
        println!("Baseline:");
        println!("{:-<50}", "");
        print_variant(baseline, false);
    }

    let rest: Vec<_> = analyses.collect();
    if !rest.is_empty() {
        println!("\nVariants:");
        println!("{:-<50}", "");
        for (analysis, files) in rest {
            print_variant(analysis, true);
            if let Some(flips) = &files.flips {
                println!("  Flip table: {}", flips.display());
            }
            println!();
        }

        println!("Accuracy ranking:");
        println!("{:-<50}", "");
        let mut ranking: Vec<_> = report.analyses.iter().map(|(a, _)| &a.summary).collect();
        ranking.sort_by(|a, b| {
            b.accuracy
                .partial_cmp(&a.accuracy)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for (i, s) in ranking.iter().enumerate() {
            println!("  {}. {} - {:.4}", i + 1, s.prompt, s.accuracy);
        }
    }

    println!("\n{:=<50}", "");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::FlipTable;
    use tempfile::tempdir;

    #[test]
    fn test_write_json_creates_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("output/flips/slow_flip.json");
        let table = FlipTable {
            prompt: "slow".into(),
            rows: vec![],
        };
        write_json(&path, &table).unwrap();

        let back: FlipTable = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, table);
    }
}
