//! Per-response text metrics

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::records::{ResultRecord, TokenUsage};

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";
const HEDGE_TOKEN: &str = "wait";

fn think_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)<think>(.*?)</think>").expect("think pattern is a valid regex"))
}

/// Metrics derived from one result record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetrics {
    /// Whitespace-separated words in the whole response
    pub total_words: usize,
    /// Both reasoning markers are present
    pub has_think: bool,
    pub think_blocks: usize,
    /// Words inside the reasoning blocks, trimmed
    pub think_words: usize,
    /// Case-insensitive occurrences of the hedging token
    pub wait_tokens: usize,
    pub time_usage: f64,
    pub token_usage: TokenUsage,
}

impl ResponseMetrics {
    /// Text metrics only; latency and usage left at their defaults
    pub fn from_text(text: &str) -> Self {
        let has_think = text.contains(THINK_OPEN) && text.contains(THINK_CLOSE);
        let (think_blocks, think_words) = if has_think {
            think_pattern()
                .captures_iter(text)
                .filter_map(|caps| caps.get(1))
                .fold((0, 0), |(blocks, words), block| {
                    (blocks + 1, words + block.as_str().split_whitespace().count())
                })
        } else {
            (0, 0)
        };

        Self {
            total_words: text.split_whitespace().count(),
            has_think,
            think_blocks,
            think_words,
            wait_tokens: text.to_lowercase().matches(HEDGE_TOKEN).count(),
            ..Default::default()
        }
    }

    /// Metrics of a record; a null response counts as empty text
    pub fn from_record(record: &ResultRecord) -> Self {
        Self {
            time_usage: record.time_usage,
            token_usage: record.token_usage,
            ..Self::from_text(record.response_text())
        }
    }
}

/// Round half away from zero to `places` decimals
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// `num / den` rounded to `places`, or 0 when `den` is 0
pub fn ratio(num: f64, den: f64, places: i32) -> f64 {
    if den > 0.0 {
        round_to(num / den, places)
    } else {
        0.0
    }
}
