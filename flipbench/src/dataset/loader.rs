//! Dataset loading from JSON-lines exports

use std::path::Path;

use serde::Deserialize;

use super::{Dataset, Question, CHOICE_COUNT};

/// Error type for dataset loading
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Invalid question on line {line}: {message}")]
    Invalid { line: usize, message: String },
}

#[derive(Deserialize)]
struct RawQuestion {
    question: String,
    #[serde(default)]
    subject: String,
    choices: Vec<String>,
    answer: i64,
}

/// Load a dataset from a JSON-lines file (one question object per line)
pub fn load_dataset_from_file(path: impl AsRef<Path>) -> Result<Dataset, LoadError> {
    let content = std::fs::read_to_string(path)?;
    load_dataset_from_str(&content)
}

/// Load a dataset from JSON-lines content.
///
/// Blank lines are ignored and do not consume an index.
pub fn load_dataset_from_str(content: &str) -> Result<Dataset, LoadError> {
    let mut questions = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }

        let raw: RawQuestion = serde_json::from_str(line).map_err(|e| LoadError::Parse {
            line: line_no,
            message: e.to_string(),
        })?;

        questions.push(validate(raw, line_no)?);
    }

    Ok(Dataset::new(questions))
}

fn validate(raw: RawQuestion, line: usize) -> Result<Question, LoadError> {
    let choices: [String; CHOICE_COUNT] =
        raw.choices
            .try_into()
            .map_err(|choices: Vec<String>| LoadError::Invalid {
                line,
                message: format!("expected {} choices, got {}", CHOICE_COUNT, choices.len()),
            })?;

    if !(0..CHOICE_COUNT as i64).contains(&raw.answer) {
        return Err(LoadError::Invalid {
            line,
            message: format!("answer {} out of range", raw.answer),
        });
    }

    Ok(Question {
        question: raw.question,
        subject: raw.subject,
        choices,
        answer: raw.answer as u8,
    })
}
