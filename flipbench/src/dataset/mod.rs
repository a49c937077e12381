//! Question dataset access

pub mod loader;

pub use loader::{load_dataset_from_file, load_dataset_from_str, LoadError};

use serde::{Deserialize, Serialize};

/// Number of answer choices every question carries
pub const CHOICE_COUNT: usize = 4;

/// Size of the MMLU test split, the default end of a full run
pub const MMLU_TEST_SIZE: usize = 14_042;

/// A single multiple-choice question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    pub subject: String,
    pub choices: [String; CHOICE_COUNT],
    /// Ordinal of the correct choice (0 = a, 3 = d)
    pub answer: u8,
}

impl Question {
    pub fn new(
        question: impl Into<String>,
        subject: impl Into<String>,
        choices: [&str; CHOICE_COUNT],
        answer: u8,
    ) -> Self {
        Self {
            question: question.into(),
            subject: subject.into(),
            choices: choices.map(str::to_string),
            answer,
        }
    }
}

/// Read-only, index-addressed question set.
///
/// The index of a question is its position in the underlying file; result
/// records and missing manifests refer to questions by that index.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    questions: Vec<Question>,
}

impl Dataset {
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    /// Subject of the question at `index`, if it exists
    pub fn subject(&self, index: usize) -> Option<&str> {
        self.get(index).map(|q| q.subject.as_str())
    }

    pub fn contains_index(&self, index: usize) -> bool {
        index < self.questions.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Question)> {
        self.questions.iter().enumerate()
    }
}
