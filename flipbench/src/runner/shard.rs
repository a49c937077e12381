//! Sequential per-index execution of one shard

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use super::extract::extract_answer;
use super::run_log::{write_error_indices, RunLog, RunMode};
use super::targets::{out_of_range, TargetSet};
use crate::dataset::{Dataset, Question};
use crate::prompts::PromptVariant;
use crate::providers::ProviderGateway;
use crate::records::{RecordAppender, ResultRecord, StoreError, TokenUsage};

/// Errors that stop a shard run before or outside per-sample processing
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Target indices outside the dataset (size {dataset_len}): {indices:?}")]
    IndexOutOfRange {
        indices: Vec<usize>,
        dataset_len: usize,
    },

    /// A log or shard write failed mid-run; `error_indices` holds every
    /// target not written, including those never reached
    #[error("Run stopped ({} indices unresolved): {source}", .error_indices.len())]
    Interrupted {
        error_indices: Vec<usize>,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Configuration for a shard run
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Model id; empty means the provider's default model
    pub model: String,
    pub streaming: bool,
    /// Attempts per index, shared by transport, empty-response and parse failures
    pub max_retries: u32,
    pub mode: RunMode,
    /// Count failed attempts per cause
    pub diagnostics: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            streaming: false,
            max_retries: 5,
            mode: RunMode::Run,
            diagnostics: false,
        }
    }
}

/// Files a shard run writes to
#[derive(Debug, Clone)]
pub struct ShardPaths {
    pub shard_log: PathBuf,
    pub run_log: PathBuf,
    pub error_log: PathBuf,
}

/// Failed attempts by cause
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FailureBreakdown {
    pub transport: u32,
    pub empty_response: u32,
    pub unparsable_answer: u32,
}

impl FailureBreakdown {
    pub fn total(&self) -> u32 {
        self.transport + self.empty_response + self.unparsable_answer
    }
}

/// What a shard run did with its targets.
///
/// Every attempted index ends up in exactly one of `written` and
/// `error_indices`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardOutcome {
    pub attempted: usize,
    pub written: Vec<usize>,
    pub error_indices: Vec<usize>,
    pub diagnostics: Option<FailureBreakdown>,
}

struct Answered {
    response: String,
    response_ans: i64,
    elapsed: f64,
    usage: TokenUsage,
}

/// Runs one prompt variant over a set of dataset indices against one provider
pub struct ShardRunner<'a> {
    dataset: &'a Dataset,
    variant: PromptVariant,
    provider: Arc<dyn ProviderGateway>,
    config: RunnerConfig,
    paths: ShardPaths,
}

impl<'a> ShardRunner<'a> {
    pub fn new(
        dataset: &'a Dataset,
        variant: PromptVariant,
        provider: Arc<dyn ProviderGateway>,
        config: RunnerConfig,
        paths: ShardPaths,
    ) -> Self {
        Self {
            dataset,
            variant,
            provider,
            config,
            paths,
        }
    }

    fn model(&self) -> &str {
        if self.config.model.is_empty() {
            self.provider.default_model()
        } else {
            &self.config.model
        }
    }

    /// Process every target index in order.
    ///
    /// Fails only on setup problems (targets outside the dataset, unwritable
    /// logs). Per-index failures are reported in the outcome.
    pub async fn run(&self, targets: &TargetSet) -> Result<ShardOutcome, RunError> {
        let indices = targets.resolve(self.dataset.len());
        let bad = out_of_range(&indices, self.dataset.len());
        if !bad.is_empty() {
            return Err(RunError::IndexOutOfRange {
                indices: bad,
                dataset_len: self.dataset.len(),
            });
        }

        let mut appender = match self.config.mode {
            RunMode::Run => Some(RecordAppender::open(&self.paths.shard_log)?),
            RunMode::Test => None,
        };
        let mut log = RunLog::open(&self.paths.run_log, self.config.mode)?;

        tracing::info!(
            "Running {} on {} ({}) over {}",
            self.variant,
            self.provider.name(),
            self.model(),
            targets.describe()
        );

        let mut outcome = ShardOutcome {
            attempted: indices.len(),
            ..Default::default()
        };
        let mut breakdown = FailureBreakdown::default();

        for (done, &index) in indices.iter().enumerate() {
            let question = self.dataset.get(index).ok_or_else(|| RunError::IndexOutOfRange {
                indices: vec![index],
                dataset_len: self.dataset.len(),
            })?;

            match self
                .process(index, question, appender.as_mut(), &mut log, &mut breakdown)
                .await
            {
                Ok(true) => outcome.written.push(index),
                Ok(false) => outcome.error_indices.push(index),
                Err(source) => {
                    // the failing index and everything after it count as errors
                    outcome.error_indices.extend_from_slice(&indices[done..]);
                    return Err(self.interrupted(outcome.error_indices, source));
                }
            }

            if (done + 1) % 100 == 0 {
                tracing::info!(
                    "{}/{} processed ({} errors)",
                    done + 1,
                    indices.len(),
                    outcome.error_indices.len()
                );
            }
        }

        write_error_indices(&self.paths.error_log, &outcome.error_indices)?;

        if self.config.diagnostics {
            log.line(&format!(
                "Failed attempts: transport={} empty_response={} unparsable_answer={}",
                breakdown.transport, breakdown.empty_response, breakdown.unparsable_answer
            ))?;
            outcome.diagnostics = Some(breakdown);
        }

        if outcome.error_indices.is_empty() {
            tracing::info!("No errors encountered ({} written)", outcome.written.len());
        } else {
            tracing::warn!(
                "{} written, {} error indices logged to {}",
                outcome.written.len(),
                outcome.error_indices.len(),
                self.paths.error_log.display()
            );
        }

        Ok(outcome)
    }

    /// Query, trace and persist one index. Returns whether a record was written.
    async fn process(
        &self,
        index: usize,
        question: &Question,
        appender: Option<&mut RecordAppender>,
        log: &mut RunLog,
        breakdown: &mut FailureBreakdown,
    ) -> Result<bool, StoreError> {
        let prompt = self.variant.render(&question.question, &question.choices);

        log.line(&format!("\n--- Sample {} ---", index))?;
        log.line(&format!(
            "Timestamp: {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        ))?;
        log.line(&format!("Prompt: {}", prompt))?;

        let Some(answered) = self.resolve_index(index, &prompt, log, breakdown).await? else {
            log.line(&format!(
                "Giving up on index {} after {} attempts",
                index, self.config.max_retries
            ))?;
            return Ok(false);
        };

        let record = self.record(index, question, prompt, answered);
        log.line(&format!("Response: {}", record.response_text()))?;
        log.line(&format!(
            "Response Answer: {}",
            record.response_ans.unwrap_or_default()
        ))?;
        log.line(&format!("Correct: {}", record.correct.unwrap_or_default()))?;
        log.line(&format!("Timing Info: {:.2}s", record.time_usage))?;
        log.line(&format!("Token Usage: {}", record.token_usage))?;

        if let Some(appender) = appender {
            appender.append(&record)?;
        }
        Ok(true)
    }

    /// Record the error indices of a run stopped by a store failure
    fn interrupted(&self, error_indices: Vec<usize>, source: StoreError) -> RunError {
        tracing::error!(
            "Run stopped with {} unresolved indices: {}",
            error_indices.len(),
            source
        );
        if let Err(e) = write_error_indices(&self.paths.error_log, &error_indices) {
            tracing::warn!("Could not write error indices: {}", e);
        }
        RunError::Interrupted {
            error_indices,
            source,
        }
    }

    /// Retry one index until the provider yields text with a parsable answer
    async fn resolve_index(
        &self,
        index: usize,
        prompt: &str,
        log: &mut RunLog,
        breakdown: &mut FailureBreakdown,
    ) -> Result<Option<Answered>, StoreError> {
        let model = self.model();

        for attempt in 1..=self.config.max_retries {
            if attempt > 1 {
                tracing::debug!(
                    "Retry {} for index {} on {}",
                    attempt - 1,
                    index,
                    self.provider.name()
                );
            }

            let started = Instant::now();
            let raw = match self.provider.issue(prompt, model, self.config.streaming).await {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!("Error on {} for index {}: {}", self.provider.name(), index, e);
                    log.line(&format!("API Error: {}", e))?;
                    breakdown.transport += 1;
                    continue;
                }
            };
            let elapsed = started.elapsed().as_secs_f64();

            let Some(response) = self.provider.extract_text(&raw) else {
                log.line("No response text found.")?;
                breakdown.empty_response += 1;
                continue;
            };

            let Some(response_ans) = extract_answer(&response) else {
                log.line("No answer found in response.")?;
                breakdown.unparsable_answer += 1;
                continue;
            };

            let usage = if self.provider.supports_usage() {
                self.provider.extract_usage(&raw)
            } else {
                TokenUsage::UNKNOWN
            };

            return Ok(Some(Answered {
                response,
                response_ans,
                elapsed,
                usage,
            }));
        }

        Ok(None)
    }

    fn record(&self, index: usize, question: &Question, prompt: String, a: Answered) -> ResultRecord {
        ResultRecord::answered(
            index,
            question,
            prompt,
            a.response,
            a.response_ans,
            a.elapsed,
            a.usage,
        )
    }
}
