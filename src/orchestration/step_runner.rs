//! # Step Runner
//!
//! Executes one named step at a time under a per-attempt timeout, with
//! bounded retries for transient failures and immediate escalation for
//! permanent ones.
//!
//! ## State machine
//!
//! `Pending → Running → {Succeeded, Retrying, FailedFatal, FailedExhausted}`
//!
//! A timeout or a classifier-matched error moves the step to `Retrying`,
//! which waits out the backoff delay and dispatches again. A non-matching
//! error is `FailedFatal` regardless of remaining budget; running out of
//! budget on transient errors is `FailedExhausted`. Both terminal failures
//! report identically (`failed`); the distinction survives only in the
//! error message.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::config::ExecutionConfig;
use crate::models::report::{StepExecution, StepStatus};
use crate::orchestration::classifier::{KeywordRetryClassifier, RetryClassifier};
use crate::orchestration::step::PipelineStep;

/// Step runner state definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    /// Step has not been dispatched yet
    #[default]
    Pending,
    /// Step attempt is executing
    Running,
    /// Step completed successfully (terminal)
    Succeeded,
    /// Transient failure, waiting out backoff before the next attempt
    Retrying,
    /// Permanent failure, no further attempts regardless of budget (terminal)
    FailedFatal,
    /// Retry budget exhausted on transient failures (terminal)
    FailedExhausted,
}

impl StepState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::FailedFatal | Self::FailedExhausted
        )
    }

    /// Check if this is a terminal failure state
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::FailedFatal | Self::FailedExhausted)
    }
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Retrying => write!(f, "retrying"),
            Self::FailedFatal => write!(f, "failed_fatal"),
            Self::FailedExhausted => write!(f, "failed_exhausted"),
        }
    }
}

impl std::str::FromStr for StepState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "succeeded" => Ok(Self::Succeeded),
            "retrying" => Ok(Self::Retrying),
            "failed_fatal" => Ok(Self::FailedFatal),
            "failed_exhausted" => Ok(Self::FailedExhausted),
            _ => Err(format!("Invalid step state: {s}")),
        }
    }
}

/// Retry and timeout configuration for the runner.
#[derive(Debug, Clone)]
pub struct StepRunnerConfig {
    /// Maximum attempts per step, first attempt included.
    pub max_attempts: u32,
    /// Backoff schedule between retries, indexed by retry ordinal and
    /// capped at the last entry.
    pub backoff: Vec<Duration>,
    /// Per-attempt timeout.
    pub step_timeout: Duration,
}

impl Default for StepRunnerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
            ],
            step_timeout: Duration::from_secs(600),
        }
    }
}

impl StepRunnerConfig {
    /// Build from the pipeline execution configuration.
    pub fn from_execution(config: &ExecutionConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            backoff: config
                .backoff_seconds
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
            step_timeout: Duration::from_secs(config.step_timeout_seconds),
        }
    }

    /// Configuration with millisecond delays for fast tests.
    pub fn for_testing() -> Self {
        Self {
            max_attempts: 3,
            backoff: vec![Duration::from_millis(1), Duration::from_millis(2)],
            step_timeout: Duration::from_millis(250),
        }
    }
}

/// Executes one step to a terminal state.
pub struct StepRunner {
    config: StepRunnerConfig,
    classifier: Arc<dyn RetryClassifier>,
}

impl StepRunner {
    pub fn new(config: StepRunnerConfig) -> Self {
        Self {
            config,
            classifier: Arc::new(KeywordRetryClassifier::new()),
        }
    }

    pub fn with_classifier(config: StepRunnerConfig, classifier: Arc<dyn RetryClassifier>) -> Self {
        Self { config, classifier }
    }

    /// Backoff delay for the given attempt (1-based), capped at the last
    /// configured entry. Zero when no schedule is configured.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        match self.config.backoff.last() {
            None => Duration::ZERO,
            Some(last) => {
                let index = (attempt as usize).saturating_sub(1);
                *self.config.backoff.get(index).unwrap_or(last)
            }
        }
    }

    fn transition(step: &str, state: &mut StepState, to: StepState, attempt: u32) {
        info!(step, from = %state, to = %to, attempt, "step state transition");
        *state = to;
    }

    /// Run a step to a terminal state and report its outcome. Never panics
    /// or errors: every failure mode folds into the returned record.
    pub async fn run_step(&self, step: &PipelineStep) -> StepExecution {
        let max_attempts = step.max_attempts.unwrap_or(self.config.max_attempts).max(1);
        let timeout = step.timeout.unwrap_or(self.config.step_timeout);
        let started = Instant::now();
        let mut state = StepState::Pending;

        info!(
            step = %step.name,
            max_attempts,
            timeout_seconds = timeout.as_secs(),
            "🚀 step dispatched"
        );

        let mut attempt = 1u32;
        loop {
            Self::transition(&step.name, &mut state, StepState::Running, attempt);

            let (message, retryable) =
                match tokio::time::timeout(timeout, step.task.execute()).await {
                    Ok(Ok(output)) => {
                        Self::transition(&step.name, &mut state, StepState::Succeeded, attempt);
                        let duration_seconds = started.elapsed().as_secs_f64();
                        info!(
                            step = %step.name,
                            attempt,
                            duration_seconds,
                            "✅ step succeeded"
                        );
                        return StepExecution {
                            status: StepStatus::Success,
                            duration_seconds,
                            retry_attempts: attempt - 1,
                            error_message: None,
                            records_processed: output.records_processed,
                        };
                    }
                    Ok(Err(err)) => {
                        let message = err.to_string();
                        let retryable = self.classifier.is_retryable(&message);
                        (message, retryable)
                    }
                    // A timed-out attempt is always transient.
                    Err(_) => (
                        crate::error::PipelineError::StepTimeout {
                            step: step.name.clone(),
                            timeout_seconds: timeout.as_secs(),
                        }
                        .to_string(),
                        true,
                    ),
                };

            if retryable && attempt < max_attempts {
                Self::transition(&step.name, &mut state, StepState::Retrying, attempt);
                let delay = self.backoff_delay(attempt);
                warn!(
                    step = %step.name,
                    attempt,
                    delay_seconds = delay.as_secs_f64(),
                    error = %message,
                    "step failed with transient error, retrying"
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
                continue;
            }

            let (terminal, final_message) = if retryable {
                (
                    StepState::FailedExhausted,
                    format!("retry budget exhausted after {max_attempts} attempts: {message}"),
                )
            } else {
                (
                    StepState::FailedFatal,
                    format!("permanent error on attempt {attempt}: {message}"),
                )
            };
            Self::transition(&step.name, &mut state, terminal, attempt);
            error!(step = %step.name, attempt, error = %final_message, "❌ step failed");

            return StepExecution {
                status: StepStatus::Failed,
                duration_seconds: started.elapsed().as_secs_f64(),
                retry_attempts: attempt - 1,
                error_message: Some(final_message),
                records_processed: None,
            };
        }
    }
}
