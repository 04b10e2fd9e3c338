//! # Pipeline Orchestration
//!
//! Sequential execution of named steps with bounded retries and
//! transient/permanent failure classification.
//!
//! ## Core Components
//!
//! - **PipelineOrchestrator**: ordered, fail-fast step execution with one
//!   persisted execution report per run
//! - **StepRunner**: per-step state machine (timeout, classification,
//!   backoff)
//! - **RetryClassifier**: pluggable transient-error predicate
//! - **StepTask**: the seam between the runner and heterogeneous work
//!   (subprocess collaborators, the native warehouse load)
//! - **RunLock**: single-flight sentinel with release-on-any-exit

pub mod classifier;
pub mod lock;
pub mod orchestrator;
pub mod step;
pub mod step_runner;

pub use classifier::{KeywordRetryClassifier, RetryClassifier};
pub use lock::{RunLock, RunLockGuard};
pub use orchestrator::PipelineOrchestrator;
pub use step::{CommandStep, PipelineStep, StepTask, TaskOutput, WarehouseLoadStep};
pub use step_runner::{StepRunner, StepRunnerConfig, StepState};
