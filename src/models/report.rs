//! Execution report: the persisted, machine-readable record of one pipeline
//! run.
//!
//! The report is created when the orchestrator starts, finalized exactly
//! once, and written to disk even when the run fails. `steps_executed`
//! serializes as a JSON object in execution order.

use chrono::{DateTime, Utc};
use serde::ser::Serializer;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::{PipelineError, Result};

/// Outcome of a single step, as reported to the caller. The fatal vs.
/// retry-exhausted distinction lives only in the error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Failed,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Overall run status. A persisted report is always `Success` or `Failed`;
/// `Running` exists only between `begin` and `finalize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Per-step record kept in the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepExecution {
    pub status: StepStatus,
    pub duration_seconds: f64,
    /// Retries actually performed (attempts beyond the first).
    pub retry_attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub records_processed: Option<u64>,
}

impl StepExecution {
    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Success
    }
}

/// A step record together with its name, kept in execution order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedStepExecution {
    pub name: String,
    pub execution: StepExecution,
}

/// Quality summary carried in the report envelope; populated by the quality
/// check collaborator when available.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataQualitySummary {
    pub quality_score: Option<f64>,
    pub critical_issues: u32,
}

/// The persisted execution report for one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub pipeline_execution_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_duration_seconds: Option<f64>,
    pub status: RunStatus,
    #[serde(serialize_with = "serialize_steps_as_map")]
    pub steps_executed: Vec<NamedStepExecution>,
    pub data_quality_summary: DataQualitySummary,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

fn serialize_steps_as_map<S>(steps: &[NamedStepExecution], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_map(steps.iter().map(|s| (&s.name, &s.execution)))
}

impl ExecutionReport {
    /// Open a report at run start.
    pub fn begin(pipeline_execution_id: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            pipeline_execution_id: pipeline_execution_id.into(),
            start_time,
            end_time: None,
            total_duration_seconds: None,
            status: RunStatus::Running,
            steps_executed: Vec::new(),
            data_quality_summary: DataQualitySummary::default(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Record a step outcome in execution order. Failed steps are also
    /// appended to the error list by name.
    pub fn record_step(&mut self, name: impl Into<String>, execution: StepExecution) {
        let name = name.into();
        if !execution.is_success() {
            self.errors.push(name.clone());
        }
        self.steps_executed.push(NamedStepExecution { name, execution });
    }

    /// Close the report. Called exactly once, after the last step outcome is
    /// recorded; the report is immutable afterwards.
    pub fn finalize(&mut self, end_time: DateTime<Utc>) {
        self.end_time = Some(end_time);
        self.total_duration_seconds =
            Some((end_time - self.start_time).num_milliseconds() as f64 / 1000.0);
        self.status = if self.steps_executed.iter().all(|s| s.execution.is_success()) {
            RunStatus::Success
        } else {
            RunStatus::Failed
        };
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    /// Write the report as pretty-printed JSON, creating parent directories
    /// as needed.
    pub fn persist(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| PipelineError::ReportPersistence(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| PipelineError::ReportPersistence(e.to_string()))?;
        fs::write(path, json).map_err(|e| PipelineError::ReportPersistence(e.to_string()))
    }
}
