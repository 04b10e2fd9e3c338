//! # Pipeline Orchestrator
//!
//! Runs an ordered list of named steps through the Step Runner, fails fast
//! on the first terminal step failure, and persists the execution report
//! exactly once — on success and on failure alike.

use chrono::Utc;
use std::path::PathBuf;
use tracing::{error, info};

use crate::error::Result;
use crate::models::report::ExecutionReport;
use crate::orchestration::step::PipelineStep;
use crate::orchestration::step_runner::StepRunner;

/// Drives one pipeline run end to end.
pub struct PipelineOrchestrator {
    runner: StepRunner,
    report_path: PathBuf,
}

impl PipelineOrchestrator {
    pub fn new(runner: StepRunner, report_path: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            report_path: report_path.into(),
        }
    }

    /// Run identifier derived from the wall clock, `PIPE_YYYYMMDD_HHMMSS`.
    fn next_run_id() -> String {
        format!("PIPE_{}", Utc::now().format("%Y%m%d_%H%M%S"))
    }

    /// Execute the steps strictly in order. The first step that terminates
    /// in a failure state stops the run; later steps never start. The
    /// report is finalized and persisted before returning, whatever the
    /// outcome; only a persistence failure surfaces as `Err`.
    pub async fn run(&self, steps: &[PipelineStep]) -> Result<ExecutionReport> {
        let run_id = Self::next_run_id();
        let mut report = ExecutionReport::begin(run_id.clone(), Utc::now());
        info!(run_id = %run_id, steps = steps.len(), "🚀 pipeline run starting");

        for step in steps {
            let execution = self.runner.run_step(step).await;
            let failed = !execution.is_success();
            report.record_step(step.name.clone(), execution);

            if failed {
                error!(run_id = %run_id, step = %step.name, "pipeline halted on step failure");
                break;
            }
        }

        report.finalize(Utc::now());
        report.persist(&self.report_path)?;
        info!(
            run_id = %run_id,
            status = %report.status,
            duration_seconds = report.total_duration_seconds,
            report = %self.report_path.display(),
            "pipeline run finished"
        );
        Ok(report)
    }
}
