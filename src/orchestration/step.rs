//! Pipeline step definitions: the `StepTask` seam plus the two built-in
//! task kinds (external subprocess, native warehouse load).

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

use crate::config::WarehouseConfig;
use crate::error::{PipelineError, Result};
use crate::warehouse::coordinator::WarehouseLoadCoordinator;
use crate::warehouse::store::{SourceRepository, WarehouseStore};

/// What a successful task reports back, beyond "it worked".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskOutput {
    pub records_processed: Option<u64>,
}

impl TaskOutput {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_records(records_processed: u64) -> Self {
        Self {
            records_processed: Some(records_processed),
        }
    }
}

/// One invocable unit of pipeline work. Implementations report failure via
/// `Err`; the runner owns timeout enforcement, classification and retries.
#[async_trait]
pub trait StepTask: Send + Sync {
    async fn execute(&self) -> Result<TaskOutput>;
}

/// A named step in the pipeline, with optional per-step overrides of the
/// runner's retry budget and timeout.
#[derive(Clone)]
pub struct PipelineStep {
    pub name: String,
    pub task: Arc<dyn StepTask>,
    pub max_attempts: Option<u32>,
    pub timeout: Option<Duration>,
}

impl PipelineStep {
    pub fn new(name: impl Into<String>, task: Arc<dyn StepTask>) -> Self {
        Self {
            name: name.into(),
            task,
            max_attempts: None,
            timeout: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl std::fmt::Debug for PipelineStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineStep")
            .field("name", &self.name)
            .field("max_attempts", &self.max_attempts)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// External collaborator invoked as a subprocess. Exit status zero is
/// success; anything else folds the status and a stderr tail into the error
/// message that feeds retry classification.
pub struct CommandStep {
    name: String,
    program: String,
    args: Vec<String>,
}

impl CommandStep {
    pub fn new(
        name: impl Into<String>,
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// Last few lines of stderr, enough for classification and the report.
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().rev().take(5).collect();
    lines.into_iter().rev().collect::<Vec<_>>().join(" | ")
}

#[async_trait]
impl StepTask for CommandStep {
    async fn execute(&self) -> Result<TaskOutput> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| PipelineError::StepFailed {
                step: self.name.clone(),
                reason: format!("failed to spawn '{}': {e}", self.program),
            })?;

        if output.status.success() {
            Ok(TaskOutput::empty())
        } else {
            Err(PipelineError::StepFailed {
                step: self.name.clone(),
                reason: format!(
                    "command exited with {}: {}",
                    output.status,
                    stderr_tail(&output.stderr)
                ),
            })
        }
    }
}

/// Native warehouse load: fetches one source batch and runs the full load
/// sequence through the coordinator.
pub struct WarehouseLoadStep {
    store: Arc<dyn WarehouseStore>,
    source: Arc<dyn SourceRepository>,
    config: WarehouseConfig,
}

impl WarehouseLoadStep {
    pub fn new(
        store: Arc<dyn WarehouseStore>,
        source: Arc<dyn SourceRepository>,
        config: WarehouseConfig,
    ) -> Self {
        Self {
            store,
            source,
            config,
        }
    }
}

#[async_trait]
impl StepTask for WarehouseLoadStep {
    async fn execute(&self) -> Result<TaskOutput> {
        let batch = self.source.fetch_batch().await?;
        let coordinator = WarehouseLoadCoordinator::new(self.store.as_ref(), &self.config);
        let summary = coordinator.load(&batch).await?;
        Ok(TaskOutput::with_records(summary.total_rows()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stderr_tail_keeps_last_lines() {
        let stderr = b"line1\nline2\nline3\nline4\nline5\nline6\nline7";
        let tail = stderr_tail(stderr);
        assert!(tail.starts_with("line3"));
        assert!(tail.ends_with("line7"));
        assert!(!tail.contains("line2"));
    }

    #[tokio::test]
    async fn test_command_step_success() {
        let step = CommandStep::new("noop", "true", Vec::<String>::new());
        let output = step.execute().await.unwrap();
        assert_eq!(output, TaskOutput::empty());
    }

    #[tokio::test]
    async fn test_command_step_failure_carries_status() {
        let step = CommandStep::new("fail", "false", Vec::<String>::new());
        let err = step.execute().await.unwrap_err();
        assert!(err.to_string().contains("command exited with"));
    }

    #[tokio::test]
    async fn test_command_step_missing_binary() {
        let step = CommandStep::new(
            "ghost",
            "definitely-not-a-real-binary-xyz",
            Vec::<String>::new(),
        );
        let err = step.execute().await.unwrap_err();
        assert!(err.to_string().contains("failed to spawn"));
    }
}
