//! Scheduled pipeline entrypoint.
//!
//! Acquires the single-flight lock, wires the configured step list
//! (subprocess collaborators plus the native warehouse load), runs the
//! orchestrator once and exits non-zero when the run failed. The execution
//! report is written even on failure; a run refused by the lock exits
//! without touching warehouse or report files.

use anyhow::Context;
use std::sync::Arc;
use tracing::warn;

use pipeline_core::config::{PipelineConfig, StepKind};
use pipeline_core::error::PipelineError;
use pipeline_core::logging::init_structured_logging;
use pipeline_core::orchestration::{
    CommandStep, PipelineOrchestrator, PipelineStep, RunLock, StepRunner, StepRunnerConfig,
    WarehouseLoadStep,
};
use pipeline_core::warehouse::{connect_pool, PgSourceRepository, PgWarehouse};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_structured_logging();

    let config = PipelineConfig::load().context("loading pipeline configuration")?;
    let code = run(&config).await?;
    // The lock guard is released before this point; exit skips destructors.
    std::process::exit(code);
}

/// Run the pipeline once under the lock. Returns the process exit code.
async fn run(config: &PipelineConfig) -> anyhow::Result<i32> {
    let lock = RunLock::new(&config.lock.path);
    let _guard = match lock.acquire() {
        Ok(guard) => guard,
        Err(PipelineError::LockHeld { owner }) => {
            warn!(owner = %owner, "pipeline already running, skipping execution");
            return Ok(0);
        }
        Err(err) => return Err(err.into()),
    };

    let steps = build_steps(config).await.context("building pipeline steps")?;
    let runner = StepRunner::new(StepRunnerConfig::from_execution(&config.execution));
    let orchestrator = PipelineOrchestrator::new(runner, &config.report.path);

    let report = orchestrator.run(&steps).await?;
    Ok(if report.is_success() { 0 } else { 1 })
}

/// Materialize the configured step list. The database pool is created only
/// when a warehouse step is present.
async fn build_steps(config: &PipelineConfig) -> anyhow::Result<Vec<PipelineStep>> {
    let mut steps = Vec::with_capacity(config.steps.len());
    let mut pool: Option<sqlx::PgPool> = None;

    for entry in &config.steps {
        let mut step = match entry.kind {
            StepKind::Command => {
                let program = entry.command.as_deref().ok_or_else(|| {
                    PipelineError::Configuration {
                        config_source: format!("steps.{}", entry.name),
                        reason: "command step without a command".to_string(),
                    }
                })?;
                PipelineStep::new(
                    entry.name.as_str(),
                    Arc::new(CommandStep::new(
                        entry.name.as_str(),
                        program,
                        entry.args.clone(),
                    )),
                )
            }
            StepKind::Warehouse => {
                let pool_handle = if let Some(existing) = &pool {
                    existing.clone()
                } else {
                    let connected = connect_pool(&config.database).await?;
                    pool = Some(connected.clone());
                    connected
                };
                let store = Arc::new(PgWarehouse::new(
                    pool_handle.clone(),
                    config.database.warehouse_schema.clone(),
                ));
                store.ensure_schema().await?;
                let source = Arc::new(PgSourceRepository::new(
                    pool_handle,
                    config.database.staging_schema.clone(),
                ));
                PipelineStep::new(
                    entry.name.as_str(),
                    Arc::new(WarehouseLoadStep::new(store, source, config.warehouse.clone())),
                )
            }
        };

        if let Some(max_attempts) = entry.max_attempts {
            step = step.with_max_attempts(max_attempts);
        }
        if let Some(timeout_seconds) = entry.timeout_seconds {
            step = step.with_timeout(std::time::Duration::from_secs(timeout_seconds));
        }
        steps.push(step);
    }

    Ok(steps)
}
