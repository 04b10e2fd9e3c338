//! # Pipeline Core
//!
//! Rust core for a scheduled e-commerce batch pipeline: a fail-fast
//! orchestrator driving named steps with bounded retries, and a star-schema
//! warehouse loader with SCD Type 2 dimensions, a derived fact table and
//! rebuilt aggregates.
//!
//! ## Architecture
//!
//! External collaborators (data generation, staging ingestion, quality
//! checks, analytics export) run as subprocess steps; the warehouse load is
//! native. The orchestrator treats all of them uniformly through the
//! [`orchestration::StepTask`] seam.
//!
//! ## Module Organization
//!
//! - [`orchestration`] - step runner state machine, orchestrator, retry
//!   classification, run lock
//! - [`warehouse`] - dimension/fact/aggregate loaders and storage backends
//! - [`models`] - source, dimension, fact, aggregate and report records
//! - [`config`] - layered configuration
//! - [`error`] - structured error handling
//! - [`logging`] - environment-aware tracing setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pipeline_core::config::PipelineConfig;
//! use pipeline_core::orchestration::{PipelineOrchestrator, StepRunner, StepRunnerConfig};
//!
//! # async fn example(steps: Vec<pipeline_core::orchestration::PipelineStep>)
//! # -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::load()?;
//! let runner = StepRunner::new(StepRunnerConfig::from_execution(&config.execution));
//! let orchestrator = PipelineOrchestrator::new(runner, &config.report.path);
//!
//! let report = orchestrator.run(&steps).await?;
//! println!("run {} finished: {}", report.pipeline_execution_id, report.status);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod warehouse;

pub use config::{
    DatabaseConfig, ExecutionConfig, LockConfig, PipelineConfig, ReportConfig, StepConfig,
    StepKind, WarehouseConfig,
};
pub use error::{PipelineError, Result};
pub use models::report::{ExecutionReport, RunStatus, StepExecution, StepStatus};
pub use orchestration::{
    CommandStep, KeywordRetryClassifier, PipelineOrchestrator, PipelineStep, RetryClassifier,
    RunLock, StepRunner, StepRunnerConfig, StepState, StepTask, WarehouseLoadStep,
};
pub use warehouse::{
    MemorySourceRepository, MemoryWarehouse, PgSourceRepository, PgWarehouse, SourceRepository,
    WarehouseLoadCoordinator, WarehouseStore,
};
