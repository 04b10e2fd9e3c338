//! # Configuration Management
//!
//! Layered configuration for the pipeline: compiled defaults, an optional
//! `config/pipeline.toml` overlay, then `PIPELINE_*` environment overrides
//! (`PIPELINE__DATABASE__URL` style). `DATABASE_URL` is honored last for
//! compatibility with standard tooling.

use chrono::NaiveDate;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{PipelineError, Result};

/// Top-level configuration for a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub database: DatabaseConfig,
    pub execution: ExecutionConfig,
    pub warehouse: WarehouseConfig,
    pub lock: LockConfig,
    pub report: ReportConfig,
    pub steps: Vec<StepConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            execution: ExecutionConfig::default(),
            warehouse: WarehouseConfig::default(),
            lock: LockConfig::default(),
            report: ReportConfig::default(),
            steps: default_steps(),
        }
    }
}

/// Database connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// Schema holding the star-schema warehouse tables.
    pub warehouse_schema: String,
    /// Schema holding the raw/staging source tables.
    pub staging_schema: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/ecommerce_db".to_string(),
            max_connections: 5,
            warehouse_schema: "warehouse".to_string(),
            staging_schema: "staging".to_string(),
        }
    }
}

/// Step execution and retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Per-attempt timeout for a single step.
    pub step_timeout_seconds: u64,
    /// Maximum attempts per step (first attempt included).
    pub max_attempts: u32,
    /// Backoff schedule between retries, indexed by retry ordinal and capped
    /// at the last entry.
    pub backoff_seconds: Vec<u64>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            step_timeout_seconds: 600,
            max_attempts: 3,
            backoff_seconds: vec![1, 2, 4],
        }
    }
}

/// Warehouse load configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    /// First day materialized into the date dimension.
    pub date_dimension_start: NaiveDate,
    /// Last day materialized into the date dimension (inclusive).
    pub date_dimension_end: NaiveDate,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            date_dimension_start: NaiveDate::from_ymd_opt(2023, 1, 1).expect("valid date"),
            date_dimension_end: NaiveDate::from_ymd_opt(2024, 12, 31).expect("valid date"),
        }
    }
}

/// Single-flight lock configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    pub path: PathBuf,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("pipeline.lock"),
        }
    }
}

/// Execution report persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub path: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/processed/pipeline_execution_report.json"),
        }
    }
}

/// How a configured step is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// External collaborator invoked as a subprocess.
    Command,
    /// Native warehouse load (dimensions, facts, aggregates).
    Warehouse,
}

/// One named step in the pipeline, in execution order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    pub name: String,
    pub kind: StepKind,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    /// Per-step override of `execution.max_attempts`.
    #[serde(default)]
    pub max_attempts: Option<u32>,
    /// Per-step override of `execution.step_timeout_seconds`.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

impl StepConfig {
    pub fn command(
        name: impl Into<String>,
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: StepKind::Command,
            command: Some(program.into()),
            args: args.into_iter().map(Into::into).collect(),
            max_attempts: None,
            timeout_seconds: None,
        }
    }

    pub fn warehouse(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: StepKind::Warehouse,
            command: None,
            args: Vec::new(),
            max_attempts: None,
            timeout_seconds: None,
        }
    }
}

/// The default five-stage pipeline: everything except the warehouse load is
/// an external collaborator.
fn default_steps() -> Vec<StepConfig> {
    vec![
        StepConfig::command(
            "data_generation",
            "python3",
            ["scripts/data_generation/generate_data.py"],
        ),
        StepConfig::command(
            "ingestion",
            "python3",
            ["scripts/ingestion/ingest_to_staging.py"],
        ),
        StepConfig::command(
            "quality_checks",
            "python3",
            ["scripts/quality_checks/validate_data.py"],
        ),
        StepConfig::warehouse("warehouse"),
        StepConfig::command(
            "analytics",
            "python3",
            ["scripts/analytics/generate_analytics.py"],
        ),
    ]
}

impl PipelineConfig {
    /// Load configuration from the optional `config/pipeline` file plus
    /// `PIPELINE_*` environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(Some("config/pipeline"))
    }

    /// Load from an explicit file stem (or defaults-only when `None`).
    pub fn load_from(file_stem: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(stem) = file_stem {
            builder = builder.add_source(File::with_name(stem).required(false));
        }
        let settings = builder
            .add_source(Environment::with_prefix("PIPELINE").separator("__"))
            .build()
            .map_err(|e| PipelineError::Configuration {
                config_source: file_stem.unwrap_or("defaults").to_string(),
                reason: e.to_string(),
            })?;

        let mut config: PipelineConfig =
            settings
                .try_deserialize()
                .map_err(|e| PipelineError::Configuration {
                    config_source: file_stem.unwrap_or("defaults").to_string(),
                    reason: e.to_string(),
                })?;

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database.url = url;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_defaults() {
        let config = ExecutionConfig::default();
        assert_eq!(config.step_timeout_seconds, 600);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.backoff_seconds, vec![1, 2, 4]);
    }

    #[test]
    fn test_default_step_catalog_order() {
        let steps = PipelineConfig::default().steps;
        let names: Vec<&str> = steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "data_generation",
                "ingestion",
                "quality_checks",
                "warehouse",
                "analytics"
            ]
        );
        assert_eq!(steps[3].kind, StepKind::Warehouse);
    }

    #[test]
    fn test_date_dimension_defaults_cover_two_years() {
        let config = WarehouseConfig::default();
        assert!(config.date_dimension_start < config.date_dimension_end);
        assert_eq!(config.date_dimension_start.to_string(), "2023-01-01");
        assert_eq!(config.date_dimension_end.to_string(), "2024-12-31");
    }
}
