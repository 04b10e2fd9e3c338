//! Error types for the pipeline core.

use thiserror::Error;

/// Unified error type for orchestration and warehouse loading.
///
/// Variants are string-backed so errors stay `Clone` across the retry loop
/// and into the execution report. Retry classification operates on the
/// rendered message (see [`crate::orchestration::classifier`]).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("Database error: {operation} - {reason}")]
    Database { operation: String, reason: String },

    /// A fact row referenced an entity with no currently-valid dimension row.
    /// Never retryable; the fact load aborts without writing.
    #[error("Referential integrity violation: {entity} '{id}' does not resolve to a current dimension key")]
    ReferentialIntegrity { entity: String, id: String },

    #[error("Step '{step}' failed: {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Step '{step}' timeout after {timeout_seconds}s")]
    StepTimeout { step: String, timeout_seconds: u64 },

    #[error("Configuration error for {config_source}: {reason}")]
    Configuration {
        config_source: String,
        reason: String,
    },

    /// The single-flight sentinel is already held by another run.
    #[error("Pipeline lock already held by {owner}")]
    LockHeld { owner: String },

    #[error("Report persistence error: {0}")]
    ReportPersistence(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for PipelineError {
    fn from(err: sqlx::Error) -> Self {
        PipelineError::Database {
            operation: "query".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    /// Helper for database errors with an operation label.
    pub fn database(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::Database {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_context() {
        let err = PipelineError::ReferentialIntegrity {
            entity: "product".to_string(),
            id: "PROD0042".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("product"));
        assert!(rendered.contains("PROD0042"));
    }

    #[test]
    fn test_timeout_message_is_classifiable() {
        let err = PipelineError::StepTimeout {
            step: "ingestion".to_string(),
            timeout_seconds: 600,
        };
        // The rendered text must carry the transient keyword so the default
        // classifier treats it as retryable.
        assert!(err.to_string().to_lowercase().contains("timeout"));
    }
}
