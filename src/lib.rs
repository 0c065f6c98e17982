// Allow complex types where needed for boxed component futures and keyed state tables
#![allow(clippy::type_complexity)]

pub mod backup;
pub mod components;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod pipeline;

// Re-export the main entry points for convenience
pub use config::CheckupConfig;
pub use models::{
    AnalysisResults, CheckupResults, CleanupResults, CodebaseMetrics, Issue, IssueKind, Severity,
    ValidationResults,
};
pub use orchestrator::CheckupOrchestrator;

use thiserror::Error;

/// Errors raised by the checkup core.
///
/// Variants line up with the error taxonomy categories so that
/// [`error::ErrorClassifier`] can map them without string inspection.
#[derive(Error, Debug)]
pub enum CheckupError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] ::config::ConfigError),

    #[error("Connectivity failure: {0}")]
    Connectivity(String),

    #[error("Compatibility problem: {0}")]
    Compatibility(String),

    #[error("Transfer failed: {0}")]
    Transfer(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Backup failed: {0}")]
    Backup(String),

    #[error("Rollback failed: {0}")]
    Rollback(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Insufficient resources: {0}")]
    Resource(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Operation '{operation}' timed out after {timeout_secs}s")]
    Timeout { operation: String, timeout_secs: u64 },

    #[error("Circuit breaker for '{key}' is open; retry in {remaining_secs:.1}s")]
    CircuitOpen { key: String, remaining_secs: f64 },

    #[error("Too many cleaners failed ({failed}/{total}, success rate {success_rate:.2})")]
    TooManyCleanerFailures {
        failed: usize,
        total: usize,
        success_rate: f64,
    },

    #[error("Cleanup phase failed (rolled back: {rolled_back}): {source}")]
    CleanupFailed {
        #[source]
        source: Box<CheckupError>,
        rolled_back: bool,
    },

    #[error("Component '{component}' failed: {message}")]
    Component { component: String, message: String },
}

impl CheckupError {
    /// Innermost error, unwrapping cleanup-phase wrappers
    pub fn root(&self) -> &CheckupError {
        match self {
            CheckupError::CleanupFailed { source, .. } => source.root(),
            other => other,
        }
    }

    /// Convert an error coming back from a collaborator into a crate error.
    ///
    /// Crate errors travelling inside `anyhow` are recovered as-is.
    pub fn from_component(component: &str, error: anyhow::Error) -> Self {
        match error.downcast::<CheckupError>() {
            Ok(inner) => inner,
            Err(other) => match other.downcast::<std::io::Error>() {
                Ok(io) => CheckupError::Io(io),
                Err(other) => CheckupError::Component {
                    component: component.to_string(),
                    message: format!("{:#}", other),
                },
            },
        }
    }
}

pub type CheckupResult<T> = Result<T, CheckupError>;
