/// Error taxonomy for recovery strategy selection
///
/// Every failure seen by the checkup core is mapped to a category, a severity,
/// a recoverability flag and an ordered list of recovery strategies. The
/// category table is fixed data; callers can only raise or lower severities.
use crate::CheckupError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Broad category of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Configuration,
    Connectivity,
    Compatibility,
    Transfer,
    Database,
    Backup,
    Rollback,
    Authentication,
    Permission,
    Resource,
    Validation,
    Platform,
    Unknown,
}

/// How bad a failure is for the current run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// Recovery action families, in the order they should be tried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    Retry,
    Fallback,
    Skip,
    Rollback,
    Manual,
    Abort,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 13] = [
        ErrorCategory::Configuration,
        ErrorCategory::Connectivity,
        ErrorCategory::Compatibility,
        ErrorCategory::Transfer,
        ErrorCategory::Database,
        ErrorCategory::Backup,
        ErrorCategory::Rollback,
        ErrorCategory::Authentication,
        ErrorCategory::Permission,
        ErrorCategory::Resource,
        ErrorCategory::Validation,
        ErrorCategory::Platform,
        ErrorCategory::Unknown,
    ];

    pub fn default_severity(&self) -> ErrorSeverity {
        match self {
            ErrorCategory::Rollback => ErrorSeverity::Critical,
            ErrorCategory::Configuration
            | ErrorCategory::Database
            | ErrorCategory::Backup
            | ErrorCategory::Authentication
            | ErrorCategory::Permission => ErrorSeverity::High,
            ErrorCategory::Connectivity
            | ErrorCategory::Compatibility
            | ErrorCategory::Transfer
            | ErrorCategory::Resource
            | ErrorCategory::Validation
            | ErrorCategory::Platform
            | ErrorCategory::Unknown => ErrorSeverity::Medium,
        }
    }

    /// Whether automated recovery is worth attempting at all
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            ErrorCategory::Configuration
                | ErrorCategory::Backup
                | ErrorCategory::Rollback
                | ErrorCategory::Authentication
                | ErrorCategory::Permission
        )
    }

    pub fn recovery_strategies(&self) -> &'static [RecoveryStrategy] {
        use RecoveryStrategy::*;
        match self {
            ErrorCategory::Configuration => &[Manual, Abort],
            ErrorCategory::Connectivity => &[Retry, Manual],
            ErrorCategory::Compatibility => &[Fallback, Manual],
            ErrorCategory::Transfer => &[Retry, Rollback, Manual],
            ErrorCategory::Database => &[Retry, Manual],
            ErrorCategory::Backup => &[Manual, Abort],
            ErrorCategory::Rollback => &[Manual],
            ErrorCategory::Authentication => &[Manual, Abort],
            ErrorCategory::Permission => &[Manual, Skip],
            ErrorCategory::Resource => &[Retry, Fallback, Manual],
            ErrorCategory::Validation => &[Skip, Manual],
            ErrorCategory::Platform => &[Fallback, Manual],
            ErrorCategory::Unknown => &[Retry, Manual],
        }
    }

    pub fn remediation_steps(&self) -> &'static [&'static str] {
        match self {
            ErrorCategory::Configuration => &[
                "Review checkup.toml and CHECKUP__* environment overrides",
                "Fix every reported configuration problem before re-running",
            ],
            ErrorCategory::Connectivity => &[
                "Check that external tools invoked by components are reachable",
                "Re-run once the transient condition clears",
            ],
            ErrorCategory::Compatibility => &[
                "Check tool and interpreter versions used by the failing component",
                "Disable the component if the project layout is unsupported",
            ],
            ErrorCategory::Transfer => &[
                "Inspect the files named in the error for partial writes",
                "Restore from the latest backup if content looks damaged",
            ],
            ErrorCategory::Database => &["Verify the state store is readable and not locked"],
            ErrorCategory::Backup => &[
                "Check free space and write permissions on the backup directory",
                "Do not run cleanup until a verified backup exists",
            ],
            ErrorCategory::Rollback => &[
                "Stop further cleanup runs on this tree",
                "Restore the target manually from the most recent backup directory",
                "Compare the tree against version control before continuing",
            ],
            ErrorCategory::Authentication => &["Refresh credentials used by external tools"],
            ErrorCategory::Permission => &[
                "Check ownership and permissions of the target and backup directories",
                "Re-run as a user with write access",
            ],
            ErrorCategory::Resource => &[
                "Free disk space or memory and retry",
                "Exclude large generated directories from the run",
            ],
            ErrorCategory::Validation => &[
                "Inspect the reported files; automated changes may need manual review",
            ],
            ErrorCategory::Platform => &["Check that the platform supports the requested operation"],
            ErrorCategory::Unknown => &[
                "Re-run with debug logging enabled",
                "Report the failure with the structured log output attached",
            ],
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Connectivity => "connectivity",
            ErrorCategory::Compatibility => "compatibility",
            ErrorCategory::Transfer => "transfer",
            ErrorCategory::Database => "database",
            ErrorCategory::Backup => "backup",
            ErrorCategory::Rollback => "rollback",
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::Permission => "permission",
            ErrorCategory::Resource => "resource",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Platform => "platform",
            ErrorCategory::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Low => write!(f, "low"),
            ErrorSeverity::Medium => write!(f, "medium"),
            ErrorSeverity::High => write!(f, "high"),
            ErrorSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// Where and when a failure happened
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Operation name (e.g., "analyzer:quality", "cleanup", "capture_metrics")
    pub operation: String,

    /// Directory the operation was working on
    pub target_path: String,

    /// Component name, when the failure came from a collaborator
    pub component: Option<String>,

    pub timestamp: DateTime<Utc>,

    pub metadata: HashMap<String, String>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>, target_path: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            target_path: target_path.into(),
            component: None,
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// Context for a single component call, e.g. `analyzer:quality_analyzer`
    pub fn for_component(target_path: impl Into<String>, role: &str, name: &str) -> Self {
        let mut ctx = Self::new(format!("{}:{}", role, name), target_path);
        ctx.component = Some(name.to_string());
        ctx.metadata.insert("role".to_string(), role.to_string());
        ctx
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A failure together with its taxonomy entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedError {
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub recoverable: bool,
    pub recovery_strategies: Vec<RecoveryStrategy>,
    pub remediation_steps: Vec<String>,
    pub message: String,
    pub context: ErrorContext,
    /// Zero-based attempt that produced this failure
    pub attempt: u32,
}

impl ClassifiedError {
    pub fn primary_strategy(&self) -> Option<RecoveryStrategy> {
        self.recovery_strategies.first().copied()
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} error in {}: {} (attempt {})",
            self.severity,
            self.category,
            self.context.operation,
            self.message,
            self.attempt + 1
        )
    }
}

/// Maps errors onto the taxonomy
#[derive(Debug, Clone, Default)]
pub struct ErrorClassifier {
    severity_overrides: HashMap<ErrorCategory, ErrorSeverity>,
}

impl ErrorClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the default severity of a category
    pub fn set_severity(&mut self, category: ErrorCategory, severity: ErrorSeverity) {
        self.severity_overrides.insert(category, severity);
    }

    /// Classify an error returned by a collaborator.
    ///
    /// The source chain is walked outermost first; the first link that is a
    /// known error type decides the category.
    pub fn classify(&self, error: &anyhow::Error, context: ErrorContext) -> ClassifiedError {
        let mut resolved = None;
        for cause in error.chain() {
            if let Some(e) = cause.downcast_ref::<CheckupError>() {
                resolved = Some(Self::categorize(e));
            } else if let Some(e) = cause.downcast_ref::<std::io::Error>() {
                resolved = Some((Self::categorize_io(e), None));
            } else if cause.downcast_ref::<tokio::time::error::Elapsed>().is_some() {
                resolved = Some((ErrorCategory::Connectivity, None));
            }
            if resolved.is_some() {
                break;
            }
        }

        let (category, severity) = resolved.unwrap_or((ErrorCategory::Unknown, None));
        self.build(category, severity, format!("{:#}", error), context)
    }

    /// Classify a crate error directly
    pub fn classify_checkup_error(
        &self,
        error: &CheckupError,
        context: ErrorContext,
    ) -> ClassifiedError {
        let (category, severity) = Self::categorize(error);
        self.build(category, severity, error.to_string(), context)
    }

    /// Category plus an optional severity that overrides the category default
    pub fn categorize(error: &CheckupError) -> (ErrorCategory, Option<ErrorSeverity>) {
        match error {
            CheckupError::Io(io) => (Self::categorize_io(io), None),
            CheckupError::InvalidConfig(_) | CheckupError::ConfigLoad(_) => {
                (ErrorCategory::Configuration, None)
            }
            CheckupError::Connectivity(_) => (ErrorCategory::Connectivity, None),
            CheckupError::Compatibility(_) => (ErrorCategory::Compatibility, None),
            CheckupError::Transfer(_) => (ErrorCategory::Transfer, None),
            CheckupError::Database(_) => (ErrorCategory::Database, None),
            CheckupError::Backup(_) => (ErrorCategory::Backup, None),
            CheckupError::Rollback(_) => (ErrorCategory::Rollback, None),
            CheckupError::Authentication(_) => (ErrorCategory::Authentication, None),
            CheckupError::PermissionDenied(_) => (ErrorCategory::Permission, None),
            CheckupError::Resource(_) => (ErrorCategory::Resource, None),
            CheckupError::Validation(_) => (ErrorCategory::Validation, None),
            CheckupError::Platform(_) => (ErrorCategory::Platform, None),
            CheckupError::Serialization(_) => (ErrorCategory::Validation, None),
            CheckupError::Timeout { .. } => (ErrorCategory::Connectivity, None),
            CheckupError::CircuitOpen { .. } => (ErrorCategory::Resource, None),
            CheckupError::TooManyCleanerFailures { .. } => {
                (ErrorCategory::Validation, Some(ErrorSeverity::High))
            }
            CheckupError::CleanupFailed {
                source,
                rolled_back,
            } => {
                let (category, _) = Self::categorize(source);
                if *rolled_back {
                    (category, Some(ErrorSeverity::High))
                } else {
                    (category, Some(ErrorSeverity::Critical))
                }
            }
            CheckupError::Component { .. } => (ErrorCategory::Unknown, None),
        }
    }

    /// Classify I/O errors by kind
    pub fn categorize_io(io_err: &std::io::Error) -> ErrorCategory {
        use std::io::ErrorKind;

        match io_err.kind() {
            ErrorKind::PermissionDenied => ErrorCategory::Permission,
            ErrorKind::TimedOut
            | ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::BrokenPipe => ErrorCategory::Connectivity,
            ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::WriteZero => {
                ErrorCategory::Transfer
            }
            ErrorKind::OutOfMemory => ErrorCategory::Resource,
            ErrorKind::Unsupported => ErrorCategory::Platform,
            ErrorKind::NotFound
            | ErrorKind::AlreadyExists
            | ErrorKind::InvalidInput
            | ErrorKind::InvalidData
            | ErrorKind::UnexpectedEof => ErrorCategory::Validation,
            _ => ErrorCategory::Unknown,
        }
    }

    fn build(
        &self,
        category: ErrorCategory,
        severity: Option<ErrorSeverity>,
        message: String,
        context: ErrorContext,
    ) -> ClassifiedError {
        let severity = severity
            .or_else(|| self.severity_overrides.get(&category).copied())
            .unwrap_or_else(|| category.default_severity());

        ClassifiedError {
            category,
            severity,
            recoverable: category.is_recoverable(),
            recovery_strategies: category.recovery_strategies().to_vec(),
            remediation_steps: category
                .remediation_steps()
                .iter()
                .map(|s| s.to_string())
                .collect(),
            message,
            context,
            attempt: 0,
        }
    }

    /// Emit the structured log event for a classified failure
    pub fn log(&self, error: &ClassifiedError) {
        let remediation = error.remediation_steps.join(" | ");
        match error.severity {
            ErrorSeverity::Critical | ErrorSeverity::High => tracing::error!(
                operation = %error.context.operation,
                category = %error.category,
                severity = %error.severity,
                recoverable = error.recoverable,
                attempt = error.attempt + 1,
                remediation = %remediation,
                "{}",
                error.message
            ),
            ErrorSeverity::Medium | ErrorSeverity::Low => tracing::warn!(
                operation = %error.context.operation,
                category = %error.category,
                severity = %error.severity,
                recoverable = error.recoverable,
                attempt = error.attempt + 1,
                remediation = %remediation,
                "{}",
                error.message
            ),
        }
    }
}
