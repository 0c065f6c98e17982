// Result model shared by the pipelines, the orchestrator and reporters

pub mod issue;
pub mod metrics;
pub mod results;

pub use issue::{Issue, IssueKind, Severity};
pub use metrics::CodebaseMetrics;
pub use results::{
    AnalysisResults, ChangeRecord, ChangeSet, CheckupResults, CleanerOutcome, CleanupResults,
    FileMove, FileRemoval, RiskLevel, ValidationResults,
};
