// Execution pipelines for the two checkup phases.
//
// - [`AnalysisPipeline`] fans analyzers and validators out concurrently and
//   merges their results as they complete
// - [`CleanupPipeline`] runs cleaners one at a time behind a verified backup,
//   validates the outcome and rolls back when it is not acceptable

pub mod analysis;
pub mod cleanup;
pub mod progress;
pub mod validation;

pub use analysis::{AnalysisOutcome, AnalysisPipeline};
pub use cleanup::{cleaner_timings, CleanupDiagnostics, CleanupPipeline, CleanupPlan, ERROR_REPORT_FILE};
pub use progress::{ProgressSnapshot, ProgressTracker};
pub use validation::{critical_files_present, risk_level, CleanupValidator};

use crate::{CheckupError, CheckupResult};

/// Run synchronous file-system work on the blocking pool
async fn blocking<T, F>(operation: &'static str, work: F) -> CheckupResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> CheckupResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| CheckupError::Platform(format!("{} task failed: {}", operation, e)))?
}
