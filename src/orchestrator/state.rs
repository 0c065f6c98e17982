/// Bookkeeping owned by the orchestrator across runs.
///
/// All mutation goes through the methods here; pipelines hand their records
/// back to the orchestrator instead of writing into shared state.

use crate::error::{CircuitBreakerState, ErrorCategory, ErrorRecord, ErrorSeverity};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Number of records included in [`ErrorSummary::recent`]
const RECENT_ERRORS: usize = 10;

#[derive(Debug, Clone, Default, Serialize)]
pub struct PerformanceMetrics {
    pub runs: u64,
    /// Last measured duration of each phase
    pub phase_durations: BTreeMap<String, Duration>,
    pub components_executed: usize,
    pub components_failed: usize,
    /// Last measured duration of each cleaner
    pub cleaner_timings: BTreeMap<String, Duration>,
    pub last_run_duration: Option<Duration>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorSummary {
    pub total_errors: usize,
    pub total_warnings: usize,
    pub unresolved: usize,
    pub by_category: BTreeMap<ErrorCategory, usize>,
    pub by_severity: BTreeMap<ErrorSeverity, usize>,
    pub recent: Vec<ErrorRecord>,
    pub circuit_breakers: BTreeMap<String, CircuitBreakerState>,
}

#[derive(Debug, Clone, Default)]
pub struct OrchestratorState {
    errors: Vec<ErrorRecord>,
    warnings: Vec<String>,
    performance: PerformanceMetrics,
}

impl OrchestratorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_run(&mut self) {
        self.performance.runs += 1;
    }

    pub fn finish_run(&mut self, duration: Duration) {
        self.performance.last_run_duration = Some(duration);
    }

    pub fn record_error(&mut self, record: ErrorRecord) {
        self.errors.push(record);
    }

    pub fn record_errors(&mut self, records: impl IntoIterator<Item = ErrorRecord>) {
        self.errors.extend(records);
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        let warning = warning.into();
        tracing::warn!(warning = %warning, "Checkup warning");
        self.warnings.push(warning);
    }

    /// Warnings already logged where they were raised
    pub fn extend_warnings(&mut self, warnings: impl IntoIterator<Item = String>) {
        self.warnings.extend(warnings);
    }

    pub fn record_phase(&mut self, phase: &str, duration: Duration) {
        tracing::debug!(phase, duration = %humantime::format_duration(duration), "Phase timed");
        self.performance.phase_durations.insert(phase.to_string(), duration);
    }

    pub fn record_components(&mut self, executed: usize, failed: usize) {
        self.performance.components_executed += executed;
        self.performance.components_failed += failed;
    }

    pub fn record_cleaner_timings(&mut self, timings: impl IntoIterator<Item = (String, Duration)>) {
        self.performance.cleaner_timings.extend(timings);
    }

    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Errors recorded since `mark` (an earlier [`error_count`](Self::error_count))
    pub fn errors_since(&self, mark: usize) -> &[ErrorRecord] {
        self.errors.get(mark..).unwrap_or(&[])
    }

    pub fn warnings_since(&self, mark: usize) -> &[String] {
        self.warnings.get(mark..).unwrap_or(&[])
    }

    pub fn unresolved_mut(&mut self) -> impl Iterator<Item = &mut ErrorRecord> {
        self.errors.iter_mut().filter(|r| !r.resolved)
    }

    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance
    }

    pub fn summary(&self, circuit_breakers: BTreeMap<String, CircuitBreakerState>) -> ErrorSummary {
        let mut by_category = BTreeMap::new();
        let mut by_severity = BTreeMap::new();
        for record in &self.errors {
            *by_category.entry(record.category).or_insert(0) += 1;
            *by_severity.entry(record.severity).or_insert(0) += 1;
        }

        let skip = self.errors.len().saturating_sub(RECENT_ERRORS);
        ErrorSummary {
            total_errors: self.errors.len(),
            total_warnings: self.warnings.len(),
            unresolved: self.errors.iter().filter(|r| !r.resolved).count(),
            by_category,
            by_severity,
            recent: self.errors[skip..].to_vec(),
            circuit_breakers,
        }
    }

    pub fn clear_history(&mut self) -> usize {
        let cleared = self.errors.len() + self.warnings.len();
        self.errors.clear();
        self.warnings.clear();
        cleared
    }
}
