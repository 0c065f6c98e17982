// Checkup Orchestrator - composes analysis, cleanup and reporting into one run
//
// This module is the library entry point: it validates configuration, captures
// before/after metrics, drives the pipelines with the shared recovery
// coordinator and keeps error, warning and timing history across runs.

mod state;

pub use state::{ErrorSummary, OrchestratorState, PerformanceMetrics};

use crate::backup::{BackupManager, RollbackEntry, RollbackManager};
use crate::components::ComponentRegistry;
use crate::config::CheckupConfig;
use crate::error::{ErrorContext, RecoveryAction, RecoveryCoordinator};
use crate::models::{AnalysisResults, CheckupResults, CleanupResults, CodebaseMetrics};
use crate::pipeline::{cleaner_timings, AnalysisPipeline, CleanupPipeline};
use crate::{CheckupError, CheckupResult};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// A record that automated recovery could not resolve
#[derive(Debug, Clone, Serialize)]
pub struct ManualIntervention {
    pub record_id: String,
    pub operation: String,
    pub message: String,
    pub steps: Vec<String>,
}

/// Outcome of [`CheckupOrchestrator::attempt_error_recovery`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecoveryReport {
    pub attempted: usize,
    pub recovered: Vec<String>,
    pub degraded: Vec<String>,
    pub breakers_reset: Vec<String>,
    pub manual: Vec<ManualIntervention>,
}

/// Main checkup orchestrator with integrated error recovery
pub struct CheckupOrchestrator {
    config: Arc<CheckupConfig>,
    registry: ComponentRegistry,
    recovery: RecoveryCoordinator,
    state: OrchestratorState,
}

impl CheckupOrchestrator {
    /// Orchestrator over the built-in components
    pub fn new(config: CheckupConfig) -> Self {
        let config = Arc::new(config);
        Self::with_registry(ComponentRegistry::with_builtin_components(Arc::clone(&config)))
    }

    /// Orchestrator over a caller-assembled registry; its configuration is used
    pub fn with_registry(registry: ComponentRegistry) -> Self {
        let config = Arc::new(registry.config().clone());
        let recovery = RecoveryCoordinator::new(&config);
        Self {
            config,
            registry,
            recovery,
            state: OrchestratorState::new(),
        }
    }

    pub fn config(&self) -> &CheckupConfig {
        &self.config
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn state(&self) -> &OrchestratorState {
        &self.state
    }

    pub fn recovery(&self) -> &RecoveryCoordinator {
        &self.recovery
    }

    /// Run enabled analyzers and validators.
    ///
    /// Component failures are absorbed into the results; only an unusable
    /// target directory is an error.
    pub async fn run_analysis_only(&mut self) -> CheckupResult<AnalysisResults> {
        self.ensure_target()?;

        let analyzers = self.registry.enabled_analyzers();
        let validators = self.registry.enabled_validators();
        if analyzers.is_empty() && validators.is_empty() {
            tracing::info!("No analyzers or validators enabled; skipping analysis");
            return Ok(AnalysisResults::new());
        }

        let outcome = AnalysisPipeline::new(&self.recovery, &self.config.target_directory)
            .run(&analyzers, &validators)
            .await;

        self.state
            .record_components(outcome.components_executed(), outcome.components_failed());
        self.state.record_phase("analysis", outcome.results.duration);
        self.state.record_errors(outcome.errors);
        for warning in outcome.warnings {
            self.state.add_warning(warning);
        }
        Ok(outcome.results)
    }

    /// Run enabled cleaners against a previous analysis
    pub async fn run_cleanup_only(&mut self, analysis: &AnalysisResults) -> CheckupResult<CleanupResults> {
        self.ensure_target()?;

        let cleaners = self.registry.enabled_cleaners();
        if cleaners.is_empty() {
            tracing::info!("No cleaners enabled; skipping cleanup");
            return Ok(CleanupResults {
                dry_run: self.config.dry_run,
                ..Default::default()
            });
        }

        let start = Instant::now();
        let mut pipeline = CleanupPipeline::from_config(&self.config, &self.recovery)?;
        let result = pipeline.run(analysis, &cleaners).await;
        let diagnostics = pipeline.into_diagnostics();

        self.state.record_phase("cleanup", start.elapsed());
        self.state.record_errors(diagnostics.errors);
        self.state.extend_warnings(diagnostics.warnings);

        let outcomes = &diagnostics.cleaner_outcomes;
        self.state.record_cleaner_timings(cleaner_timings(outcomes));
        let failed = outcomes.iter().filter(|o| !o.success).count();
        self.state.record_components(outcomes.len(), failed);
        result
    }

    /// Full checkup: validate, analyze, clean up when requested, report.
    ///
    /// Never fails; an unexpected error comes back as an unsuccessful
    /// [`CheckupResults`] carrying the message.
    pub async fn run_full_checkup(&mut self) -> CheckupResults {
        let run_id = new_run_id();
        let start = Instant::now();
        self.state.begin_run();
        let error_mark = self.state.error_count();
        let warning_mark = self.state.warning_count();

        tracing::info!(
            run_id = %run_id,
            target = %self.config.target_directory.display(),
            dry_run = self.config.dry_run,
            "Starting full checkup"
        );

        let mut results = match self.full_checkup(&run_id, error_mark, warning_mark).await {
            Ok(results) => results,
            Err(error) => {
                let context = ErrorContext::new("full_checkup", self.config.target_directory.display().to_string());
                let record = self.recovery.record_checkup_error(&error, context);
                self.state.record_error(record);
                let mut failed = CheckupResults::failed(run_id.as_str(), error.to_string());
                failed.warnings = self.state.warnings_since(warning_mark).to_vec();
                failed
            }
        };

        results.duration = start.elapsed();
        self.state.finish_run(results.duration);
        tracing::info!(
            run_id = %run_id,
            success = results.success,
            total_issues = results.total_issues(),
            duration = %humantime::format_duration(results.duration),
            "Checkup finished"
        );
        results
    }

    async fn full_checkup(
        &mut self,
        run_id: &str,
        error_mark: usize,
        warning_mark: usize,
    ) -> CheckupResult<CheckupResults> {
        let phase = Instant::now();
        let problems = self.config.validate();
        self.state.record_phase("config_validation", phase.elapsed());
        if !problems.is_empty() {
            return Err(CheckupError::InvalidConfig(problems));
        }

        let mut results = CheckupResults::new(run_id);

        let phase = Instant::now();
        results.before_metrics = self.capture_metrics("before").await;
        self.state.record_phase("metrics_before", phase.elapsed());

        results.analysis = self.run_analysis_only().await?;

        if self.config.cleanup_requested() && !self.config.dry_run {
            match self.run_cleanup_only(&results.analysis).await {
                Ok(cleanup) => results.cleanup = Some(cleanup),
                Err(e) => self
                    .state
                    .add_warning(format!("Cleanup failed; keeping analysis results: {}", e)),
            }
        }

        let phase = Instant::now();
        results.after_metrics = Some(self.capture_metrics("after").await);
        self.state.record_phase("metrics_after", phase.elapsed());

        results.success = self.state.errors_since(error_mark).is_empty();
        results.warnings = self.state.warnings_since(warning_mark).to_vec();
        results.timestamp = Utc::now();

        let phase = Instant::now();
        self.generate_reports(&mut results).await;
        self.state.record_phase("reports", phase.elapsed());
        results.warnings = self.state.warnings_since(warning_mark).to_vec();

        Ok(results)
    }

    /// Metrics snapshot of the target; failures degrade to empty metrics
    async fn capture_metrics(&mut self, label: &str) -> CodebaseMetrics {
        let target = self.config.target_directory.clone();
        let mut exclude = self.config.exclude_dirs.clone();
        if let Some(name) = self.config.report_dir.file_name() {
            exclude.push(name.to_string_lossy().into_owned());
        }

        let captured = tokio::task::spawn_blocking(move || CodebaseMetrics::capture(&target, &exclude)).await;
        match captured {
            Ok(Ok(metrics)) => metrics,
            Ok(Err(e)) => {
                self.state
                    .add_warning(format!("Could not capture {} metrics: {}", label, e));
                CodebaseMetrics::default()
            }
            Err(e) => {
                self.state
                    .add_warning(format!("Metrics capture task failed ({}): {}", label, e));
                CodebaseMetrics::default()
            }
        }
    }

    async fn generate_reports(&mut self, results: &mut CheckupResults) {
        for reporter in self.registry.enabled_reporters() {
            let name = reporter.name().to_string();

            match reporter.generate_and_save_summary(results).await {
                Ok(path) => {
                    results.report_files.insert(format!("{}/summary", name), path);
                }
                Err(e) => self
                    .state
                    .add_warning(format!("Reporter '{}' summary failed: {:#}", name, e)),
            }
            match reporter.generate_and_save_detailed(results).await {
                Ok(path) => {
                    results.report_files.insert(format!("{}/detailed", name), path);
                }
                Err(e) => self
                    .state
                    .add_warning(format!("Reporter '{}' detailed report failed: {:#}", name, e)),
            }
        }
    }

    fn ensure_target(&self) -> CheckupResult<()> {
        let target = &self.config.target_directory;
        if target.is_dir() {
            Ok(())
        } else {
            Err(CheckupError::InvalidConfig(vec![format!(
                "Target directory does not exist: {}",
                target.display()
            )]))
        }
    }

    pub fn get_error_summary(&self) -> ErrorSummary {
        self.state.summary(self.recovery.breakers().snapshot())
    }

    /// Apply automated recovery to every unresolved error record
    pub fn attempt_error_recovery(&mut self) -> RecoveryReport {
        let mut report = RecoveryReport::default();

        for record in self.state.unresolved_mut() {
            report.attempted += 1;
            match self.recovery.determine_recovery_action(record) {
                RecoveryAction::ResetBreaker { key } => {
                    self.recovery.reset_circuit_breaker(&key);
                    record.resolved = true;
                    record.resolution = Some(format!("circuit breaker '{}' reset", key));
                    report.recovered.push(record.id.clone());
                    if !report.breakers_reset.contains(&key) {
                        report.breakers_reset.push(key);
                    }
                }
                RecoveryAction::Degrade { reason } => {
                    record.resolved = true;
                    record.resolution = Some(reason);
                    report.degraded.push(record.id.clone());
                }
                RecoveryAction::Manual { steps } => {
                    report.manual.push(ManualIntervention {
                        record_id: record.id.clone(),
                        operation: record.operation.clone(),
                        message: record.message.clone(),
                        steps,
                    });
                }
            }
        }

        tracing::info!(
            attempted = report.attempted,
            recovered = report.recovered.len(),
            degraded = report.degraded.len(),
            manual = report.manual.len(),
            "Error recovery attempted"
        );
        report
    }

    pub fn reset_circuit_breakers(&self) -> usize {
        let reset = self.recovery.reset_circuit_breakers();
        tracing::info!(reset, "Circuit breakers reset");
        reset
    }

    pub fn get_performance_metrics(&self) -> &PerformanceMetrics {
        self.state.performance()
    }

    /// Drop accumulated errors and warnings; returns how many were dropped
    pub fn clear_error_history(&mut self) -> usize {
        self.state.clear_history()
    }

    fn rollback_manager(&self) -> CheckupResult<RollbackManager> {
        Ok(RollbackManager::new(BackupManager::from_config(&self.config)?))
    }

    /// Cleanup runs registered for rollback under the configured backup root
    pub fn list_rollback_operations(&self) -> CheckupResult<Vec<RollbackEntry>> {
        self.rollback_manager()?.list_operations()
    }

    /// Restore the target of a registered cleanup run from its backup
    pub async fn rollback_operation(&mut self, operation_id: &str) -> CheckupResult<usize> {
        let manager = self.rollback_manager()?;
        let id = operation_id.to_string();
        let restored = tokio::task::spawn_blocking(move || manager.rollback_operation(&id))
            .await
            .map_err(|e| CheckupError::Rollback(format!("rollback task failed: {}", e)))?;

        if let Err(e) = &restored {
            let context = ErrorContext::new("manual_rollback", self.config.target_directory.display().to_string())
                .with_metadata("operation_id", operation_id);
            let record = self.recovery.record_checkup_error(e, context);
            self.state.record_error(record);
        }
        restored
    }
}

fn new_run_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", Utc::now().format("%Y%m%d_%H%M%S"), &suffix[..8])
}
