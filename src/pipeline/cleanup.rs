/// Guarded cleanup phase.
///
/// ```text
/// planning -> pre-checks -> backup -> cleaners (sequential) -> validation
///                                                                 |
///                                      finalized <- (rollback if invalid)
/// ```
///
/// Any failure before the rollback decision restores the backup (when one
/// exists), writes `cleanup_error_report.json` into the target and comes
/// back as [`CheckupError::CleanupFailed`].

use super::blocking;
use super::validation::{critical_files_present, CleanupValidator};
use crate::backup::{available_space, BackupManager, BackupSnapshot, RollbackManager, CRITICAL_FILES};
use crate::components::Cleaner;
use crate::config::CheckupConfig;
use crate::error::{ErrorContext, ErrorRecord, RecoveryCoordinator};
use crate::models::{AnalysisResults, CleanerOutcome, CleanupResults, IssueKind, RiskLevel};
use crate::{CheckupError, CheckupResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const ERROR_REPORT_FILE: &str = "cleanup_error_report.json";

/// Quality issue types a formatter pass can resolve
const FORMATTING_ISSUE_TYPES: &[&str] = &["trailing_whitespace"];

/// Intended work for one cleanup run, derived without touching the tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanupPlan {
    pub formatting_fixes: usize,
    pub import_cleanups: usize,
    pub file_moves: usize,
    pub cleaners: Vec<String>,
    pub risk_assessment: RiskLevel,
}

impl CleanupPlan {
    pub fn build(
        analysis: &AnalysisResults,
        config: &CheckupConfig,
        cleaners: &[Arc<dyn Cleaner>],
    ) -> Self {
        let formatting_fixes = if config.auto_format {
            analysis
                .quality_issues()
                .iter()
                .filter(|i| FORMATTING_ISSUE_TYPES.contains(&i.issue_type.as_str()))
                .count()
        } else {
            0
        };
        let import_cleanups = if config.auto_fix_imports {
            analysis.issues_of(IssueKind::Import).len()
        } else {
            0
        };
        let structure = analysis.structure_issues().len();
        let file_moves = if config.auto_organize_files {
            structure.min(config.max_file_moves)
        } else {
            0
        };

        let risk_assessment = if config.auto_organize_files && structure > config.max_file_moves {
            RiskLevel::High
        } else if file_moves > 0 || formatting_fixes + import_cleanups > 100 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        Self {
            formatting_fixes,
            import_cleanups,
            file_moves,
            cleaners: cleaners.iter().map(|c| c.name().to_string()).collect(),
            risk_assessment,
        }
    }

    pub fn total_operations(&self) -> usize {
        self.formatting_fixes + self.import_cleanups + self.file_moves
    }
}

#[derive(Serialize)]
struct ErrorReport<'a> {
    error: String,
    error_chain: Vec<String>,
    rolled_back: bool,
    started_at: DateTime<Utc>,
    failed_at: DateTime<Utc>,
    backup_path: Option<&'a std::path::Path>,
    operation_id: Option<&'a str>,
    config: serde_json::Value,
}

pub struct CleanupPipeline<'a> {
    config: &'a CheckupConfig,
    recovery: &'a RecoveryCoordinator,
    backups: BackupManager,
    rollback: Option<RollbackManager>,
    errors: Vec<ErrorRecord>,
    warnings: Vec<String>,
    outcomes: Vec<CleanerOutcome>,
}

/// What a cleanup run leaves behind for the orchestrator, whether it
/// finished or failed part way
pub struct CleanupDiagnostics {
    pub errors: Vec<ErrorRecord>,
    pub warnings: Vec<String>,
    pub cleaner_outcomes: Vec<CleanerOutcome>,
}

impl<'a> CleanupPipeline<'a> {
    pub fn new(
        config: &'a CheckupConfig,
        recovery: &'a RecoveryCoordinator,
        backups: BackupManager,
        rollback: Option<RollbackManager>,
    ) -> Self {
        Self {
            config,
            recovery,
            backups,
            rollback,
            errors: Vec::new(),
            warnings: Vec::new(),
            outcomes: Vec::new(),
        }
    }

    /// Pipeline with a backup manager and rollback registry built from `config`
    pub fn from_config(config: &'a CheckupConfig, recovery: &'a RecoveryCoordinator) -> CheckupResult<Self> {
        let backups = BackupManager::from_config(config)?;
        let rollback = RollbackManager::new(backups.clone());
        Ok(Self::new(config, recovery, backups, Some(rollback)))
    }

    /// Error records, warnings and per-cleaner outcomes of the last run
    pub fn into_diagnostics(self) -> CleanupDiagnostics {
        CleanupDiagnostics {
            errors: self.errors,
            warnings: self.warnings,
            cleaner_outcomes: self.outcomes,
        }
    }

    pub async fn run(
        &mut self,
        analysis: &AnalysisResults,
        cleaners: &[Arc<dyn Cleaner>],
    ) -> CheckupResult<CleanupResults> {
        let start = Instant::now();
        let started_at = Utc::now();
        let plan = CleanupPlan::build(analysis, self.config, cleaners);
        tracing::info!(
            cleaners = plan.cleaners.len(),
            planned_operations = plan.total_operations(),
            risk = ?plan.risk_assessment,
            dry_run = self.config.dry_run,
            "Starting cleanup"
        );

        let mut results = CleanupResults {
            dry_run: self.config.dry_run,
            ..Default::default()
        };
        let mut snapshot = None;

        let executed = self
            .execute(analysis, cleaners, &plan, &mut results, &mut snapshot)
            .await;
        self.outcomes = results.cleaner_outcomes.clone();
        if let Err(error) = executed {
            return Err(self.fail(error, &results, snapshot.as_ref(), started_at).await);
        }

        let needs_rollback = !results.validation_results.validation_passed
            || results.success_rate < self.config.rollback_policy.rollback_below_success_rate
            || results.validation_results.risk_level == RiskLevel::High;

        if needs_rollback && !self.config.dry_run {
            if let Err(error) = self.rollback_after_validation(&mut results, snapshot.as_ref()).await {
                let context =
                    ErrorContext::new("rollback", self.config.target_directory.display().to_string());
                self.errors.push(self.recovery.record_checkup_error(&error, context));
                self.write_error_report(&error, false, &results, started_at).await;
                return Err(CheckupError::CleanupFailed {
                    source: Box::new(error),
                    rolled_back: false,
                });
            }
        }

        results.timestamp = Utc::now();
        results.duration = start.elapsed();
        tracing::info!(
            total_changes = results.total_changes(),
            applied = results.successful_changes(),
            success_rate = results.success_rate,
            rolled_back = results.rolled_back,
            duration = %humantime::format_duration(results.duration),
            "Cleanup finished"
        );
        Ok(results)
    }

    /// Steps from pre-checks through validation
    async fn execute(
        &mut self,
        analysis: &AnalysisResults,
        cleaners: &[Arc<dyn Cleaner>],
        plan: &CleanupPlan,
        results: &mut CleanupResults,
        snapshot: &mut Option<BackupSnapshot>,
    ) -> CheckupResult<()> {
        let target = self.config.target_directory.clone();
        let backup_wanted = self.config.create_backup && !self.config.dry_run;

        self.check_critical_paths()?;
        if backup_wanted {
            self.check_disk_space().await?;
        }
        let critical_before = critical_files_present(&target);

        if backup_wanted {
            let created = self.create_verified_backup().await?;
            results.backup_created = true;
            results.backup_path = Some(created.path.clone());
            results.operation_id = self.register(&created, analysis);
            *snapshot = Some(created);
        } else if !self.config.dry_run {
            tracing::warn!("Backups disabled; cleanup changes cannot be rolled back");
            self.warnings.push("Cleanup ran without a backup".to_string());
        }

        self.run_cleaners(analysis, cleaners, results).await?;

        results.validation_results = CleanupValidator::new(&target, &self.config.rollback_policy)
            .validate(
                &results.changes,
                &critical_before,
                plan.total_operations(),
                results.success_rate,
            )
            .await;
        Ok(())
    }

    fn check_critical_paths(&self) -> CheckupResult<()> {
        for name in CRITICAL_FILES {
            let path = self.config.target_directory.join(name);
            if path.exists() && !path.is_file() {
                return Err(CheckupError::Validation(format!(
                    "Expected a regular file at critical path {}",
                    path.display()
                )));
            }
        }
        Ok(())
    }

    async fn check_disk_space(&self) -> CheckupResult<()> {
        let backups = self.backups.clone();
        let target = self.config.target_directory.clone();
        let estimate = blocking("estimate_backup_size", move || backups.estimate_size(&target)).await?;

        let available = match available_space(&self.config.target_directory) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "Could not query free space; skipping disk space check");
                return Ok(());
            }
        };

        let required = (estimate as f64 * self.config.rollback_policy.disk_space_factor) as u64;
        if available < required {
            return Err(CheckupError::Resource(format!(
                "Backup needs {} bytes free, only {} available",
                required, available
            )));
        }
        tracing::debug!(estimate, available, "Disk space check passed");
        Ok(())
    }

    async fn create_verified_backup(&self) -> CheckupResult<BackupSnapshot> {
        let context = ErrorContext::new("backup", self.config.target_directory.display().to_string());

        let created = self
            .recovery
            .execute_with_recovery(&context, || {
                let backups = self.backups.clone();
                let target = self.config.target_directory.clone();
                let flags = self.config.snapshot();
                async move {
                    blocking("create_backup", move || backups.create_backup(&target, flags))
                        .await
                        .map_err(anyhow::Error::from)
                }
            })
            .await
            .map_err(|e| CheckupError::from_component("backup", e))?;

        let backups = self.backups.clone();
        let target = self.config.target_directory.clone();
        let to_verify = created.clone();
        blocking("verify_backup", move || backups.verify_integrity(&to_verify, &target)).await?;

        tracing::info!(backup = %created.path.display(), "Backup created and verified");
        Ok(created)
    }

    fn register(&mut self, snapshot: &BackupSnapshot, analysis: &AnalysisResults) -> Option<String> {
        let rollback = self.rollback.as_ref()?;
        let affected = analysis.affected_files().into_iter().collect();
        match rollback.register_operation(snapshot, &self.config.target_directory, affected) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(error = %e, "Could not register cleanup for rollback");
                self.warnings.push(format!("Rollback registration failed: {}", e));
                None
            }
        }
    }

    /// Run cleaners in registration order, stopping once the success-rate
    /// floor can no longer be met
    async fn run_cleaners(
        &mut self,
        analysis: &AnalysisResults,
        cleaners: &[Arc<dyn Cleaner>],
        results: &mut CleanupResults,
    ) -> CheckupResult<()> {
        let total = cleaners.len();
        let floor = self.config.rollback_policy.rollback_below_success_rate;
        let mut failed = 0usize;

        for (index, cleaner) in cleaners.iter().enumerate() {
            let name = cleaner.name().to_string();
            let context = ErrorContext::for_component(
                self.config.target_directory.display().to_string(),
                "cleaner",
                &name,
            );
            let started = Instant::now();
            let outcome = self.run_cleaner(cleaner.as_ref(), analysis).await;
            let duration = started.elapsed();

            let record = match outcome {
                Ok(outcome) if outcome.success => {
                    let changes = outcome.change_count();
                    results.changes.merge(outcome.changes);
                    tracing::info!(cleaner = %name, changes, "Cleaner succeeded");
                    CleanerOutcome {
                        name,
                        success: true,
                        duration,
                        changes,
                        error_message: None,
                    }
                }
                Ok(outcome) => {
                    failed += 1;
                    let message = outcome
                        .error_message
                        .clone()
                        .unwrap_or_else(|| "cleaner reported failure".to_string());
                    let changes = outcome.change_count();
                    // partial changes still need validating and possibly rolling back
                    results.changes.merge(outcome.changes);
                    let error = CheckupError::Component {
                        component: name.clone(),
                        message: message.clone(),
                    };
                    self.errors.push(self.recovery.record_checkup_error(&error, context));
                    CleanerOutcome {
                        name,
                        success: false,
                        duration,
                        changes,
                        error_message: Some(message),
                    }
                }
                Err(error) => {
                    failed += 1;
                    tracing::warn!(cleaner = %name, error = %format!("{:#}", error), "Cleaner failed");
                    let record = self.recovery.record(&error, context);
                    self.errors.push(record);
                    CleanerOutcome {
                        name,
                        success: false,
                        duration,
                        changes: 0,
                        error_message: Some(format!("{:#}", error)),
                    }
                }
            };
            results.cleaner_outcomes.push(record);

            // assumes every remaining cleaner succeeds
            let best_rate = (total - failed) as f64 / total as f64;
            if best_rate < floor {
                let remaining = total - index - 1;
                let success_rate = (index + 1 - failed) as f64 / total as f64;
                tracing::error!(failed, total, remaining, success_rate, "Too many cleaners failed; aborting cleanup");
                results.success_rate = success_rate;
                return Err(CheckupError::TooManyCleanerFailures {
                    failed,
                    total,
                    success_rate,
                });
            }
        }

        results.success_rate = if total == 0 {
            1.0
        } else {
            (total - failed) as f64 / total as f64
        };
        Ok(())
    }

    async fn run_cleaner(
        &self,
        cleaner: &dyn Cleaner,
        analysis: &AnalysisResults,
    ) -> anyhow::Result<crate::components::CleanOutcome> {
        let timeout = self.config.rollback_policy.cleaner_timeout();
        cleaner.pre_clean(analysis).await?;

        let outcome = tokio::time::timeout(timeout, cleaner.clean(analysis))
            .await
            .map_err(|_| CheckupError::Timeout {
                operation: format!("cleaner:{}", cleaner.name()),
                timeout_secs: timeout.as_secs(),
            })??;

        if let Err(e) = cleaner.post_clean(&outcome).await {
            tracing::warn!(cleaner = cleaner.name(), error = %e, "post_clean hook failed");
        }
        Ok(outcome)
    }

    async fn rollback_after_validation(
        &mut self,
        results: &mut CleanupResults,
        snapshot: Option<&BackupSnapshot>,
    ) -> CheckupResult<()> {
        let Some(snapshot) = snapshot else {
            if results.successful_changes() > 0 {
                return Err(CheckupError::Rollback(
                    "Cleanup validation failed and no backup is available to restore".to_string(),
                ));
            }
            tracing::warn!("Cleanup validation failed; nothing was applied, nothing to roll back");
            self.warnings.push("Cleanup validation failed".to_string());
            return Ok(());
        };

        tracing::warn!(
            problems = ?results.validation_results.problems,
            success_rate = results.success_rate,
            "Rolling back cleanup"
        );
        self.restore(snapshot, results.operation_id.as_deref()).await?;
        results.rolled_back = true;
        self.warnings.push(format!(
            "Cleanup rolled back from {}",
            snapshot.path.display()
        ));
        Ok(())
    }

    async fn restore(&self, snapshot: &BackupSnapshot, operation_id: Option<&str>) -> CheckupResult<usize> {
        let backups = self.backups.clone();
        let target = self.config.target_directory.clone();
        let owned = snapshot.clone();
        let restored = blocking("restore_backup", move || backups.restore(&owned, &target, true))
            .await
            .map_err(|e| {
                if matches!(e, CheckupError::Rollback(_)) {
                    e
                } else {
                    CheckupError::Rollback(e.to_string())
                }
            })?;

        if let (Some(rollback), Some(id)) = (self.rollback.as_ref(), operation_id) {
            if let Err(e) = rollback.mark_rolled_back(id) {
                tracing::warn!(operation_id = id, error = %e, "Could not update rollback registry");
            }
        }
        Ok(restored)
    }

    /// Emergency path for failures before the rollback decision
    async fn fail(
        &mut self,
        error: CheckupError,
        results: &CleanupResults,
        snapshot: Option<&BackupSnapshot>,
        started_at: DateTime<Utc>,
    ) -> CheckupError {
        tracing::error!(error = %error, "Cleanup failed");
        let context = ErrorContext::new("cleanup", self.config.target_directory.display().to_string());
        self.errors.push(self.recovery.record_checkup_error(&error, context));

        let mut rolled_back = false;
        if let (Some(snapshot), false) = (snapshot, self.config.dry_run) {
            match self.restore(snapshot, results.operation_id.as_deref()).await {
                Ok(files) => {
                    tracing::warn!(files, "Emergency rollback complete");
                    rolled_back = true;
                }
                Err(e) => tracing::error!(error = %e, "Emergency rollback failed; manual restore required"),
            }
        }

        if !self.config.dry_run {
            self.write_error_report(&error, rolled_back, results, started_at).await;
        }

        CheckupError::CleanupFailed {
            source: Box::new(error),
            rolled_back,
        }
    }

    async fn write_error_report(
        &self,
        error: &CheckupError,
        rolled_back: bool,
        results: &CleanupResults,
        started_at: DateTime<Utc>,
    ) {
        let mut chain = Vec::new();
        let mut cause: Option<&dyn std::error::Error> = Some(error);
        while let Some(e) = cause {
            chain.push(e.to_string());
            cause = e.source();
        }

        let report = ErrorReport {
            error: error.to_string(),
            error_chain: chain,
            rolled_back,
            started_at,
            failed_at: Utc::now(),
            backup_path: results.backup_path.as_deref(),
            operation_id: results.operation_id.as_deref(),
            config: self.config.snapshot(),
        };

        let path = self.config.target_directory.join(ERROR_REPORT_FILE);
        let written = match serde_json::to_vec_pretty(&report) {
            Ok(json) => tokio::fs::write(&path, json).await.map_err(CheckupError::from),
            Err(e) => Err(CheckupError::from(e)),
        };
        match written {
            Ok(()) => tracing::info!(path = %path.display(), "Cleanup error report written"),
            Err(e) => tracing::warn!(error = %e, "Could not write cleanup error report"),
        }
    }
}

/// Elapsed time of each cleaner, for performance reporting
pub fn cleaner_timings(outcomes: &[CleanerOutcome]) -> Vec<(String, Duration)> {
    outcomes
        .iter()
        .map(|o| (o.name.clone(), o.duration))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{CleanOutcome, ComponentKind};
    use crate::error::{CircuitBreaker, CircuitBreakerConfig, RetryPolicy};
    use crate::models::{ChangeRecord, ChangeSet, Issue};
    use async_trait::async_trait;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    struct Rewrite {
        file: PathBuf,
        content: &'static str,
    }

    #[async_trait]
    impl Cleaner for Rewrite {
        fn name(&self) -> &str {
            "rewrite_formatter"
        }

        fn kind(&self) -> ComponentKind {
            ComponentKind::Formatter
        }

        async fn clean(&self, _analysis: &AnalysisResults) -> anyhow::Result<CleanOutcome> {
            fs::write(&self.file, self.content)?;
            let mut changes = ChangeSet::default();
            changes
                .formatting_changes
                .push(ChangeRecord::new(&self.file, "rewrite", true));
            Ok(CleanOutcome::succeeded(changes))
        }
    }

    struct Exploding;

    #[async_trait]
    impl Cleaner for Exploding {
        fn name(&self) -> &str {
            "exploding_formatter"
        }

        async fn clean(&self, _analysis: &AnalysisResults) -> anyhow::Result<CleanOutcome> {
            anyhow::bail!("formatter crashed")
        }
    }

    struct Slow;

    #[async_trait]
    impl Cleaner for Slow {
        fn name(&self) -> &str {
            "slow_formatter"
        }

        async fn clean(&self, _analysis: &AnalysisResults) -> anyhow::Result<CleanOutcome> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(CleanOutcome::default())
        }
    }

    fn coordinator() -> RecoveryCoordinator {
        RecoveryCoordinator::with_policy(
            RetryPolicy::no_retry(),
            CircuitBreaker::new(CircuitBreakerConfig::default()),
        )
    }

    fn config_for(dir: &Path) -> CheckupConfig {
        let mut config = CheckupConfig::for_target(dir);
        config.auto_format = true;
        config
    }

    fn analysis_with_issue(dir: &Path) -> AnalysisResults {
        let mut analysis = AnalysisResults::new();
        analysis.add_issue(Issue::new(
            IssueKind::Quality,
            dir.join("app.py"),
            "trailing_whitespace",
            "Trailing whitespace",
        ));
        analysis
    }

    #[test]
    fn test_plan_respects_flags() {
        let dir = TempDir::new().unwrap();
        let analysis = analysis_with_issue(dir.path());

        let plan = CleanupPlan::build(&analysis, &config_for(dir.path()), &[]);
        assert_eq!(plan.formatting_fixes, 1);
        assert_eq!(plan.import_cleanups, 0);
        assert_eq!(plan.risk_assessment, RiskLevel::Low);

        let plan = CleanupPlan::build(&analysis, &CheckupConfig::for_target(dir.path()), &[]);
        assert_eq!(plan.total_operations(), 0);
    }

    #[tokio::test]
    async fn test_successful_cleanup_keeps_changes() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("app.py");
        fs::write(&file, "x = 1   \n").unwrap();

        let config = config_for(dir.path());
        let recovery = coordinator();
        let cleaners: Vec<Arc<dyn Cleaner>> = vec![Arc::new(Rewrite {
            file: file.clone(),
            content: "x = 1\n",
        })];

        let mut pipeline = CleanupPipeline::from_config(&config, &recovery).unwrap();
        let results = pipeline
            .run(&analysis_with_issue(dir.path()), &cleaners)
            .await
            .unwrap();

        assert!(results.backup_created);
        assert!(results.operation_id.is_some());
        assert!(!results.rolled_back);
        assert_eq!(results.total_changes(), 1);
        assert_eq!(results.success_rate, 1.0);
        assert_eq!(fs::read_to_string(&file).unwrap(), "x = 1\n");
    }

    #[tokio::test]
    async fn test_too_many_failures_restores_backup() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("app.py");
        fs::write(&file, "original = True\n").unwrap();

        let config = config_for(dir.path());
        let recovery = coordinator();
        let mut cleaners: Vec<Arc<dyn Cleaner>> = vec![Arc::new(Rewrite {
            file: file.clone(),
            content: "mutated = True\n",
        })];
        for _ in 0..4 {
            cleaners.push(Arc::new(Exploding));
        }

        let mut pipeline = CleanupPipeline::from_config(&config, &recovery).unwrap();
        let error = pipeline
            .run(&analysis_with_issue(dir.path()), &cleaners)
            .await
            .unwrap_err();

        assert!(matches!(error, CheckupError::CleanupFailed { rolled_back: true, .. }));
        assert!(matches!(error.root(), CheckupError::TooManyCleanerFailures { failed: 4, total: 5, .. }));
        assert_eq!(fs::read_to_string(&file).unwrap(), "original = True\n");
        assert!(dir.path().join(ERROR_REPORT_FILE).is_file());

        let diagnostics = pipeline.into_diagnostics();
        assert_eq!(diagnostics.errors.len(), 5);
        assert_eq!(diagnostics.cleaner_outcomes.len(), 5);
        assert_eq!(diagnostics.cleaner_outcomes.iter().filter(|o| o.success).count(), 1);
    }

    #[tokio::test]
    async fn test_early_abort_reports_actual_success_rate() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("app.py");
        fs::write(&file, "original = True\n").unwrap();

        let config = config_for(dir.path());
        let recovery = coordinator();
        let mut cleaners: Vec<Arc<dyn Cleaner>> = Vec::new();
        for _ in 0..4 {
            cleaners.push(Arc::new(Exploding));
        }
        cleaners.push(Arc::new(Rewrite {
            file: file.clone(),
            content: "mutated = True\n",
        }));

        let mut pipeline = CleanupPipeline::from_config(&config, &recovery).unwrap();
        let error = pipeline
            .run(&analysis_with_issue(dir.path()), &cleaners)
            .await
            .unwrap_err();

        // the fifth cleaner never ran, so it must not count as a success
        match error.root() {
            CheckupError::TooManyCleanerFailures { failed, total, success_rate } => {
                assert_eq!((*failed, *total), (4, 5));
                assert_eq!(*success_rate, 0.0);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(fs::read_to_string(&file).unwrap(), "original = True\n");
        assert_eq!(pipeline.into_diagnostics().cleaner_outcomes.len(), 4);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.py"), "x = 1\n").unwrap();

        let mut config = config_for(dir.path());
        config.rollback_policy.cleaner_timeout_secs = 1;
        config.rollback_policy.rollback_below_success_rate = 0.0;
        config.create_backup = false;
        let recovery = coordinator();
        let cleaners: Vec<Arc<dyn Cleaner>> = vec![
            Arc::new(Slow),
            Arc::new(Rewrite {
                file: dir.path().join("app.py"),
                content: "x = 2\n",
            }),
        ];

        let mut pipeline = CleanupPipeline::from_config(&config, &recovery).unwrap();
        let results = pipeline
            .run(&analysis_with_issue(dir.path()), &cleaners)
            .await
            .unwrap();

        assert_eq!(results.success_rate, 0.5);
        let slow = &results.cleaner_outcomes[0];
        assert!(!slow.success);
        assert!(slow.error_message.as_deref().unwrap_or("").contains("timed out"));
        assert!(results.cleaner_outcomes[1].success);
    }

    #[tokio::test]
    async fn test_dry_run_skips_backup() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.py"), "x = 1\n").unwrap();

        let mut config = config_for(dir.path());
        config.dry_run = true;
        let recovery = coordinator();

        let mut pipeline = CleanupPipeline::from_config(&config, &recovery).unwrap();
        let results = pipeline.run(&AnalysisResults::new(), &[]).await.unwrap();

        assert!(!results.backup_created);
        assert!(results.dry_run);
        assert!(!config.resolved_backup_dir().exists());
    }

    #[tokio::test]
    async fn test_directory_at_critical_path_aborts() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("setup.py")).unwrap();

        let config = config_for(dir.path());
        let recovery = coordinator();
        let mut pipeline = CleanupPipeline::from_config(&config, &recovery).unwrap();
        let error = pipeline.run(&AnalysisResults::new(), &[]).await.unwrap_err();

        assert!(matches!(error.root(), CheckupError::Validation(_)));
        assert!(matches!(error, CheckupError::CleanupFailed { rolled_back: false, .. }));
    }
}
