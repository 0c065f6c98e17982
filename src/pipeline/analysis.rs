/// Concurrent analysis phase.
///
/// Every enabled analyzer is started at once and merged as it completes;
/// validators follow with the same pattern. A failing component is recorded
/// and contributes nothing, its siblings keep running.

use super::progress::{ProgressSnapshot, ProgressTracker};
use crate::components::{Analyzer, AnalyzerReport, ValidationReport, Validator};
use crate::error::{ErrorContext, ErrorRecord, RecoveryCoordinator};
use crate::models::AnalysisResults;
use futures::stream::{FuturesUnordered, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// What one analysis run produced, besides the results themselves
#[derive(Debug)]
pub struct AnalysisOutcome {
    pub results: AnalysisResults,
    pub errors: Vec<ErrorRecord>,
    pub warnings: Vec<String>,
    pub analyzers: ProgressSnapshot,
    pub validators: ProgressSnapshot,
}

impl AnalysisOutcome {
    pub fn components_executed(&self) -> usize {
        self.analyzers.total + self.validators.total
    }

    pub fn components_failed(&self) -> usize {
        self.analyzers.failed + self.validators.failed
    }
}

struct ComponentRun<R> {
    name: String,
    context: ErrorContext,
    result: anyhow::Result<R>,
}

pub struct AnalysisPipeline<'a> {
    recovery: &'a RecoveryCoordinator,
    target: String,
}

impl<'a> AnalysisPipeline<'a> {
    pub fn new(recovery: &'a RecoveryCoordinator, target: &Path) -> Self {
        Self {
            recovery,
            target: target.display().to_string(),
        }
    }

    /// Run the given (already gated) analyzers, then validators
    pub async fn run(
        &self,
        analyzers: &[Arc<dyn Analyzer>],
        validators: &[Arc<dyn Validator>],
    ) -> AnalysisOutcome {
        let start = Instant::now();
        let mut results = AnalysisResults::new();
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        tracing::info!(
            analyzers = analyzers.len(),
            validators = validators.len(),
            target = %self.target,
            "Starting analysis"
        );

        let mut progress = ProgressTracker::new("analyzers", analyzers.len());
        let mut pending: FuturesUnordered<_> = analyzers
            .iter()
            .map(|a| self.run_analyzer(Arc::clone(a)))
            .collect();

        while let Some(run) = pending.next().await {
            match run.result {
                Ok(report) => {
                    tracing::debug!(component = %run.name, issues = report.issues.len(), "Analyzer merged");
                    results.absorb(report.issues, &report.metrics);
                    progress.record_success(&run.name);
                }
                Err(error) => {
                    errors.push(self.absorb_failure(&mut results, &run.name, &error, run.context));
                    progress.record_failure(&run.name);
                }
            }
        }
        let analyzer_progress = progress.snapshot();

        let mut progress = ProgressTracker::new("validators", validators.len());
        let mut pending: FuturesUnordered<_> = validators
            .iter()
            .map(|v| self.run_validator(Arc::clone(v)))
            .collect();

        while let Some(run) = pending.next().await {
            match run.result {
                Ok(report) => {
                    if !report.success {
                        warnings.push(format!("Validator '{}' reported a failed check", run.name));
                    }
                    results.absorb(report.issues, &report.metrics);
                    progress.record_success(&run.name);
                }
                Err(error) => {
                    errors.push(self.absorb_failure(&mut results, &run.name, &error, run.context));
                    progress.record_failure(&run.name);
                }
            }
        }

        results.duration = start.elapsed();
        tracing::info!(
            total_issues = results.total_issues(),
            failed_components = results.failed_components.len(),
            duration = %humantime::format_duration(results.duration),
            "Analysis complete"
        );

        AnalysisOutcome {
            results,
            errors,
            warnings,
            analyzers: analyzer_progress,
            validators: progress.snapshot(),
        }
    }

    fn absorb_failure(
        &self,
        results: &mut AnalysisResults,
        name: &str,
        error: &anyhow::Error,
        context: ErrorContext,
    ) -> ErrorRecord {
        tracing::warn!(
            component = name,
            error = %format!("{:#}", error),
            "Component failed; continuing without its output"
        );
        results.failed_components.push(name.to_string());
        self.recovery.record(error, context)
    }

    async fn run_analyzer(&self, analyzer: Arc<dyn Analyzer>) -> ComponentRun<AnalyzerReport> {
        let name = analyzer.name().to_string();
        let context = ErrorContext::for_component(self.target.as_str(), "analyzer", &name);

        let result = async {
            analyzer.pre_analyze().await?;
            let report = self
                .recovery
                .execute_with_recovery(&context, || analyzer.analyze())
                .await?;
            if let Err(e) = analyzer.post_analyze(&report).await {
                tracing::warn!(component = %name, error = %e, "post_analyze hook failed");
            }
            Ok::<_, anyhow::Error>(report)
        }
        .await;

        ComponentRun {
            name,
            context,
            result,
        }
    }

    async fn run_validator(&self, validator: Arc<dyn Validator>) -> ComponentRun<ValidationReport> {
        let name = validator.name().to_string();
        let context = ErrorContext::for_component(self.target.as_str(), "validator", &name);

        let result = async {
            validator.pre_validate().await?;
            let report = self
                .recovery
                .execute_with_recovery(&context, || validator.validate())
                .await?;
            if let Err(e) = validator.post_validate(&report).await {
                tracing::warn!(component = %name, error = %e, "post_validate hook failed");
            }
            Ok::<_, anyhow::Error>(report)
        }
        .await;

        ComponentRun {
            name,
            context,
            result,
        }
    }
}
