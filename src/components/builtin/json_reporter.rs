use crate::components::{ComponentKind, Reporter};
use crate::config::CheckupConfig;
use crate::models::{CheckupResults, IssueKind};
use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Writes summary and detailed JSON reports under the report directory
#[derive(Debug, Clone)]
pub struct JsonReporter {
    report_dir: PathBuf,
}

#[derive(Serialize)]
struct Summary<'a> {
    run_id: &'a str,
    success: bool,
    timestamp: String,
    duration: String,
    total_issues: usize,
    issues_by_kind: BTreeMap<IssueKind, usize>,
    python_files: u64,
    failed_components: &'a [String],
    total_changes: usize,
    successful_changes: usize,
    rolled_back: bool,
    error_message: Option<&'a str>,
    warnings: &'a [String],
}

impl<'a> Summary<'a> {
    fn of(results: &'a CheckupResults) -> Self {
        let cleanup = results.cleanup.as_ref();
        Self {
            run_id: &results.run_id,
            success: results.success,
            timestamp: results.timestamp.to_rfc3339(),
            duration: humantime::format_duration(results.duration).to_string(),
            total_issues: results.total_issues(),
            issues_by_kind: results.analysis.counts_by_kind(),
            python_files: results.analysis.metrics.python_files,
            failed_components: &results.analysis.failed_components,
            total_changes: cleanup.map(|c| c.total_changes()).unwrap_or(0),
            successful_changes: cleanup.map(|c| c.successful_changes()).unwrap_or(0),
            rolled_back: cleanup.map(|c| c.rolled_back).unwrap_or(false),
            error_message: results.error_message.as_deref(),
            warnings: &results.warnings,
        }
    }
}

impl JsonReporter {
    pub fn new(config: &CheckupConfig) -> Self {
        Self {
            report_dir: config.resolved_report_dir(),
        }
    }

    pub fn report_dir(&self) -> &Path {
        &self.report_dir
    }

    async fn write<T: Serialize + ?Sized>(&self, file_name: String, value: &T) -> anyhow::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.report_dir)
            .await
            .with_context(|| format!("Creating report directory {}", self.report_dir.display()))?;

        let path = self.report_dir.join(file_name);
        let json = serde_json::to_vec_pretty(value)?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Writing report {}", path.display()))?;

        tracing::info!(report = %path.display(), "JSON report written");
        Ok(path)
    }
}

#[async_trait]
impl Reporter for JsonReporter {
    fn name(&self) -> &str {
        "json_reporter"
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Json
    }

    async fn generate_and_save_summary(&self, results: &CheckupResults) -> anyhow::Result<PathBuf> {
        self.write(
            format!("checkup_summary_{}.json", results.run_id),
            &Summary::of(results),
        )
        .await
    }

    async fn generate_and_save_detailed(&self, results: &CheckupResults) -> anyhow::Result<PathBuf> {
        self.write(format!("checkup_detailed_{}.json", results.run_id), results)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Issue;
    use tempfile::TempDir;

    fn sample() -> CheckupResults {
        let mut results = CheckupResults::new("run42");
        results.success = true;
        results
            .analysis
            .add_issue(Issue::new(IssueKind::Import, "a.py", "unused_import", "'os' is never used"));
        results
    }

    #[tokio::test]
    async fn test_summary_written_under_report_dir() {
        let dir = TempDir::new().unwrap();
        let reporter = JsonReporter::new(&CheckupConfig::for_target(dir.path()));

        let path = reporter.generate_and_save_summary(&sample()).await.unwrap();
        assert_eq!(
            path,
            dir.path().join("checkup_reports").join("checkup_summary_run42.json")
        );

        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["run_id"], "run42");
        assert_eq!(value["total_issues"], 1);
        assert_eq!(value["issues_by_kind"]["import"], 1);
    }

    #[tokio::test]
    async fn test_detailed_report_round_trips() {
        let dir = TempDir::new().unwrap();
        let reporter = JsonReporter::new(&CheckupConfig::for_target(dir.path()));

        let path = reporter.generate_and_save_detailed(&sample()).await.unwrap();
        let parsed: CheckupResults =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(parsed.run_id, "run42");
        assert_eq!(parsed.total_issues(), 1);
    }
}
