use super::issue::{Issue, IssueKind};
use super::metrics::CodebaseMetrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;

/// Aggregate of one analysis phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResults {
    /// Issue lists keyed by kind; a kind with no issues may be absent
    pub issues: BTreeMap<IssueKind, Vec<Issue>>,
    pub metrics: CodebaseMetrics,
    pub timestamp: DateTime<Utc>,
    pub duration: Duration,
    /// Components whose failure was absorbed as "produced nothing"
    #[serde(default)]
    pub failed_components: Vec<String>,
}

impl Default for AnalysisResults {
    fn default() -> Self {
        Self {
            issues: BTreeMap::new(),
            metrics: CodebaseMetrics::default(),
            timestamp: Utc::now(),
            duration: Duration::ZERO,
            failed_components: Vec::new(),
        }
    }
}

impl AnalysisResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route an issue to the list for its kind
    pub fn add_issue(&mut self, issue: Issue) {
        self.issues.entry(issue.kind).or_default().push(issue);
    }

    /// Merge one component's contribution
    pub fn absorb(&mut self, issues: Vec<Issue>, metrics: &CodebaseMetrics) {
        for issue in issues {
            self.add_issue(issue);
        }
        self.metrics.merge(metrics);
    }

    pub fn issues_of(&self, kind: IssueKind) -> &[Issue] {
        self.issues.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn quality_issues(&self) -> &[Issue] {
        self.issues_of(IssueKind::Quality)
    }

    pub fn duplicates(&self) -> &[Issue] {
        self.issues_of(IssueKind::Duplicate)
    }

    pub fn import_issues(&self) -> &[Issue] {
        self.issues_of(IssueKind::Import)
    }

    pub fn structure_issues(&self) -> &[Issue] {
        self.issues_of(IssueKind::Structure)
    }

    pub fn coverage_gaps(&self) -> &[Issue] {
        self.issues_of(IssueKind::CoverageGap)
    }

    pub fn config_issues(&self) -> &[Issue] {
        self.issues_of(IssueKind::Config)
    }

    pub fn doc_issues(&self) -> &[Issue] {
        self.issues_of(IssueKind::Doc)
    }

    pub fn total_issues(&self) -> usize {
        self.issues.values().map(Vec::len).sum()
    }

    pub fn all_issues(&self) -> impl Iterator<Item = &Issue> {
        self.issues.values().flatten()
    }

    /// Every file referenced by any issue
    pub fn affected_files(&self) -> BTreeSet<PathBuf> {
        self.all_issues()
            .flat_map(|issue| issue.affected_paths().map(PathBuf::from))
            .collect()
    }

    pub fn counts_by_kind(&self) -> BTreeMap<IssueKind, usize> {
        self.issues.iter().map(|(kind, list)| (*kind, list.len())).collect()
    }
}

/// A content change made (or planned, in dry run) to one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub file_path: PathBuf,
    pub description: String,
    pub applied: bool,
}

impl ChangeRecord {
    pub fn new(file_path: impl Into<PathBuf>, description: impl Into<String>, applied: bool) -> Self {
        Self {
            file_path: file_path.into(),
            description: description.into(),
            applied,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMove {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub applied: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRemoval {
    pub path: PathBuf,
    pub reason: String,
    pub applied: bool,
}

/// The change lists a cleaner may populate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeSet {
    pub formatting_changes: Vec<ChangeRecord>,
    pub import_cleanups: Vec<ChangeRecord>,
    pub file_moves: Vec<FileMove>,
    pub file_removals: Vec<FileRemoval>,
    pub auto_fixes: Vec<ChangeRecord>,
}

impl ChangeSet {
    pub fn merge(&mut self, other: ChangeSet) {
        self.formatting_changes.extend(other.formatting_changes);
        self.import_cleanups.extend(other.import_cleanups);
        self.file_moves.extend(other.file_moves);
        self.file_removals.extend(other.file_removals);
        self.auto_fixes.extend(other.auto_fixes);
    }

    pub fn total(&self) -> usize {
        self.formatting_changes.len()
            + self.import_cleanups.len()
            + self.file_moves.len()
            + self.file_removals.len()
            + self.auto_fixes.len()
    }

    pub fn applied(&self) -> usize {
        self.content_changes().filter(|c| c.applied).count()
            + self.file_moves.iter().filter(|m| m.applied).count()
            + self.file_removals.iter().filter(|r| r.applied).count()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    fn content_changes(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.formatting_changes
            .iter()
            .chain(self.import_cleanups.iter())
            .chain(self.auto_fixes.iter())
    }

    /// Files whose content was rewritten in place
    pub fn modified_files(&self) -> BTreeSet<PathBuf> {
        self.content_changes()
            .filter(|c| c.applied)
            .map(|c| c.file_path.clone())
            .chain(
                self.file_moves
                    .iter()
                    .filter(|m| m.applied)
                    .map(|m| m.destination.clone()),
            )
            .collect()
    }
}

/// Per-cleaner execution record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanerOutcome {
    pub name: String,
    pub success: bool,
    pub duration: Duration,
    pub changes: usize,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Post-cleanup checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResults {
    pub file_system_integrity: bool,
    pub syntax_validation: bool,
    pub import_integrity: bool,
    pub critical_files_intact: bool,
    pub cleanup_effectiveness: bool,
    pub validation_passed: bool,
    pub risk_level: RiskLevel,
    pub success_rate: f64,
    /// True when no Python interpreter was available for the syntax check
    #[serde(default)]
    pub syntax_check_skipped: bool,
    /// Human-readable description of every failed check
    #[serde(default)]
    pub problems: Vec<String>,
}

impl Default for ValidationResults {
    fn default() -> Self {
        Self {
            file_system_integrity: false,
            syntax_validation: false,
            import_integrity: false,
            critical_files_intact: false,
            cleanup_effectiveness: false,
            validation_passed: false,
            risk_level: RiskLevel::Low,
            success_rate: 0.0,
            syntax_check_skipped: false,
            problems: Vec::new(),
        }
    }
}

impl ValidationResults {
    pub fn all_checks_passed(&self) -> bool {
        self.file_system_integrity
            && self.syntax_validation
            && self.import_integrity
            && self.critical_files_intact
            && self.cleanup_effectiveness
    }
}

/// Aggregate of one cleanup phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupResults {
    #[serde(flatten)]
    pub changes: ChangeSet,
    pub backup_created: bool,
    pub backup_path: Option<PathBuf>,
    /// Rollback registry id of this run, when a backup was registered
    #[serde(default)]
    pub operation_id: Option<String>,
    pub validation_results: ValidationResults,
    pub rolled_back: bool,
    pub dry_run: bool,
    pub cleaner_outcomes: Vec<CleanerOutcome>,
    pub success_rate: f64,
    pub timestamp: DateTime<Utc>,
    pub duration: Duration,
}

impl Default for CleanupResults {
    fn default() -> Self {
        Self {
            changes: ChangeSet::default(),
            backup_created: false,
            backup_path: None,
            operation_id: None,
            validation_results: ValidationResults::default(),
            rolled_back: false,
            dry_run: false,
            cleaner_outcomes: Vec::new(),
            success_rate: 1.0,
            timestamp: Utc::now(),
            duration: Duration::ZERO,
        }
    }
}

impl CleanupResults {
    pub fn total_changes(&self) -> usize {
        self.changes.total()
    }

    pub fn successful_changes(&self) -> usize {
        self.changes.applied()
    }

    pub fn failed_cleaners(&self) -> impl Iterator<Item = &CleanerOutcome> {
        self.cleaner_outcomes.iter().filter(|o| !o.success)
    }
}

/// Top-level deliverable of a checkup run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckupResults {
    pub run_id: String,
    pub analysis: AnalysisResults,
    pub cleanup: Option<CleanupResults>,
    pub before_metrics: CodebaseMetrics,
    pub after_metrics: Option<CodebaseMetrics>,
    pub success: bool,
    pub duration: Duration,
    pub timestamp: DateTime<Utc>,
    pub error_message: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Reporter name and report kind ("json_reporter/summary") to written path
    #[serde(default)]
    pub report_files: BTreeMap<String, PathBuf>,
}

impl CheckupResults {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            analysis: AnalysisResults::default(),
            cleanup: None,
            before_metrics: CodebaseMetrics::default(),
            after_metrics: None,
            success: false,
            duration: Duration::ZERO,
            timestamp: Utc::now(),
            error_message: None,
            warnings: Vec::new(),
            report_files: BTreeMap::new(),
        }
    }

    /// Result for a run that could not complete
    pub fn failed(run_id: impl Into<String>, message: impl Into<String>) -> Self {
        let mut results = Self::new(run_id);
        results.error_message = Some(message.into());
        results
    }

    pub fn total_issues(&self) -> usize {
        self.analysis.total_issues()
    }
}
