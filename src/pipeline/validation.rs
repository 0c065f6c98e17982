/// Post-cleanup checks deciding whether a cleanup run is kept or rolled back

use crate::backup::CRITICAL_FILES;
use crate::config::RollbackPolicy;
use crate::models::{ChangeSet, RiskLevel, ValidationResults};
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const PYTHON: &str = "python3";

/// Parses every path given on the command line; prints and fails on syntax errors
const SYNTAX_CHECK_SCRIPT: &str = "\
import ast, sys
bad = 0
for path in sys.argv[1:]:
    try:
        with open(path, 'rb') as f:
            ast.parse(f.read(), path)
    except (SyntaxError, ValueError) as exc:
        bad += 1
        print('%s: %s' % (path, exc))
sys.exit(1 if bad else 0)
";

/// Critical files currently present in `target`
pub fn critical_files_present(target: &Path) -> BTreeSet<&'static str> {
    CRITICAL_FILES
        .iter()
        .copied()
        .filter(|name| target.join(name).is_file())
        .collect()
}

pub fn risk_level(success_rate: f64, policy: &RollbackPolicy) -> RiskLevel {
    if success_rate < policy.rollback_below_success_rate {
        RiskLevel::High
    } else if success_rate < policy.medium_risk_below_success_rate {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

enum SyntaxCheck {
    Passed,
    Failed(Vec<String>),
    Skipped,
}

pub struct CleanupValidator<'a> {
    target: &'a Path,
    policy: &'a RollbackPolicy,
}

impl<'a> CleanupValidator<'a> {
    pub fn new(target: &'a Path, policy: &'a RollbackPolicy) -> Self {
        Self { target, policy }
    }

    /// Run every check against the tree as the cleaners left it.
    ///
    /// `critical_before` is the set of critical files present before cleanup;
    /// `issues_found` is the number of issues the cleanup was meant to address.
    pub async fn validate(
        &self,
        changes: &ChangeSet,
        critical_before: &BTreeSet<&'static str>,
        issues_found: usize,
        success_rate: f64,
    ) -> ValidationResults {
        let mut results = ValidationResults {
            success_rate,
            risk_level: risk_level(success_rate, self.policy),
            ..Default::default()
        };

        let mut problems = Vec::new();

        for moved in changes.file_moves.iter().filter(|m| m.applied) {
            if !moved.destination.exists() {
                problems.push(format!(
                    "Moved file missing at destination {}",
                    moved.destination.display()
                ));
            }
        }
        for removal in changes.file_removals.iter().filter(|r| r.applied) {
            if removal.path.exists() {
                problems.push(format!("Removed file still present: {}", removal.path.display()));
            }
        }
        results.file_system_integrity = problems.is_empty();

        let modified: Vec<PathBuf> = changes
            .modified_files()
            .into_iter()
            .filter(|p| p.extension().map(|e| e == "py").unwrap_or(false))
            .collect();
        match self.check_syntax(&modified).await {
            SyntaxCheck::Passed => results.syntax_validation = true,
            SyntaxCheck::Skipped => {
                results.syntax_validation = true;
                results.syntax_check_skipped = true;
            }
            SyntaxCheck::Failed(errors) => {
                problems.extend(errors.into_iter().map(|e| format!("Syntax error: {}", e)));
            }
        }

        let before = problems.len();
        for change in changes.import_cleanups.iter().filter(|c| c.applied) {
            if let Err(e) = std::fs::read_to_string(&change.file_path) {
                problems.push(format!(
                    "File unreadable after import cleanup {}: {}",
                    change.file_path.display(),
                    e
                ));
            }
        }
        results.import_integrity = problems.len() == before;

        let before = problems.len();
        for name in critical_before {
            if !self.target.join(name).is_file() {
                problems.push(format!("Critical file removed: {}", name));
            }
        }
        results.critical_files_intact = problems.len() == before;

        results.cleanup_effectiveness = issues_found == 0 || !changes.is_empty();
        if !results.cleanup_effectiveness {
            problems.push(format!("No changes made although {} issues were found", issues_found));
        }

        results.validation_passed =
            results.all_checks_passed() && success_rate >= self.policy.validation_min_success_rate;
        if success_rate < self.policy.validation_min_success_rate {
            problems.push(format!(
                "Cleaner success rate {:.2} below required {:.2}",
                success_rate, self.policy.validation_min_success_rate
            ));
        }
        results.problems = problems;

        if results.validation_passed {
            tracing::info!(risk = ?results.risk_level, "Cleanup validation passed");
        } else {
            tracing::warn!(
                risk = ?results.risk_level,
                problems = ?results.problems,
                "Cleanup validation failed"
            );
        }
        results
    }

    async fn check_syntax(&self, files: &[PathBuf]) -> SyntaxCheck {
        if files.is_empty() {
            return SyntaxCheck::Passed;
        }

        let output = tokio::process::Command::new(PYTHON)
            .arg("-B")
            .arg("-c")
            .arg(SYNTAX_CHECK_SCRIPT)
            .args(files)
            .current_dir(self.target)
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => SyntaxCheck::Passed,
            Ok(output) => {
                let errors: Vec<String> = String::from_utf8_lossy(&output.stdout)
                    .lines()
                    .map(str::to_string)
                    .collect();
                if errors.is_empty() {
                    // interpreter failed for some other reason
                    tracing::warn!(
                        stderr = %String::from_utf8_lossy(&output.stderr),
                        "Syntax check could not run"
                    );
                    SyntaxCheck::Skipped
                } else {
                    SyntaxCheck::Failed(errors)
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!("{} not found, skipping syntax validation", PYTHON);
                SyntaxCheck::Skipped
            }
            Err(e) => {
                tracing::warn!(error = %e, "Syntax check could not run");
                SyntaxCheck::Skipped
            }
        }
    }
}
