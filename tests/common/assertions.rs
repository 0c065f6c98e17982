/// Reusable assertions over checkup results

use anyhow::Result;
use codebase_checkup::{AnalysisResults, CleanupResults};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// The total equals the sum of the seven per-kind lists
pub fn assert_issue_counts_consistent(results: &AnalysisResults) -> Result<()> {
    let summed = results.quality_issues().len()
        + results.duplicates().len()
        + results.import_issues().len()
        + results.structure_issues().len()
        + results.coverage_gaps().len()
        + results.config_issues().len()
        + results.doc_issues().len();

    anyhow::ensure!(
        results.total_issues() == summed,
        "total_issues {} does not match per-kind sum {}",
        results.total_issues(),
        summed
    );
    Ok(())
}

pub fn assert_change_counts_consistent(results: &CleanupResults) -> Result<()> {
    anyhow::ensure!(
        results.successful_changes() <= results.total_changes(),
        "successful changes {} exceed total {}",
        results.successful_changes(),
        results.total_changes()
    );
    Ok(())
}

/// Every file in `before` is present with identical bytes in `after`, and
/// nothing was added
pub fn assert_tree_restored(
    before: &BTreeMap<PathBuf, Vec<u8>>,
    after: &BTreeMap<PathBuf, Vec<u8>>,
) -> Result<()> {
    for (path, content) in before {
        match after.get(path) {
            Some(current) => anyhow::ensure!(
                current == content,
                "{} differs from its pre-cleanup content",
                path.display()
            ),
            None => anyhow::bail!("{} is missing after restore", path.display()),
        }
    }

    let added: Vec<_> = after.keys().filter(|p| !before.contains_key(*p)).collect();
    anyhow::ensure!(added.is_empty(), "unexpected files after restore: {:?}", added);
    Ok(())
}
