/// Property tests over result merging, counts and recovery policies

use codebase_checkup::config::RollbackPolicy;
use codebase_checkup::error::RetryPolicy;
use codebase_checkup::models::{ChangeRecord, ChangeSet};
use codebase_checkup::pipeline::risk_level;
use codebase_checkup::{AnalysisResults, CodebaseMetrics, Issue, IssueKind};
use proptest::prelude::*;
use std::time::Duration;

fn kind_strategy() -> impl Strategy<Value = IssueKind> {
    prop::sample::select(IssueKind::ALL.to_vec())
}

fn issue_strategy() -> impl Strategy<Value = Issue> {
    (kind_strategy(), "[a-z]{1,8}", "[a-z_]{3,16}", prop::option::of(1usize..500)).prop_map(
        |(kind, file, issue_type, line)| {
            let issue = Issue::new(kind, format!("/project/{}.py", file), issue_type, "found");
            match line {
                Some(line) => issue.at_line(line),
                None => issue,
            }
        },
    )
}

fn metrics_strategy() -> impl Strategy<Value = CodebaseMetrics> {
    (
        prop::array::uniform8(0u64..10_000),
        prop::array::uniform8(0u64..10_000),
        0.0f64..=100.0,
    )
        .prop_map(|(a, b, coverage)| CodebaseMetrics {
            total_files: a[0],
            python_files: a[1],
            test_files: a[2],
            config_files: a[3],
            doc_files: a[4],
            total_lines: a[5],
            code_lines: a[6],
            comment_lines: a[7],
            blank_lines: b[0],
            syntax_errors: b[1],
            style_violations: b[2],
            unused_imports: b[3],
            duplicate_blocks: b[4],
            misplaced_files: b[5],
            empty_directories: b[6],
            missing_docstrings: b[7],
            test_coverage_percentage: coverage,
            ..Default::default()
        })
}

fn change_set_strategy() -> impl Strategy<Value = ChangeSet> {
    prop::collection::vec(("[a-z]{1,8}", any::<bool>()), 0..12).prop_map(|records| {
        let mut changes = ChangeSet::default();
        for (index, (file, applied)) in records.into_iter().enumerate() {
            let record = ChangeRecord::new(format!("/project/{}.py", file), "edit", applied);
            if index % 2 == 0 {
                changes.formatting_changes.push(record);
            } else {
                changes.import_cleanups.push(record);
            }
        }
        changes
    })
}

fn issue_keys(results: &AnalysisResults) -> Vec<(IssueKind, String, String, Option<usize>)> {
    let mut keys: Vec<_> = results
        .all_issues()
        .map(|i| (i.kind, i.file_path.display().to_string(), i.issue_type.clone(), i.line))
        .collect();
    keys.sort();
    keys
}

proptest! {
    #[test]
    fn total_issues_is_sum_of_kinds(issues in prop::collection::vec(issue_strategy(), 0..64)) {
        let mut results = AnalysisResults::new();
        results.absorb(issues.clone(), &CodebaseMetrics::default());

        let per_kind: usize = IssueKind::ALL.iter().map(|k| results.issues_of(*k).len()).sum();
        prop_assert_eq!(results.total_issues(), issues.len());
        prop_assert_eq!(results.total_issues(), per_kind);
        for issue in &issues {
            prop_assert!(results.issues_of(issue.kind).contains(issue));
        }
    }

    #[test]
    fn absorb_order_does_not_matter(
        first in prop::collection::vec(issue_strategy(), 0..24),
        second in prop::collection::vec(issue_strategy(), 0..24),
        metrics_a in metrics_strategy(),
        metrics_b in metrics_strategy(),
    ) {
        let mut forward = AnalysisResults::new();
        forward.absorb(first.clone(), &metrics_a);
        forward.absorb(second.clone(), &metrics_b);

        let mut backward = AnalysisResults::new();
        backward.absorb(second, &metrics_b);
        backward.absorb(first, &metrics_a);

        prop_assert_eq!(issue_keys(&forward), issue_keys(&backward));
        prop_assert_eq!(forward.metrics, backward.metrics);
    }

    #[test]
    fn metrics_merge_is_commutative(a in metrics_strategy(), b in metrics_strategy()) {
        let mut ab = a.clone();
        ab.merge(&b);
        let mut ba = b.clone();
        ba.merge(&a);
        prop_assert_eq!(&ab, &ba);
        prop_assert_eq!(ab.total_files, a.total_files + b.total_files);
        prop_assert!(ab.test_coverage_percentage >= a.test_coverage_percentage);
    }

    #[test]
    fn applied_changes_never_exceed_total(a in change_set_strategy(), b in change_set_strategy()) {
        let expected_total = a.total() + b.total();
        let expected_applied = a.applied() + b.applied();

        let mut merged = a;
        merged.merge(b);
        prop_assert!(merged.applied() <= merged.total());
        prop_assert_eq!(merged.total(), expected_total);
        prop_assert_eq!(merged.applied(), expected_applied);
    }

    #[test]
    fn backoff_is_capped_and_non_decreasing(
        base_ms in 1u64..500,
        max_ms in 1u64..10_000,
        exponential_base in 1.0f64..4.0,
    ) {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(base_ms),
            max_delay: Duration::from_millis(max_ms),
            exponential_base,
            jitter: false,
            retryable_categories: Vec::new(),
        };

        let mut previous = Duration::ZERO;
        for attempt in 0..10 {
            let delay = policy.backoff_delay(attempt);
            prop_assert!(delay <= policy.max_delay);
            prop_assert!(delay >= previous);
            previous = delay;
        }
    }

    #[test]
    fn risk_rises_as_success_rate_falls(lower in 0.0f64..=1.0, upper in 0.0f64..=1.0) {
        let policy = RollbackPolicy::default();
        let (low_rate, high_rate) = if lower <= upper { (lower, upper) } else { (upper, lower) };
        prop_assert!(risk_level(low_rate, &policy) >= risk_level(high_rate, &policy));
    }
}
