/// Result merging benchmarks
///
/// Measures how analysis results absorb component reports and how the
/// analysis pipeline fans out and merges analyzers.

use async_trait::async_trait;
use codebase_checkup::components::{Analyzer, AnalyzerReport};
use codebase_checkup::error::{CircuitBreaker, RecoveryCoordinator, RetryPolicy};
use codebase_checkup::pipeline::AnalysisPipeline;
use codebase_checkup::{AnalysisResults, CodebaseMetrics, Issue, IssueKind};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::path::Path;
use std::sync::Arc;

fn make_issues(count: usize) -> Vec<Issue> {
    (0..count)
        .map(|i| {
            let kind = IssueKind::ALL[i % IssueKind::ALL.len()];
            Issue::new(kind, format!("/project/module_{}.py", i % 97), "synthetic", "generated").at_line(i)
        })
        .collect()
}

fn make_metrics(seed: u64) -> CodebaseMetrics {
    CodebaseMetrics {
        total_files: seed,
        python_files: seed / 2,
        total_lines: seed * 40,
        code_lines: seed * 30,
        test_coverage_percentage: (seed % 100) as f64,
        ..Default::default()
    }
}

struct SyntheticAnalyzer {
    name: String,
    issues: Vec<Issue>,
    metrics: CodebaseMetrics,
}

#[async_trait]
impl Analyzer for SyntheticAnalyzer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn analyze(&self) -> anyhow::Result<AnalyzerReport> {
        Ok(AnalyzerReport {
            issues: self.issues.clone(),
            metrics: self.metrics.clone(),
        })
    }
}

// Benchmark folding component reports into one result set
fn bench_absorb(c: &mut Criterion) {
    let mut group = c.benchmark_group("absorb");

    for issue_count in [100usize, 1_000, 10_000] {
        let reports: Vec<_> = (0..8)
            .map(|i| (make_issues(issue_count / 8), make_metrics(i as u64 + 1)))
            .collect();
        group.throughput(Throughput::Elements(issue_count as u64));

        group.bench_with_input(BenchmarkId::new("eight_reports", issue_count), &reports, |b, reports| {
            b.iter(|| {
                let mut results = AnalysisResults::new();
                for (issues, metrics) in reports {
                    results.absorb(issues.clone(), metrics);
                }
                black_box(results.total_issues())
            });
        });
    }

    group.finish();
}

// Benchmark the concurrent analysis phase end to end
fn bench_analysis_pipeline(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
    let recovery = RecoveryCoordinator::with_policy(RetryPolicy::no_retry(), CircuitBreaker::default());
    let mut group = c.benchmark_group("analysis_pipeline");

    for analyzer_count in [1usize, 4, 16] {
        let analyzers: Vec<Arc<dyn Analyzer>> = (0..analyzer_count)
            .map(|i| {
                Arc::new(SyntheticAnalyzer {
                    name: format!("synthetic_{}", i),
                    issues: make_issues(250),
                    metrics: make_metrics(i as u64 + 1),
                }) as Arc<dyn Analyzer>
            })
            .collect();

        group.bench_with_input(
            BenchmarkId::new("analyzers", analyzer_count),
            &analyzers,
            |b, analyzers| {
                b.to_async(&runtime).iter(|| async {
                    let outcome = AnalysisPipeline::new(&recovery, Path::new("/project"))
                        .run(analyzers, &[])
                        .await;
                    black_box(outcome.results.total_issues())
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_absorb, bench_analysis_pipeline);
criterion_main!(benches);
