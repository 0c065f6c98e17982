use serde::Serialize;
use std::time::{Duration, Instant};

/// Completion tracking for one pipeline phase.
///
/// Updated only by the coordinator that awaits the component tasks, so no
/// interior mutability is needed.
#[derive(Debug)]
pub struct ProgressTracker {
    phase: &'static str,
    total: usize,
    succeeded: usize,
    failed: usize,
    start: Instant,
}

/// Point-in-time view of a tracker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub phase: &'static str,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub percent: f64,
    pub elapsed: Duration,
}

impl ProgressTracker {
    pub fn new(phase: &'static str, total: usize) -> Self {
        tracing::debug!(phase, total, "Phase started");
        Self {
            phase,
            total,
            succeeded: 0,
            failed: 0,
            start: Instant::now(),
        }
    }

    pub fn record_success(&mut self, component: &str) {
        self.succeeded += 1;
        self.report(component, true);
    }

    pub fn record_failure(&mut self, component: &str) {
        self.failed += 1;
        self.report(component, false);
    }

    fn report(&self, component: &str, ok: bool) {
        tracing::info!(
            phase = self.phase,
            component,
            ok,
            done = self.completed(),
            total = self.total,
            percent = self.percent(),
            "Component finished"
        );
    }

    pub fn completed(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn is_finished(&self) -> bool {
        self.completed() >= self.total
    }

    /// 0.0..=100.0; an empty phase counts as complete
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.completed() as f64 / self.total as f64 * 100.0).clamp(0.0, 100.0)
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            phase: self.phase,
            total: self.total,
            succeeded: self.succeeded,
            failed: self.failed,
            percent: self.percent(),
            elapsed: self.elapsed(),
        }
    }
}
