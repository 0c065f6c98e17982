/// Scripted components for driving the pipelines from integration tests
///
/// Each mock counts its invocations so tests can tell whether the circuit
/// breaker or the early-abort logic kept it from running.

use anyhow::Result;
use async_trait::async_trait;
use codebase_checkup::components::{
    Analyzer, AnalyzerReport, CleanOutcome, Cleaner, ComponentKind, ValidationReport, Validator,
};
use codebase_checkup::models::{ChangeRecord, ChangeSet};
use codebase_checkup::{AnalysisResults, CheckupError, CodebaseMetrics, Issue};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shared invocation counter
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicU32>);

impl CallCounter {
    pub fn hit(&self) -> u32 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn count(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}

// ==================== ANALYZERS ====================

/// Returns the same issues and metrics on every call
pub struct FixedAnalyzer {
    pub name: String,
    pub kind: ComponentKind,
    pub issues: Vec<Issue>,
    pub metrics: CodebaseMetrics,
    pub calls: CallCounter,
}

impl FixedAnalyzer {
    pub fn new(name: &str, issues: Vec<Issue>, metrics: CodebaseMetrics) -> Self {
        Self {
            name: name.to_string(),
            kind: ComponentKind::Other,
            issues,
            metrics,
            calls: CallCounter::default(),
        }
    }
}

#[async_trait]
impl Analyzer for FixedAnalyzer {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ComponentKind {
        self.kind
    }

    async fn analyze(&self) -> Result<AnalyzerReport> {
        self.calls.hit();
        Ok(AnalyzerReport {
            issues: self.issues.clone(),
            metrics: self.metrics.clone(),
        })
    }
}

/// Fails with a fresh error from `make_error` for the first `failures` calls
pub struct ScriptedAnalyzer {
    pub name: String,
    pub failures: u32,
    pub make_error: fn() -> CheckupError,
    pub calls: CallCounter,
}

impl ScriptedAnalyzer {
    pub fn always_failing(name: &str, make_error: fn() -> CheckupError) -> Self {
        Self {
            name: name.to_string(),
            failures: u32::MAX,
            make_error,
            calls: CallCounter::default(),
        }
    }

    pub fn failing_times(name: &str, failures: u32, make_error: fn() -> CheckupError) -> Self {
        Self {
            failures,
            ..Self::always_failing(name, make_error)
        }
    }
}

#[async_trait]
impl Analyzer for ScriptedAnalyzer {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Other
    }

    async fn analyze(&self) -> Result<AnalyzerReport> {
        let call = self.calls.hit();
        if call <= self.failures {
            return Err((self.make_error)().into());
        }
        Ok(AnalyzerReport::default())
    }
}

/// Validator that judges the tree as failing
pub struct RejectingValidator;

#[async_trait]
impl Validator for RejectingValidator {
    fn name(&self) -> &str {
        "strict_validator"
    }

    async fn validate(&self) -> Result<ValidationReport> {
        Ok(ValidationReport {
            issues: Vec::new(),
            metrics: CodebaseMetrics::default(),
            success: false,
        })
    }
}

// ==================== CLEANERS ====================

/// What a [`ScriptedCleaner`] does when invoked
#[derive(Debug, Clone)]
pub enum CleanerScript {
    /// Overwrite the file and report the change
    Rewrite { file: PathBuf, content: String },
    /// Overwrite the file, then fail
    CorruptThenFail { file: PathBuf, content: String },
    /// Fail without touching anything
    Fail,
    /// Sleep before succeeding with no changes
    Sleep(Duration),
}

/// Cleaner gated by the formatter toggle that follows a script
pub struct ScriptedCleaner {
    pub name: String,
    pub script: CleanerScript,
    pub calls: CallCounter,
}

impl ScriptedCleaner {
    pub fn new(name: &str, script: CleanerScript) -> Self {
        Self {
            name: name.to_string(),
            script,
            calls: CallCounter::default(),
        }
    }
}

#[async_trait]
impl Cleaner for ScriptedCleaner {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Formatter
    }

    async fn clean(&self, _analysis: &AnalysisResults) -> Result<CleanOutcome> {
        self.calls.hit();
        match &self.script {
            CleanerScript::Rewrite { file, content } => {
                tokio::fs::write(file, content).await?;
                let mut changes = ChangeSet::default();
                changes
                    .formatting_changes
                    .push(ChangeRecord::new(file, format!("{} rewrote file", self.name), true));
                Ok(CleanOutcome::succeeded(changes))
            }
            CleanerScript::CorruptThenFail { file, content } => {
                tokio::fs::write(file, content).await?;
                Err(CheckupError::Transfer(format!("{} lost its write halfway", self.name)).into())
            }
            CleanerScript::Fail => Err(anyhow::anyhow!("{} refused to run", self.name)),
            CleanerScript::Sleep(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(CleanOutcome::succeeded(ChangeSet::default()))
            }
        }
    }
}
