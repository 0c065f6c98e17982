// Collaborator contracts: analyzers, validators, cleaners and reporters.
//
// Every component declares a [`ComponentKind`] that ties it to one
// configuration toggle. Components that do not declare a kind get one
// inferred from their name, using the same keywords the toggles are named
// after.

pub mod builtin;
pub mod registry;

pub use registry::ComponentRegistry;

use crate::config::CheckupConfig;
use crate::models::{AnalysisResults, ChangeSet, CheckupResults, CodebaseMetrics, Issue};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentRole {
    Analyzer,
    Validator,
    Cleaner,
    Reporter,
}

impl fmt::Display for ComponentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentRole::Analyzer => write!(f, "analyzer"),
            ComponentRole::Validator => write!(f, "validator"),
            ComponentRole::Cleaner => write!(f, "cleaner"),
            ComponentRole::Reporter => write!(f, "reporter"),
        }
    }
}

/// Configuration toggle a component is gated by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    // Analyzers
    Quality,
    Duplicate,
    Import,
    Structure,

    // Validators
    Coverage,
    Config,
    Docs,

    // Cleaners
    Formatter,
    ImportCleanup,
    FileOrganizer,

    // Reporters
    Html,
    Json,
    Markdown,

    /// Not tied to any toggle
    Other,
}

impl ComponentKind {
    /// Kind implied by a component's display name
    pub fn infer_from_name(name: &str, role: ComponentRole) -> ComponentKind {
        let name = name.to_lowercase();
        let has = |keyword: &str| name.contains(keyword);

        match role {
            ComponentRole::Analyzer => {
                if has("quality") {
                    ComponentKind::Quality
                } else if has("duplicate") {
                    ComponentKind::Duplicate
                } else if has("import") {
                    ComponentKind::Import
                } else if has("structure") {
                    ComponentKind::Structure
                } else {
                    ComponentKind::Other
                }
            }
            ComponentRole::Validator => {
                if has("coverage") {
                    ComponentKind::Coverage
                } else if has("config") {
                    ComponentKind::Config
                } else if has("doc") {
                    ComponentKind::Docs
                } else {
                    ComponentKind::Other
                }
            }
            ComponentRole::Cleaner => {
                if has("format") {
                    ComponentKind::Formatter
                } else if has("import") {
                    ComponentKind::ImportCleanup
                } else if has("organiz") || has("structure") {
                    ComponentKind::FileOrganizer
                } else {
                    ComponentKind::Other
                }
            }
            ComponentRole::Reporter => {
                if has("html") {
                    ComponentKind::Html
                } else if has("json") {
                    ComponentKind::Json
                } else if has("markdown") {
                    ComponentKind::Markdown
                } else {
                    ComponentKind::Other
                }
            }
        }
    }

    /// The toggle for this kind, if it has one
    pub fn toggle(&self, config: &CheckupConfig) -> Option<bool> {
        match self {
            ComponentKind::Quality => Some(config.enable_quality_analysis),
            ComponentKind::Duplicate => Some(config.enable_duplicate_detection),
            ComponentKind::Import => Some(config.enable_import_analysis),
            ComponentKind::Structure => Some(config.enable_structure_analysis),
            ComponentKind::Coverage => Some(config.check_test_coverage),
            ComponentKind::Config => Some(config.validate_configs),
            ComponentKind::Docs => Some(config.check_documentation),
            ComponentKind::Formatter => Some(config.auto_format),
            ComponentKind::ImportCleanup => Some(config.auto_fix_imports),
            ComponentKind::FileOrganizer => Some(config.auto_organize_files),
            ComponentKind::Html => Some(config.generate_html_report),
            ComponentKind::Json => Some(config.generate_json_report),
            ComponentKind::Markdown => Some(config.generate_markdown_report),
            ComponentKind::Other => None,
        }
    }
}

/// Whether a component of `kind` playing `role` runs under `config`.
///
/// Untagged cleaners never run; everything else untagged does.
pub fn should_run(role: ComponentRole, kind: ComponentKind, config: &CheckupConfig) -> bool {
    kind.toggle(config)
        .unwrap_or(!matches!(role, ComponentRole::Cleaner))
}

/// Issues and partial metrics from one analyzer
#[derive(Debug, Clone, Default)]
pub struct AnalyzerReport {
    pub issues: Vec<Issue>,
    pub metrics: CodebaseMetrics,
}

/// Judgement from one validator
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub issues: Vec<Issue>,
    pub metrics: CodebaseMetrics,
    pub success: bool,
}

/// What one cleaner did
#[derive(Debug, Clone, Default)]
pub struct CleanOutcome {
    pub success: bool,
    pub changes: ChangeSet,
    /// Count reported by cleaners that track changes outside the lists
    pub changes_made: Option<usize>,
    pub error_message: Option<String>,
}

impl CleanOutcome {
    pub fn succeeded(changes: ChangeSet) -> Self {
        Self {
            success: true,
            changes,
            changes_made: None,
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn change_count(&self) -> usize {
        self.changes_made.unwrap_or_else(|| self.changes.total())
    }
}

/// Read-only component producing issues and metrics
#[async_trait]
pub trait Analyzer: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> ComponentKind {
        ComponentKind::infer_from_name(self.name(), ComponentRole::Analyzer)
    }

    async fn pre_analyze(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn analyze(&self) -> anyhow::Result<AnalyzerReport>;

    async fn post_analyze(&self, _report: &AnalyzerReport) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Read-only component producing a pass/fail judgement plus issues
#[async_trait]
pub trait Validator: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> ComponentKind {
        ComponentKind::infer_from_name(self.name(), ComponentRole::Validator)
    }

    async fn pre_validate(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn validate(&self) -> anyhow::Result<ValidationReport>;

    async fn post_validate(&self, _report: &ValidationReport) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Mutating component that edits the target tree.
///
/// In dry run a cleaner must not write and reports its planned changes with
/// `applied = false`.
#[async_trait]
pub trait Cleaner: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> ComponentKind {
        ComponentKind::infer_from_name(self.name(), ComponentRole::Cleaner)
    }

    async fn pre_clean(&self, _analysis: &AnalysisResults) -> anyhow::Result<()> {
        Ok(())
    }

    async fn clean(&self, analysis: &AnalysisResults) -> anyhow::Result<CleanOutcome>;

    async fn post_clean(&self, _outcome: &CleanOutcome) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Renders results into an external format
#[async_trait]
pub trait Reporter: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> ComponentKind {
        ComponentKind::infer_from_name(self.name(), ComponentRole::Reporter)
    }

    async fn generate_and_save_summary(&self, results: &CheckupResults) -> anyhow::Result<PathBuf>;

    async fn generate_and_save_detailed(&self, results: &CheckupResults) -> anyhow::Result<PathBuf>;
}
