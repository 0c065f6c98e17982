use super::{blocking, python_files};
use crate::components::{Analyzer, AnalyzerReport, CleanOutcome, Cleaner, ComponentKind};
use crate::config::CheckupConfig;
use crate::models::{AnalysisResults, ChangeRecord, ChangeSet, CodebaseMetrics, Issue, IssueKind, Severity};
use anyhow::Context;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

lazy_static! {
    static ref IMPORT_RE: Regex =
        Regex::new(r"^import\s+([^#]+?)\s*(#.*)?$").expect("valid import pattern");
    static ref FROM_IMPORT_RE: Regex =
        Regex::new(r"^from\s+(\S+)\s+import\s+([^#]+?)\s*(#.*)?$").expect("valid from-import pattern");
    static ref IDENTIFIER_RE: Regex =
        Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("valid identifier pattern");
}

/// One name bound by a module-level import statement
#[derive(Debug, Clone, PartialEq, Eq)]
struct ImportedName {
    /// Text as written, e.g. "numpy as np"
    text: String,
    /// Name bound in the module namespace
    bound: String,
}

#[derive(Debug, Clone)]
struct ImportStatement {
    line_index: usize,
    module: Option<String>,
    names: Vec<ImportedName>,
    comment: Option<String>,
}

/// An import whose bound name is never referenced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnusedImport {
    pub line: usize,
    pub name: String,
}

fn parse_imports(lines: &[&str]) -> Vec<ImportStatement> {
    let mut statements = Vec::new();

    for (line_index, line) in lines.iter().enumerate() {
        // module level, single line only
        if line.starts_with(char::is_whitespace) || line.contains('(') || line.trim_end().ends_with('\\') {
            continue;
        }

        let (module, list, comment) = if let Some(caps) = FROM_IMPORT_RE.captures(line) {
            let module = caps[1].to_string();
            if module == "__future__" {
                continue;
            }
            (Some(module), caps[2].to_string(), caps.get(3).map(|m| m.as_str().to_string()))
        } else if let Some(caps) = IMPORT_RE.captures(line) {
            (None, caps[1].to_string(), caps.get(2).map(|m| m.as_str().to_string()))
        } else {
            continue;
        };

        let mut names = Vec::new();
        for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if part == "*" {
                names.clear();
                break;
            }
            let bound = match part.split_once(" as ") {
                Some((_, alias)) => alias.trim().to_string(),
                None if module.is_some() => part.to_string(),
                None => part.split('.').next().unwrap_or(part).to_string(),
            };
            names.push(ImportedName {
                text: part.to_string(),
                bound,
            });
        }

        if !names.is_empty() {
            statements.push(ImportStatement {
                line_index,
                module,
                names,
                comment,
            });
        }
    }

    statements
}

fn used_identifiers<'a>(lines: &[&'a str], statements: &[ImportStatement]) -> HashSet<&'a str> {
    let import_lines: HashSet<usize> = statements.iter().map(|s| s.line_index).collect();
    lines
        .iter()
        .copied()
        .enumerate()
        .filter(|(index, _)| !import_lines.contains(index))
        .flat_map(|(_, line)| IDENTIFIER_RE.find_iter(line).map(|m| m.as_str()))
        .collect()
}

/// Module-level imports in `content` whose names are never used
pub fn find_unused_imports(content: &str) -> Vec<UnusedImport> {
    let lines: Vec<&str> = content.lines().collect();
    let statements = parse_imports(&lines);
    let used = used_identifiers(&lines, &statements);

    statements
        .iter()
        .flat_map(|s| {
            s.names
                .iter()
                .filter(|n| !used.contains(n.bound.as_str()))
                .map(move |n| UnusedImport {
                    line: s.line_index + 1,
                    name: n.bound.clone(),
                })
        })
        .collect()
}

/// Rewrite `content` without its unused imports.
///
/// Returns `None` when nothing would change, otherwise the new content and
/// the removed names.
pub fn remove_unused_imports(content: &str) -> Option<(String, Vec<String>)> {
    let lines: Vec<&str> = content.lines().collect();
    let statements = parse_imports(&lines);
    let used = used_identifiers(&lines, &statements);

    let mut replacements: Vec<Option<Option<String>>> = vec![None; lines.len()];
    let mut removed = Vec::new();

    for statement in &statements {
        let (kept, dropped): (Vec<_>, Vec<_>) = statement
            .names
            .iter()
            .partition(|n| used.contains(n.bound.as_str()));
        if dropped.is_empty() {
            continue;
        }
        removed.extend(dropped.iter().map(|n| n.bound.clone()));

        let replacement = if kept.is_empty() {
            None
        } else {
            let list = kept.iter().map(|n| n.text.as_str()).collect::<Vec<_>>().join(", ");
            let mut line = match &statement.module {
                Some(module) => format!("from {} import {}", module, list),
                None => format!("import {}", list),
            };
            if let Some(comment) = &statement.comment {
                line.push_str("  ");
                line.push_str(comment);
            }
            Some(line)
        };
        replacements[statement.line_index] = Some(replacement);
    }

    if removed.is_empty() {
        return None;
    }

    let mut output = String::with_capacity(content.len());
    for (line, replacement) in lines.iter().zip(replacements) {
        match replacement {
            None => {
                output.push_str(line);
                output.push('\n');
            }
            Some(Some(rewritten)) => {
                output.push_str(&rewritten);
                output.push('\n');
            }
            Some(None) => {}
        }
    }
    if !content.ends_with('\n') && output.ends_with('\n') {
        output.pop();
    }

    Some((output, removed))
}

fn is_package_init(path: &Path) -> bool {
    path.file_name().map(|n| n == "__init__.py").unwrap_or(false)
}

/// Reports module-level imports that are never referenced
#[derive(Debug, Clone)]
pub struct ImportAnalyzer {
    target: PathBuf,
    exclude_dirs: Vec<String>,
}

impl ImportAnalyzer {
    pub fn new(config: &CheckupConfig) -> Self {
        Self {
            target: config.target_directory.clone(),
            exclude_dirs: config.exclude_dirs.clone(),
        }
    }

    fn scan(&self) -> anyhow::Result<AnalyzerReport> {
        let mut report = AnalyzerReport::default();

        for path in python_files(&self.target, &self.exclude_dirs)? {
            if is_package_init(&path) {
                continue;
            }
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Reading {}", path.display()))?;

            for unused in find_unused_imports(&content) {
                report.issues.push(
                    Issue::new(
                        IssueKind::Import,
                        &path,
                        "unused_import",
                        format!("'{}' is imported but never used", unused.name),
                    )
                    .at_line(unused.line)
                    .with_severity(Severity::Low)
                    .with_suggestion("Remove the import or enable auto_fix_imports"),
                );
            }
        }

        report.metrics = CodebaseMetrics {
            unused_imports: report.issues.len() as u64,
            ..Default::default()
        };
        Ok(report)
    }
}

#[async_trait]
impl Analyzer for ImportAnalyzer {
    fn name(&self) -> &str {
        "import_analyzer"
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Import
    }

    async fn analyze(&self) -> anyhow::Result<AnalyzerReport> {
        let this = self.clone();
        blocking(move || this.scan()).await
    }
}

/// Removes unused module-level imports
#[derive(Debug, Clone)]
pub struct ImportCleaner {
    target: PathBuf,
    exclude_dirs: Vec<String>,
    dry_run: bool,
}

impl ImportCleaner {
    pub fn new(config: &CheckupConfig) -> Self {
        Self {
            target: config.target_directory.clone(),
            exclude_dirs: config.exclude_dirs.clone(),
            dry_run: config.dry_run,
        }
    }

    fn run(&self) -> anyhow::Result<CleanOutcome> {
        let mut changes = ChangeSet::default();

        // rescan: earlier cleaners may have rewritten files since analysis
        for path in python_files(&self.target, &self.exclude_dirs)? {
            if is_package_init(&path) {
                continue;
            }
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Reading {}", path.display()))?;

            if let Some((rewritten, removed)) = remove_unused_imports(&content) {
                if !self.dry_run {
                    std::fs::write(&path, rewritten)
                        .with_context(|| format!("Writing {}", path.display()))?;
                }
                changes.import_cleanups.push(ChangeRecord::new(
                    &path,
                    format!("Removed unused imports: {}", removed.join(", ")),
                    !self.dry_run,
                ));
            }
        }

        Ok(CleanOutcome::succeeded(changes))
    }
}

#[async_trait]
impl Cleaner for ImportCleaner {
    fn name(&self) -> &str {
        "import_cleaner"
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::ImportCleanup
    }

    async fn clean(&self, analysis: &AnalysisResults) -> anyhow::Result<CleanOutcome> {
        tracing::debug!(
            reported = analysis.import_issues().len(),
            dry_run = self.dry_run,
            "Cleaning unused imports"
        );
        let this = self.clone();
        blocking(move || this.run()).await
    }
}
