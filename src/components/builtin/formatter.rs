use super::{blocking, python_files};
use crate::components::{CleanOutcome, Cleaner, ComponentKind};
use crate::config::CheckupConfig;
use crate::models::{AnalysisResults, ChangeRecord, ChangeSet};
use anyhow::Context;
use async_trait::async_trait;
use std::path::PathBuf;

const INDENT: &str = "    ";
const MAX_BLANK_RUN: usize = 2;

/// Whitespace normalization of a Python source.
///
/// Returns the normalized text and a description of each kind of fix applied;
/// the list is empty when the input was already clean.
pub fn normalize_formatting(content: &str) -> (String, Vec<&'static str>) {
    let mut fixes = Vec::new();
    if content.contains("\r\n") {
        fixes.push("line endings");
    }

    let mut output = String::with_capacity(content.len());
    let mut blank_run = 0;
    let mut tabs = false;
    let mut trailing = false;
    let mut collapsed = false;

    for line in content.lines() {
        let body = line.trim_start_matches(&[' ', '\t'][..]);
        let indent = &line[..line.len() - body.len()];
        let indent = if indent.contains('\t') {
            tabs = true;
            indent.replace('\t', INDENT)
        } else {
            indent.to_string()
        };

        let trimmed_body = body.trim_end();
        if trimmed_body.len() != body.len() || (trimmed_body.is_empty() && !indent.is_empty()) {
            trailing = true;
        }

        if trimmed_body.is_empty() {
            blank_run += 1;
            if blank_run > MAX_BLANK_RUN {
                collapsed = true;
                continue;
            }
            output.push('\n');
        } else {
            blank_run = 0;
            output.push_str(&indent);
            output.push_str(trimmed_body);
            output.push('\n');
        }
    }

    if tabs {
        fixes.push("tab indentation");
    }
    if trailing {
        fixes.push("trailing whitespace");
    }
    if collapsed {
        fixes.push("excess blank lines");
    }

    let body_len = output.trim_end_matches('\n').len();
    let had_trailing_blanks = output.len() - body_len > usize::from(body_len > 0);
    let mut normalized = output[..body_len].to_string();
    if !normalized.is_empty() {
        normalized.push('\n');
    }
    let missing_newline = !content.ends_with('\n') && !normalized.is_empty();
    if had_trailing_blanks || missing_newline {
        fixes.push("final newline");
    }

    (normalized, fixes)
}

/// Normalizes whitespace in Python files
#[derive(Debug, Clone)]
pub struct FormatterCleaner {
    target: PathBuf,
    exclude_dirs: Vec<String>,
    dry_run: bool,
}

impl FormatterCleaner {
    pub fn new(config: &CheckupConfig) -> Self {
        Self {
            target: config.target_directory.clone(),
            exclude_dirs: config.exclude_dirs.clone(),
            dry_run: config.dry_run,
        }
    }

    fn run(&self) -> anyhow::Result<CleanOutcome> {
        let mut changes = ChangeSet::default();

        for path in python_files(&self.target, &self.exclude_dirs)? {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Reading {}", path.display()))?;
            let (normalized, fixes) = normalize_formatting(&content);
            if normalized == content {
                continue;
            }

            if !self.dry_run {
                std::fs::write(&path, &normalized)
                    .with_context(|| format!("Writing {}", path.display()))?;
            }
            changes.formatting_changes.push(ChangeRecord::new(
                &path,
                format!("Fixed {}", fixes.join(", ")),
                !self.dry_run,
            ));
        }

        tracing::debug!(
            files = changes.formatting_changes.len(),
            dry_run = self.dry_run,
            "Formatting pass complete"
        );
        Ok(CleanOutcome::succeeded(changes))
    }
}

#[async_trait]
impl Cleaner for FormatterCleaner {
    fn name(&self) -> &str {
        "code_formatter"
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Formatter
    }

    async fn clean(&self, _analysis: &AnalysisResults) -> anyhow::Result<CleanOutcome> {
        let this = self.clone();
        blocking(move || this.run()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_clean_input_is_untouched() {
        let source = "def f():\n    return 1\n";
        let (normalized, fixes) = normalize_formatting(source);
        assert_eq!(normalized, source);
        assert!(fixes.is_empty());
    }

    #[test]
    fn test_normalizes_whitespace() {
        let source = "def f():\t\n\treturn 1   \n\n\n\n\nx = 2";
        let (normalized, fixes) = normalize_formatting(source);
        assert_eq!(normalized, "def f():\n    return 1\n\n\nx = 2\n");
        assert!(fixes.contains(&"tab indentation"));
        assert!(fixes.contains(&"trailing whitespace"));
        assert!(fixes.contains(&"excess blank lines"));
        assert!(fixes.contains(&"final newline"));
    }

    #[test]
    fn test_trailing_blank_lines_removed() {
        let (normalized, _) = normalize_formatting("x = 1\n\n\n");
        assert_eq!(normalized, "x = 1\n");
    }

    #[test]
    fn test_crlf_converted() {
        let (normalized, fixes) = normalize_formatting("x = 1\r\ny = 2\r\n");
        assert_eq!(normalized, "x = 1\ny = 2\n");
        assert_eq!(fixes, vec!["line endings"]);
    }

    #[tokio::test]
    async fn test_dry_run_reports_without_writing() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("messy.py");
        fs::write(&file, "x = 1   \n").unwrap();

        let mut config = CheckupConfig::for_target(dir.path());
        config.dry_run = true;
        let outcome = FormatterCleaner::new(&config)
            .clean(&AnalysisResults::new())
            .await
            .unwrap();

        assert_eq!(outcome.changes.formatting_changes.len(), 1);
        assert!(!outcome.changes.formatting_changes[0].applied);
        assert_eq!(fs::read_to_string(&file).unwrap(), "x = 1   \n");
    }

    #[tokio::test]
    async fn test_writes_when_not_dry_run() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("messy.py");
        fs::write(&file, "x = 1   \n").unwrap();

        let outcome = FormatterCleaner::new(&CheckupConfig::for_target(dir.path()))
            .clean(&AnalysisResults::new())
            .await
            .unwrap();

        assert!(outcome.changes.formatting_changes[0].applied);
        assert_eq!(fs::read_to_string(&file).unwrap(), "x = 1\n");
    }
}
