use super::{blocking, python_files};
use crate::components::{Analyzer, AnalyzerReport, ComponentKind};
use crate::config::CheckupConfig;
use crate::models::{CodebaseMetrics, Issue, IssueKind, Severity};
use anyhow::Context;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Style and complexity checks; also owns the file inventory counters
#[derive(Debug, Clone)]
pub struct QualityAnalyzer {
    target: PathBuf,
    exclude_dirs: Vec<String>,
    max_line_length: usize,
    max_parameters: usize,
}

impl QualityAnalyzer {
    pub fn new(config: &CheckupConfig) -> Self {
        Self {
            target: config.target_directory.clone(),
            exclude_dirs: config.exclude_dirs.clone(),
            max_line_length: config.max_line_length,
            max_parameters: config.max_parameters,
        }
    }

    fn scan(&self) -> anyhow::Result<AnalyzerReport> {
        let mut metrics = CodebaseMetrics::capture(&self.target, &self.exclude_dirs)
            .with_context(|| format!("Scanning {}", self.target.display()))?;
        let mut issues = Vec::new();

        for path in python_files(&self.target, &self.exclude_dirs)? {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Reading {}", path.display()))?;
            self.check_file(&path, &content, &mut issues, &mut metrics);
        }

        Ok(AnalyzerReport { issues, metrics })
    }

    fn check_file(
        &self,
        path: &Path,
        content: &str,
        issues: &mut Vec<Issue>,
        metrics: &mut CodebaseMetrics,
    ) {
        for (index, line) in content.lines().enumerate() {
            let line_no = index + 1;
            let length = line.chars().count();

            if length > self.max_line_length {
                metrics.style_violations += 1;
                issues.push(
                    Issue::new(
                        IssueKind::Quality,
                        path,
                        "line_too_long",
                        format!("Line is {} characters (max {})", length, self.max_line_length),
                    )
                    .at_line(line_no)
                    .with_severity(Severity::Low),
                );
            }

            if line != line.trim_end() {
                metrics.style_violations += 1;
                issues.push(
                    Issue::new(IssueKind::Quality, path, "trailing_whitespace", "Trailing whitespace")
                        .at_line(line_no)
                        .with_severity(Severity::Low)
                        .with_suggestion("Enable auto_format to strip it"),
                );
            }
        }

        for signature in function_signatures(content) {
            if signature.parameters > self.max_parameters {
                metrics.complexity_violations += 1;
                issues.push(
                    Issue::new(
                        IssueKind::Quality,
                        path,
                        "too_many_parameters",
                        format!(
                            "Function '{}' takes {} parameters (max {})",
                            signature.name, signature.parameters, self.max_parameters
                        ),
                    )
                    .at_line(signature.line)
                    .with_severity(Severity::Medium)
                    .with_suggestion("Group related parameters into a dataclass"),
                );
            }
        }
    }
}

#[async_trait]
impl Analyzer for QualityAnalyzer {
    fn name(&self) -> &str {
        "quality_analyzer"
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Quality
    }

    async fn analyze(&self) -> anyhow::Result<AnalyzerReport> {
        let this = self.clone();
        blocking(move || this.scan()).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    pub name: String,
    pub line: usize,
    pub parameters: usize,
}

/// `def` signatures in a Python source, including multi-line ones
pub fn function_signatures(content: &str) -> Vec<FunctionSignature> {
    let lines: Vec<&str> = content.lines().collect();
    let mut signatures = Vec::new();

    for (index, line) in lines.iter().enumerate() {
        let trimmed = line.trim_start();
        let rest = match trimmed
            .strip_prefix("def ")
            .or_else(|| trimmed.strip_prefix("async def "))
        {
            Some(rest) => rest,
            None => continue,
        };
        let Some(open) = rest.find('(') else {
            continue;
        };
        let name = rest[..open].trim().to_string();

        // gather until the parameter list closes
        let mut text = rest[open + 1..].to_string();
        let mut next = index + 1;
        while !closes(&text) && next < lines.len() {
            text.push(' ');
            text.push_str(lines[next]);
            next += 1;
        }

        signatures.push(FunctionSignature {
            name,
            line: index + 1,
            parameters: count_parameters(&text),
        });
    }

    signatures
}

fn closes(text: &str) -> bool {
    let mut depth = 1i32;
    for c in text.chars() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth -= 1;
                if depth == 0 {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

fn count_parameters(text: &str) -> usize {
    let mut depth = 1i32;
    let mut current = String::new();
    let mut params = Vec::new();

    for c in text.chars() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            ',' if depth == 1 => {
                params.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    params.push(current);

    params
        .iter()
        .map(|p| p.split(&[':', '='][..]).next().unwrap_or("").trim())
        .filter(|p| !p.is_empty() && !matches!(*p, "self" | "cls" | "*" | "/"))
        .count()
}
