use super::{blocking, python_files};
use crate::components::{ComponentKind, ValidationReport, Validator};
use crate::config::CheckupConfig;
use crate::models::{CodebaseMetrics, Issue, IssueKind, Severity};
use ::config::{Config, File, FileFormat};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

const METADATA_FILES: &[&str] = &["pyproject.toml", "setup.py", "setup.cfg"];

/// Project configuration files that must parse, with their format
const PARSED_FILES: &[(&str, FileFormat)] = &[
    ("pyproject.toml", FileFormat::Toml),
    ("setup.cfg", FileFormat::Ini),
    ("tox.ini", FileFormat::Ini),
];

/// Checks that a Python project declares its metadata and that its
/// configuration files parse
#[derive(Debug, Clone)]
pub struct ConfigValidator {
    target: PathBuf,
    exclude_dirs: Vec<String>,
}

impl ConfigValidator {
    pub fn new(config: &CheckupConfig) -> Self {
        Self {
            target: config.target_directory.clone(),
            exclude_dirs: config.exclude_dirs.clone(),
        }
    }

    fn check(&self) -> anyhow::Result<ValidationReport> {
        let mut issues = Vec::new();

        let has_python = !python_files(&self.target, &self.exclude_dirs)?.is_empty();
        let has_metadata = METADATA_FILES.iter().any(|f| self.target.join(f).is_file());
        if has_python && !has_metadata {
            issues.push(
                Issue::new(
                    IssueKind::Config,
                    &self.target,
                    "missing_project_metadata",
                    "No pyproject.toml, setup.py or setup.cfg found",
                )
                .with_severity(Severity::Medium)
                .with_suggestion("Add a pyproject.toml describing the project"),
            );
        }

        for (name, format) in PARSED_FILES {
            let path = self.target.join(name);
            if !path.is_file() {
                continue;
            }
            if let Err(e) = parse(&path, *format) {
                issues.push(
                    Issue::new(
                        IssueKind::Config,
                        &path,
                        "invalid_config_file",
                        format!("{} does not parse: {}", name, e),
                    )
                    .with_severity(Severity::High),
                );
            }
        }

        let success = !issues.iter().any(|i| i.severity >= Severity::High);
        Ok(ValidationReport {
            issues,
            metrics: CodebaseMetrics::default(),
            success,
        })
    }
}

fn parse(path: &Path, format: FileFormat) -> Result<Config, ::config::ConfigError> {
    Config::builder()
        .add_source(File::from(path).format(format).required(true))
        .build()
}

#[async_trait]
impl Validator for ConfigValidator {
    fn name(&self) -> &str {
        "config_validator"
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Config
    }

    async fn validate(&self) -> anyhow::Result<ValidationReport> {
        let this = self.clone();
        blocking(move || this.check()).await
    }
}
