use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Which result list an issue belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Quality,
    Duplicate,
    Import,
    Structure,
    CoverageGap,
    Config,
    Doc,
}

impl IssueKind {
    pub const ALL: [IssueKind; 7] = [
        IssueKind::Quality,
        IssueKind::Duplicate,
        IssueKind::Import,
        IssueKind::Structure,
        IssueKind::CoverageGap,
        IssueKind::Config,
        IssueKind::Doc,
    ];
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IssueKind::Quality => "quality",
            IssueKind::Duplicate => "duplicate",
            IssueKind::Import => "import",
            IssueKind::Structure => "structure",
            IssueKind::CoverageGap => "coverage_gap",
            IssueKind::Config => "config",
            IssueKind::Doc => "doc",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// A single finding produced by an analyzer or validator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub file_path: PathBuf,
    pub line: Option<usize>,
    pub severity: Severity,
    /// Short machine tag, e.g. "unused_import"
    pub issue_type: String,
    pub message: String,
    pub suggestion: Option<String>,
    /// Other files involved (duplicate blocks, circular imports)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_paths: Vec<PathBuf>,
}

impl Issue {
    pub fn new(
        kind: IssueKind,
        file_path: impl Into<PathBuf>,
        issue_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            file_path: file_path.into(),
            line: None,
            severity: Severity::Medium,
            issue_type: issue_type.into(),
            message: message.into(),
            suggestion: None,
            related_paths: Vec::new(),
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_related(mut self, paths: Vec<PathBuf>) -> Self {
        self.related_paths = paths;
        self
    }

    /// Every path this issue touches
    pub fn affected_paths(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.file_path.as_path()).chain(self.related_paths.iter().map(PathBuf::as_path))
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(
                f,
                "{}:{}: [{}] {}",
                self.file_path.display(),
                line,
                self.issue_type,
                self.message
            ),
            None => write!(
                f,
                "{}: [{}] {}",
                self.file_path.display(),
                self.issue_type,
                self.message
            ),
        }
    }
}
