use serde::{Deserialize, Serialize};
use std::path::Path;
use walkdir::WalkDir;

const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "ini", "cfg", "json"];
const DOC_EXTENSIONS: &[&str] = &["md", "rst", "txt"];

/// Numeric counters describing a source tree.
///
/// Analyzers and validators each contribute a partial set; [`merge`](Self::merge)
/// sums counters and keeps the best known coverage percentage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodebaseMetrics {
    pub total_files: u64,
    pub python_files: u64,
    pub test_files: u64,
    pub config_files: u64,
    pub doc_files: u64,

    pub total_lines: u64,
    pub code_lines: u64,
    pub comment_lines: u64,
    pub blank_lines: u64,

    pub syntax_errors: u64,
    pub style_violations: u64,
    pub complexity_violations: u64,

    pub unused_imports: u64,
    pub circular_imports: u64,
    pub missing_imports: u64,

    pub duplicate_blocks: u64,
    pub misplaced_files: u64,
    pub empty_directories: u64,
    pub missing_docstrings: u64,

    pub test_coverage_percentage: f64,
}

impl CodebaseMetrics {
    /// Fold another partial set into this one
    pub fn merge(&mut self, other: &CodebaseMetrics) {
        self.total_files += other.total_files;
        self.python_files += other.python_files;
        self.test_files += other.test_files;
        self.config_files += other.config_files;
        self.doc_files += other.doc_files;

        self.total_lines += other.total_lines;
        self.code_lines += other.code_lines;
        self.comment_lines += other.comment_lines;
        self.blank_lines += other.blank_lines;

        self.syntax_errors += other.syntax_errors;
        self.style_violations += other.style_violations;
        self.complexity_violations += other.complexity_violations;

        self.unused_imports += other.unused_imports;
        self.circular_imports += other.circular_imports;
        self.missing_imports += other.missing_imports;

        self.duplicate_blocks += other.duplicate_blocks;
        self.misplaced_files += other.misplaced_files;
        self.empty_directories += other.empty_directories;
        self.missing_docstrings += other.missing_docstrings;

        self.test_coverage_percentage = self
            .test_coverage_percentage
            .max(other.test_coverage_percentage);
    }

    /// Walk `dir` and count files by kind and Python lines by kind.
    ///
    /// Directories whose name is in `exclude_dirs` are not entered.
    pub fn capture(dir: &Path, exclude_dirs: &[String]) -> std::io::Result<Self> {
        let mut metrics = CodebaseMetrics::default();

        let walker = WalkDir::new(dir).into_iter().filter_entry(|entry| {
            entry.depth() == 0
                || !(entry.file_type().is_dir()
                    && exclude_dirs
                        .iter()
                        .any(|excluded| entry.file_name().to_string_lossy() == excluded.as_str()))
        });

        for entry in walker {
            let entry = entry?;
            let path = entry.path();

            if entry.file_type().is_dir() {
                if entry.depth() > 0 && std::fs::read_dir(path)?.next().is_none() {
                    metrics.empty_directories += 1;
                }
                continue;
            }
            if !entry.file_type().is_file() {
                continue;
            }

            metrics.total_files += 1;
            let extension = path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default();

            if extension == "py" {
                metrics.python_files += 1;
                if is_test_file(path) {
                    metrics.test_files += 1;
                }
                let content = std::fs::read(path)?;
                metrics.count_lines(&String::from_utf8_lossy(&content));
            } else if CONFIG_EXTENSIONS.contains(&extension.as_str()) {
                metrics.config_files += 1;
            } else if DOC_EXTENSIONS.contains(&extension.as_str()) {
                metrics.doc_files += 1;
            }
        }

        tracing::debug!(
            dir = %dir.display(),
            total_files = metrics.total_files,
            python_files = metrics.python_files,
            "Captured codebase metrics"
        );

        Ok(metrics)
    }

    fn count_lines(&mut self, content: &str) {
        for line in content.lines() {
            self.total_lines += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                self.blank_lines += 1;
            } else if trimmed.starts_with('#') {
                self.comment_lines += 1;
            } else {
                self.code_lines += 1;
            }
        }
    }
}

/// `test_*.py`, `*_test.py`, or anything under a `tests` directory
pub fn is_test_file(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    name.starts_with("test_")
        || name.ends_with("_test.py")
        || path
            .parent()
            .map(|p| p.components().any(|c| c.as_os_str() == "tests"))
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_merge_sums_counters_and_keeps_best_coverage() {
        let mut a = CodebaseMetrics {
            python_files: 2,
            unused_imports: 1,
            test_coverage_percentage: 40.0,
            ..Default::default()
        };
        let b = CodebaseMetrics {
            python_files: 3,
            style_violations: 4,
            test_coverage_percentage: 75.5,
            ..Default::default()
        };

        a.merge(&b);
        assert_eq!(a.python_files, 5);
        assert_eq!(a.unused_imports, 1);
        assert_eq!(a.style_violations, 4);
        assert_eq!(a.test_coverage_percentage, 75.5);
    }

    #[test]
    fn test_capture_empty_directory() {
        let dir = TempDir::new().unwrap();
        let metrics = CodebaseMetrics::capture(dir.path(), &[]).unwrap();
        assert_eq!(metrics, CodebaseMetrics::default());
    }

    #[test]
    fn test_capture_counts_kinds_and_lines() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.py"), "# header\nimport os\n\nprint(os.name)\n").unwrap();
        fs::create_dir(dir.path().join("tests")).unwrap();
        fs::write(dir.path().join("tests/test_app.py"), "def test_x():\n    pass\n").unwrap();
        fs::write(dir.path().join("pyproject.toml"), "[project]\n").unwrap();
        fs::write(dir.path().join("README.md"), "# readme\n").unwrap();
        fs::create_dir(dir.path().join("empty")).unwrap();

        let metrics = CodebaseMetrics::capture(dir.path(), &[]).unwrap();
        assert_eq!(metrics.total_files, 4);
        assert_eq!(metrics.python_files, 2);
        assert_eq!(metrics.test_files, 1);
        assert_eq!(metrics.config_files, 1);
        assert_eq!(metrics.doc_files, 1);
        assert_eq!(metrics.total_lines, 6);
        assert_eq!(metrics.comment_lines, 1);
        assert_eq!(metrics.blank_lines, 1);
        assert_eq!(metrics.code_lines, 4);
        assert_eq!(metrics.empty_directories, 1);
    }

    #[test]
    fn test_capture_skips_excluded_directories() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".venv")).unwrap();
        fs::write(dir.path().join(".venv/site.py"), "x = 1\n").unwrap();
        fs::write(dir.path().join("main.py"), "x = 1\n").unwrap();

        let metrics = CodebaseMetrics::capture(dir.path(), &[".venv".to_string()]).unwrap();
        assert_eq!(metrics.python_files, 1);
    }
}
