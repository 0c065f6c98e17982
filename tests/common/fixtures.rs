/// Temporary project trees for integration tests

use codebase_checkup::pipeline::ERROR_REPORT_FILE;
use codebase_checkup::CheckupConfig;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

pub const UNUSED_IMPORT_SOURCE: &str = "import os\nimport json\n\nprint(json.dumps({}))\n";
pub const WIDE_FUNCTION_SOURCE: &str =
    "def configure(a, b, c, d, e, f, g, h, i, j):\n    return a + j\n";
pub const MESSY_SOURCE: &str = "def greet(name):   \n\treturn 'hi ' + name\n\n\n\n\nprint(greet('x'))";

/// A throwaway project directory
pub struct ProjectFixture {
    dir: TempDir,
}

impl ProjectFixture {
    pub fn empty() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    /// One file with an unused import, one with a ten-parameter function
    pub fn with_known_issues() -> Self {
        Self::empty()
            .with_file("app/cli.py", UNUSED_IMPORT_SOURCE)
            .with_file("app/settings.py", WIDE_FUNCTION_SOURCE)
    }

    pub fn with_file(self, relative: &str, content: &str) -> Self {
        self.write(relative, content);
        self
    }

    pub fn write(&self, relative: &str, content: &str) {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(path, content).expect("write fixture file");
    }

    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.dir.path().join(relative)).expect("read fixture file")
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// Config targeting this project with fast, single-attempt retries
    pub fn config(&self) -> CheckupConfig {
        let mut config = CheckupConfig::for_target(self.path());
        config.retry.max_attempts = 1;
        config.retry.base_delay_ms = 1;
        config.retry.max_delay_ms = 5;
        config
    }

    /// Contents of every project file, skipping checkup's own output
    pub fn contents(&self) -> BTreeMap<PathBuf, Vec<u8>> {
        let config = self.config();
        let skipped: Vec<String> = config
            .exclude_dirs
            .iter()
            .cloned()
            .chain([config.report_dir.to_string_lossy().into_owned()])
            .collect();

        WalkDir::new(self.path())
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0 || !skipped.iter().any(|s| e.file_name().to_string_lossy() == *s)
            })
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file() && e.file_name() != ERROR_REPORT_FILE)
            .map(|e| {
                let relative = e.path().strip_prefix(self.path()).unwrap().to_path_buf();
                (relative, fs::read(e.path()).unwrap())
            })
            .collect()
    }
}
