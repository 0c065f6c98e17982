// Built-in components.
//
// Deliberately small heuristics over Python sources; enough to run the
// checkup end to end without external tools.

mod config_validator;
mod formatter;
mod imports;
mod json_reporter;
mod quality;

pub use config_validator::ConfigValidator;
pub use formatter::{normalize_formatting, FormatterCleaner};
pub use imports::{find_unused_imports, remove_unused_imports, ImportAnalyzer, ImportCleaner, UnusedImport};
pub use json_reporter::JsonReporter;
pub use quality::{function_signatures, FunctionSignature, QualityAnalyzer};

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// `.py` files under `root`, sorted, without entering excluded directories
pub fn python_files(root: &Path, exclude_dirs: &[String]) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root).into_iter().filter_entry(|e| {
        e.depth() == 0
            || !(e.file_type().is_dir()
                && exclude_dirs
                    .iter()
                    .any(|d| e.file_name().to_string_lossy() == d.as_str()))
    });

    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() && entry.path().extension().map(|e| e == "py").unwrap_or(false)
        {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

/// Run blocking file work off the async executor
async fn blocking<T, F>(work: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}
