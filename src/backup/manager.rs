/// Backup snapshots of the target tree
///
/// A snapshot is a plain directory copy under the backup root plus a
/// `backup_metadata.json` sidecar. Snapshots are created before destructive
/// cleanup, verified against the source, and used by rollback.
use crate::config::CheckupConfig;
use crate::{CheckupError, CheckupResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Sidecar written into every snapshot directory
pub const METADATA_FILE: &str = "backup_metadata.json";

/// Files whose loss would break the project; their presence and content are checked
pub const CRITICAL_FILES: [&str; 4] = ["pyproject.toml", "setup.py", "requirements.txt", "README.md"];

/// Dotfiles kept by comprehensive backups
const DOTFILE_ALLOW_LIST: &[&str] = &[
    ".gitignore",
    ".env.example",
    ".pre-commit-config.yaml",
    ".editorconfig",
    ".flake8",
    ".pylintrc",
];

/// Suffixes dropped by comprehensive backups
const TRANSIENT_SUFFIXES: &[&str] = &[".log", ".tmp", ".cache"];

/// Allowed py-file count drift between source and snapshot
const PY_COUNT_TOLERANCE: f64 = 0.10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupMode {
    /// Everything except ignore patterns and excluded directories
    Standard,

    /// Standard filters plus dotfiles (outside an allow-list) and transient files
    Comprehensive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupMetadata {
    pub backup_id: String,
    pub timestamp: DateTime<Utc>,
    pub source_path: PathBuf,
    pub mode: BackupMode,
    /// Configuration flags in effect when the snapshot was taken
    pub config: serde_json::Value,
    pub file_count: u64,
    pub total_size: u64,
    /// SHA-256 of each critical file present in the source
    #[serde(default)]
    pub critical_file_digests: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackupSnapshot {
    pub path: PathBuf,
    pub metadata: BackupMetadata,
}

#[derive(Debug, Clone)]
pub struct BackupManager {
    backup_root: PathBuf,
    mode: BackupMode,
    ignore_patterns: Vec<glob::Pattern>,
    exclude_dirs: Vec<String>,
}

impl BackupManager {
    pub fn new(
        backup_root: impl Into<PathBuf>,
        mode: BackupMode,
        ignore_patterns: &[String],
        exclude_dirs: &[String],
    ) -> CheckupResult<Self> {
        let ignore_patterns = ignore_patterns
            .iter()
            .map(|p| {
                glob::Pattern::new(p).map_err(|e| {
                    CheckupError::InvalidConfig(vec![format!("Invalid ignore pattern '{}': {}", p, e)])
                })
            })
            .collect::<CheckupResult<Vec<_>>>()?;

        Ok(Self {
            backup_root: backup_root.into(),
            mode,
            ignore_patterns,
            exclude_dirs: exclude_dirs.to_vec(),
        })
    }

    pub fn from_config(config: &CheckupConfig) -> CheckupResult<Self> {
        let mode = if config.comprehensive_backup {
            BackupMode::Comprehensive
        } else {
            BackupMode::Standard
        };
        Self::new(
            config.resolved_backup_dir(),
            mode,
            &config.ignore_patterns,
            &config.exclude_dirs,
        )
    }

    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    pub fn mode(&self) -> BackupMode {
        self.mode
    }

    /// Copy `source_dir` into a new timestamped snapshot under the backup root
    pub fn create_backup(
        &self,
        source_dir: &Path,
        config: serde_json::Value,
    ) -> CheckupResult<BackupSnapshot> {
        self.create_named("checkup_backup", source_dir, config)
    }

    fn create_named(
        &self,
        prefix: &str,
        source_dir: &Path,
        config: serde_json::Value,
    ) -> CheckupResult<BackupSnapshot> {
        let backup_id = uuid::Uuid::new_v4().simple().to_string();
        let timestamp = Utc::now();
        let name = format!(
            "{}_{}_{}",
            prefix,
            timestamp.format("%Y%m%d_%H%M%S"),
            &backup_id[..8]
        );
        let destination = self.backup_root.join(name);

        tracing::info!(
            source = %source_dir.display(),
            destination = %destination.display(),
            mode = ?self.mode,
            "Creating backup"
        );

        fs::create_dir_all(&destination).map_err(|e| {
            CheckupError::Backup(format!("Cannot create {}: {}", destination.display(), e))
        })?;

        let (file_count, total_size) = self.copy_tree(source_dir, &destination).map_err(|e| {
            CheckupError::Backup(format!("Copying {} failed: {}", source_dir.display(), e))
        })?;

        let metadata = BackupMetadata {
            backup_id,
            timestamp,
            source_path: source_dir.to_path_buf(),
            mode: self.mode,
            config,
            file_count,
            total_size,
            critical_file_digests: critical_digests(source_dir)?,
        };

        let json = serde_json::to_string_pretty(&metadata)?;
        fs::write(destination.join(METADATA_FILE), json).map_err(|e| {
            CheckupError::Backup(format!("Cannot write backup metadata: {}", e))
        })?;

        tracing::info!(
            path = %destination.display(),
            files = file_count,
            bytes = total_size,
            "Backup created"
        );

        Ok(BackupSnapshot {
            path: destination,
            metadata,
        })
    }

    /// Read a snapshot back from its directory
    pub fn load_snapshot(path: &Path) -> CheckupResult<BackupSnapshot> {
        let raw = fs::read_to_string(path.join(METADATA_FILE)).map_err(|e| {
            CheckupError::Backup(format!("Cannot read metadata in {}: {}", path.display(), e))
        })?;
        Ok(BackupSnapshot {
            path: path.to_path_buf(),
            metadata: serde_json::from_str(&raw)?,
        })
    }

    /// Snapshots under the backup root, oldest first
    pub fn list_backups(&self) -> CheckupResult<Vec<BackupSnapshot>> {
        if !self.backup_root.is_dir() {
            return Ok(Vec::new());
        }

        let mut snapshots = Vec::new();
        for entry in fs::read_dir(&self.backup_root)? {
            let path = entry?.path();
            if path.join(METADATA_FILE).is_file() {
                match Self::load_snapshot(&path) {
                    Ok(snapshot) => snapshots.push(snapshot),
                    Err(e) => tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable backup"),
                }
            }
        }
        snapshots.sort_by_key(|s| s.metadata.timestamp);
        Ok(snapshots)
    }

    /// Check a fresh snapshot against its source.
    ///
    /// Fails when the `.py` counts differ by more than 10% or a critical
    /// file present in the source is missing or different in the snapshot.
    pub fn verify_integrity(&self, snapshot: &BackupSnapshot, source_dir: &Path) -> CheckupResult<()> {
        let source_py = self.count_python_files(source_dir)?;
        let snapshot_py = self.count_python_files(&snapshot.path)?;

        let drift = if source_py == 0 {
            snapshot_py as f64
        } else {
            (source_py as f64 - snapshot_py as f64).abs() / source_py as f64
        };
        if drift > PY_COUNT_TOLERANCE {
            return Err(CheckupError::Backup(format!(
                "Python file count mismatch: source has {}, backup has {}",
                source_py, snapshot_py
            )));
        }

        for name in CRITICAL_FILES {
            if !source_dir.join(name).is_file() {
                continue;
            }
            let copy = snapshot.path.join(name);
            if !copy.is_file() {
                return Err(CheckupError::Backup(format!(
                    "Critical file {} missing from backup",
                    name
                )));
            }
            if let Some(expected) = snapshot.metadata.critical_file_digests.get(name) {
                if &sha256_file(&copy)? != expected {
                    return Err(CheckupError::Backup(format!(
                        "Critical file {} differs from its recorded digest",
                        name
                    )));
                }
            }
        }

        tracing::debug!(
            backup = %snapshot.path.display(),
            python_files = snapshot_py,
            "Backup integrity verified"
        );
        Ok(())
    }

    /// Restore `target_dir` from a snapshot, returning the number of files restored.
    ///
    /// Entries the backup would have skipped (excluded directories, ignore
    /// patterns, the backup root) are left in place.
    pub fn restore(
        &self,
        snapshot: &BackupSnapshot,
        target_dir: &Path,
        safety_copy: bool,
    ) -> CheckupResult<usize> {
        tracing::warn!(
            backup = %snapshot.path.display(),
            target = %target_dir.display(),
            "Restoring target from backup"
        );

        if safety_copy {
            match self.create_named(
                "pre_rollback",
                target_dir,
                serde_json::json!({ "restoring_from": snapshot.path }),
            ) {
                Ok(safety) => tracing::info!(path = %safety.path.display(), "Pre-rollback safety copy created"),
                Err(e) => tracing::warn!(error = %e, "Pre-rollback safety copy failed, continuing"),
            }
        }

        self.clear_target(target_dir)?;

        let mut restored = 0usize;
        for entry in WalkDir::new(&snapshot.path).min_depth(1) {
            let entry = entry.map_err(|e| CheckupError::Rollback(format!("Reading backup failed: {}", e)))?;
            let relative = entry
                .path()
                .strip_prefix(&snapshot.path)
                .map_err(|e| CheckupError::Rollback(e.to_string()))?;

            if relative == Path::new(METADATA_FILE) {
                continue;
            }

            let destination = target_dir.join(relative);
            let result = if entry.file_type().is_dir() {
                fs::create_dir_all(&destination)
            } else {
                copy_file(entry.path(), &destination).map(|_| restored += 1)
            };
            result.map_err(|e| {
                CheckupError::Rollback(format!("Failed to restore {}: {}", relative.display(), e))
            })?;
        }

        tracing::info!(files = restored, target = %target_dir.display(), "Restore complete");
        Ok(restored)
    }

    /// Bytes that a backup of `source_dir` would copy
    pub fn estimate_size(&self, source_dir: &Path) -> CheckupResult<u64> {
        let mut total = 0;
        for entry in self.walk(source_dir) {
            let entry = entry.map_err(std::io::Error::from)?;
            if entry.file_type().is_file() {
                total += entry.metadata().map_err(std::io::Error::from)?.len();
            }
        }
        Ok(total)
    }

    fn clear_target(&self, target_dir: &Path) -> CheckupResult<()> {
        // parent-first so skipped directories are pruned before their contents are seen
        let mut entries: Vec<_> = self
            .walk(target_dir)
            .into_iter()
            .collect::<Result<_, _>>()
            .map_err(|e| CheckupError::Rollback(format!("Scanning target failed: {}", e)))?;
        entries.reverse();

        for entry in entries {
            if entry.depth() == 0 {
                continue;
            }
            let path = entry.path();
            if entry.file_type().is_dir() {
                // still holds preserved entries when this fails
                let _ = fs::remove_dir(path);
            } else {
                fs::remove_file(path).map_err(|e| {
                    CheckupError::Rollback(format!("Failed to remove {}: {}", path.display(), e))
                })?;
            }
        }
        Ok(())
    }

    fn copy_tree(&self, source: &Path, destination: &Path) -> std::io::Result<(u64, u64)> {
        let mut files = 0;
        let mut bytes = 0;

        for entry in self.walk(source) {
            let entry = entry?;
            if entry.depth() == 0 {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(source)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
            let target = destination.join(relative);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&target)?;
            } else if entry.file_type().is_file() {
                bytes += copy_file(entry.path(), &target)?;
                files += 1;
            } else {
                tracing::debug!(path = %entry.path().display(), "Skipping non-regular file");
            }
        }

        Ok((files, bytes))
    }

    fn count_python_files(&self, dir: &Path) -> CheckupResult<usize> {
        let mut count = 0;
        for entry in self.walk(dir) {
            let entry = entry.map_err(std::io::Error::from)?;
            if entry.file_type().is_file()
                && entry.path().extension().map(|e| e == "py").unwrap_or(false)
            {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Walk `dir` applying the backup filters
    fn walk<'a>(&'a self, dir: &Path) -> FilteredWalk<'a> {
        FilteredWalk {
            walker: WalkDir::new(dir),
            manager: self,
        }
    }

    fn should_skip(&self, entry: &walkdir::DirEntry) -> bool {
        if entry.path() == self.backup_root {
            return true;
        }

        let name = entry.file_name().to_string_lossy();
        if self.exclude_dirs.iter().any(|d| d.as_str() == name) {
            return true;
        }
        if self.ignore_patterns.iter().any(|p| p.matches(&name)) {
            return true;
        }

        if self.mode == BackupMode::Comprehensive {
            if name.starts_with('.') && !DOTFILE_ALLOW_LIST.contains(&&*name) {
                return true;
            }
            if entry.file_type().is_file() && TRANSIENT_SUFFIXES.iter().any(|s| name.ends_with(s)) {
                return true;
            }
        }

        false
    }
}

/// Directory walk with the manager's skip rules applied below the root
struct FilteredWalk<'a> {
    walker: WalkDir,
    manager: &'a BackupManager,
}

impl<'a> IntoIterator for FilteredWalk<'a> {
    type Item = walkdir::Result<walkdir::DirEntry>;
    type IntoIter = walkdir::FilterEntry<walkdir::IntoIter, Box<dyn FnMut(&walkdir::DirEntry) -> bool + 'a>>;

    fn into_iter(self) -> Self::IntoIter {
        let manager = self.manager;
        let predicate: Box<dyn FnMut(&walkdir::DirEntry) -> bool + 'a> =
            Box::new(move |e| e.depth() == 0 || !manager.should_skip(e));
        self.walker.into_iter().filter_entry(predicate)
    }
}

fn copy_file(from: &Path, to: &Path) -> std::io::Result<u64> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(from, to)
}

fn sha256_file(path: &Path) -> CheckupResult<String> {
    let content = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(format!("{:x}", hasher.finalize()))
}

fn critical_digests(source_dir: &Path) -> CheckupResult<BTreeMap<String, String>> {
    let mut digests = BTreeMap::new();
    for name in CRITICAL_FILES {
        let path = source_dir.join(name);
        if path.is_file() {
            digests.insert(name.to_string(), sha256_file(&path)?);
        }
    }
    Ok(digests)
}

/// Free bytes available to unprivileged users on the filesystem holding `path`
pub fn available_space(path: &Path) -> CheckupResult<u64> {
    let stat = nix::sys::statvfs::statvfs(path)
        .map_err(|e| CheckupError::Platform(format!("statvfs {}: {}", path.display(), e)))?;
    #[allow(clippy::unnecessary_cast)]
    let available = stat.blocks_available() as u64 * stat.fragment_size() as u64;
    Ok(available)
}
