/// Rollback registry
///
/// Cleanup runs that took a backup register themselves here so a later,
/// manual rollback can find the snapshot and the files the run touched.
/// The registry is a JSON file under the backup root.
use super::manager::{BackupManager, BackupSnapshot};
use crate::{CheckupError, CheckupResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const REGISTRY_FILE: &str = "rollback_registry.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackStatus {
    Registered,
    RolledBack,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackEntry {
    pub operation_id: String,
    pub backup_path: PathBuf,
    pub target_directory: PathBuf,
    pub affected_files: Vec<PathBuf>,
    pub registered_at: DateTime<Utc>,
    pub status: RollbackStatus,
    pub rolled_back_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct RollbackManager {
    backups: BackupManager,
    registry_path: PathBuf,
}

impl RollbackManager {
    pub fn new(backups: BackupManager) -> Self {
        let registry_path = backups.backup_root().join(REGISTRY_FILE);
        Self {
            backups,
            registry_path,
        }
    }

    pub fn registry_path(&self) -> &Path {
        &self.registry_path
    }

    /// Record a cleanup operation and its backup; returns the operation id
    pub fn register_operation(
        &self,
        snapshot: &BackupSnapshot,
        target_directory: &Path,
        affected_files: Vec<PathBuf>,
    ) -> CheckupResult<String> {
        let mut entries = self.list_operations()?;
        let operation_id = uuid::Uuid::new_v4().to_string();

        entries.push(RollbackEntry {
            operation_id: operation_id.clone(),
            backup_path: snapshot.path.clone(),
            target_directory: target_directory.to_path_buf(),
            affected_files,
            registered_at: Utc::now(),
            status: RollbackStatus::Registered,
            rolled_back_at: None,
        });
        self.save(&entries)?;

        tracing::info!(
            operation_id = %operation_id,
            backup = %snapshot.path.display(),
            "Cleanup operation registered for rollback"
        );
        Ok(operation_id)
    }

    pub fn list_operations(&self) -> CheckupResult<Vec<RollbackEntry>> {
        if !self.registry_path.is_file() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.registry_path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn find(&self, operation_id: &str) -> CheckupResult<Option<RollbackEntry>> {
        Ok(self
            .list_operations()?
            .into_iter()
            .find(|e| e.operation_id == operation_id))
    }

    /// Restore the target of a registered operation from its backup
    pub fn rollback_operation(&self, operation_id: &str) -> CheckupResult<usize> {
        let entry = self.find(operation_id)?.ok_or_else(|| {
            CheckupError::Rollback(format!("Unknown rollback operation {}", operation_id))
        })?;

        if entry.status == RollbackStatus::RolledBack {
            tracing::warn!(operation_id = operation_id, "Operation was already rolled back; restoring again");
        }

        let snapshot = BackupManager::load_snapshot(&entry.backup_path)
            .map_err(|e| CheckupError::Rollback(e.to_string()))?;
        let restored = self
            .backups
            .restore(&snapshot, &entry.target_directory, true)?;

        self.mark_rolled_back(operation_id)?;
        Ok(restored)
    }

    pub fn mark_rolled_back(&self, operation_id: &str) -> CheckupResult<()> {
        let mut entries = self.list_operations()?;
        let entry = entries
            .iter_mut()
            .find(|e| e.operation_id == operation_id)
            .ok_or_else(|| {
                CheckupError::Rollback(format!("Unknown rollback operation {}", operation_id))
            })?;

        entry.status = RollbackStatus::RolledBack;
        entry.rolled_back_at = Some(Utc::now());
        self.save(&entries)
    }

    fn save(&self, entries: &[RollbackEntry]) -> CheckupResult<()> {
        if let Some(parent) = self.registry_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        fs::write(&self.registry_path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::BackupMode;
    use tempfile::TempDir;

    fn setup() -> (TempDir, TempDir, RollbackManager) {
        let target = TempDir::new().unwrap();
        let backups = TempDir::new().unwrap();
        fs::write(target.path().join("app.py"), "import os\n").unwrap();
        let manager =
            BackupManager::new(backups.path(), BackupMode::Standard, &[], &[]).unwrap();
        (target, backups, RollbackManager::new(manager))
    }

    #[test]
    fn test_register_and_list() {
        let (target, _backups, rollback) = setup();
        let snapshot = rollback
            .backups
            .create_backup(target.path(), serde_json::Value::Null)
            .unwrap();

        let id = rollback
            .register_operation(&snapshot, target.path(), vec![PathBuf::from("app.py")])
            .unwrap();

        let entries = rollback.list_operations().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].operation_id, id);
        assert_eq!(entries[0].status, RollbackStatus::Registered);
        assert!(rollback.registry_path().is_file());
    }

    #[test]
    fn test_manual_rollback_restores_and_marks() {
        let (target, _backups, rollback) = setup();
        let snapshot = rollback
            .backups
            .create_backup(target.path(), serde_json::Value::Null)
            .unwrap();
        let id = rollback
            .register_operation(&snapshot, target.path(), Vec::new())
            .unwrap();

        fs::write(target.path().join("app.py"), "").unwrap();
        let restored = rollback.rollback_operation(&id).unwrap();

        assert_eq!(restored, 1);
        assert_eq!(
            fs::read_to_string(target.path().join("app.py")).unwrap(),
            "import os\n"
        );
        let entry = rollback.find(&id).unwrap().unwrap();
        assert_eq!(entry.status, RollbackStatus::RolledBack);
        assert!(entry.rolled_back_at.is_some());
    }

    #[test]
    fn test_unknown_operation() {
        let (_target, _backups, rollback) = setup();
        assert!(matches!(
            rollback.rollback_operation("missing"),
            Err(CheckupError::Rollback(_))
        ));
    }
}
