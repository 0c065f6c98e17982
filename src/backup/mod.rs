// Backup and rollback safety net for the cleanup phase

pub mod manager;
pub mod rollback;

pub use manager::{
    available_space, BackupManager, BackupMetadata, BackupMode, BackupSnapshot, CRITICAL_FILES,
    METADATA_FILE,
};
pub use rollback::{RollbackEntry, RollbackManager, RollbackStatus};
