// ABOUTME: Rotating backups of the entries file, kept beside it in three numbered slots.
// ABOUTME: Slot 1 is always the newest; creating a fourth backup evicts the oldest.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::jsonl::{StoreError, write_atomic};

/// Number of backup slots kept.
pub const MAX_BACKUPS: usize = 3;

/// Errors that can occur during backup operations.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("no backup in slot {0} (valid slots: 1-{max})", max = MAX_BACKUPS)]
    NoSuchBackup(usize),
}

impl BackupError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// One existing backup slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupInfo {
    pub slot: usize,
    pub path: PathBuf,
    pub modified: DateTime<Utc>,
    pub size_bytes: u64,
}

/// Manages `<file>.bak.1` .. `<file>.bak.3` next to a store file.
#[derive(Debug, Clone)]
pub struct BackupManager {
    store_path: PathBuf,
}

impl BackupManager {
    pub fn new(store_path: impl Into<PathBuf>) -> Self {
        Self {
            store_path: store_path.into(),
        }
    }

    /// Path of a backup slot, whether or not it exists.
    pub fn slot_path(&self, slot: usize) -> PathBuf {
        let name = self
            .store_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "entries.jsonl".to_string());
        self.store_path.with_file_name(format!("{}.bak.{}", name, slot))
    }

    /// Snapshot the live store into slot 1, shifting older backups down and
    /// dropping whatever was in the last slot. Returns `None` when there is
    /// no store file yet.
    pub fn create_backup(&self) -> Result<Option<BackupInfo>, BackupError> {
        let contents = match fs::read(&self.store_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.store_path.display(), "no store file, skipping backup");
                return Ok(None);
            }
            Err(e) => return Err(BackupError::io(&self.store_path, e)),
        };

        for slot in (1..MAX_BACKUPS).rev() {
            let from = self.slot_path(slot);
            if from.exists() {
                let to = self.slot_path(slot + 1);
                fs::rename(&from, &to).map_err(|e| BackupError::io(&from, e))?;
            }
        }

        let newest = self.slot_path(1);
        write_atomic(&newest, &contents)?;
        tracing::info!(path = %newest.display(), bytes = contents.len(), "created backup");

        self.info(1)
    }

    /// Existing backups, most recent first.
    pub fn list_backups(&self) -> Result<Vec<BackupInfo>, BackupError> {
        let mut backups = Vec::new();
        for slot in 1..=MAX_BACKUPS {
            if let Some(info) = self.info(slot)? {
                backups.push(info);
            }
        }
        Ok(backups)
    }

    /// Replace the live store with the contents of `slot`, atomically.
    ///
    /// The live file is backed up first, so the restored backup moves down
    /// one slot and the state it replaced becomes slot 1. The returned info
    /// describes the backup as it was when chosen.
    pub fn restore_backup(&self, slot: usize) -> Result<BackupInfo, BackupError> {
        if !(1..=MAX_BACKUPS).contains(&slot) {
            return Err(BackupError::NoSuchBackup(slot));
        }
        let info = self.info(slot)?.ok_or(BackupError::NoSuchBackup(slot))?;

        let contents = fs::read(&info.path).map_err(|e| BackupError::io(&info.path, e))?;
        self.create_backup()?;
        write_atomic(&self.store_path, &contents)?;
        tracing::info!(
            slot,
            path = %self.store_path.display(),
            "restored store from backup"
        );

        Ok(info)
    }

    fn info(&self, slot: usize) -> Result<Option<BackupInfo>, BackupError> {
        let path = self.slot_path(slot);
        let metadata = match fs::metadata(&path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BackupError::io(&path, e)),
        };
        let modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .map_err(|e| BackupError::io(&path, e))?;

        Ok(Some(BackupInfo {
            slot,
            path,
            modified,
            size_bytes: metadata.len(),
        }))
    }
}
