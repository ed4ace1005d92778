// ABOUTME: High-level facade over the entry store used by CLI and UI commands.
// ABOUTME: Resolves user indices, applies mutations, and takes backups before destructive rewrites.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Duration;
use thiserror::Error;
use worklog_core::{Clock, Entry, EntryEdit, EntryError};

use crate::backup::{BackupError, BackupInfo, BackupManager};
use crate::index::{IndexError, ResolvedEntry, active_entries, resolve_active};
use crate::jsonl::{EntryStore, StoreError};
use crate::reader::ParseWarning;
use crate::retention::{DeletedEntry, RetentionError, RetentionManager, most_recently_deleted};

/// Errors surfaced by worklog operations.
#[derive(Debug, Error)]
pub enum WorklogError {
    #[error(transparent)]
    Entry(#[from] EntryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Retention(#[from] RetentionError),

    #[error(transparent)]
    Backup(#[from] BackupError),
}

/// A snapshot of the store for display: active entries numbered for the
/// user, tombstones with their storage positions, and any corrupt lines.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    pub active: Vec<ResolvedEntry>,
    pub deleted: Vec<DeletedEntry>,
    pub warnings: Vec<ParseWarning>,
}

impl Listing {
    /// Sum of active entry durations.
    pub fn total_minutes(&self) -> u64 {
        self.active
            .iter()
            .map(|r| u64::from(r.entry.duration_minutes))
            .sum()
    }
}

/// The worklog: one entries file plus its backups, a clock, and a
/// retention window. Stateless between calls; every operation rereads the
/// file.
pub struct Worklog {
    store: EntryStore,
    retention: RetentionManager,
    backups: BackupManager,
    clock: Arc<dyn Clock>,
}

impl Worklog {
    pub fn open(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        let store = EntryStore::new(path);
        let retention = RetentionManager::new(store.clone(), Arc::clone(&clock));
        Self::assemble(store, retention, clock)
    }

    pub fn with_retention(path: impl Into<PathBuf>, clock: Arc<dyn Clock>, window: Duration) -> Self {
        let store = EntryStore::new(path);
        let retention = RetentionManager::with_window(store.clone(), Arc::clone(&clock), window);
        Self::assemble(store, retention, clock)
    }

    fn assemble(store: EntryStore, retention: RetentionManager, clock: Arc<dyn Clock>) -> Self {
        let backups = BackupManager::new(store.path());
        Self {
            store,
            retention,
            backups,
            clock,
        }
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    /// Create an entry stamped with the current time and append it.
    pub fn add(
        &self,
        description: &str,
        duration_minutes: u32,
        project: Option<&str>,
        tags: &[String],
    ) -> Result<Entry, WorklogError> {
        let entry = Entry::new(self.clock.now(), description, duration_minutes, project, tags)?;
        self.store.append(&entry)?;
        tracing::info!(raw_input = %entry.raw_input, "added entry");
        Ok(entry)
    }

    pub fn list(&self) -> Result<Listing, WorklogError> {
        let outcome = self.store.read_all_with_warnings()?;
        let deleted = outcome
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_deleted())
            .map(|(storage_index, entry)| DeletedEntry {
                entry: entry.clone(),
                storage_index,
            })
            .collect();

        Ok(Listing {
            active: active_entries(&outcome.entries),
            deleted,
            warnings: outcome.warnings,
        })
    }

    /// Look up an active entry by its 1-based index.
    pub fn get(&self, active_index: i64) -> Result<ResolvedEntry, WorklogError> {
        let entries = self.store.read_all()?;
        Ok(resolve_active(active_index, &entries)?)
    }

    /// Edit the active entry at `active_index`, keeping its creation time.
    pub fn edit(&self, active_index: i64, edit: &EntryEdit) -> Result<Entry, WorklogError> {
        let resolved = self.get(active_index)?;
        let updated = resolved.entry.apply_edit(edit)?;
        self.store.rewrite_at(resolved.storage_index, updated.clone())?;
        tracing::info!(active_index, raw_input = %updated.raw_input, "edited entry");
        Ok(updated)
    }

    /// Soft-delete the active entry at `active_index`.
    pub fn delete(&self, active_index: i64) -> Result<Entry, WorklogError> {
        let resolved = self.get(active_index)?;
        Ok(self.retention.soft_delete(resolved.storage_index)?)
    }

    /// Restore the most recently deleted entry, backing up first.
    pub fn undo_delete(&self) -> Result<Entry, WorklogError> {
        let entries = self.store.read_all()?;
        let target = most_recently_deleted(&entries)?;
        self.backups.create_backup()?;
        Ok(self.retention.restore(target.storage_index)?)
    }

    /// Permanently remove every tombstone, backing up first. Returns the
    /// number removed; with nothing to remove no backup is taken.
    pub fn purge(&self) -> Result<usize, WorklogError> {
        let entries = self.store.read_all()?;
        if !entries.iter().any(Entry::is_deleted) {
            return Ok(0);
        }
        self.backups.create_backup()?;
        Ok(self.retention.purge_all(&entries)?)
    }

    /// Remove tombstones older than the retention window.
    pub fn purge_expired(&self) -> Result<usize, WorklogError> {
        let entries = self.store.read_all()?;
        Ok(self.retention.purge_expired(&entries)?)
    }

    pub fn create_backup(&self) -> Result<Option<BackupInfo>, WorklogError> {
        Ok(self.backups.create_backup()?)
    }

    pub fn list_backups(&self) -> Result<Vec<BackupInfo>, WorklogError> {
        Ok(self.backups.list_backups()?)
    }

    /// Replace the entries file with a backup, backing up the live file first.
    pub fn restore_backup(&self, slot: usize) -> Result<BackupInfo, WorklogError> {
        Ok(self.backups.restore_backup(slot)?)
    }
}
