// ABOUTME: Soft-delete, restore, and purge of tombstoned entries against the JSONL store.
// ABOUTME: Tombstones older than the retention window are purged opportunistically after deletes.

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset};
use thiserror::Error;
use worklog_core::{Clock, Entry};

use crate::jsonl::{EntryStore, StoreError};

/// How long a tombstone is kept before it becomes eligible for purge.
pub const DEFAULT_RETENTION_DAYS: i64 = 7;

/// Errors that can occur during retention operations.
#[derive(Debug, Error)]
pub enum RetentionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("no deleted entries")]
    NoDeletedEntries,

    #[error("entry at storage index {0} is already deleted")]
    AlreadyDeleted(usize),

    #[error("entry at storage index {0} is not deleted")]
    NotDeleted(usize),
}

/// A tombstoned entry and where it sits in the file.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletedEntry {
    pub entry: Entry,
    pub storage_index: usize,
}

/// Applies tombstone lifecycle changes to an `EntryStore`, stamping them
/// with an injected clock.
pub struct RetentionManager {
    store: EntryStore,
    clock: Arc<dyn Clock>,
    window: Duration,
}

impl RetentionManager {
    pub fn new(store: EntryStore, clock: Arc<dyn Clock>) -> Self {
        Self::with_window(store, clock, Duration::days(DEFAULT_RETENTION_DAYS))
    }

    pub fn with_window(store: EntryStore, clock: Arc<dyn Clock>, window: Duration) -> Self {
        Self {
            store,
            clock,
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Tombstone the entry at `storage_index` and return it. Afterwards,
    /// expired tombstones are purged; a failure there is logged and does not
    /// affect the result.
    pub fn soft_delete(&self, storage_index: usize) -> Result<Entry, RetentionError> {
        let entries = self.store.read_all()?;
        let target = entry_at(&entries, storage_index)?;
        if target.is_deleted() {
            return Err(RetentionError::AlreadyDeleted(storage_index));
        }

        let mut tombstone = target.clone();
        tombstone.deleted_at = Some(self.clock.now());
        self.store.rewrite_at(storage_index, tombstone.clone())?;
        tracing::info!(storage_index, description = %tombstone.description, "soft-deleted entry");

        let cleanup = self
            .store
            .read_all()
            .map_err(RetentionError::from)
            .and_then(|entries| self.purge_expired(&entries));
        if let Err(e) = cleanup {
            tracing::warn!("cleanup of expired tombstones failed: {}", e);
        }

        Ok(tombstone)
    }

    /// Clear the tombstone on the entry at `storage_index` and return it.
    pub fn restore(&self, storage_index: usize) -> Result<Entry, RetentionError> {
        let entries = self.store.read_all()?;
        let target = entry_at(&entries, storage_index)?;
        if !target.is_deleted() {
            return Err(RetentionError::NotDeleted(storage_index));
        }

        let mut restored = target.clone();
        restored.deleted_at = None;
        self.store.rewrite_at(storage_index, restored.clone())?;
        tracing::info!(storage_index, description = %restored.description, "restored entry");

        Ok(restored)
    }

    /// Drop tombstones deleted longer ago than the retention window. Commits
    /// only when something was removed. Returns how many were removed.
    ///
    /// A window reaching past the earliest representable date expires nothing.
    pub fn purge_expired(&self, entries: &[Entry]) -> Result<usize, RetentionError> {
        let Some(cutoff) = self.clock.now().checked_sub_signed(self.window) else {
            tracing::debug!(window = %self.window, "retention window out of range, nothing expires");
            return Ok(0);
        };
        self.purge_where(entries, |deleted_at| deleted_at < cutoff)
    }

    /// Drop every tombstone regardless of age.
    pub fn purge_all(&self, entries: &[Entry]) -> Result<usize, RetentionError> {
        self.purge_where(entries, |_| true)
    }

    fn purge_where<F>(&self, entries: &[Entry], expired: F) -> Result<usize, RetentionError>
    where
        F: Fn(DateTime<FixedOffset>) -> bool,
    {
        let kept: Vec<Entry> = entries
            .iter()
            .filter(|e| !e.deleted_at.is_some_and(|at| expired(at)))
            .cloned()
            .collect();

        let removed = entries.len() - kept.len();
        if removed > 0 {
            self.store.commit(&kept)?;
            tracing::info!(removed, remaining = kept.len(), "purged tombstoned entries");
        }
        Ok(removed)
    }
}

/// The tombstone with the latest `deleted_at`; on a tie the one later in the
/// file wins.
pub fn most_recently_deleted(entries: &[Entry]) -> Result<DeletedEntry, RetentionError> {
    entries
        .iter()
        .enumerate()
        .filter_map(|(i, e)| e.deleted_at.map(|at| (at, i, e)))
        .max_by_key(|(at, i, _)| (*at, *i))
        .map(|(_, storage_index, entry)| DeletedEntry {
            entry: entry.clone(),
            storage_index,
        })
        .ok_or(RetentionError::NoDeletedEntries)
}

fn entry_at(entries: &[Entry], storage_index: usize) -> Result<&Entry, StoreError> {
    entries.get(storage_index).ok_or(StoreError::IndexOutOfBounds {
        index: storage_index,
        len: entries.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::active_count;
    use tempfile::TempDir;
    use worklog_core::FixedClock;

    fn start() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-09-01T08:00:00+02:00").unwrap()
    }

    fn make_entry(description: &str) -> Entry {
        Entry::new(start(), description, 20, None, Vec::<String>::new()).unwrap()
    }

    fn setup(names: &[&str]) -> (TempDir, EntryStore, Arc<FixedClock>, RetentionManager) {
        let dir = TempDir::new().unwrap();
        let store = EntryStore::new(dir.path().join("entries.jsonl"));
        for name in names {
            store.append(&make_entry(name)).unwrap();
        }
        let clock = Arc::new(FixedClock::new(start()));
        let manager = RetentionManager::new(store.clone(), clock.clone());
        (dir, store, clock, manager)
    }

    #[test]
    fn soft_delete_sets_deleted_at_from_clock() {
        let (_dir, store, clock, manager) = setup(&["a", "b"]);
        clock.advance(Duration::minutes(5));

        let deleted = manager.soft_delete(0).unwrap();

        assert_eq!(deleted.description, "a");
        assert_eq!(deleted.deleted_at, Some(start() + Duration::minutes(5)));
        let entries = store.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_deleted());
        assert_eq!(active_count(&entries), 1);
    }

    #[test]
    fn soft_delete_twice_is_rejected() {
        let (_dir, _store, _clock, manager) = setup(&["a"]);
        manager.soft_delete(0).unwrap();
        assert!(matches!(
            manager.soft_delete(0),
            Err(RetentionError::AlreadyDeleted(0))
        ));
    }

    #[test]
    fn soft_delete_out_of_bounds() {
        let (_dir, _store, _clock, manager) = setup(&["a"]);
        assert!(matches!(
            manager.soft_delete(3),
            Err(RetentionError::Store(StoreError::IndexOutOfBounds { index: 3, len: 1 }))
        ));
    }

    #[test]
    fn soft_delete_then_restore_is_a_no_op() {
        let (_dir, store, clock, manager) = setup(&["a", "b", "c"]);
        let before = store.read_all().unwrap();

        manager.soft_delete(1).unwrap();
        clock.advance(Duration::hours(1));
        let restored = manager.restore(1).unwrap();

        assert!(restored.deleted_at.is_none());
        assert_eq!(store.read_all().unwrap(), before);
    }

    #[test]
    fn restore_requires_tombstone() {
        let (_dir, _store, _clock, manager) = setup(&["a"]);
        assert!(matches!(manager.restore(0), Err(RetentionError::NotDeleted(0))));
    }

    #[test]
    fn soft_delete_purges_expired_tombstones() {
        let (_dir, store, clock, manager) = setup(&["old", "keep", "new"]);
        manager.soft_delete(0).unwrap();

        clock.advance(Duration::days(8));
        // "new" is at storage index 2 until the purge runs
        manager.soft_delete(2).unwrap();

        let entries = store.read_all().unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.description.as_str()).collect();
        assert_eq!(names, vec!["keep", "new"]);
        assert!(entries[1].is_deleted());
    }

    #[test]
    fn purge_expired_respects_window_boundary() {
        let (_dir, store, clock, manager) = setup(&["a", "b"]);
        manager.soft_delete(0).unwrap();

        clock.advance(Duration::days(7));
        let entries = store.read_all().unwrap();
        assert_eq!(manager.purge_expired(&entries).unwrap(), 0);

        clock.advance(Duration::seconds(1));
        let entries = store.read_all().unwrap();
        assert_eq!(manager.purge_expired(&entries).unwrap(), 1);
        assert_eq!(store.read_all().unwrap().len(), 1);
    }

    #[test]
    fn purge_expired_without_changes_does_not_touch_file() {
        let (_dir, store, _clock, manager) = setup(&["a"]);
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(store.path())
            .unwrap();
        std::io::Write::write_all(&mut file, b"corrupt line\n").unwrap();
        drop(file);

        let entries = store.read_all().unwrap();
        assert_eq!(manager.purge_expired(&entries).unwrap(), 0);
        // no commit happened, so the corrupt line is still there
        assert_eq!(store.read_all_with_warnings().unwrap().warnings.len(), 1);
    }

    #[test]
    fn purge_all_removes_every_tombstone() {
        let (_dir, store, _clock, manager) = setup(&["a", "b", "c", "d"]);
        manager.soft_delete(1).unwrap();
        manager.soft_delete(3).unwrap();
        let active_before = store.read_active().unwrap();

        let entries = store.read_all().unwrap();
        assert_eq!(manager.purge_all(&entries).unwrap(), 2);

        let after = store.read_all().unwrap();
        assert!(after.iter().all(|e| !e.is_deleted()));
        assert_eq!(store.read_active().unwrap(), active_before);
    }

    #[test]
    fn most_recently_deleted_picks_latest_then_later_position() {
        let (_dir, store, clock, manager) = setup(&["a", "b", "c"]);
        manager.soft_delete(2).unwrap();
        clock.advance(Duration::minutes(1));
        manager.soft_delete(0).unwrap();

        let found = most_recently_deleted(&store.read_all().unwrap()).unwrap();
        assert_eq!(found.storage_index, 0);
        assert_eq!(found.entry.description, "a");

        // same instant: later file position wins
        manager.soft_delete(1).unwrap();
        let found = most_recently_deleted(&store.read_all().unwrap()).unwrap();
        assert_eq!(found.storage_index, 1);
    }

    #[test]
    fn most_recently_deleted_with_none() {
        let (_dir, store, _clock, _manager) = setup(&["a"]);
        assert!(matches!(
            most_recently_deleted(&store.read_all().unwrap()),
            Err(RetentionError::NoDeletedEntries)
        ));
    }

    #[test]
    fn custom_window() {
        let (_dir, store, clock, _manager) = setup(&["a"]);
        let manager =
            RetentionManager::with_window(store.clone(), clock.clone(), Duration::hours(1));
        assert_eq!(manager.window(), Duration::hours(1));

        manager.soft_delete(0).unwrap();
        clock.advance(Duration::hours(2));
        assert_eq!(manager.purge_expired(&store.read_all().unwrap()).unwrap(), 1);
    }

    #[test]
    fn window_beyond_calendar_expires_nothing() {
        let (_dir, store, clock, _manager) = setup(&["a", "b"]);
        let manager = RetentionManager::with_window(
            store.clone(),
            clock.clone(),
            Duration::days(1_000_000_000),
        );

        let deleted = manager.soft_delete(0).unwrap();
        assert!(deleted.is_deleted());

        clock.advance(Duration::days(365));
        let entries = store.read_all().unwrap();
        assert_eq!(manager.purge_expired(&entries).unwrap(), 0);
        assert!(store.read_all().unwrap()[0].is_deleted());
    }
}
