// ABOUTME: Translates the user-facing 1-based active index into a 0-based storage index.
// ABOUTME: Always computed over a freshly read entry list; active numbering is never persisted.

use thiserror::Error;
use worklog_core::Entry;

/// Errors from resolving a user-supplied active index.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    #[error("invalid index {0}: must be 1 or greater")]
    Invalid(i64),

    #[error("no entries")]
    NoEntries,

    #[error("index {index} is out of range (valid: 1-{max})")]
    OutOfRange { index: i64, max: usize },
}

/// An active entry located in the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEntry {
    pub entry: Entry,
    /// 1-based position among active entries.
    pub active_index: usize,
    /// 0-based position in the file, tombstones included.
    pub storage_index: usize,
}

/// Number of entries that are not tombstoned.
pub fn active_count(entries: &[Entry]) -> usize {
    entries.iter().filter(|e| !e.is_deleted()).count()
}

/// Every active entry with both of its indices, in file order.
pub fn active_entries(entries: &[Entry]) -> Vec<ResolvedEntry> {
    entries
        .iter()
        .enumerate()
        .filter(|(_, e)| !e.is_deleted())
        .enumerate()
        .map(|(active, (storage_index, entry))| ResolvedEntry {
            entry: entry.clone(),
            active_index: active + 1,
            storage_index,
        })
        .collect()
}

/// Find the entry a user means by `user_index`. Signed so that `0` and
/// negative input from a caller get a proper error rather than a parse
/// failure upstream.
pub fn resolve_active(user_index: i64, entries: &[Entry]) -> Result<ResolvedEntry, IndexError> {
    if user_index < 1 {
        return Err(IndexError::Invalid(user_index));
    }

    let mut seen = 0usize;
    for (storage_index, entry) in entries.iter().enumerate() {
        if entry.is_deleted() {
            continue;
        }
        seen += 1;
        if seen as i64 == user_index {
            return Ok(ResolvedEntry {
                entry: entry.clone(),
                active_index: seen,
                storage_index,
            });
        }
    }

    if seen == 0 {
        Err(IndexError::NoEntries)
    } else {
        Err(IndexError::OutOfRange {
            index: user_index,
            max: seen,
        })
    }
}
