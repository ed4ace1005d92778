// ABOUTME: Persistence layer for worklog, keeping every entry in one JSON Lines file.
// ABOUTME: Provides the line codec, tolerant reader, atomic store, index resolution, retention, and backups.

pub mod backup;
pub mod codec;
pub mod dispatch;
pub mod index;
pub mod jsonl;
pub mod manager;
pub mod reader;
pub mod retention;

pub use backup::{BackupError, BackupInfo, BackupManager, MAX_BACKUPS};
pub use codec::{DecodeError, decode_line, encode_line};
pub use dispatch::{StoreCommand, StoreMessage, StoreOutput, dispatch, execute};
pub use index::{IndexError, ResolvedEntry, active_count, active_entries, resolve_active};
pub use jsonl::{EntryStore, StoreError};
pub use manager::{Listing, Worklog, WorklogError};
pub use reader::{ParseWarning, ReadOutcome};
pub use retention::{
    DEFAULT_RETENTION_DAYS, DeletedEntry, RetentionError, RetentionManager, most_recently_deleted,
};
