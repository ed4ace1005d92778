// ABOUTME: JSONL entry store: one Entry per line in a single file that is the source of truth.
// ABOUTME: Provides durable append, full reads with corruption warnings, and atomic full rewrites.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use worklog_core::Entry;

use crate::codec::encode_line;
use crate::reader::{ParseWarning, ReadOutcome, read_path};

/// Errors that can occur during entry store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage index {index} is out of bounds (store holds {len} entries)")]
    IndexOutOfBounds { index: usize, len: usize },
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Handle to the entries file. Holds no open file and no cached state, so
/// every read reflects whatever is on disk right now.
#[derive(Debug, Clone)]
pub struct EntryStore {
    path: PathBuf,
}

impl EntryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the path to the underlying JSONL file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a single entry as one JSON line and fsync. Creates the file
    /// (mode 0644) and its parent directories when absent.
    pub fn append(&self, entry: &Entry) -> Result<(), StoreError> {
        let mut line = encode_line(entry)?;
        line.push('\n');

        self.ensure_parent()?;
        let mut file = append_options()
            .open(&self.path)
            .map_err(|e| StoreError::io(&self.path, e))?;
        file.write_all(line.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| StoreError::io(&self.path, e))?;

        tracing::debug!(path = %self.path.display(), "appended entry");
        Ok(())
    }

    /// All entries in file order, tombstones included. Corrupt lines are
    /// dropped and logged.
    pub fn read_all(&self) -> Result<Vec<Entry>, StoreError> {
        Ok(self.read_all_with_warnings()?.entries)
    }

    /// All entries in file order plus a warning per line that failed to decode.
    pub fn read_all_with_warnings(&self) -> Result<ReadOutcome, StoreError> {
        let outcome = read_path(&self.path).map_err(|e| StoreError::io(&self.path, e))?;
        for warning in &outcome.warnings {
            log_warning(&self.path, warning);
        }
        Ok(outcome)
    }

    /// Entries that are not tombstoned, in file order.
    pub fn read_active(&self) -> Result<Vec<Entry>, StoreError> {
        let mut entries = self.read_all()?;
        entries.retain(|e| !e.is_deleted());
        Ok(entries)
    }

    /// Replace the entry at `storage_index` (0-based, tombstones counted)
    /// and commit the whole file.
    pub fn rewrite_at(&self, storage_index: usize, entry: Entry) -> Result<(), StoreError> {
        let mut entries = self.read_all()?;
        let len = entries.len();
        let slot = entries
            .get_mut(storage_index)
            .ok_or(StoreError::IndexOutOfBounds {
                index: storage_index,
                len,
            })?;
        *slot = entry;
        self.commit(&entries)
    }

    /// Replace the file with exactly `entries`.
    ///
    /// Writes to a temp file in the same directory, fsyncs it, and renames it
    /// over the store path, so readers see either the old file or the new
    /// one. If anything fails before the rename the temp file is removed and
    /// the original is untouched.
    pub fn commit(&self, entries: &[Entry]) -> Result<(), StoreError> {
        let mut body = String::new();
        for entry in entries {
            body.push_str(&encode_line(entry)?);
            body.push('\n');
        }

        self.ensure_parent()?;
        write_atomic(&self.path, body.as_bytes())?;

        tracing::info!(
            path = %self.path.display(),
            count = entries.len(),
            "committed entry file"
        );
        Ok(())
    }

    fn ensure_parent(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        Ok(())
    }
}

fn log_warning(path: &Path, warning: &ParseWarning) {
    tracing::warn!(
        path = %path.display(),
        line = warning.line_number,
        content = %warning.truncated_content,
        error = %warning.error,
        "skipping corrupt entry line"
    );
}

fn append_options() -> OpenOptions {
    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o644);
    }
    options
}

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Path of the temp file used while replacing `path`. `seq` keeps concurrent
/// writers in one process off each other's temp files.
pub(crate) fn temp_path_for(path: &Path, seq: u64) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "entries.jsonl".to_string());
    path.with_file_name(format!(".{}.tmp.{}.{}", name, std::process::id(), seq))
}

/// Write `contents` to `path` via temp file, fsync, chmod 0644, rename, and a
/// best-effort fsync of the parent directory.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    write_atomic_via(path, &temp_path_for(path, seq), contents)
}

fn write_atomic_via(path: &Path, tmp_path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let result = write_temp(tmp_path, contents)
        .map_err(|e| StoreError::io(tmp_path, e))
        .and_then(|()| fs::rename(tmp_path, path).map_err(|e| StoreError::io(path, e)));

    if result.is_err() {
        let _ = fs::remove_file(tmp_path);
        return result;
    }

    // Without this, a crash after rename could leave the directory entry
    // pointing at the old file. The rename already happened, so failure here
    // is ignored.
    if let Some(parent) = path.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }

    Ok(())
}

fn write_temp(tmp_path: &Path, contents: &[u8]) -> io::Result<()> {
    let file = File::create(tmp_path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o644))?;
    }
    let mut writer = BufWriter::new(file);
    writer.write_all(contents)?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()
}
