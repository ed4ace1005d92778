// ABOUTME: Runs worklog operations as one-shot background tasks for an async UI event loop.
// ABOUTME: Each dispatched command runs to completion on the blocking pool and reports back over mpsc.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use worklog_core::{Entry, EntryEdit};

use crate::backup::BackupInfo;
use crate::manager::{Listing, Worklog, WorklogError};

/// An operation a UI can ask the store to perform.
#[derive(Debug, Clone)]
pub enum StoreCommand {
    Add {
        description: String,
        duration_minutes: u32,
        project: Option<String>,
        tags: Vec<String>,
    },
    List,
    Edit {
        active_index: i64,
        edit: EntryEdit,
    },
    Delete {
        active_index: i64,
    },
    UndoDelete,
    Purge,
    ListBackups,
    RestoreBackup {
        slot: usize,
    },
}

/// What a completed command produced.
#[derive(Debug)]
pub enum StoreOutput {
    Entry(Entry),
    Listing(Listing),
    Purged(usize),
    Backups(Vec<BackupInfo>),
    Restored(BackupInfo),
}

/// Message delivered back into the event loop when a command finishes.
#[derive(Debug)]
pub struct StoreMessage {
    pub command: StoreCommand,
    pub result: Result<StoreOutput, WorklogError>,
}

/// Run `command` against `worklog` on the blocking pool and send exactly one
/// `StoreMessage` to `tx` when it is done. There is no cancellation; if the
/// receiver has gone away the result is dropped.
pub fn dispatch(
    worklog: Arc<Worklog>,
    command: StoreCommand,
    tx: mpsc::UnboundedSender<StoreMessage>,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        let result = execute(&worklog, &command);
        if let Err(e) = &result {
            tracing::debug!(?command, error = %e, "store command failed");
        }
        // Ignore send error; the loop may have shut down
        let _ = tx.send(StoreMessage { command, result });
    })
}

/// Run a command synchronously.
pub fn execute(worklog: &Worklog, command: &StoreCommand) -> Result<StoreOutput, WorklogError> {
    match command {
        StoreCommand::Add {
            description,
            duration_minutes,
            project,
            tags,
        } => worklog
            .add(description, *duration_minutes, project.as_deref(), tags)
            .map(StoreOutput::Entry),
        StoreCommand::List => worklog.list().map(StoreOutput::Listing),
        StoreCommand::Edit { active_index, edit } => {
            worklog.edit(*active_index, edit).map(StoreOutput::Entry)
        }
        StoreCommand::Delete { active_index } => {
            worklog.delete(*active_index).map(StoreOutput::Entry)
        }
        StoreCommand::UndoDelete => worklog.undo_delete().map(StoreOutput::Entry),
        StoreCommand::Purge => worklog.purge().map(StoreOutput::Purged),
        StoreCommand::ListBackups => worklog.list_backups().map(StoreOutput::Backups),
        StoreCommand::RestoreBackup { slot } => {
            worklog.restore_backup(*slot).map(StoreOutput::Restored)
        }
    }
}
