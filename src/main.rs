// ABOUTME: Entry point for the worklog binary.
// ABOUTME: Parses CLI arguments, initializes tracing, and drives the entry store for one command.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use worklog_core::{EntryEdit, SystemClock, format_duration, parse_duration};
use worklog_store::{IndexError, Listing, RetentionError, Worklog, WorklogError};

use crate::config::WorklogConfig;

#[derive(Debug, Parser)]
#[command(name = "worklog", version, about = "Log what you did and for how long")]
struct Cli {
    /// Entries file to use instead of the configured one
    #[arg(long, global = true, value_name = "PATH")]
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Record an activity
    Add {
        /// What you did
        #[arg(required = true, num_args = 1..)]
        description: Vec<String>,
        /// How long it took: 45m, 2h, 1h30m, 1.5h
        #[arg(short, long)]
        duration: String,
        #[arg(short, long)]
        project: Option<String>,
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },
    /// Show entries with their index
    List {
        /// Also show deleted entries awaiting purge
        #[arg(long)]
        all: bool,
    },
    /// Change fields of an entry
    Edit {
        #[arg(allow_hyphen_values = true)]
        index: i64,
        #[arg(long)]
        description: Option<String>,
        #[arg(short, long)]
        duration: Option<String>,
        /// New project; pass an empty string to clear it
        #[arg(short, long)]
        project: Option<String>,
        /// Replace all tags with these
        #[arg(short, long = "tag")]
        tags: Vec<String>,
        /// Remove all tags
        #[arg(long, conflicts_with = "tags")]
        clear_tags: bool,
    },
    /// Delete an entry (recoverable with `undo`)
    Delete {
        #[arg(allow_hyphen_values = true)]
        index: i64,
    },
    /// Restore the most recently deleted entry
    Undo,
    /// Permanently remove all deleted entries
    Purge,
    /// List available backups
    Backups,
    /// Replace the entries file with a backup
    RestoreBackup { slot: usize },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("worklog=warn")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = WorklogConfig::from_env()?;
    let path = cli.file.unwrap_or(config.store_path);
    tracing::debug!(path = %path.display(), "using entries file");
    let log = Worklog::with_retention(path, Arc::new(SystemClock), config.retention);

    match cli.command {
        Command::Add {
            description,
            duration,
            project,
            tags,
        } => {
            let minutes = parse_duration(&duration)?;
            let entry = log.add(&description.join(" "), minutes, project.as_deref(), &tags)?;
            println!("Logged: {}", entry.raw_input);
        }

        Command::List { all } => {
            let listing = log.list()?;
            print_warnings(&listing);
            print_listing(&listing, all);
        }

        Command::Edit {
            index,
            description,
            duration,
            project,
            tags,
            clear_tags,
        } => {
            let edit = EntryEdit {
                description,
                duration_minutes: duration.as_deref().map(parse_duration).transpose()?,
                project,
                tags: if clear_tags {
                    Some(Vec::new())
                } else if tags.is_empty() {
                    None
                } else {
                    Some(tags)
                },
            };
            if edit.is_empty() {
                return Err(anyhow!("nothing to change; pass at least one field to edit"));
            }
            let entry = log
                .edit(index, &edit)
                .map_err(|e| no_entries_as(e, "No entries to edit"))?;
            println!("Updated #{}: {}", index, entry.raw_input);
        }

        Command::Delete { index } => {
            let entry = log
                .delete(index)
                .map_err(|e| no_entries_as(e, "No entries to delete"))?;
            println!("Deleted: {}", entry.raw_input);
            println!("Run `worklog undo` to restore it.");
        }

        Command::Undo => {
            let entry = log.undo_delete().map_err(|e| match e {
                WorklogError::Retention(RetentionError::NoDeletedEntries) => {
                    anyhow!("Nothing to undo: no deleted entries")
                }
                other => other.into(),
            })?;
            println!("Restored: {}", entry.raw_input);
        }

        Command::Purge => {
            let removed = log.purge()?;
            match removed {
                0 => println!("No deleted entries to purge."),
                n => println!("Purged {} deleted {}.", n, plural(n, "entry", "entries")),
            }
        }

        Command::Backups => {
            let backups = log.list_backups()?;
            if backups.is_empty() {
                println!("No backups yet.");
            }
            for backup in backups {
                println!(
                    "{}. {} ({} bytes)",
                    backup.slot,
                    backup
                        .modified
                        .with_timezone(&chrono::Local)
                        .format("%Y-%m-%d %H:%M:%S"),
                    backup.size_bytes
                );
            }
        }

        Command::RestoreBackup { slot } => {
            let info = log
                .restore_backup(slot)
                .with_context(|| format!("restoring {}", log.path().display()))?;
            println!("Restored entries from backup {}.", info.slot);
        }
    }

    Ok(())
}

fn no_entries_as(err: WorklogError, message: &'static str) -> anyhow::Error {
    match err {
        WorklogError::Index(IndexError::NoEntries) => anyhow!(message),
        other => other.into(),
    }
}

fn print_warnings(listing: &Listing) {
    if listing.warnings.is_empty() {
        return;
    }
    eprintln!(
        "Warning: skipped {} corrupt {}:",
        listing.warnings.len(),
        plural(listing.warnings.len(), "line", "lines")
    );
    for warning in &listing.warnings {
        eprintln!("{}", warning);
    }
}

fn print_listing(listing: &Listing, include_deleted: bool) {
    if listing.active.is_empty() {
        println!("No entries.");
    }
    for item in &listing.active {
        println!(
            "{:>3}. {}  {}",
            item.active_index,
            item.entry.timestamp.format("%Y-%m-%d %H:%M"),
            item.entry.raw_input
        );
    }
    if !listing.active.is_empty() {
        println!(
            "Total: {} across {} {}",
            format_duration_total(listing.total_minutes()),
            listing.active.len(),
            plural(listing.active.len(), "entry", "entries")
        );
    }

    if include_deleted && !listing.deleted.is_empty() {
        println!();
        println!("Deleted (purged after retention window):");
        for item in &listing.deleted {
            let deleted_at = item
                .entry
                .deleted_at
                .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            println!(
                "  -  {}  {} (deleted {})",
                item.entry.timestamp.format("%Y-%m-%d %H:%M"),
                item.entry.raw_input,
                deleted_at
            );
        }
    }
}

fn format_duration_total(minutes: u64) -> String {
    match u32::try_from(minutes) {
        Ok(m) => format_duration(m),
        Err(_) => format!("{}h", minutes / 60),
    }
}

fn plural<'a>(n: usize, one: &'a str, many: &'a str) -> &'a str {
    if n == 1 { one } else { many }
}
