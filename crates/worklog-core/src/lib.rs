// ABOUTME: Core library for worklog, containing the entry data model and time sources.
// ABOUTME: This crate defines the shared types used by the store, the CLI, and any UI layer.

pub mod clock;
pub mod entry;

pub use clock::{Clock, FixedClock, SystemClock};
pub use entry::{
    Entry, EntryEdit, EntryError, MAX_DURATION_MINUTES, format_duration, parse_duration,
};
