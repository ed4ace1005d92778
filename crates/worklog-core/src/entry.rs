// ABOUTME: Defines the Entry struct, one logged activity with description, duration, project, and tags.
// ABOUTME: Handles validation, raw input reconstruction, edits, and duration parsing/formatting.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound for a single entry's duration: one full day.
pub const MAX_DURATION_MINUTES: u32 = 24 * 60;

/// Errors raised when building or editing an entry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntryError {
    #[error("description must not be empty")]
    EmptyDescription,

    #[error("duration must be between 1 and {max} minutes, got {0}", max = MAX_DURATION_MINUTES)]
    DurationOutOfRange(u32),

    #[error("invalid duration {0:?}: expected forms like 45m, 2h, 1h30m, or 1.5h")]
    InvalidDuration(String),
}

/// One logged activity. Entries with `deleted_at` set are tombstones: still
/// physically stored but hidden from active views until purged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub timestamp: DateTime<FixedOffset>,
    pub description: String,
    pub duration_minutes: u32,
    pub raw_input: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub project: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<FixedOffset>>,
}

/// A partial update to an entry. `None` leaves a field unchanged; an empty
/// project string clears the project and an empty tag list clears the tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryEdit {
    pub description: Option<String>,
    pub duration_minutes: Option<u32>,
    pub project: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl EntryEdit {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.duration_minutes.is_none()
            && self.project.is_none()
            && self.tags.is_none()
    }
}

impl Entry {
    /// Build a validated, active entry and render its raw input.
    pub fn new<I, S>(
        timestamp: DateTime<FixedOffset>,
        description: &str,
        duration_minutes: u32,
        project: Option<&str>,
        tags: I,
    ) -> Result<Self, EntryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let description = validate_description(description)?;
        validate_duration(duration_minutes)?;
        let project = project.map(normalize_project).unwrap_or_default();
        let tags = normalize_tags(tags);
        let raw_input = render_raw_input(&description, duration_minutes, &project, &tags);

        Ok(Self {
            timestamp,
            description,
            duration_minutes,
            raw_input,
            project,
            tags,
            deleted_at: None,
        })
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Check the constraints `new` enforces, for entries that were not built
    /// through it (e.g. read back from disk).
    pub fn validate(&self) -> Result<(), EntryError> {
        validate_description(&self.description)?;
        validate_duration(self.duration_minutes)
    }

    /// Apply an edit, regenerating `raw_input`. The creation timestamp and
    /// tombstone state are left untouched.
    pub fn apply_edit(&self, edit: &EntryEdit) -> Result<Self, EntryError> {
        let description = match &edit.description {
            Some(d) => validate_description(d)?,
            None => self.description.clone(),
        };
        let duration_minutes = match edit.duration_minutes {
            Some(d) => {
                validate_duration(d)?;
                d
            }
            None => self.duration_minutes,
        };
        let project = match &edit.project {
            Some(p) => normalize_project(p),
            None => self.project.clone(),
        };
        let tags = match &edit.tags {
            Some(t) => normalize_tags(t),
            None => self.tags.clone(),
        };
        let raw_input = render_raw_input(&description, duration_minutes, &project, &tags);

        Ok(Self {
            timestamp: self.timestamp,
            description,
            duration_minutes,
            raw_input,
            project,
            tags,
            deleted_at: self.deleted_at,
        })
    }
}

fn validate_description(description: &str) -> Result<String, EntryError> {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        return Err(EntryError::EmptyDescription);
    }
    Ok(trimmed.to_string())
}

fn validate_duration(minutes: u32) -> Result<(), EntryError> {
    if minutes == 0 || minutes > MAX_DURATION_MINUTES {
        return Err(EntryError::DurationOutOfRange(minutes));
    }
    Ok(())
}

fn normalize_project(project: &str) -> String {
    project.trim().trim_start_matches('@').trim().to_string()
}

fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().trim_start_matches('#').trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Render `<description> for <duration> [@project] [#tag ...]`.
fn render_raw_input(description: &str, minutes: u32, project: &str, tags: &[String]) -> String {
    let mut raw = format!("{} for {}", description, format_duration(minutes));
    if !project.is_empty() {
        raw.push_str(" @");
        raw.push_str(project);
    }
    for tag in tags {
        raw.push_str(" #");
        raw.push_str(tag);
    }
    raw
}

/// Format minutes as `45m`, `2h`, or `1h30m`.
pub fn format_duration(minutes: u32) -> String {
    let (hours, rest) = (minutes / 60, minutes % 60);
    match (hours, rest) {
        (0, m) => format!("{}m", m),
        (h, 0) => format!("{}h", h),
        (h, m) => format!("{}h{}m", h, m),
    }
}

/// Parse a human duration into minutes. Accepts `90`, `90m`, `2h`, `1h30m`,
/// and `1.5h`, case-insensitively.
pub fn parse_duration(text: &str) -> Result<u32, EntryError> {
    let normalized = text.trim().to_ascii_lowercase();
    let minutes =
        parse_minutes(&normalized).ok_or_else(|| EntryError::InvalidDuration(text.to_string()))?;
    validate_duration(minutes)?;
    Ok(minutes)
}

fn parse_minutes(s: &str) -> Option<u32> {
    if let Ok(m) = s.parse::<u32>() {
        return Some(m);
    }

    if let Some((hours, rest)) = s.split_once('h') {
        let hours: f64 = hours.parse().ok()?;
        if !hours.is_finite() || hours < 0.0 {
            return None;
        }
        let extra = if rest.is_empty() {
            0
        } else {
            // "1.5h30m" is ambiguous enough to reject
            if hours.fract() != 0.0 {
                return None;
            }
            rest.strip_suffix('m')?.parse::<u32>().ok()?
        };
        let total = (hours * 60.0).round() + f64::from(extra);
        if total > f64::from(u32::MAX) {
            return None;
        }
        return Some(total as u32);
    }

    s.strip_suffix('m')?.parse::<u32>().ok()
}
