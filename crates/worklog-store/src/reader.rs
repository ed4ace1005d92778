// ABOUTME: Streams a JSONL entry file line by line, decoding each line independently.
// ABOUTME: Lines that fail to decode become ParseWarnings instead of aborting the read.

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use worklog_core::Entry;

use crate::codec::decode_bytes;

/// Maximum number of characters of a bad line kept for display.
pub const WARNING_CONTENT_CHARS: usize = 50;

/// A line that was skipped because it did not decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    /// 1-based position among non-blank lines.
    pub line_number: usize,
    /// The offending line, cut to 50 characters plus "..." when longer.
    pub truncated_content: String,
    pub error: String,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  Line {}: {} (error: {})",
            self.line_number, self.truncated_content, self.error
        )
    }
}

/// Everything a read produced: decoded entries in file order plus warnings
/// for the lines that were dropped.
#[derive(Debug, Default, Clone)]
pub struct ReadOutcome {
    pub entries: Vec<Entry>,
    pub warnings: Vec<ParseWarning>,
}

/// Decode every non-blank line from `reader`. Only I/O failures abort; a
/// malformed line is recorded and the scan moves on.
pub fn read_entries<R: BufRead>(mut reader: R) -> io::Result<ReadOutcome> {
    let mut outcome = ReadOutcome::default();
    let mut line_number = 0;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        // Same notion of whitespace as the decoder, so a line of only
        // Unicode spaces is blank rather than corrupt
        let line = match std::str::from_utf8(&buf) {
            Ok(text) => text.trim().as_bytes(),
            Err(_) => buf.trim_ascii(),
        };
        if line.is_empty() {
            continue;
        }
        line_number += 1;

        match decode_bytes(line) {
            Ok(entry) => outcome.entries.push(entry),
            Err(err) => outcome.warnings.push(ParseWarning {
                line_number,
                truncated_content: truncate_content(&String::from_utf8_lossy(line)),
                error: err.to_string(),
            }),
        }
    }

    Ok(outcome)
}

/// Read the file at `path`. A missing file reads as empty.
pub fn read_path(path: &Path) -> io::Result<ReadOutcome> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(ReadOutcome::default()),
        Err(err) => return Err(err),
    };
    read_entries(BufReader::new(file))
}

fn truncate_content(line: &str) -> String {
    if line.chars().count() <= WARNING_CONTENT_CHARS {
        return line.to_string();
    }
    let mut cut: String = line.chars().take(WARNING_CONTENT_CHARS).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_line;
    use chrono::DateTime;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn make_entry(description: &str) -> Entry {
        let ts = DateTime::parse_from_rfc3339("2024-06-01T09:00:00+00:00").unwrap();
        Entry::new(ts, description, 30, None, Vec::<String>::new()).unwrap()
    }

    fn line_for(description: &str) -> String {
        encode_line(&make_entry(description)).unwrap()
    }

    #[test]
    fn missing_file_reads_empty() {
        let dir = TempDir::new().unwrap();
        let outcome = read_path(&dir.path().join("nope.jsonl")).unwrap();
        assert!(outcome.entries.is_empty());
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn blank_lines_are_skipped_silently() {
        let text = format!("\n{}\n   \n\t\n{}\n\n", line_for("a"), line_for("b"));
        let outcome = read_entries(Cursor::new(text)).unwrap();

        assert_eq!(outcome.entries.len(), 2);
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn unicode_whitespace_lines_are_blank() {
        let text = format!(
            "{}\n\u{3000}\n\u{a0} \u{2003}\nbad\n{}\n",
            line_for("a"),
            line_for("b")
        );
        let outcome = read_entries(Cursor::new(text)).unwrap();

        assert_eq!(outcome.entries.len(), 2);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].line_number, 2);
    }

    #[test]
    fn corruption_is_isolated_per_line() {
        let text = format!(
            "{}\nthis is garbage\n\n{}\n{{\"timestamp\":\"broken\n{}\n",
            line_for("first"),
            line_for("second"),
            line_for("third"),
        );
        let outcome = read_entries(Cursor::new(text)).unwrap();

        let descriptions: Vec<_> = outcome.entries.iter().map(|e| e.description.as_str()).collect();
        assert_eq!(descriptions, vec!["first", "second", "third"]);

        assert_eq!(outcome.warnings.len(), 2);
        // blank line does not count toward numbering
        assert_eq!(outcome.warnings[0].line_number, 2);
        assert_eq!(outcome.warnings[0].truncated_content, "this is garbage");
        assert_eq!(outcome.warnings[1].line_number, 4);
    }

    #[test]
    fn valid_line_with_whitespace_and_crlf() {
        let text = format!("  {}  \r\n", line_for("spaced"));
        let outcome = read_entries(Cursor::new(text)).unwrap();
        assert_eq!(outcome.entries.len(), 1);
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn invalid_utf8_line_is_a_warning() {
        let mut bytes = line_for("ok").into_bytes();
        bytes.extend_from_slice(b"\n\xff\xfe garbage\n");
        bytes.extend_from_slice(line_for("after").as_bytes());

        let outcome = read_entries(Cursor::new(bytes)).unwrap();
        assert_eq!(outcome.entries.len(), 2);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].line_number, 2);
    }

    #[test]
    fn long_content_is_truncated_by_characters() {
        let long = "é".repeat(60);
        let outcome = read_entries(Cursor::new(long)).unwrap();

        let warning = &outcome.warnings[0];
        assert_eq!(warning.truncated_content.chars().count(), 53);
        assert!(warning.truncated_content.ends_with("..."));
        assert!(warning.truncated_content.starts_with("éé"));

        let exact = "x".repeat(50);
        let outcome = read_entries(Cursor::new(exact.clone())).unwrap();
        assert_eq!(outcome.warnings[0].truncated_content, exact);
    }

    #[test]
    fn warning_display_format() {
        let warning = ParseWarning {
            line_number: 3,
            truncated_content: "oops".to_string(),
            error: "expected value at line 1 column 1".to_string(),
        };
        assert_eq!(
            warning.to_string(),
            "  Line 3: oops (error: expected value at line 1 column 1)"
        );
    }
}
