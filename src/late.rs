#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Late-submission determination: compares the recorded deadline against a
//! submission's commit timestamp.

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use thiserror::Error;

/// An error raised while evaluating lateness. Grading cannot proceed without
/// deadline knowledge, so every variant is fatal.
#[derive(Error, Debug)]
pub enum LateError {
    /// The deadline file could not be read.
    #[error("could not read deadline file {path}")]
    Deadline {
        /// Path to the deadline file.
        path:   PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
    /// The deadline file's contents did not parse as a timestamp.
    #[error("could not parse deadline {text:?}")]
    BadDeadline {
        /// The offending deadline text.
        text: String,
    },
    /// The commit timestamp did not parse as ISO-8601.
    #[error("could not parse commit timestamp {text:?}")]
    BadTimestamp {
        /// The offending timestamp text.
        text:   String,
        /// The underlying parse error.
        source: chrono::ParseError,
    },
}

/// Returns whether a submission is late: true iff the commit timestamp is
/// strictly after the recorded deadline.
///
/// The deadline file holds a single timestamp, either RFC 3339 or a naive
/// `YYYY-MM-DD [HH:MM[:SS]]` form; a naive deadline is interpreted in the
/// commit's own UTC offset. The commit timestamp is ISO-8601, as produced by
/// `git log --format=%aI`.
pub fn is_late(deadline_path: &Path, commit_timestamp: &str) -> Result<bool, LateError> {
    let text = std::fs::read_to_string(deadline_path).map_err(|source| LateError::Deadline {
        path: deadline_path.to_path_buf(),
        source,
    })?;

    let commit = DateTime::parse_from_rfc3339(commit_timestamp.trim()).map_err(|source| {
        LateError::BadTimestamp {
            text: commit_timestamp.trim().to_string(),
            source,
        }
    })?;

    let deadline = parse_deadline(text.trim(), *commit.offset()).ok_or_else(|| {
        LateError::BadDeadline {
            text: text.trim().to_string(),
        }
    })?;

    Ok(commit > deadline)
}

/// Parses the deadline text, attaching `offset` when the timestamp carries no
/// zone of its own. A bare date means midnight at the start of that day.
fn parse_deadline(text: &str, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt);
    }

    let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;

    naive.and_local_timezone(offset).single()
}
