//! Append-only log of settled hand positions.
//!
//! One JSON object per line:
//!
//! ```text
//! {"timestamp":"2023-10-01T03:00:00+11:00","hand_one":180,"hand_two":180}
//! ```
//!
//! A record is appended after every pass that moved a hand. On startup the
//! last readable record seeds both hands; a missing, empty or corrupt log
//! falls back to the current face time.

use crate::face_time::FaceTime;
use chrono::{DateTime, FixedOffset, TimeZone};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tower_common::error::{ClockError, ClockResult};
use tracing::{debug, info, warn};

/// One settled correction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandRecord {
    /// When the correction settled.
    pub timestamp: DateTime<FixedOffset>,
    /// Dial position of hand one, in minutes.
    pub hand_one: i32,
    /// Dial position of hand two, in minutes.
    pub hand_two: i32,
}

impl HandRecord {
    /// Record both positions at `timestamp`.
    pub fn new<Z: TimeZone>(timestamp: &DateTime<Z>, positions: [i32; 2]) -> Self {
        Self {
            timestamp: timestamp.fixed_offset(),
            hand_one: positions[0],
            hand_two: positions[1],
        }
    }

    /// Positions as `[one, two]`.
    #[must_use]
    pub fn positions(&self) -> [i32; 2] {
        [self.hand_one, self.hand_two]
    }
}

/// JSON Lines hand-position log. Assumes a single writer.
#[derive(Debug, Clone)]
pub struct HandLog {
    path: PathBuf,
}

impl HandLog {
    /// Log at `path`; nothing is touched until the first read or append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, creating the file and parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::Io`] if the record cannot be written.
    pub fn append(&self, record: &HandRecord) -> ClockResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(&e))?;
        }

        let mut line = serde_json::to_string(record)
            .map_err(|e| ClockError::Io(format!("failed to encode hand record: {e}")))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(&e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| self.io_error(&e))?;

        debug!(path = %self.path.display(), one = record.hand_one, two = record.hand_two, "Hand positions logged");
        Ok(())
    }

    /// Most recent readable record, if any.
    ///
    /// Lines that do not parse are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::Io`] if the file exists but cannot be read.
    pub fn last_record(&self) -> ClockResult<Option<HandRecord>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(&e)),
        };

        let lines: Vec<&str> = content.lines().collect();
        for (index, line) in lines.iter().enumerate().rev() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HandRecord>(line) {
                Ok(record) => return Ok(Some(record)),
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = index + 1,
                    error = %e,
                    "Skipping unreadable hand record"
                ),
            }
        }
        Ok(None)
    }

    fn io_error(&self, e: &std::io::Error) -> ClockError {
        ClockError::Io(format!("{}: {e}", self.path.display()))
    }
}

/// Starting positions for both hands.
///
/// Uses the last record in `log`, or the face time of `now` for both hands
/// when there is none or it cannot be read.
pub fn seed_positions<Z: TimeZone>(log: &HandLog, now: &DateTime<Z>) -> [i32; 2] {
    let fallback = FaceTime::from_instant(now).minutes();
    match log.last_record() {
        Ok(Some(record)) => {
            info!(
                one = record.hand_one,
                two = record.hand_two,
                recorded = %record.timestamp,
                "Seeded hand positions from log"
            );
            record.positions()
        }
        Ok(None) => {
            info!(face = fallback, "No hand log, assuming hands show the current time");
            [fallback; 2]
        }
        Err(e) => {
            warn!(error = %e, face = fallback, "Hand log unreadable, assuming hands show the current time");
            [fallback; 2]
        }
    }
}
