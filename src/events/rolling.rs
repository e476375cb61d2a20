//! Daily, size-capped, retention-bounded log files.
//!
//! The active file for a day is always `<prefix>-YYYY-MM-DD.log`. When the
//! next line would push it past the size cap it is renamed to
//! `<prefix>-YYYY-MM-DD.log.<n>` (n = 1, 2, ... oldest first) and a fresh
//! active file is opened.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::events::{daily_file_name, EmitterError};

struct ActiveFile {
    date: NaiveDate,
    path: PathBuf,
    file: File,
    size: u64,
}

/// Append-only writer for one stream (general or error-only).
pub struct RollingFile {
    dir: PathBuf,
    prefix: String,
    max_size: u64,
    retention_days: i64,
    active: Option<ActiveFile>,
}

impl RollingFile {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, max_size: u64, retention_days: u32) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            max_size,
            retention_days: i64::from(retention_days),
            active: None,
        }
    }

    /// Append one line to the file for `date`, switching days and segments as needed.
    pub fn write_line(&mut self, line: &str, date: NaiveDate) -> Result<(), EmitterError> {
        let needed = line.len() as u64 + 1;

        let stale = self.active.as_ref().map_or(true, |a| a.date != date);
        if stale {
            self.active = Some(self.open(date)?);
            self.prune(date);
        }

        let over_cap = self
            .active
            .as_ref()
            .map_or(false, |a| a.size > 0 && a.size + needed > self.max_size);
        if over_cap {
            self.archive_segment(date)?;
            self.active = Some(self.open(date)?);
        }

        let Some(active) = self.active.as_mut() else {
            return Ok(());
        };

        let mut buf = Vec::with_capacity(needed as usize);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        active.file.write_all(&buf).map_err(|source| EmitterError::Io {
            path: active.path.clone(),
            source,
        })?;
        active.size += needed;
        Ok(())
    }

    /// Path of the file currently being written, if any.
    pub fn active_path(&self) -> Option<&Path> {
        self.active.as_ref().map(|a| a.path.as_path())
    }

    fn open(&self, date: NaiveDate) -> Result<ActiveFile, EmitterError> {
        let path = self.dir.join(daily_file_name(&self.prefix, date));
        let io_err = |source| EmitterError::Io { path: path.clone(), source };

        fs::create_dir_all(&self.dir).map_err(io_err)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;
        let size = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(ActiveFile { date, path, file, size })
    }

    fn archive_segment(&mut self, date: NaiveDate) -> Result<(), EmitterError> {
        // Close before renaming.
        self.active = None;

        let base = self.dir.join(daily_file_name(&self.prefix, date));
        let next = segment_paths(&self.dir, &self.prefix, date).len() + 1;
        let target = segment_path(&base, next);

        fs::rename(&base, &target).map_err(|source| EmitterError::Io { path: base.clone(), source })?;
        tracing::debug!(from = ?base, to = ?target, "Log segment archived");
        Ok(())
    }

    /// Delete files of this stream older than the retention window.
    fn prune(&self, today: NaiveDate) {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = ?self.dir, error = %e, "Retention sweep skipped");
                return;
            }
        };

        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(date) = name.to_str().and_then(|n| stream_date(n, &self.prefix)) else {
                continue;
            };
            if (today - date).num_days() > self.retention_days {
                match fs::remove_file(entry.path()) {
                    Ok(()) => tracing::info!(file = ?entry.path(), "Expired log file removed"),
                    Err(e) => tracing::warn!(file = ?entry.path(), error = %e, "Failed to remove expired log file"),
                }
            }
        }
    }
}

/// Archived segments of a day's stream, oldest first. The active file is not included.
pub fn segment_paths(dir: &Path, prefix: &str, date: NaiveDate) -> Vec<PathBuf> {
    let base = dir.join(daily_file_name(prefix, date));
    let mut segments = Vec::new();
    let mut n = 1;
    loop {
        let candidate = segment_path(&base, n);
        if !candidate.exists() {
            break;
        }
        segments.push(candidate);
        n += 1;
    }
    segments
}

fn segment_path(base: &Path, n: usize) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{}", n));
    PathBuf::from(name)
}

/// Date encoded in a stream file name (`<prefix>-YYYY-MM-DD.log[.n]`).
fn stream_date(file_name: &str, prefix: &str) -> Option<NaiveDate> {
    let rest = file_name.strip_prefix(prefix)?.strip_prefix('-')?;
    let date = rest.get(..10)?;
    if !rest.get(10..)?.starts_with(".log") {
        return None;
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}
