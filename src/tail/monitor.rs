//! Follows the active day's general stream and hands each newly completed
//! line to a callback.
//!
//! Only the last complete line of the file is read per change signal, so
//! bursts that land between two signals are coalesced.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use chrono::Local;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::broadcast;

use crate::events::{general_log_path, LogEvent};
use crate::tail::{FileChangeWatcher, TailError};

/// Bytes read from the end of the file on each change.
const TAIL_CHUNK: u64 = 64 * 1024;

/// Delivers the newest complete entry of a growing event file to one callback.
pub struct TailMonitor {
    path: PathBuf,
    /// End offset of the last line handed to the callback.
    delivered_end: Option<u64>,
}

impl TailMonitor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delivered_end: None,
        }
    }

    /// Monitor the general stream of the current local day.
    pub fn for_today(log_dir: &Path, service: &str) -> Self {
        Self::new(general_log_path(log_dir, service, Local::now().date_naive()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Watch until `shutdown` fires, calling `on_event` for each new entry.
    ///
    /// Malformed or partial lines are skipped and watching continues.
    pub async fn run<F>(
        &mut self,
        watcher: &mut dyn FileChangeWatcher,
        mut on_event: F,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), TailError>
    where
        F: FnMut(LogEvent),
    {
        let mut changes = watcher.start(&self.path)?;
        tracing::info!(path = ?self.path, "Tail monitor started");

        loop {
            let change = tokio::select! {
                _ = shutdown.recv() => None,
                change = changes.recv() => Some(change),
            };
            match change {
                None => {
                    tracing::info!(path = ?self.path, "Tail monitor stopped");
                    return Ok(());
                }
                Some(None) => return Err(TailError::WatcherClosed),
                Some(Some(())) => {}
            }
            // Coalesce bursts into one read.
            while changes.try_recv().is_ok() {}

            match self.latest_entry().await {
                Ok(Some(event)) => on_event(event),
                Ok(None) => {}
                Err(e) => tracing::debug!(error = %e, "Tail read failed"),
            }
        }
    }

    /// Parse the last newline-terminated line, unless it was already delivered.
    pub async fn latest_entry(&mut self) -> Result<Option<LogEvent>, TailError> {
        let Some((end, line)) = self.read_last_line().await? else {
            return Ok(None);
        };
        if self.delivered_end == Some(end) {
            return Ok(None);
        }
        self.delivered_end = Some(end);
        Ok(LogEvent::from_line(&line))
    }

    async fn read_last_line(&self) -> Result<Option<(u64, String)>, TailError> {
        let io_err = |source: std::io::Error| TailError::Io {
            path: self.path.clone(),
            source,
        };

        let mut file = match tokio::fs::File::open(&self.path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(e)),
        };
        let len = file.metadata().await.map_err(io_err)?.len();
        let start = len.saturating_sub(TAIL_CHUNK);
        file.seek(SeekFrom::Start(start)).await.map_err(io_err)?;
        let mut chunk = Vec::with_capacity((len - start) as usize);
        file.read_to_end(&mut chunk).await.map_err(io_err)?;

        // A trailing partial write is not a complete line.
        let Some(last_nl) = chunk.iter().rposition(|&b| b == b'\n') else {
            return Ok(None);
        };
        let line_start = match chunk[..last_nl].iter().rposition(|&b| b == b'\n') {
            Some(i) => i + 1,
            // Line begins before the chunk; too long to be a single event.
            None if start > 0 => return Ok(None),
            None => 0,
        };

        let end = start + last_nl as u64;
        let line = String::from_utf8_lossy(&chunk[line_start..last_nl]).into_owned();
        Ok(Some((end, line)))
    }
}
