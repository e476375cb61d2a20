//! Event sinks.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::NaiveDate;

use crate::config::EmitterConfig;
use crate::events::rolling::RollingFile;
use crate::events::{EmitterError, Level, LogEvent, ERROR_STREAM_PREFIX};

/// Destination for emitted events.
pub trait EventSink: Send + Sync {
    /// Persist one event. `date` selects the daily partition.
    fn write(&self, event: &LogEvent, date: NaiveDate) -> Result<(), EmitterError>;
}

/// General + error-only daily file streams.
pub struct DailyFileSink {
    dir: PathBuf,
    general: Mutex<RollingFile>,
    errors: Mutex<RollingFile>,
}

impl DailyFileSink {
    pub fn new(config: &EmitterConfig) -> Self {
        Self {
            dir: config.log_dir.clone(),
            general: Mutex::new(RollingFile::new(
                &config.log_dir,
                config.service.clone(),
                config.max_file_size_bytes,
                config.general_retention_days,
            )),
            errors: Mutex::new(RollingFile::new(
                &config.log_dir,
                ERROR_STREAM_PREFIX,
                config.max_file_size_bytes,
                config.error_retention_days,
            )),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl EventSink for DailyFileSink {
    fn write(&self, event: &LogEvent, date: NaiveDate) -> Result<(), EmitterError> {
        let line = event.to_line()?;

        self.general
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write_line(&line, date)?;

        if event.level == Level::Error {
            self.errors
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .write_line(&line, date)?;
        }
        Ok(())
    }
}

/// Keeps events in memory. Cloning shares the same buffer.
#[derive(Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<LogEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.message).collect()
    }

    pub fn find(&self, message: &str) -> Option<LogEvent> {
        self.events().into_iter().find(|e| e.message == message)
    }

    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl EventSink for MemorySink {
    fn write(&self, event: &LogEvent, _date: NaiveDate) -> Result<(), EmitterError> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }
}
