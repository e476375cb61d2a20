//! Real-time tail monitoring of the active event file.
//!
//! # Data Flow
//! ```text
//! watcher.rs (notify or poll) → change signal
//!     → monitor.rs (read file tail, last complete line, parse)
//!     → subscriber callback
//! ```
//!
//! # Design Decisions
//! - Single subscriber, no fan-out
//! - The watch ends when the shutdown broadcast fires

pub mod monitor;
pub mod watcher;

pub use monitor::TailMonitor;
pub use watcher::{watcher_for, FileChangeWatcher, NotifyFileWatcher, PollFileWatcher};

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum TailError {
    #[error("file watch failed: {0}")]
    Watch(#[from] notify::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("directory {0} does not exist")]
    MissingDirectory(PathBuf),

    #[error("change watcher stopped")]
    WatcherClosed,
}
