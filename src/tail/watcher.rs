//! File change sources for the tail monitor.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::{TailConfig, WatchMode};
use crate::tail::TailError;

/// Produces a unit signal each time the watched file may have changed.
///
/// Signals may be coalesced or spurious; the consumer re-reads the file.
pub trait FileChangeWatcher: Send {
    fn start(&mut self, path: &Path) -> Result<mpsc::UnboundedReceiver<()>, TailError>;
}

/// Build the watcher selected by configuration.
pub fn watcher_for(config: &TailConfig) -> Box<dyn FileChangeWatcher> {
    match config.mode {
        WatchMode::Notify => Box::new(NotifyFileWatcher::new()),
        WatchMode::Poll => Box::new(PollFileWatcher::new(Duration::from_millis(
            config.poll_interval_ms,
        ))),
    }
}

/// OS notifications on the parent directory, filtered to one file name.
///
/// Watching the directory lets the file be created after the watch starts.
#[derive(Default)]
pub struct NotifyFileWatcher {
    watcher: Option<RecommendedWatcher>,
}

impl NotifyFileWatcher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FileChangeWatcher for NotifyFileWatcher {
    fn start(&mut self, path: &Path) -> Result<mpsc::UnboundedReceiver<()>, TailError> {
        let dir = parent_dir(path)?;
        let file_name = path.file_name().map(|n| n.to_os_string());
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !(event.kind.is_modify() || event.kind.is_create()) {
                        return;
                    }
                    let ours = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if ours {
                        let _ = tx.send(());
                    }
                }
                Err(e) => tracing::warn!(error = ?e, "Tail watch error"),
            },
            Config::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::debug!(path = ?path, "Notify tail watcher started");
        self.watcher = Some(watcher);
        Ok(rx)
    }
}

/// Periodic length + mtime comparison. Works on file systems without
/// change notifications.
pub struct PollFileWatcher {
    interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl PollFileWatcher {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            task: None,
        }
    }
}

impl FileChangeWatcher for PollFileWatcher {
    fn start(&mut self, path: &Path) -> Result<mpsc::UnboundedReceiver<()>, TailError> {
        parent_dir(path)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let path = path.to_path_buf();
        let interval = self.interval;

        if let Some(previous) = self.task.take() {
            previous.abort();
        }
        // Baseline before returning so appends right after start() are seen.
        let mut last = fingerprint_now(&path);
        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let current = fingerprint(&path).await;
                if current != last {
                    last = current;
                    if tx.send(()).is_err() {
                        break;
                    }
                }
            }
        }));
        Ok(rx)
    }
}

impl Drop for PollFileWatcher {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

type Fingerprint = Option<(u64, Option<SystemTime>)>;

fn fingerprint_now(path: &Path) -> Fingerprint {
    let meta = std::fs::metadata(path).ok()?;
    Some((meta.len(), meta.modified().ok()))
}

async fn fingerprint(path: &Path) -> Fingerprint {
    let meta = tokio::fs::metadata(path).await.ok()?;
    Some((meta.len(), meta.modified().ok()))
}

fn parent_dir(path: &Path) -> Result<PathBuf, TailError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    if dir.is_dir() {
        Ok(dir)
    } else {
        Err(TailError::MissingDirectory(dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_poll_watcher_signals_on_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("svc-2024-05-01.log");
        let mut watcher = PollFileWatcher::new(Duration::from_millis(10));
        let mut rx = watcher.start(&path).unwrap();

        std::fs::write(&path, "line\n").unwrap();

        let signal = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await;
        assert_eq!(signal.unwrap(), Some(()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_append_right_after_start_is_signalled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("svc-2024-05-01.log");
        std::fs::write(&path, "first\n").unwrap();

        for round in 0..20 {
            let mut watcher = PollFileWatcher::new(Duration::from_millis(10));
            let mut rx = watcher.start(&path).unwrap();
            std::fs::write(&path, "x".repeat(round + 10)).unwrap();

            let signal = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await;
            assert_eq!(signal.unwrap(), Some(()), "round {round}");
        }
    }

    #[test]
    fn test_missing_directory_rejected() {
        let mut watcher = NotifyFileWatcher::new();
        let err = watcher
            .start(Path::new("/definitely/not/here/svc.log"))
            .unwrap_err();
        assert!(matches!(err, TailError::MissingDirectory(_)));
    }
}
