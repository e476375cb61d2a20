//! Hot reload of the configuration file.
//!
//! Change signals come from the same [`FileChangeWatcher`] sources the tail
//! monitor uses. Editors often produce several events per save, so signals
//! are debounced, and a reload is forwarded only when a section actually
//! differs from the running configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::config::loader::{load_config, ConfigError};
use crate::config::schema::TelemetryConfig;
use crate::tail::{FileChangeWatcher, NotifyFileWatcher};

const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Top-level sections, in file order.
const SECTIONS: [&str; 7] = [
    "listener",
    "emitter",
    "instrumentation",
    "analyzer",
    "tail",
    "admin",
    "observability",
];

/// Sections the running server applies without a restart.
const LIVE_SECTIONS: [&str; 2] = ["instrumentation", "admin"];

/// Reloads the configuration file on change and forwards changed configs.
pub struct ConfigWatcher {
    path: PathBuf,
    current: TelemetryConfig,
    debounce: Duration,
    update_tx: mpsc::UnboundedSender<TelemetryConfig>,
}

impl ConfigWatcher {
    /// `current` is the configuration the process is running with.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(
        path: &Path,
        current: TelemetryConfig,
    ) -> (Self, mpsc::UnboundedReceiver<TelemetryConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                current,
                debounce: DEFAULT_DEBOUNCE,
                update_tx,
            },
            update_rx,
        )
    }

    /// Quiet period after the last change signal before reloading.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Watch with OS notifications until `shutdown` fires.
    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> Result<JoinHandle<()>, ConfigError> {
        self.spawn_with(Box::new(NotifyFileWatcher::new()), shutdown)
    }

    /// Watch with the given change source until `shutdown` fires.
    pub fn spawn_with(
        mut self,
        mut source: Box<dyn FileChangeWatcher>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<JoinHandle<()>, ConfigError> {
        let mut changes = source.start(&self.path)?;
        tracing::info!(path = ?self.path, debounce_ms = self.debounce.as_millis() as u64, "Config watcher started");

        Ok(tokio::spawn(async move {
            // The source must stay alive for the signals to keep coming.
            let _source = source;
            loop {
                let stop = tokio::select! {
                    _ = shutdown.recv() => true,
                    signal = changes.recv() => signal.is_none(),
                };
                if stop {
                    break;
                }

                // Absorb the rest of the burst.
                loop {
                    match tokio::time::timeout(self.debounce, changes.recv()).await {
                        Ok(Some(())) => continue,
                        Ok(None) => return,
                        Err(_) => break,
                    }
                }

                self.reload();
            }
            tracing::debug!("Config watcher stopped");
        }))
    }

    fn reload(&mut self) {
        let new_config = match load_config(&self.path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "Failed to reload config. Keeping current configuration."
                );
                return;
            }
        };

        let changed = changed_sections(&self.current, &new_config);
        if changed.is_empty() {
            tracing::debug!("Config file rewritten without changes");
            return;
        }

        let deferred: Vec<&str> = changed
            .iter()
            .copied()
            .filter(|s| !LIVE_SECTIONS.contains(s))
            .collect();
        if !deferred.is_empty() {
            tracing::warn!(sections = ?deferred, "Changed sections take effect after restart");
        }
        tracing::info!(sections = ?changed, "Config change detected");

        self.current = new_config.clone();
        let _ = self.update_tx.send(new_config);
    }
}

/// Names of the top-level sections that differ between two configs.
pub fn changed_sections(old: &TelemetryConfig, new: &TelemetryConfig) -> Vec<&'static str> {
    let (Ok(Value::Object(old)), Ok(Value::Object(new))) =
        (serde_json::to_value(old), serde_json::to_value(new))
    else {
        return SECTIONS.to_vec();
    };
    SECTIONS
        .iter()
        .copied()
        .filter(|section| old.get(*section) != new.get(*section))
        .collect()
}
