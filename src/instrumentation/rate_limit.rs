//! Observe-only per-client rate tracking.
//!
//! Requests are counted per `(client, window)` where the window is
//! `floor(epoch_ms / window_ms)`. Exceeding the per-window budget produces a
//! warning event; the request itself always proceeds.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde_json::json;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::events::EventEmitter;
use crate::instrumentation::chain::RequestObserver;
use crate::instrumentation::context::RequestContext;
use crate::instrumentation::ObserverError;
use crate::observability::metrics;

/// Milliseconds since the Unix epoch.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Concurrent request counters keyed by `(client, window bucket)`.
///
/// Increments lock only the shard holding the key, so increment-then-read is
/// atomic per key and sweeping never blocks increments on other shards.
pub struct RateWindowCounter {
    counts: DashMap<(String, u64), u64>,
    window_ms: u64,
    retention_ms: u64,
}

impl RateWindowCounter {
    pub fn new(window: Duration, retention: Duration) -> Self {
        Self {
            counts: DashMap::new(),
            window_ms: (window.as_millis() as u64).max(1),
            retention_ms: retention.as_millis() as u64,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_millis(self.retention_ms)
    }

    pub fn bucket(&self, now_ms: u64) -> u64 {
        now_ms / self.window_ms
    }

    /// Count one request for `client` and return the post-increment value.
    pub fn increment(&self, client: &str, now_ms: u64) -> u64 {
        let mut count = self
            .counts
            .entry((client.to_string(), self.bucket(now_ms)))
            .or_insert(0);
        *count += 1;
        *count
    }

    /// Current count for `client` in the window containing `now_ms`.
    pub fn count(&self, client: &str, now_ms: u64) -> u64 {
        self.counts
            .get(&(client.to_string(), self.bucket(now_ms)))
            .map(|c| *c)
            .unwrap_or(0)
    }

    /// Number of tracked `(client, window)` pairs.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Remove every window whose start is more than the retention period
    /// before `now_ms`. Returns the number of entries removed.
    pub fn sweep(&self, now_ms: u64) -> usize {
        let mut removed = 0;
        self.counts.retain(|(_, bucket), _| {
            let age = now_ms.saturating_sub(bucket * self.window_ms);
            let keep = age <= self.retention_ms;
            if !keep {
                removed += 1;
            }
            keep
        });
        metrics::record_rate_window_keys(self.counts.len());
        removed
    }

    /// Sweep on a fixed interval until shutdown.
    pub fn spawn_eviction(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            tracing::info!(interval_secs = interval.as_secs(), "Rate window eviction started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = self.sweep(epoch_millis());
                        if removed > 0 {
                            tracing::debug!(removed, remaining = self.len(), "Rate windows evicted");
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::info!("Rate window eviction received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        })
    }
}

/// Reports clients that exceed the per-window request budget.
pub struct RateLimiter {
    counter: Arc<RateWindowCounter>,
    max_requests: u64,
}

impl RateLimiter {
    pub fn new(counter: Arc<RateWindowCounter>, max_requests: u64) -> Self {
        Self { counter, max_requests }
    }

    pub fn observe_at(&self, ctx: &RequestContext, emitter: &EventEmitter, now_ms: u64) -> u64 {
        let count = self.counter.increment(&ctx.ip, now_ms);

        if count > self.max_requests {
            emitter.warn(
                "Rate Limit Exceeded",
                json!({
                    "ip": ctx.ip,
                    "count": count,
                    "endpoint": ctx.url,
                    "method": ctx.method,
                    "userAgent": ctx.user_agent(),
                    "security": "rate_limit_violation",
                }),
            );
            metrics::record_rate_limit_violation();
        }
        count
    }
}

impl RequestObserver for RateLimiter {
    fn name(&self) -> &'static str {
        "rate_limiter"
    }

    fn observe(&self, ctx: &RequestContext, emitter: &EventEmitter) -> Result<(), ObserverError> {
        self.observe_at(ctx, emitter, epoch_millis());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmitterConfig;

    const MINUTE: u64 = 60_000;

    fn counter() -> Arc<RateWindowCounter> {
        Arc::new(RateWindowCounter::new(
            Duration::from_secs(60),
            Duration::from_secs(300),
        ))
    }

    #[test]
    fn test_counts_per_client_and_window() {
        let counter = counter();
        let t = 10 * MINUTE + 5;

        for _ in 0..7 {
            counter.increment("1.1.1.1", t);
        }
        counter.increment("2.2.2.2", t);
        counter.increment("1.1.1.1", t + MINUTE);

        assert_eq!(counter.count("1.1.1.1", t), 7);
        assert_eq!(counter.count("2.2.2.2", t), 1);
        assert_eq!(counter.count("1.1.1.1", t + MINUTE), 1);
        assert_eq!(counter.len(), 3);
    }

    #[test]
    fn test_warning_fires_only_above_budget() {
        let (emitter, sink) = EventEmitter::in_memory(&EmitterConfig::default());
        let limiter = RateLimiter::new(counter(), 100);
        let ctx = RequestContext::new("POST", "/api/auth/login")
            .with_ip("9.9.9.9")
            .with_header("user-agent", "Bot/1.0");
        let t = 42 * MINUTE;

        for _ in 0..100 {
            limiter.observe_at(&ctx, &emitter, t);
        }
        assert!(sink.events().is_empty());

        assert_eq!(limiter.observe_at(&ctx, &emitter, t), 101);
        let events = sink.events();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.message, "Rate Limit Exceeded");
        assert_eq!(event.field("count"), Some(&json!(101)));
        assert_eq!(event.str_field("endpoint"), Some("/api/auth/login"));
        assert_eq!(event.str_field("userAgent"), Some("Bot/1.0"));
        assert_eq!(event.str_field("security"), Some("rate_limit_violation"));
    }

    #[test]
    fn test_sweep_removes_only_expired_windows() {
        let counter = counter();
        let now = 100 * MINUTE;

        counter.increment("old", now - 6 * MINUTE);
        counter.increment("edge", now - 5 * MINUTE);
        counter.increment("fresh", now - MINUTE);
        counter.increment("fresh", now - MINUTE);

        assert_eq!(counter.sweep(now), 1);
        assert_eq!(counter.count("old", now - 6 * MINUTE), 0);
        assert_eq!(counter.count("edge", now - 5 * MINUTE), 1);
        assert_eq!(counter.count("fresh", now - MINUTE), 2);
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let counter = counter();
        let t = 7 * MINUTE;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = counter.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        counter.increment("shared", t);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(counter.count("shared", t), 2000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_task_stops_on_shutdown() {
        let counter = counter();
        counter.increment("ancient", 0);
        let (tx, rx) = broadcast::channel(1);

        let handle = counter.clone().spawn_eviction(Duration::from_secs(1), rx);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(counter.is_empty());

        tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
