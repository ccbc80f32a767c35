//! Cache engine: the public face of the bounded store plus its maintenance task.

use super::config::CacheConfig;
use super::entry::{estimate_size, CacheEntry, Expiry, SetOptions, WarmEntry};
use super::metrics::{CacheMetrics, MaintenanceReport, WarmReport};
use super::state::{CacheState, Limits};
use crate::Result;
use futures::FutureExt;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Bounded in-memory key/value cache with TTL expiry, tags and two-tier eviction.
///
/// Every operation takes the single state lock once and runs to completion,
/// so the store, recency order and tag index never disagree. Values are
/// returned as owned clones.
pub struct CacheEngine {
    config: CacheConfig,
    state: Arc<Mutex<CacheState>>,
    cancel: CancellationToken,
    maintenance: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl CacheEngine {
    /// Build an engine and, when an interval is configured and a tokio runtime
    /// is available, start its background maintenance task.
    pub fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        let state = Arc::new(Mutex::new(CacheState::new(Limits {
            max_size: config.max_size_bytes(),
            max_entries: config.max_entries,
            metrics: config.enable_metrics,
        })));
        let cancel = CancellationToken::new();

        let handle = if config.maintenance_interval.is_zero() {
            debug!("Cache maintenance disabled");
            None
        } else if tokio::runtime::Handle::try_current().is_err() {
            debug!("No tokio runtime; cache maintenance must be run manually");
            None
        } else {
            Some(spawn_maintenance(
                Arc::clone(&state),
                config.maintenance_interval,
                cancel.clone(),
            ))
        };

        info!(
            "Cache engine started: {} bytes, {} entries, default ttl {:?}",
            config.max_size_bytes(),
            config.max_entries,
            config.default_ttl
        );

        Ok(Self {
            config,
            state,
            cancel,
            maintenance: std::sync::Mutex::new(handle),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        self.state.lock().await.lookup(key)
    }

    pub async fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).await.unwrap_or(default)
    }

    /// Store `value` under the default TTL with no tags.
    pub async fn set(&self, key: impl Into<String>, value: Value) {
        self.set_with(key, value, SetOptions::default()).await;
    }

    /// Store `value`, evicting least-recently-used entries as needed to stay
    /// within both budgets.
    ///
    /// Returns whether the value was stored; a value larger than the whole
    /// size budget is refused.
    pub async fn set_with(&self, key: impl Into<String>, value: Value, opts: SetOptions) -> bool {
        let ttl = self.resolve_ttl(opts.expiry);
        let size = estimate_size(&value);
        let entry = CacheEntry::new(value, size, ttl, opts.tags);
        self.state.lock().await.insert(key.into(), entry)
    }

    fn resolve_ttl(&self, expiry: Expiry) -> Option<Duration> {
        match expiry {
            Expiry::Default if self.config.default_ttl.is_zero() => None,
            Expiry::Default => Some(self.config.default_ttl),
            Expiry::After(ttl) => Some(ttl),
            Expiry::Never => None,
        }
    }

    pub async fn delete(&self, key: &str) -> bool {
        self.state.lock().await.remove(key).is_some()
    }

    pub async fn exists(&self, key: &str) -> bool {
        self.state.lock().await.contains_live(key)
    }

    /// Live entries carrying all of `tags`. An empty tag set matches nothing.
    pub async fn get_by_tags<I, S>(&self, tags: I) -> HashMap<String, Value>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags = collect_tags(tags);
        self.state.lock().await.by_tags(&tags)
    }

    /// Delete every entry carrying any of `tags`, returning how many went.
    pub async fn clear_tags<I, S>(&self, tags: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags = collect_tags(tags);
        let removed = self.state.lock().await.remove_tagged(&tags);
        debug!("Cleared {} entries for tags {:?}", removed, tags);
        removed
    }

    pub async fn clear_all(&self) {
        self.state.lock().await.clear();
        info!("Cache cleared");
    }

    /// Bulk-load `{ "value": .., "ttl": secs?, "tags": [..]? }` descriptors.
    ///
    /// Malformed descriptors are logged and skipped.
    pub async fn warm(&self, entries: HashMap<String, Value>) -> WarmReport {
        let mut report = WarmReport::default();
        for (key, raw) in entries {
            let parsed = match serde_json::from_value::<WarmEntry>(raw) {
                Ok(w) => w,
                Err(e) => {
                    warn!("Skipping warm entry {}: {}", key, e);
                    report.skipped += 1;
                    continue;
                }
            };
            let (value, opts) = parsed.into_options();
            if self.set_with(key.as_str(), value, opts).await {
                report.loaded += 1;
            } else {
                warn!("Skipping warm entry {}: refused by size budget", key);
                report.skipped += 1;
            }
        }
        if self.config.enable_metrics {
            self.state.lock().await.counters.warm_operations += report.loaded as u64;
        }
        info!(
            "Cache warmed: {} loaded, {} skipped",
            report.loaded, report.skipped
        );
        report
    }

    /// Warm from a JSON object snapshot mapping keys to warm descriptors.
    pub async fn warm_from_json(&self, snapshot: &str) -> Result<WarmReport> {
        let entries: HashMap<String, Value> = serde_json::from_str(snapshot)?;
        Ok(self.warm(entries).await)
    }

    pub async fn metrics(&self) -> CacheMetrics {
        let st = self.state.lock().await;
        let limits = st.limits();
        st.counters
            .snapshot(st.current_size(), st.len(), limits.max_size, limits.max_entries)
    }

    /// Tag → number of entries carrying it.
    pub async fn tag_counts(&self) -> HashMap<String, usize> {
        self.state.lock().await.tag_counts()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Run one expiry sweep followed by priority rebalancing.
    pub async fn run_maintenance(&self) -> MaintenanceReport {
        self.state.lock().await.maintain()
    }

    /// Stop the background maintenance task and wait for it to finish.
    pub async fn close(&self) {
        self.cancel.cancel();
        let handle = match self.maintenance.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Cache maintenance task ended abnormally: {}", e);
            }
            info!("Cache maintenance stopped");
        }
    }

    /// Whether the background maintenance task is still running.
    pub fn maintenance_running(&self) -> bool {
        match self.maintenance.lock() {
            Ok(guard) => guard.as_ref().map_or(false, |h| !h.is_finished()),
            Err(_) => false,
        }
    }
}

impl Drop for CacheEngine {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn collect_tags<I, S>(tags: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    tags.into_iter().map(Into::into).collect()
}

fn spawn_maintenance(
    state: Arc<Mutex<CacheState>>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // the first tick completes immediately
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let cycle = async { state.lock().await.maintain() };
                    match AssertUnwindSafe(cycle).catch_unwind().await {
                        Ok(report) if report.expired > 0 || report.evicted > 0 => {
                            debug!(
                                "Cache maintenance: {} expired, {} evicted",
                                report.expired, report.evicted
                            );
                        }
                        Ok(_) => {}
                        Err(_) => error!("Cache maintenance cycle panicked; continuing"),
                    }
                }
            }
        }
        debug!("Cache maintenance loop exiting");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn test_maintenance_survives_panicking_cycle() {
        let cache = CacheEngine::new(
            CacheConfig::default().with_maintenance_interval(Duration::from_secs(1)),
        )
        .unwrap();
        cache.state.lock().await.fail_next_cycle = true;
        cache
            .set_with("k", json!("v"), SetOptions::new().with_ttl(Duration::from_millis(500)))
            .await;

        // the first cycle panics before sweeping
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(cache.len().await, 1);
        assert!(cache.maintenance_running());

        tokio::time::sleep(Duration::from_secs(1)).await;
        let m = cache.metrics().await;
        assert_eq!(m.expired_cleanups, 1);
        assert_eq!(m.entry_count, 0);

        cache.close().await;
        assert!(!cache.maintenance_running());
    }
}
