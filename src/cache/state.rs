//! Mutable cache state guarded as one unit.
//!
//! The entry store doubles as the recency ordering (`LruCache` keeps entries
//! in access order), so the store, the ordering, the tag index and the running
//! size total can only ever change together, under the engine's single lock.

use super::entry::CacheEntry;
use super::eviction::{priority_score, REBALANCE_TARGET};
use super::metrics::{Counters, MaintenanceReport};
use lru::LruCache;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Limits {
    pub max_size: usize,
    pub max_entries: usize,
    pub metrics: bool,
}

pub(crate) struct CacheState {
    entries: LruCache<String, CacheEntry>,
    tag_index: HashMap<String, HashSet<String>>,
    current_size: usize,
    pub counters: Counters,
    limits: Limits,
    #[cfg(test)]
    pub fail_next_cycle: bool,
}

impl CacheState {
    pub fn new(limits: Limits) -> Self {
        Self {
            entries: LruCache::unbounded(),
            tag_index: HashMap::new(),
            current_size: 0,
            counters: Counters::default(),
            limits,
            #[cfg(test)]
            fail_next_cycle: false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn current_size(&self) -> usize {
        self.current_size
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn lookup(&mut self, key: &str) -> Option<Value> {
        let now = Instant::now();
        let expired = match self.entries.peek(key) {
            Some(entry) => entry.is_expired(now),
            None => {
                self.record_miss();
                return None;
            }
        };
        if expired {
            self.remove(key);
            self.counters.expired_cleanups += 1;
            self.record_miss();
            return None;
        }
        // get_mut promotes the entry to most-recently-used
        let value = self.entries.get_mut(key).map(|entry| {
            entry.touch();
            entry.value.clone()
        });
        if value.is_some() && self.limits.metrics {
            self.counters.hits += 1;
        }
        value
    }

    fn record_miss(&mut self) {
        if self.limits.metrics {
            self.counters.misses += 1;
        }
    }

    pub fn contains_live(&self, key: &str) -> bool {
        self.entries
            .peek(key)
            .map(|e| !e.is_expired(Instant::now()))
            .unwrap_or(false)
    }

    /// Insert `entry` under `key`, evicting least-recently-used entries until it fits.
    ///
    /// Returns false when the entry is larger than the whole size budget; the
    /// key is left absent in that case.
    pub fn insert(&mut self, key: String, entry: CacheEntry) -> bool {
        // an overwrite releases its old size and tags before the space check
        self.remove(&key);

        if entry.size_bytes > self.limits.max_size {
            tracing::warn!(
                "Not caching {}: {} bytes exceeds the {} byte budget",
                key,
                entry.size_bytes,
                self.limits.max_size
            );
            return false;
        }

        while self.current_size + entry.size_bytes > self.limits.max_size
            || self.entries.len() >= self.limits.max_entries
        {
            match self.entries.pop_lru() {
                Some((old_key, old)) => {
                    self.release(&old_key, &old);
                    if self.limits.metrics {
                        self.counters.evictions += 1;
                    }
                    debug!("LRU evicted {} ({} bytes)", old_key, old.size_bytes);
                }
                None => break,
            }
        }

        for tag in &entry.tags {
            self.tag_index
                .entry(tag.clone())
                .or_default()
                .insert(key.clone());
        }
        self.current_size += entry.size_bytes;
        self.entries.put(key, entry);
        true
    }

    /// Remove `key` from every structure, handing back the owned entry.
    pub fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.pop(key)?;
        self.release(key, &entry);
        Some(entry)
    }

    /// Drop index references and size accounting for an entry already taken out of the store.
    fn release(&mut self, key: &str, entry: &CacheEntry) {
        self.current_size = self.current_size.saturating_sub(entry.size_bytes);
        for tag in &entry.tags {
            if let Some(keys) = self.tag_index.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tag_index.remove(tag);
                }
            }
        }
    }

    /// Live entries carrying every tag in `tags`.
    pub fn by_tags(&self, tags: &HashSet<String>) -> HashMap<String, Value> {
        let mut sets: Vec<&HashSet<String>> = Vec::with_capacity(tags.len());
        for tag in tags {
            match self.tag_index.get(tag) {
                Some(keys) => sets.push(keys),
                None => return HashMap::new(),
            }
        }
        sets.sort_by_key(|s| s.len());
        let Some((smallest, rest)) = sets.split_first() else {
            return HashMap::new();
        };

        let now = Instant::now();
        smallest
            .iter()
            .filter(|k| rest.iter().all(|s| s.contains(*k)))
            .filter_map(|k| {
                self.entries
                    .peek(k.as_str())
                    .filter(|e| !e.is_expired(now))
                    .map(|e| (k.clone(), e.value.clone()))
            })
            .collect()
    }

    /// Remove entries carrying any tag in `tags`.
    pub fn remove_tagged(&mut self, tags: &HashSet<String>) -> usize {
        let keys: HashSet<String> = tags
            .iter()
            .filter_map(|t| self.tag_index.get(t))
            .flat_map(|keys| keys.iter().cloned())
            .collect();
        keys.iter().filter(|k| self.remove(k).is_some()).count()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.tag_index.clear();
        self.current_size = 0;
    }

    pub fn tag_counts(&self) -> HashMap<String, usize> {
        self.tag_index
            .iter()
            .map(|(tag, keys)| (tag.clone(), keys.len()))
            .collect()
    }

    /// Drop every expired entry.
    ///
    /// Keys are collected first; each removal then takes ownership of the
    /// entry and untags it from its own tag set.
    pub fn purge_expired(&mut self) -> usize {
        let now = Instant::now();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();

        let removed = expired
            .iter()
            .filter(|k| self.remove(k).is_some())
            .count();
        self.counters.expired_cleanups += removed as u64;
        removed
    }

    fn over_budget(&self) -> bool {
        self.current_size >= self.limits.max_size || self.entries.len() >= self.limits.max_entries
    }

    /// Evict lowest-priority entries until both budgets sit at or below 90%.
    ///
    /// Does nothing unless the cache is at or over one of its budgets.
    pub fn rebalance(&mut self) -> usize {
        if !self.over_budget() {
            return 0;
        }
        let size_target = (self.limits.max_size as f64 * REBALANCE_TARGET) as usize;
        let count_target = (self.limits.max_entries as f64 * REBALANCE_TARGET) as usize;

        let now = Instant::now();
        // least recently used first, so the stable sort breaks ties by recency
        let mut ranked: Vec<(String, f64)> = self
            .entries
            .iter()
            .rev()
            .map(|(k, e)| (k.clone(), priority_score(e, now)))
            .collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));

        let mut evicted = 0;
        for (key, score) in ranked {
            if self.current_size <= size_target && self.entries.len() <= count_target {
                break;
            }
            if let Some(entry) = self.remove(&key) {
                evicted += 1;
                debug!(
                    "Rebalance evicted {} (priority {:.4}, {} bytes)",
                    key, score, entry.size_bytes
                );
            }
        }
        if self.limits.metrics {
            self.counters.memory_evictions += evicted as u64;
        }
        evicted
    }

    pub fn maintain(&mut self) -> MaintenanceReport {
        #[cfg(test)]
        if std::mem::take(&mut self.fail_next_cycle) {
            panic!("maintenance cycle failed");
        }
        let expired = self.purge_expired();
        let evicted = self.rebalance();
        MaintenanceReport { expired, evicted }
    }

    #[cfg(test)]
    pub fn check_consistency(&self) {
        let mut size = 0;
        for (key, entry) in self.entries.iter() {
            size += entry.size_bytes;
            for tag in &entry.tags {
                assert!(
                    self.tag_index.get(tag).map_or(false, |s| s.contains(key)),
                    "{} missing from tag {}",
                    key,
                    tag
                );
            }
        }
        assert_eq!(size, self.current_size);
        for (tag, keys) in &self.tag_index {
            assert!(!keys.is_empty(), "empty tag set for {}", tag);
            for key in keys {
                let entry = self.entries.peek(key.as_str()).expect("indexed key is stored");
                assert!(entry.tags.contains(tag));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn limits(max_size: usize, max_entries: usize) -> Limits {
        Limits {
            max_size,
            max_entries,
            metrics: true,
        }
    }

    fn entry(size: usize, ttl: Option<Duration>, tags: &[&str]) -> CacheEntry {
        CacheEntry::new(
            json!(size),
            size,
            ttl,
            tags.iter().map(|t| t.to_string()).collect(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_replaces_tags_and_size() {
        let mut st = CacheState::new(limits(1000, 10));
        st.insert("k".into(), entry(100, None, &["a", "b"]));
        st.insert("k".into(), entry(40, None, &["b", "c"]));
        st.check_consistency();
        assert_eq!(st.current_size(), 40);
        assert!(!st.tag_counts().contains_key("a"));
        assert_eq!(st.tag_counts().get("c"), Some(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_insert_evicts_lru_for_size() {
        let mut st = CacheState::new(limits(250, 10));
        st.insert("a".into(), entry(100, None, &[]));
        st.insert("b".into(), entry(100, None, &[]));
        assert!(st.lookup("a").is_some());
        st.insert("c".into(), entry(100, None, &[]));
        st.check_consistency();
        assert!(st.contains_live("a"));
        assert!(!st.contains_live("b"));
        assert!(st.contains_live("c"));
        assert_eq!(st.counters.evictions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_entry_is_rejected_without_eviction() {
        let mut st = CacheState::new(limits(100, 10));
        st.insert("small".into(), entry(10, None, &["t"]));
        assert!(!st.insert("huge".into(), entry(101, None, &["t"])));
        assert!(st.contains_live("small"));
        assert!(!st.contains_live("huge"));
        assert_eq!(st.counters.evictions, 0);
        st.check_consistency();
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_cleans_tag_index() {
        let mut st = CacheState::new(limits(10_000, 100));
        st.insert("short".into(), entry(10, Some(Duration::from_secs(1)), &["x", "y"]));
        st.insert("long".into(), entry(10, Some(Duration::from_secs(60)), &["x"]));
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(st.purge_expired(), 1);
        st.check_consistency();
        assert_eq!(st.tag_counts().get("x"), Some(&1));
        assert!(!st.tag_counts().contains_key("y"));
        assert_eq!(st.counters.expired_cleanups, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rebalance_drains_to_ninety_percent() {
        let mut st = CacheState::new(limits(1_000_000, 20));
        for i in 0..20 {
            st.insert(format!("k{}", i), entry(10, None, &["all"]));
        }
        assert_eq!(st.len(), 20);
        tokio::time::advance(Duration::from_secs(5)).await;

        let evicted = st.rebalance();
        assert_eq!(evicted, 2);
        assert_eq!(st.len(), 18);
        assert_eq!(st.counters.memory_evictions, 2);
        st.check_consistency();
    }

    #[tokio::test(start_paused = true)]
    async fn test_rebalance_is_idle_under_budget() {
        let mut st = CacheState::new(limits(1000, 10));
        st.insert("a".into(), entry(10, None, &[]));
        assert_eq!(st.rebalance(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rebalance_prefers_lowest_priority() {
        let mut st = CacheState::new(limits(1_000_000, 3));
        st.insert("big".into(), entry(900_000, None, &[]));
        st.insert("tiny".into(), entry(10, None, &[]));
        tokio::time::advance(Duration::from_secs(10)).await;
        // count reaches the limit with the third insert
        st.insert("other".into(), entry(50_000, None, &[]));
        tokio::time::advance(Duration::from_secs(10)).await;

        // "other" and "tiny" score below "big", whose size term keeps it
        assert_eq!(st.rebalance(), 2);
        assert!(!st.contains_live("tiny"));
        assert!(!st.contains_live("other"));
        assert!(st.contains_live("big"));
        st.check_consistency();
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_tagged_is_or() {
        let mut st = CacheState::new(limits(10_000, 100));
        st.insert("x".into(), entry(1, None, &["p", "m"]));
        st.insert("y".into(), entry(1, None, &["p"]));
        st.insert("z".into(), entry(1, None, &["q"]));
        let tags: HashSet<String> = ["p".to_string(), "m".to_string()].into();
        assert_eq!(st.remove_tagged(&tags), 2);
        assert_eq!(st.len(), 1);
        st.check_consistency();
    }
}
