//! Cache entries and write options.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::io;
use std::time::Duration;
use tokio::time::Instant;

/// Size assumed for a value whose serialized length cannot be measured.
pub const DEFAULT_ENTRY_SIZE: usize = 1024;

/// A stored value plus the bookkeeping used for expiry and eviction.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Value,
    pub created_at: Instant,
    pub last_accessed: Instant,
    pub access_count: u64,
    pub size_bytes: usize,
    pub ttl: Option<Duration>,
    pub tags: HashSet<String>,
}

impl CacheEntry {
    pub fn new(
        value: Value,
        size_bytes: usize,
        ttl: Option<Duration>,
        tags: HashSet<String>,
    ) -> Self {
        let now = Instant::now();
        Self {
            value,
            created_at: now,
            last_accessed: now,
            access_count: 1,
            size_bytes,
            ttl,
            tags,
        }
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        match self.ttl {
            Some(ttl) => self.age(now) > ttl,
            None => false,
        }
    }

    /// Accesses per second since creation; infinite for a brand-new entry.
    pub fn access_frequency(&self, now: Instant) -> f64 {
        let age = self.age(now).as_secs_f64();
        if age < f64::EPSILON {
            f64::INFINITY
        } else {
            self.access_count as f64 / age
        }
    }

    pub(crate) fn touch(&mut self) {
        self.last_accessed = Instant::now();
        self.access_count = self.access_count.saturating_add(1);
    }
}

/// Expiry choice for a single write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiry {
    /// Use the engine's configured default TTL.
    #[default]
    Default,
    After(Duration),
    Never,
}

/// Options accepted by [`CacheEngine::set_with`](super::CacheEngine::set_with).
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    pub expiry: Expiry,
    pub tags: HashSet<String>,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.expiry = Expiry::After(ttl);
        self
    }

    pub fn without_expiry(mut self) -> Self {
        self.expiry = Expiry::Never;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }
}

/// Descriptor accepted by [`CacheEngine::warm`](super::CacheEngine::warm).
#[derive(Debug, Clone, Deserialize)]
pub struct WarmEntry {
    pub value: Value,
    /// TTL in seconds; absent means the engine default, 0 means never expire.
    #[serde(default)]
    pub ttl: Option<u64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl WarmEntry {
    pub(crate) fn into_options(self) -> (Value, SetOptions) {
        let mut opts = SetOptions::new().with_tags(self.tags);
        match self.ttl {
            Some(0) => opts = opts.without_expiry(),
            Some(secs) => opts = opts.with_ttl(Duration::from_secs(secs)),
            None => {}
        }
        (self.value, opts)
    }
}

struct ByteCounter(usize);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Serialized JSON length of `value`, without buffering the output.
pub fn estimate_size(value: &Value) -> usize {
    let mut counter = ByteCounter(0);
    match serde_json::to_writer(&mut counter, value) {
        Ok(()) => counter.0,
        Err(e) => {
            tracing::debug!("size estimation failed, using default: {}", e);
            DEFAULT_ENTRY_SIZE
        }
    }
}
