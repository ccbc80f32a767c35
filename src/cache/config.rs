//! Cache engine configuration.

use crate::{Error, ErrorContext, Result};
use std::env;
use std::time::Duration;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Size budget in megabytes. Fractional values are allowed.
    pub max_size_mb: f64,
    pub max_entries: usize,
    /// TTL applied when a write does not choose one. Zero means entries never expire.
    pub default_ttl: Duration,
    /// Period of the background maintenance task. Zero disables the task.
    pub maintenance_interval: Duration,
    pub enable_metrics: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size_mb: 100.0,
            max_entries: 10_000,
            default_ttl: Duration::from_secs(3600),
            maintenance_interval: Duration::from_secs(300),
            enable_metrics: true,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `AI_CACHE_*` environment variables.
    ///
    /// Values that fail to parse are ignored with a warning.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(v) = env_parse::<f64>("AI_CACHE_MAX_SIZE_MB") {
            cfg.max_size_mb = v;
        }
        if let Some(v) = env_parse::<usize>("AI_CACHE_MAX_ENTRIES") {
            cfg.max_entries = v;
        }
        if let Some(v) = env_parse::<u64>("AI_CACHE_DEFAULT_TTL_SECS") {
            cfg.default_ttl = Duration::from_secs(v);
        }
        if let Some(v) = env_parse::<u64>("AI_CACHE_MAINTENANCE_INTERVAL_SECS") {
            cfg.maintenance_interval = Duration::from_secs(v);
        }
        if let Ok(v) = env::var("AI_CACHE_METRICS") {
            cfg.enable_metrics = !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "off");
        }
        cfg
    }

    pub fn with_max_size_mb(mut self, mb: f64) -> Self {
        self.max_size_mb = mb;
        self
    }

    pub fn with_max_entries(mut self, n: usize) -> Self {
        self.max_entries = n;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_maintenance_interval(mut self, interval: Duration) -> Self {
        self.maintenance_interval = interval;
        self
    }

    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.enable_metrics = enabled;
        self
    }

    pub fn max_size_bytes(&self) -> usize {
        (self.max_size_mb * BYTES_PER_MB) as usize
    }

    pub fn validate(&self) -> Result<()> {
        if !self.max_size_mb.is_finite() || self.max_size_mb <= 0.0 {
            return Err(Error::configuration_with_context(
                "max_size_mb must be a positive number",
                ErrorContext::new()
                    .with_field_path("cache.max_size_mb")
                    .with_details(format!("got {}", self.max_size_mb))
                    .with_source("cache_config"),
            ));
        }
        if self.max_entries == 0 {
            return Err(Error::configuration_with_context(
                "max_entries must be greater than zero",
                ErrorContext::new()
                    .with_field_path("cache.max_entries")
                    .with_source("cache_config"),
            ));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring unparseable {}={:?}", key, raw);
            None
        }
    }
}
