//! Cache metrics.

use serde::Serialize;

/// Point-in-time view of the engine's counters and occupancy.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    /// Entries dropped by the insert-time LRU guarantee.
    pub evictions: u64,
    /// Entries dropped by periodic priority rebalancing.
    pub memory_evictions: u64,
    pub expired_cleanups: u64,
    pub warm_operations: u64,
    pub current_size_bytes: usize,
    pub entry_count: usize,
    pub average_entry_size: f64,
    pub max_size_bytes: usize,
    pub max_entries: usize,
    /// `current_size_bytes / max_size_bytes`.
    pub utilization: f64,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Counters {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub memory_evictions: u64,
    pub expired_cleanups: u64,
    pub warm_operations: u64,
}

impl Counters {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn snapshot(
        &self,
        current_size: usize,
        entry_count: usize,
        max_size: usize,
        max_entries: usize,
    ) -> CacheMetrics {
        CacheMetrics {
            hits: self.hits,
            misses: self.misses,
            hit_rate: self.hit_rate(),
            evictions: self.evictions,
            memory_evictions: self.memory_evictions,
            expired_cleanups: self.expired_cleanups,
            warm_operations: self.warm_operations,
            current_size_bytes: current_size,
            entry_count,
            average_entry_size: if entry_count == 0 {
                0.0
            } else {
                current_size as f64 / entry_count as f64
            },
            max_size_bytes: max_size,
            max_entries,
            utilization: if max_size == 0 {
                0.0
            } else {
                current_size as f64 / max_size as f64
            },
        }
    }
}

/// Outcome of one maintenance pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    pub expired: usize,
    pub evicted: usize,
}

/// Outcome of a warm-up batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WarmReport {
    pub loaded: usize,
    pub skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate_and_averages() {
        let c = Counters {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        let m = c.snapshot(400, 4, 1000, 10);
        assert_eq!(m.hit_rate, 0.75);
        assert_eq!(m.average_entry_size, 100.0);
        assert_eq!(m.utilization, 0.4);

        let empty = Counters::default().snapshot(0, 0, 1000, 10);
        assert_eq!(empty.hit_rate, 0.0);
        assert_eq!(empty.average_entry_size, 0.0);
    }
}
