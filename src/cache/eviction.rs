//! Priority scoring for periodic rebalancing.
//!
//! Lower scores are evicted first.

use super::entry::CacheEntry;
use tokio::time::Instant;

const FREQUENCY_WEIGHT: f64 = 0.4;
const AGE_WEIGHT: f64 = 0.3;
const SIZE_WEIGHT: f64 = 0.2;
const TTL_WEIGHT: f64 = 0.1;

/// Ages at or beyond a day score the maximum.
const AGE_SATURATION_SECS: f64 = 86_400.0;
/// Sizes at or beyond one megabyte score the maximum.
const SIZE_SATURATION_BYTES: f64 = 1_048_576.0;

/// Fraction of each budget that rebalancing drains down to.
pub const REBALANCE_TARGET: f64 = 0.9;

pub fn priority_score(entry: &CacheEntry, now: Instant) -> f64 {
    let age = entry.age(now).as_secs_f64();

    let freq = 1.0 / (1.0 + entry.access_frequency(now));
    let age_score = (age / AGE_SATURATION_SECS).min(1.0);
    let size_score = (entry.size_bytes as f64 / SIZE_SATURATION_BYTES).min(1.0);
    let ttl_score = match entry.ttl {
        Some(ttl) if !ttl.is_zero() => {
            let total = ttl.as_secs_f64();
            (total - age).max(0.0) / total
        }
        _ => 0.0,
    };

    FREQUENCY_WEIGHT * freq
        + AGE_WEIGHT * age_score
        + SIZE_WEIGHT * size_score
        + TTL_WEIGHT * (1.0 - ttl_score)
}
