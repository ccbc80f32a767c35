//! 缓存引擎模块：有界内存键值缓存，支持 TTL 过期、标签分组与双层淘汰。
//!
//! # Cache Engine Module
//!
//! A memory-bounded key/value store that enforces both a byte-size budget and
//! an entry-count budget, with per-entry TTL, tag-based grouping and
//! value-aware eviction.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CacheEngine`] | Async facade owning the state lock and maintenance task |
//! | [`CacheConfig`] | Budgets, default TTL and maintenance interval |
//! | [`SetOptions`] | Per-write TTL choice and tags |
//! | [`CacheMetrics`] | Hit/miss counters, eviction counters and occupancy |
//! | [`priority_score`] | Composite score used by periodic rebalancing |
//!
//! ## Eviction
//!
//! Two tiers cooperate:
//!
//! 1. **Insert-time LRU**: before every write, least-recently-used entries are
//!    dropped until the new value fits both budgets. Cheap and strict.
//! 2. **Periodic rebalancing**: each maintenance tick first sweeps expired
//!    entries, then, if the cache sits at a budget, ranks entries by
//!    [`priority_score`] and evicts the lowest until size and count are both at
//!    or below 90% of their limits.
//!
//! ## Example
//!
//! ```rust
//! use ai_gateway_cache::cache::{CacheConfig, CacheEngine, SetOptions};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> ai_gateway_cache::Result<()> {
//! let cache = CacheEngine::new(CacheConfig::new().with_max_entries(1000))?;
//! cache
//!     .set_with(
//!         "user:42",
//!         json!({"name": "Ada"}),
//!         SetOptions::new().with_ttl(Duration::from_secs(60)).with_tag("users"),
//!     )
//!     .await;
//! assert_eq!(cache.get("user:42").await, Some(json!({"name": "Ada"})));
//! assert_eq!(cache.clear_tags(["users"]).await, 1);
//! cache.close().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod engine;
mod entry;
mod eviction;
pub mod key;
mod metrics;
mod state;

pub use config::CacheConfig;
pub use engine::CacheEngine;
pub use entry::{estimate_size, CacheEntry, Expiry, SetOptions, WarmEntry, DEFAULT_ENTRY_SIZE};
pub use eviction::{priority_score, REBALANCE_TARGET};
pub use metrics::{CacheMetrics, MaintenanceReport, WarmReport};
