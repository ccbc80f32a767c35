//! # ai-gateway-cache
//!
//! 面向 AI 网关的进程内缓存：有界内存、TTL 过期、标签失效与会话级复用。
//!
//! In-process cache for AI gateways. It keeps identical conversational requests
//! from being recomputed or re-sent to upstream model providers.
//!
//! ## Overview
//!
//! Two layers:
//!
//! - **Cache engine** ([`cache`]): a bounded key/value store with a byte budget
//!   and an entry budget, per-entry TTL, tag grouping, strict LRU eviction on
//!   insert and priority-scored rebalancing from a background maintenance task.
//! - **Conversation cache** ([`conversation`]): derives deterministic keys for
//!   conversation contexts and exact-request responses, applies provider TTL
//!   policy and offers similarity lookup across cached contexts.
//!
//! The cache is advisory. Every operation is total: misses, expiry and
//! undecodable values all surface as absence, and callers recompute.
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Bounded engine, entries, eviction scoring, metrics |
//! | [`conversation`] | Context/response reuse and similarity search |
//! | [`types`] | Message types shared with provider wrappers |

pub mod cache;
pub mod conversation;
pub mod types;

pub use cache::{CacheConfig, CacheEngine, CacheMetrics, SetOptions};
pub use conversation::{ConversationCache, ConversationCacheConfig};
pub use types::{Message, MessageRole};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
