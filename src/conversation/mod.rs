//! 会话缓存模块：基于缓存引擎的会话上下文与响应复用。
//!
//! # Conversation Cache Module
//!
//! Provider/model-aware caching built entirely on [`CacheEngine`](crate::cache::CacheEngine):
//!
//! - **Context reuse**: the recent history of a conversation, keyed by a hash
//!   of the conversation id plus provider and model.
//! - **Response reuse**: exact-match caching keyed by a hash of the canonical
//!   (sorted-key JSON) request descriptor. Any change to messages, system
//!   prompt, temperature or extra parameters yields a different key.
//! - **Similarity lookup**: token-set Jaccard comparison against the last
//!   message of each cached context for a provider/model pair.
//!
//! ## Provider TTL policy
//!
//! | Provider | Context TTL | Response TTL |
//! |----------|-------------|--------------|
//! | minimax | 7200s | 3600s |
//! | glm / zhipu | default | 1800s |
//! | kimi / moonshot | default | 1800s |
//! | others | 3600s | 1800s |
//!
//! ## Example
//!
//! ```rust
//! use ai_gateway_cache::cache::{CacheConfig, CacheEngine};
//! use ai_gateway_cache::conversation::{
//!     ConversationCache, ConversationCacheConfig, RequestDescriptor, ResponsePayload, TokenUsage,
//! };
//! use ai_gateway_cache::types::Message;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> ai_gateway_cache::Result<()> {
//! let engine = Arc::new(CacheEngine::new(CacheConfig::default())?);
//! let cache = ConversationCache::new(engine, ConversationCacheConfig::default())?;
//!
//! let request = RequestDescriptor::new(vec![Message::user("What is Rust?")]).with_temperature(0.0);
//! cache
//!     .cache_response("openai", "gpt-4o", &request, ResponsePayload::new("A language.", TokenUsage::new(4, 3)))
//!     .await;
//! let hit = cache.get_cached_response("openai", "gpt-4o", &request).await;
//! assert_eq!(hit.map(|r| r.content).as_deref(), Some("A language."));
//! cache.close().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod manager;
mod similarity;
mod types;

pub use config::{default_provider_policies, ConversationCacheConfig, ProviderTtlPolicy};
pub use manager::{context_key, response_key, ConversationCache};
pub use similarity::jaccard_similarity;
pub use types::{
    CachedResponse, ConversationCacheStats, ConversationContext, RequestDescriptor,
    ResponsePayload, SimilarContext, TokenUsage, KEY_HASH_LEN,
};
