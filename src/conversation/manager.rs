//! Conversation cache: provider/model-aware facade over the cache engine.

use super::config::ConversationCacheConfig;
use super::similarity::jaccard_similarity;
use super::types::{
    CachedResponse, ConversationCacheStats, ConversationContext, RequestDescriptor,
    ResponsePayload, SimilarContext, KEY_HASH_LEN,
};
use crate::cache::key::short_hash;
use crate::cache::{CacheEngine, SetOptions};
use crate::types::Message;
use crate::Result;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

const KIND_CONTEXT: &str = "kind:context";
const KIND_RESPONSE: &str = "kind:response";

fn provider_tag(provider: &str) -> String {
    format!("provider:{}", provider)
}

fn model_tag(model: &str) -> String {
    format!("model:{}", model)
}

fn conversation_tag(conversation_id: &str) -> String {
    format!("conversation:{}", conversation_id)
}

pub fn context_key(conversation_id: &str, provider: &str, model: &str) -> String {
    format!(
        "context:{}:{}:{}",
        short_hash(conversation_id, KEY_HASH_LEN),
        provider,
        model
    )
}

pub fn response_key(request: &RequestDescriptor, provider: &str, model: &str) -> String {
    format!("response:{}:{}:{}", request.request_hash(), provider, model)
}

/// Context and response reuse for provider wrappers.
///
/// All storage, expiry and eviction is delegated to the shared [`CacheEngine`].
/// Reads fail open: anything that cannot be decoded is reported as a miss.
pub struct ConversationCache {
    engine: Arc<CacheEngine>,
    config: ConversationCacheConfig,
}

impl ConversationCache {
    pub fn new(engine: Arc<CacheEngine>, config: ConversationCacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { engine, config })
    }

    pub fn engine(&self) -> &Arc<CacheEngine> {
        &self.engine
    }

    pub fn config(&self) -> &ConversationCacheConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Store the latest `max_history` messages of a conversation.
    ///
    /// Returns the context as stored, or `None` when caching is disabled or
    /// the engine refused the value.
    pub async fn cache_conversation_context(
        &self,
        conversation_id: &str,
        messages: &[Message],
        provider: &str,
        model: &str,
        system_prompt: Option<&str>,
        metadata: Option<Map<String, Value>>,
    ) -> Option<ConversationContext> {
        if !self.config.enabled {
            return None;
        }
        let keep_from = messages.len().saturating_sub(self.config.max_history);
        let now = Utc::now();
        let context = ConversationContext {
            conversation_id: conversation_id.to_string(),
            messages: messages[keep_from..].to_vec(),
            provider: provider.to_string(),
            model: model.to_string(),
            system_prompt: system_prompt.map(str::to_string),
            metadata: metadata.unwrap_or_default(),
            created_at: now,
            last_accessed: now,
        };

        let opts = SetOptions::new()
            .with_ttl(self.config.context_ttl(provider))
            .with_tags([
                KIND_CONTEXT.to_string(),
                conversation_tag(conversation_id),
                provider_tag(provider),
                model_tag(model),
            ]);
        let key = context_key(conversation_id, provider, model);
        if self.store(&key, &context, opts).await {
            debug!(
                "Cached context {} ({} of {} messages)",
                key,
                context.messages.len(),
                messages.len()
            );
            Some(context)
        } else {
            None
        }
    }

    pub async fn get_conversation_context(
        &self,
        conversation_id: &str,
        provider: &str,
        model: &str,
    ) -> Option<ConversationContext> {
        if !self.config.enabled {
            return None;
        }
        self.load(&context_key(conversation_id, provider, model))
            .await
    }

    /// Cache a response for exact reuse by an identical request.
    pub async fn cache_response(
        &self,
        provider: &str,
        model: &str,
        request: &RequestDescriptor,
        payload: ResponsePayload,
    ) -> Option<CachedResponse> {
        if !self.config.enabled {
            return None;
        }
        let response = CachedResponse {
            response_id: short_hash(&payload.content, KEY_HASH_LEN),
            content: payload.content,
            model: model.to_string(),
            provider: provider.to_string(),
            usage: payload.usage,
            reasoning: payload.reasoning,
            metadata: payload.metadata,
            timestamp: Utc::now(),
        };

        let opts = SetOptions::new()
            .with_ttl(self.config.response_ttl(provider))
            .with_tags([KIND_RESPONSE.to_string(), provider_tag(provider), model_tag(model)]);
        let key = response_key(request, provider, model);
        if self.store(&key, &response, opts).await {
            debug!("Cached response {}", key);
            Some(response)
        } else {
            None
        }
    }

    pub async fn get_cached_response(
        &self,
        provider: &str,
        model: &str,
        request: &RequestDescriptor,
    ) -> Option<CachedResponse> {
        if !self.config.enabled {
            return None;
        }
        self.load(&response_key(request, provider, model)).await
    }

    /// Drop the cached response for one exact request.
    pub async fn invalidate_response(
        &self,
        provider: &str,
        model: &str,
        request: &RequestDescriptor,
    ) -> bool {
        self.engine
            .delete(&response_key(request, provider, model))
            .await
    }

    /// Contexts for `provider`/`model` whose last message resembles `content`.
    ///
    /// Scores below the configured threshold are dropped; the rest come back
    /// best first, at most `limit` of them.
    pub async fn find_similar_contexts(
        &self,
        content: &str,
        provider: &str,
        model: &str,
        limit: usize,
    ) -> Vec<SimilarContext> {
        if !self.config.enabled || limit == 0 {
            return Vec::new();
        }
        let candidates = self
            .engine
            .get_by_tags([KIND_CONTEXT.to_string(), provider_tag(provider), model_tag(model)])
            .await;

        let mut matches: Vec<SimilarContext> = candidates
            .into_iter()
            .filter_map(|(key, value)| match serde_json::from_value::<ConversationContext>(value) {
                Ok(ctx) => Some(ctx),
                Err(e) => {
                    warn!("Skipping undecodable context {}: {}", key, e);
                    None
                }
            })
            .filter_map(|ctx| {
                let last = ctx.last_message()?.text();
                let score = jaccard_similarity(content, &last);
                (score >= self.config.similarity_threshold).then(|| SimilarContext {
                    conversation_id: ctx.conversation_id,
                    score,
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.conversation_id.cmp(&b.conversation_id))
        });
        matches.truncate(limit);
        matches
    }

    pub async fn clear_conversation(&self, conversation_id: &str, provider: &str, model: &str) -> bool {
        self.engine
            .delete(&context_key(conversation_id, provider, model))
            .await
    }

    /// Remove every context and response cached for `provider`.
    pub async fn clear_provider_cache(&self, provider: &str) -> usize {
        self.engine.clear_tags([provider_tag(provider)]).await
    }

    pub async fn clear_model_cache(&self, model: &str) -> usize {
        self.engine.clear_tags([model_tag(model)]).await
    }

    pub async fn cache_stats(&self) -> ConversationCacheStats {
        let engine = self.engine.metrics().await;
        let tags = self.engine.tag_counts().await;

        let mut providers = Vec::new();
        let mut models = Vec::new();
        for tag in tags.keys() {
            if let Some(p) = tag.strip_prefix("provider:") {
                providers.push(p.to_string());
            } else if let Some(m) = tag.strip_prefix("model:") {
                models.push(m.to_string());
            }
        }
        providers.sort();
        models.sort();

        ConversationCacheStats {
            engine,
            cached_contexts: tags.get(KIND_CONTEXT).copied().unwrap_or(0),
            cached_responses: tags.get(KIND_RESPONSE).copied().unwrap_or(0),
            providers,
            models,
        }
    }

    pub async fn close(&self) {
        self.engine.close().await;
    }

    async fn store<T: Serialize>(&self, key: &str, value: &T, opts: SetOptions) -> bool {
        match serde_json::to_value(value) {
            Ok(v) => self.engine.set_with(key, v, opts).await,
            Err(e) => {
                warn!("Not caching {}: {}", key, e);
                false
            }
        }
    }

    async fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.engine.get(key).await?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Discarding undecodable cache entry {}: {}", key, e);
                None
            }
        }
    }
}
