use ai_gateway_cache::cache::{CacheConfig, CacheEngine};
use ai_gateway_cache::conversation::{
    context_key, ConversationCache, ConversationCacheConfig, RequestDescriptor, ResponsePayload,
    TokenUsage,
};
use ai_gateway_cache::types::Message;
use serde_json::{json, Map};
use std::sync::Arc;
use std::time::Duration;

fn cache_with(config: ConversationCacheConfig) -> ConversationCache {
    let engine = CacheEngine::new(
        CacheConfig::default().with_maintenance_interval(Duration::ZERO),
    )
    .expect("valid cache config");
    ConversationCache::new(Arc::new(engine), config).expect("valid conversation config")
}

fn cache() -> ConversationCache {
    cache_with(ConversationCacheConfig::default())
}

fn history(n: usize) -> Vec<Message> {
    (0..n).map(|i| Message::user(format!("message {}", i))).collect()
}

#[tokio::test]
async fn test_context_history_is_capped() {
    let cache = cache_with(ConversationCacheConfig::default().with_max_history(3));
    let stored = cache
        .cache_conversation_context("conv-1", &history(5), "openai", "gpt-4o", None, None)
        .await
        .unwrap();
    assert_eq!(stored.messages, history(5)[2..].to_vec());

    let loaded = cache
        .get_conversation_context("conv-1", "openai", "gpt-4o")
        .await
        .unwrap();
    let texts: Vec<String> = loaded.messages.iter().map(|m| m.text()).collect();
    assert_eq!(texts, ["message 2", "message 3", "message 4"]);
}

#[tokio::test]
async fn test_context_round_trip_is_scoped_by_provider_and_model() {
    let cache = cache();
    let mut meta = Map::new();
    meta.insert("tenant".into(), json!("acme"));
    cache
        .cache_conversation_context(
            "conv-1",
            &history(2),
            "anthropic",
            "claude-3-5-sonnet",
            Some("be terse"),
            Some(meta),
        )
        .await;

    let ctx = cache
        .get_conversation_context("conv-1", "anthropic", "claude-3-5-sonnet")
        .await
        .unwrap();
    assert_eq!(ctx.conversation_id, "conv-1");
    assert_eq!(ctx.system_prompt.as_deref(), Some("be terse"));
    assert_eq!(ctx.metadata.get("tenant"), Some(&json!("acme")));

    assert!(cache
        .get_conversation_context("conv-1", "anthropic", "claude-3-haiku")
        .await
        .is_none());
    assert!(cache
        .get_conversation_context("conv-1", "openai", "claude-3-5-sonnet")
        .await
        .is_none());
    assert!(cache
        .get_conversation_context("conv-2", "anthropic", "claude-3-5-sonnet")
        .await
        .is_none());
}

#[tokio::test]
async fn test_response_key_ignores_extra_param_order() {
    let cache = cache();
    let written = RequestDescriptor::new(history(2))
        .with_system_prompt("sys")
        .with_temperature(0.2)
        .with_param("max_tokens", json!(256))
        .with_param("stop", json!(["\n"]));
    let payload = ResponsePayload::new("cached answer", TokenUsage::new(12, 3))
        .with_reasoning("because");
    let stored = cache
        .cache_response("openai", "gpt-4o", &written, payload)
        .await
        .unwrap();

    let reordered = RequestDescriptor::new(history(2))
        .with_system_prompt("sys")
        .with_temperature(0.2)
        .with_param("stop", json!(["\n"]))
        .with_param("max_tokens", json!(256));
    let hit = cache
        .get_cached_response("openai", "gpt-4o", &reordered)
        .await
        .unwrap();
    assert_eq!(hit, stored);
    assert_eq!(hit.content, "cached answer");
    assert_eq!(hit.usage.total_tokens, 15);
    assert_eq!(hit.reasoning.as_deref(), Some("because"));
    assert_eq!(hit.response_id.len(), 16);

    let warmer = reordered.clone().with_temperature(0.3);
    assert!(cache
        .get_cached_response("openai", "gpt-4o", &warmer)
        .await
        .is_none());
    assert!(cache
        .get_cached_response("openai", "gpt-4o-mini", &reordered)
        .await
        .is_none());
}

#[tokio::test]
async fn test_invalidate_response() {
    let cache = cache();
    let req = RequestDescriptor::new(history(1));
    cache
        .cache_response("glm", "glm-4", &req, ResponsePayload::new("x", TokenUsage::default()))
        .await;
    assert!(cache.invalidate_response("glm", "glm-4", &req).await);
    assert!(cache.get_cached_response("glm", "glm-4", &req).await.is_none());
    assert!(!cache.invalidate_response("glm", "glm-4", &req).await);
}

async fn seed_contexts(cache: &ConversationCache) {
    let convs = [
        ("exact", "how do I reverse a list in python"),
        ("close", "how do I reverse a list in rust"),
        ("far", "what is the weather today"),
    ];
    for (id, last) in convs {
        let messages = vec![Message::system("assistant"), Message::user(last)];
        cache
            .cache_conversation_context(id, &messages, "openai", "gpt-4o", None, None)
            .await;
    }
    // same text, other model: never a candidate
    cache
        .cache_conversation_context(
            "other-model",
            &[Message::user("how do I reverse a list in python")],
            "openai",
            "gpt-4o-mini",
            None,
            None,
        )
        .await;
}

#[tokio::test]
async fn test_similar_contexts_respect_threshold() {
    let cache = cache();
    seed_contexts(&cache).await;

    let found = cache
        .find_similar_contexts("How do I reverse a list in Python", "openai", "gpt-4o", 10)
        .await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].conversation_id, "exact");
    assert_eq!(found[0].score, 1.0);
}

#[tokio::test]
async fn test_similar_contexts_are_ranked() {
    let cache = cache_with(ConversationCacheConfig::default().with_similarity_threshold(0.5));
    seed_contexts(&cache).await;

    let found = cache
        .find_similar_contexts("how do I reverse a list in python", "openai", "gpt-4o", 10)
        .await;
    let ids: Vec<&str> = found.iter().map(|s| s.conversation_id.as_str()).collect();
    assert_eq!(ids, ["exact", "close"]);
    assert!(found[0].score > found[1].score);
    assert!((found[1].score - 7.0 / 9.0).abs() < 1e-9);

    let top = cache
        .find_similar_contexts("how do I reverse a list in python", "openai", "gpt-4o", 1)
        .await;
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].conversation_id, "exact");
}

#[tokio::test]
async fn test_clear_conversation_and_provider() {
    let cache = cache();
    let req = RequestDescriptor::new(history(1));
    cache
        .cache_conversation_context("a", &history(1), "kimi", "moonshot-v1", None, None)
        .await;
    cache
        .cache_conversation_context("b", &history(1), "kimi", "moonshot-v1", None, None)
        .await;
    cache
        .cache_response("kimi", "moonshot-v1", &req, ResponsePayload::new("r", TokenUsage::default()))
        .await;
    cache
        .cache_response("openai", "gpt-4o", &req, ResponsePayload::new("r", TokenUsage::default()))
        .await;

    assert!(cache.clear_conversation("a", "kimi", "moonshot-v1").await);
    assert!(cache
        .get_conversation_context("a", "kimi", "moonshot-v1")
        .await
        .is_none());

    assert_eq!(cache.clear_provider_cache("kimi").await, 2);
    assert!(cache
        .get_conversation_context("b", "kimi", "moonshot-v1")
        .await
        .is_none());
    assert!(cache
        .get_cached_response("openai", "gpt-4o", &req)
        .await
        .is_some());

    assert_eq!(cache.clear_model_cache("gpt-4o").await, 1);
}

#[tokio::test]
async fn test_cache_stats() {
    let cache = cache();
    let req = RequestDescriptor::new(history(1));
    cache
        .cache_conversation_context("a", &history(2), "openai", "gpt-4o", None, None)
        .await;
    cache
        .cache_conversation_context("b", &history(2), "minimax", "abab6.5", None, None)
        .await;
    cache
        .cache_response("openai", "gpt-4o", &req, ResponsePayload::new("r", TokenUsage::default()))
        .await;
    cache.get_cached_response("openai", "gpt-4o", &req).await;
    cache.get_cached_response("openai", "gpt-4", &req).await;

    let stats = cache.cache_stats().await;
    assert_eq!(stats.cached_contexts, 2);
    assert_eq!(stats.cached_responses, 1);
    assert_eq!(stats.providers, ["minimax", "openai"]);
    assert_eq!(stats.models, ["abab6.5", "gpt-4o"]);
    assert_eq!(stats.engine.entry_count, 3);
    assert_eq!(stats.engine.hits, 1);
    assert_eq!(stats.engine.misses, 1);
}

#[tokio::test(start_paused = true)]
async fn test_provider_ttl_policy_applies() {
    let cache = cache();
    cache
        .cache_conversation_context("long", &history(1), "minimax", "abab6.5", None, None)
        .await;
    cache
        .cache_conversation_context("std", &history(1), "openai", "gpt-4o", None, None)
        .await;

    tokio::time::sleep(Duration::from_secs(3601)).await;
    assert!(cache
        .get_conversation_context("std", "openai", "gpt-4o")
        .await
        .is_none());
    assert!(cache
        .get_conversation_context("long", "minimax", "abab6.5")
        .await
        .is_some());

    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert!(cache
        .get_conversation_context("long", "minimax", "abab6.5")
        .await
        .is_none());
}

#[tokio::test]
async fn test_undecodable_entry_reads_as_miss() {
    let cache = cache();
    cache
        .engine()
        .set(context_key("conv", "openai", "gpt-4o"), json!({"not": "a context"}))
        .await;
    assert!(cache
        .get_conversation_context("conv", "openai", "gpt-4o")
        .await
        .is_none());
}

#[tokio::test]
async fn test_disabled_cache_always_misses() {
    let cache = cache_with(ConversationCacheConfig::default().with_enabled(false));
    let req = RequestDescriptor::new(history(1));
    assert!(cache
        .cache_conversation_context("a", &history(1), "openai", "gpt-4o", None, None)
        .await
        .is_none());
    assert!(cache
        .cache_response("openai", "gpt-4o", &req, ResponsePayload::new("r", TokenUsage::default()))
        .await
        .is_none());
    assert!(cache
        .get_conversation_context("a", "openai", "gpt-4o")
        .await
        .is_none());
    assert!(cache.get_cached_response("openai", "gpt-4o", &req).await.is_none());
    assert!(cache.engine().is_empty().await);
}

#[test]
fn test_invalid_conversation_config_is_rejected() {
    let engine = CacheEngine::new(CacheConfig::default()).unwrap();
    let result = ConversationCache::new(
        Arc::new(engine),
        ConversationCacheConfig::default().with_similarity_threshold(-0.1),
    );
    assert!(result.is_err());
}
