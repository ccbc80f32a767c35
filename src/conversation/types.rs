//! Values stored and returned by the conversation cache.

use crate::cache::key::{canonical_json, short_hash};
use crate::cache::CacheMetrics;
use crate::types::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Hex characters kept from a digest when it becomes part of a key.
pub const KEY_HASH_LEN: usize = 16;

/// A conversation's recent history for one provider/model pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub conversation_id: String,
    pub messages: Vec<Message>,
    pub provider: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

impl ConversationContext {
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// A provider response reusable for byte-identical requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResponse {
    /// Content hash of `content`.
    pub response_id: String,
    pub content: String,
    pub model: String,
    pub provider: String,
    pub usage: TokenUsage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

/// The request fields that decide whether a cached response may be reused.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestDescriptor {
    pub messages: Vec<Message>,
    pub system_prompt: Option<String>,
    pub temperature: f64,
    pub extra_params: Map<String, Value>,
}

impl RequestDescriptor {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            system_prompt: None,
            temperature: 0.7,
            extra_params: Map::new(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_temperature(mut self, t: f64) -> Self {
        self.temperature = t;
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra_params.insert(key.into(), value);
        self
    }

    /// First 16 hex characters of the SHA-256 of the sorted-key JSON form.
    pub fn request_hash(&self) -> String {
        let descriptor = json!({
            "messages": self.messages,
            "system_prompt": self.system_prompt,
            "temperature": self.temperature,
            "extra_params": self.extra_params,
        });
        short_hash(&canonical_json(&descriptor), KEY_HASH_LEN)
    }
}

/// Response fields supplied by the caller when caching.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponsePayload {
    pub content: String,
    pub usage: TokenUsage,
    pub reasoning: Option<String>,
    pub metadata: Map<String, Value>,
}

impl ResponsePayload {
    pub fn new(content: impl Into<String>, usage: TokenUsage) -> Self {
        Self {
            content: content.into(),
            usage,
            reasoning: None,
            metadata: Map::new(),
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarContext {
    pub conversation_id: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationCacheStats {
    pub engine: CacheMetrics,
    pub cached_contexts: usize,
    pub cached_responses: usize,
    pub providers: Vec<String>,
    pub models: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_hash_ignores_param_order() {
        let a = RequestDescriptor::new(vec![Message::user("hi")])
            .with_param("top_p", json!(0.9))
            .with_param("max_tokens", json!(128));
        let b = RequestDescriptor::new(vec![Message::user("hi")])
            .with_param("max_tokens", json!(128))
            .with_param("top_p", json!(0.9));
        assert_eq!(a.request_hash(), b.request_hash());
        assert_eq!(a.request_hash().len(), KEY_HASH_LEN);
    }

    #[test]
    fn test_request_hash_sensitive_to_every_field() {
        let base = RequestDescriptor::new(vec![Message::user("hi")]);
        let h = base.request_hash();
        assert_ne!(h, base.clone().with_temperature(0.2).request_hash());
        assert_ne!(h, base.clone().with_system_prompt("be brief").request_hash());
        assert_ne!(h, base.clone().with_param("seed", json!(1)).request_hash());
        assert_ne!(
            h,
            RequestDescriptor::new(vec![Message::user("hi!")]).request_hash()
        );
    }

    #[test]
    fn test_token_usage_total() {
        assert_eq!(TokenUsage::new(10, 5).total_tokens, 15);
    }
}
