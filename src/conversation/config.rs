//! Conversation cache configuration and provider TTL policy.

use crate::{Error, ErrorContext, Result};
use std::time::Duration;

/// TTL overrides for providers whose name contains any of `patterns`.
///
/// `None` falls back to the configured default for that kind of entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderTtlPolicy {
    pub patterns: Vec<String>,
    pub context_ttl: Option<Duration>,
    pub response_ttl: Option<Duration>,
}

impl ProviderTtlPolicy {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.into().to_lowercase())
                .collect(),
            context_ttl: None,
            response_ttl: None,
        }
    }

    pub fn with_context_ttl(mut self, ttl: Duration) -> Self {
        self.context_ttl = Some(ttl);
        self
    }

    pub fn with_response_ttl(mut self, ttl: Duration) -> Self {
        self.response_ttl = Some(ttl);
        self
    }

    pub fn matches(&self, provider: &str) -> bool {
        let provider = provider.to_lowercase();
        self.patterns.iter().any(|p| provider.contains(p.as_str()))
    }
}

/// Built-in policies for providers with long-lived prompt caches.
pub fn default_provider_policies() -> Vec<ProviderTtlPolicy> {
    vec![
        ProviderTtlPolicy::new(["minimax"])
            .with_context_ttl(Duration::from_secs(7200))
            .with_response_ttl(Duration::from_secs(3600)),
        ProviderTtlPolicy::new(["glm", "zhipu"]).with_response_ttl(Duration::from_secs(1800)),
        ProviderTtlPolicy::new(["kimi", "moonshot"]).with_response_ttl(Duration::from_secs(1800)),
    ]
}

#[derive(Debug, Clone)]
pub struct ConversationCacheConfig {
    pub enabled: bool,
    /// Messages kept per cached context; older ones are dropped first.
    pub max_history: usize,
    pub similarity_threshold: f64,
    pub default_context_ttl: Duration,
    pub default_response_ttl: Duration,
    /// Checked in order; the first matching policy wins.
    pub provider_policies: Vec<ProviderTtlPolicy>,
}

impl Default for ConversationCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_history: 50,
            similarity_threshold: 0.8,
            default_context_ttl: Duration::from_secs(3600),
            default_response_ttl: Duration::from_secs(1800),
            provider_policies: default_provider_policies(),
        }
    }
}

impl ConversationCacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_max_history(mut self, n: usize) -> Self {
        self.max_history = n;
        self
    }

    pub fn with_similarity_threshold(mut self, t: f64) -> Self {
        self.similarity_threshold = t;
        self
    }

    pub fn with_default_context_ttl(mut self, ttl: Duration) -> Self {
        self.default_context_ttl = ttl;
        self
    }

    pub fn with_default_response_ttl(mut self, ttl: Duration) -> Self {
        self.default_response_ttl = ttl;
        self
    }

    /// Register a policy ahead of the existing ones.
    pub fn with_provider_policy(mut self, policy: ProviderTtlPolicy) -> Self {
        self.provider_policies.insert(0, policy);
        self
    }

    fn policy_for(&self, provider: &str) -> Option<&ProviderTtlPolicy> {
        self.provider_policies.iter().find(|p| p.matches(provider))
    }

    pub fn context_ttl(&self, provider: &str) -> Duration {
        self.policy_for(provider)
            .and_then(|p| p.context_ttl)
            .unwrap_or(self.default_context_ttl)
    }

    pub fn response_ttl(&self, provider: &str) -> Duration {
        self.policy_for(provider)
            .and_then(|p| p.response_ttl)
            .unwrap_or(self.default_response_ttl)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_history == 0 {
            return Err(Error::validation_with_context(
                "max_history must be greater than zero",
                ErrorContext::new()
                    .with_field_path("conversation.max_history")
                    .with_source("conversation_config"),
            ));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(Error::validation_with_context(
                "similarity_threshold must be within [0, 1]",
                ErrorContext::new()
                    .with_field_path("conversation.similarity_threshold")
                    .with_details(format!("got {}", self.similarity_threshold))
                    .with_source("conversation_config"),
            ));
        }
        Ok(())
    }
}
