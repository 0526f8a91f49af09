/// Conversation context analysis
///
/// Wraps a `ContextInferenceProvider` with a TTL cache, per-conversation state
/// for debounced incremental updates, topic shift detection and persistence.
/// Analysis never fails from the caller's point of view: provider errors come
/// back as a fallback context flagged `fallback_used`.

use crate::config::EngineConfig;
use crate::core::{CacheLookup, CacheStatus, Debouncer, TtlCache};
use crate::db::{context_key, KeyValueStore};
use crate::error::{AdaptError, Result};
use crate::intelligence::inference::{ContextInferenceProvider, HeuristicInference, Inference};
use crate::models::{ContextShift, ConversationContext, Message, Sentiment, ShiftType};
use chrono::Utc;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

// Per-message prefix that goes into the cache key
const CACHE_KEY_CONTENT_CHARS: usize = 100;

const PIVOT_CONFIDENCE: f64 = 0.8;
const EXPANSION_CONFIDENCE: f64 = 0.6;

/// A context plus whether it came from the cache
#[derive(Debug, Clone, PartialEq)]
pub struct ContextAnalysis {
    pub context: ConversationContext,
    pub cache_status: CacheStatus,
}

type Conversations = Arc<RwLock<HashMap<String, ConversationContext>>>;

pub struct ContextAnalyzer {
    provider: Arc<dyn ContextInferenceProvider>,
    cache: RwLock<TtlCache<ConversationContext>>,
    conversations: Conversations,
    debouncer: Debouncer,
    store: Arc<dyn KeyValueStore>,
    max_topics: usize,
    shift_window: usize,
}

impl ContextAnalyzer {
    /// Analyzer backed by the keyword heuristics
    pub fn new(config: &EngineConfig, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            provider: Arc::new(HeuristicInference::new(config.max_topics)),
            cache: RwLock::new(TtlCache::new(config.context_cache_ttl())),
            conversations: Arc::new(RwLock::new(HashMap::new())),
            debouncer: Debouncer::new(config.debounce_window()),
            store,
            max_topics: config.max_topics,
            shift_window: config.shift_window,
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn ContextInferenceProvider>) -> Self {
        self.provider = provider;
        self
    }

    pub async fn analyze_context(&self, messages: &[Message]) -> ConversationContext {
        self.analyze_context_detailed(messages).await.context
    }

    /// Analyze, reporting whether the cache answered
    pub async fn analyze_context_detailed(&self, messages: &[Message]) -> ContextAnalysis {
        if messages.is_empty() {
            return ContextAnalysis {
                context: ConversationContext::fallback(),
                cache_status: CacheStatus::Miss,
            };
        }

        let key = cache_key(messages);

        if let CacheLookup::Hit(context) = self.cache.read().await.get(&key) {
            tracing::debug!(key = %key, "context cache hit");
            return ContextAnalysis {
                context,
                cache_status: CacheStatus::Hit,
            };
        }
        tracing::debug!(key = %key, messages = messages.len(), "context cache miss");

        let context = match self.provider.infer(messages).await {
            Ok(inference) => {
                let context = self.build_context(format!("context_{}", key), inference);
                self.cache.write().await.insert(key, context.clone());
                context
            }
            Err(e) => {
                tracing::warn!(error = %e, "context analysis failed, using fallback");
                ConversationContext::failed_analysis()
            }
        };

        ContextAnalysis {
            context,
            cache_status: CacheStatus::Miss,
        }
    }

    /// Analyze and remember the result as the conversation's current context
    pub async fn analyze_conversation(&self, conversation_id: &str, messages: &[Message]) -> ConversationContext {
        let mut context = self.analyze_context(messages).await;
        context.id = conversation_id.to_string();

        self.conversations
            .write()
            .await
            .insert(conversation_id.to_string(), context.clone());

        context
    }

    pub async fn get_context(&self, conversation_id: &str) -> Option<ConversationContext> {
        self.conversations.read().await.get(conversation_id).cloned()
    }

    /// Fold one new message into the conversation's context
    ///
    /// Debounced per conversation: within a burst only the last call runs and
    /// its handle yields the updated context; earlier handles yield `None`.
    pub fn update_context_with_new_message(
        &self,
        conversation_id: &str,
        message: Message,
    ) -> JoinHandle<Option<ConversationContext>> {
        let provider = Arc::clone(&self.provider);
        let conversations = Arc::clone(&self.conversations);
        let conversation_id_owned = conversation_id.to_string();
        let max_topics = self.max_topics;

        self.debouncer.schedule(conversation_id, move || async move {
            apply_update(provider, conversations, conversation_id_owned, message, max_topics).await
        })
    }

    /// Topic discontinuities between each message and the window before it
    pub async fn detect_context_shifts(&self, messages: &[Message]) -> Vec<ContextShift> {
        let mut topic_sets = Vec::with_capacity(messages.len());
        for message in messages {
            match self.provider.extract_topics(&message.content).await {
                Ok(topics) => topic_sets.push(topics),
                Err(e) => {
                    tracing::warn!(error = %e, "topic extraction failed, no shifts reported");
                    return Vec::new();
                }
            }
        }

        let mut shifts = Vec::new();

        for index in 1..messages.len() {
            let start = index.saturating_sub(self.shift_window);
            let mut prior: Vec<&String> = Vec::new();
            for topic in topic_sets[start..index].iter().flatten() {
                if !prior.contains(&topic) {
                    prior.push(topic);
                }
            }
            if prior.is_empty() {
                continue;
            }

            let current = &topic_sets[index];
            let Some(new_topic) = current.iter().find(|t| !prior.contains(t)) else {
                continue;
            };

            let (shift_type, confidence, from_topic) = match current.iter().find(|t| prior.contains(t)) {
                Some(shared) => (ShiftType::Expansion, EXPANSION_CONFIDENCE, shared),
                None => match prior.last() {
                    Some(last) => (ShiftType::Pivot, PIVOT_CONFIDENCE, *last),
                    None => continue,
                },
            };

            shifts.push(ContextShift {
                from_topic: from_topic.clone(),
                to_topic: new_topic.clone(),
                shift_type,
                confidence,
                message_index: index,
                timestamp: messages[index].timestamp,
            });
        }

        shifts
    }

    /// Store a context under `context_<conversationId>`. Invalid data is rejected.
    pub async fn persist_context(&self, conversation_id: &str, context: &ConversationContext) -> Result<()> {
        context.validate(self.max_topics)?;

        self.store
            .set(&context_key(conversation_id), serde_json::to_value(context)?)
            .await
    }

    /// Same as `persist_context` for data that arrives as raw JSON
    pub async fn persist_context_value(&self, conversation_id: &str, value: Value) -> Result<()> {
        let context: ConversationContext =
            serde_json::from_value(value).map_err(|e| AdaptError::InvalidContext(e.to_string()))?;

        self.persist_context(conversation_id, &context).await
    }

    /// Read a stored context. Missing or unreadable entries come back as `None`.
    pub async fn get_persisted_context(&self, conversation_id: &str) -> Result<Option<ConversationContext>> {
        let Some(raw) = self.store.get(&context_key(conversation_id)).await? else {
            return Ok(None);
        };

        let context: ConversationContext = match serde_json::from_value(raw) {
            Ok(context) => context,
            Err(e) => {
                tracing::warn!(conversation_id, error = %e, "ignoring malformed stored context");
                return Ok(None);
            }
        };

        if let Err(e) = context.validate(self.max_topics) {
            tracing::warn!(conversation_id, error = %e, "ignoring invalid stored context");
            return Ok(None);
        }

        Ok(Some(context))
    }

    /// Drop expired cache entries
    pub async fn sweep_cache(&self) -> usize {
        let removed = self.cache.write().await.sweep_expired();
        if removed > 0 {
            tracing::debug!(removed, "context cache swept");
        }
        removed
    }

    pub async fn cache_len(&self) -> usize {
        self.cache.read().await.len()
    }

    fn build_context(&self, id: String, inference: Inference) -> ConversationContext {
        let mut context = ConversationContext {
            id,
            topics: Vec::new(),
            sentiment: inference.sentiment,
            user_intent: inference.user_intent,
            complexity_level: inference.complexity_level,
            expertise_level: inference.expertise_level,
            last_analyzed: Utc::now(),
            error: None,
            fallback_used: false,
            is_fallback: false,
        };
        context.merge_topics(inference.topics, self.max_topics);
        context
    }
}

async fn apply_update(
    provider: Arc<dyn ContextInferenceProvider>,
    conversations: Conversations,
    conversation_id: String,
    message: Message,
    max_topics: usize,
) -> ConversationContext {
    let existing = conversations.read().await.get(&conversation_id).cloned();

    let updated = match (existing, provider.infer(std::slice::from_ref(&message)).await) {
        (Some(mut context), Ok(inference)) => {
            context.merge_topics(inference.topics, max_topics);
            if inference.sentiment != Sentiment::Neutral {
                context.sentiment = inference.sentiment;
            }
            context.last_analyzed = Utc::now();
            context
        }
        (None, Ok(inference)) => {
            let mut context = ConversationContext {
                id: conversation_id.clone(),
                sentiment: inference.sentiment,
                user_intent: inference.user_intent,
                complexity_level: inference.complexity_level,
                expertise_level: inference.expertise_level,
                ..ConversationContext::fallback()
            };
            context.is_fallback = false;
            context.merge_topics(inference.topics, max_topics);
            context
        }
        (Some(context), Err(e)) => {
            tracing::warn!(conversation_id = %conversation_id, error = %e, "incremental analysis failed, keeping context");
            context
        }
        (None, Err(e)) => {
            tracing::warn!(conversation_id = %conversation_id, error = %e, "incremental analysis failed, using fallback");
            ConversationContext {
                id: conversation_id.clone(),
                ..ConversationContext::failed_analysis()
            }
        }
    };

    conversations
        .write()
        .await
        .insert(conversation_id, updated.clone());

    updated
}

fn cache_key(messages: &[Message]) -> String {
    let joined = messages
        .iter()
        .map(|m| {
            let content: String = m.content.chars().take(CACHE_KEY_CONTENT_CHARS).collect();
            format!("{}:{}", m.role, content)
        })
        .collect::<Vec<_>>()
        .join("|");

    let digest = Sha256::digest(joined.as_bytes());
    digest.iter().take(8).map(|b| format!("{:02x}", b)).collect()
}
