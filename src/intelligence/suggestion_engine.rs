/// Suggestion engine
///
/// Generates quick replies, action suggestions, follow-ups and clarifications
/// from the recent message window. Quick replies are cached per conversation
/// and recent-message hash. Ranking and learning use the feedback each user
/// leaves on what we suggested.

use crate::config::EngineConfig;
use crate::core::{CacheLookup, TtlCache};
use crate::error::Result;
use crate::intelligence::feedback::{self, FeedbackLog, LearnedPreferences};
use crate::intelligence::inference::{ContextInferenceProvider, HeuristicInference};
use crate::intelligence::Scorer;
use crate::models::{ConversationContext, Message, Priority, SmartSuggestion, SuggestionFeedback, SuggestionType};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

// Messages that feed the quick-reply cache key
const WINDOW: usize = 3;

// Remember issued suggestions long enough for feedback to arrive
const ISSUED_TTL_MINUTES: i64 = 30;

type Candidates = &'static [(&'static str, f64)];

// Trigger phrases on the last message -> (family, replies)
const QUICK_REPLY_TEMPLATES: &[(&[&str], &str, Candidates)] = &[
    (
        &["does that help", "did that work", "does this make sense", "make sense?"],
        "confirmation",
        &[("Yes, that helps!", 0.9), ("Not quite, can you explain it differently?", 0.8), ("Can you show an example?", 0.7)],
    ),
    (
        &["error", "exception", "failed", "crash"],
        "debugging",
        &[("Here's the full error message", 0.85), ("Can you help me debug this?", 0.75), ("It happens every time I run it", 0.7)],
    ),
    (
        &["would you like", "do you want", "shall i", "should i"],
        "choice",
        &[("Yes, please", 0.9), ("No, thanks", 0.75)],
    ),
    (
        &["how do i", "how to", "how can i"],
        "how_to",
        &[("Show me step by step", 0.8), ("Just the code, please", 0.7)],
    ),
    (
        &["thanks", "thank you"],
        "gratitude",
        &[("That solved it", 0.8), ("I have another question", 0.7)],
    ),
];

// Topic -> reply offered whenever the window mentions it
const TOPIC_REPLIES: &[(&str, &str, f64)] = &[
    ("css", "Can you show me the CSS?", 0.65),
    ("layout", "How would this look on mobile?", 0.6),
    ("flexbox", "When should I use grid instead?", 0.6),
    ("react", "Can you show a component example?", 0.65),
    ("javascript", "Can you explain this code line by line?", 0.6),
    ("database", "How should I structure the query?", 0.6),
    ("api", "What should the request look like?", 0.6),
    ("performance", "How can I measure the improvement?", 0.6),
    ("security", "Is this safe for production?", 0.6),
];

const GENERIC_TOPIC_CONFIDENCE: f64 = 0.5;

const FALLBACK_REPLIES: Candidates = &[
    ("Tell me more", 0.5),
    ("Can you give an example?", 0.45),
    ("Thanks!", 0.4),
];

// (triggers, category, [(content, action, confidence, complexity)])
type ActionCandidates = &'static [(&'static str, &'static str, f64, &'static str)];

const ACTION_TRIGGERS: &[(&[&str], &str, ActionCandidates)] = &[
    (
        &["file", "upload", "attach", "document"],
        "file",
        &[("Upload a file", "upload_file", 0.8, "low")],
    ),
    (
        &["code", "snippet", "function", "```"],
        "code",
        &[("Share a code snippet", "insert_code", 0.75, "low"), ("Open the code editor", "open_editor", 0.6, "medium")],
    ),
    (
        &["documentation", "docs", "reference", "manual"],
        "docs",
        &[("Open the documentation", "open_docs", 0.7, "low")],
    ),
    (
        &["screen", "screenshot", "see what", "looks like"],
        "screen",
        &[("Share your screen", "share_screen", 0.65, "medium"), ("Take a screenshot", "capture_screenshot", 0.6, "low")],
    ),
];

const FOLLOW_UP_FAMILIES: &[(&[&str], &str, Candidates)] = &[
    (
        &["error", "exception", "bug", "crash", "fail"],
        "debugging",
        &[
            ("Can you share the full error message?", 0.85),
            ("What changed right before this started?", 0.7),
            ("Which version are you running?", 0.6),
        ],
    ),
    (
        &["something", "stuff", "thing", "somehow", "doesn't work"],
        "clarity",
        &[("Can you describe what you expected to happen?", 0.75), ("Which part is unclear?", 0.65)],
    ),
    (
        &["how do i", "how to", "how can i"],
        "how_to",
        &[
            ("Would a step-by-step walkthrough help?", 0.8),
            ("Want a minimal working example?", 0.75),
            ("Should I explain the underlying concept?", 0.6),
        ],
    ),
    (
        &["learn", "understand", "explain", "new to"],
        "learning",
        &[("Want some practice exercises?", 0.7), ("Should I recommend further reading?", 0.65)],
    ),
];

const SHORT_MESSAGE_WORDS: usize = 4;

/// One unit of batch work
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionRequest {
    #[serde(rename = "type")]
    pub request_type: SuggestionType,
    pub priority: Priority,
    pub conversation_id: String,
    pub messages: Vec<Message>,
    pub max: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    #[serde(rename = "type")]
    pub request_type: SuggestionType,
    pub priority: Priority,
    pub conversation_id: String,
    pub suggestions: Vec<SmartSuggestion>,
}

pub struct SuggestionEngine {
    provider: Arc<dyn ContextInferenceProvider>,
    cache: RwLock<TtlCache<Vec<SmartSuggestion>>>,
    issued: RwLock<TtlCache<String>>,
    feedback: RwLock<FeedbackLog>,
    ambiguous_reference: Option<Regex>,
    file_name: Option<Regex>,
    batch_pause: Duration,
}

impl SuggestionEngine {
    /// Create a new suggestion engine
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            provider: Arc::new(HeuristicInference::new(config.max_topics)),
            cache: RwLock::new(TtlCache::new(config.suggestion_cache_ttl())),
            issued: RwLock::new(TtlCache::new(chrono::Duration::minutes(ISSUED_TTL_MINUTES))),
            feedback: RwLock::new(FeedbackLog::new(config.feedback_history_limit)),
            ambiguous_reference: Regex::new(r"\b(it|this|that|they|those)\b").ok(),
            file_name: Regex::new(r"\b[\w-]+\.(js|jsx|ts|tsx|py|rs|css|html|json|csv|pdf|png|jpg)\b").ok(),
            batch_pause: config.batch_pause(),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn ContextInferenceProvider>) -> Self {
        self.provider = provider;
        self
    }

    /// Quick replies for the conversation, at most `max`
    ///
    /// Never fails: a generation error yields the fallback set, flagged
    /// `is_fallback`.
    pub async fn generate_quick_replies(
        &self,
        messages: &[Message],
        conversation_id: &str,
        max: usize,
    ) -> Vec<SmartSuggestion> {
        if messages.is_empty() || max == 0 {
            return Vec::new();
        }

        let key = format!("{}:{}", conversation_id, window_hash(messages));

        if let CacheLookup::Hit(mut cached) = self.cache.read().await.get(&key) {
            tracing::debug!(conversation_id, "suggestion cache hit");
            cached.truncate(max);
            return cached;
        }

        let mut replies = match self.build_quick_replies(messages).await {
            Ok(candidates) => {
                let ranked = sort_by_confidence(candidates);
                self.cache.write().await.insert(key, ranked.clone());
                ranked
            }
            Err(e) => {
                tracing::warn!(conversation_id, error = %e, "quick reply generation failed, using fallback");
                fallback_replies()
            }
        };

        replies.truncate(max);
        self.remember(&replies).await;
        replies
    }

    async fn build_quick_replies(&self, messages: &[Message]) -> Result<Vec<SmartSuggestion>> {
        let last = messages
            .last()
            .map(|m| m.content.to_lowercase())
            .unwrap_or_default();

        let mut candidates = Vec::new();

        for (triggers, family, replies) in QUICK_REPLY_TEMPLATES {
            if let Some(trigger) = triggers.iter().find(|t| last.contains(*t)) {
                for (content, confidence) in replies.iter() {
                    candidates.push(SmartSuggestion::new(
                        SuggestionType::QuickReply,
                        *content,
                        *confidence,
                        format!("Last message mentions '{}'", trigger),
                        *family,
                    ));
                }
            }
        }

        let window = recent_text(messages);
        for topic in self.provider.extract_topics(&window).await? {
            let (content, confidence) = TOPIC_REPLIES
                .iter()
                .find(|(t, _, _)| *t == topic)
                .map(|(_, content, confidence)| (content.to_string(), *confidence))
                .unwrap_or_else(|| (format!("Tell me more about {}", topic), GENERIC_TOPIC_CONFIDENCE));

            candidates.push(SmartSuggestion::new(
                SuggestionType::QuickReply,
                content,
                confidence,
                format!("Conversation is about {}", topic),
                topic,
            ));
        }

        dedup_by_content(&mut candidates);
        Ok(candidates)
    }

    /// Actions the widget can offer (upload, share code, open docs, share screen)
    pub fn generate_action_suggestions(&self, messages: &[Message], max: usize) -> Vec<SmartSuggestion> {
        let Some(text) = last_user_text(messages) else {
            return Vec::new();
        };

        let mentions_file_name = self.file_name.as_ref().is_some_and(|re| re.is_match(&text));
        let mut suggestions = Vec::new();

        for (triggers, category, actions) in ACTION_TRIGGERS {
            let triggered = triggers.iter().any(|t| text.contains(*t)) || (*category == "file" && mentions_file_name);
            if !triggered {
                continue;
            }

            for (content, action, confidence, complexity) in actions.iter() {
                let priority = if *confidence >= 0.75 { Priority::High } else { Priority::Medium };
                suggestions.push(
                    SmartSuggestion::new(
                        SuggestionType::ActionSuggestion,
                        *content,
                        *confidence,
                        format!("You mentioned {}", category),
                        *category,
                    )
                    .with_action(*action)
                    .with_complexity(*complexity)
                    .with_priority(priority),
                );
            }
        }

        capped(suggestions, max)
    }

    pub fn generate_follow_up_suggestions(&self, messages: &[Message], max: usize) -> Vec<SmartSuggestion> {
        let Some(text) = last_user_text(messages) else {
            return Vec::new();
        };

        let mut suggestions = Vec::new();
        for (triggers, family, candidates) in FOLLOW_UP_FAMILIES {
            if triggers.iter().any(|t| text.contains(*t)) {
                for (content, confidence) in candidates.iter() {
                    suggestions.push(SmartSuggestion::new(
                        SuggestionType::FollowUp,
                        *content,
                        *confidence,
                        format!("Follows up on a {} question", family.replace('_', "-")),
                        *family,
                    ));
                }
            }
        }

        capped(suggestions, max)
    }

    pub fn generate_clarification_suggestions(&self, messages: &[Message], max: usize) -> Vec<SmartSuggestion> {
        let Some(text) = last_user_text(messages) else {
            return Vec::new();
        };

        let mut suggestions = Vec::new();

        let word_count = text.split_whitespace().count();
        if word_count > 0 && word_count < SHORT_MESSAGE_WORDS {
            suggestions.push(SmartSuggestion::new(
                SuggestionType::Clarification,
                "Could you add a bit more detail?",
                0.7,
                "Message is very short",
                "detail",
            ));
        }

        if let Some(reference) = self
            .ambiguous_reference
            .as_ref()
            .and_then(|re| re.find(&text))
        {
            suggestions.push(SmartSuggestion::new(
                SuggestionType::Clarification,
                format!("What does \"{}\" refer to here?", reference.as_str()),
                0.65,
                "Message uses a reference without saying what it points to",
                "reference",
            ));
        }

        if text.matches('?').count() >= 2 {
            suggestions.push(SmartSuggestion::new(
                SuggestionType::Clarification,
                "Which question should we tackle first?",
                0.6,
                "Message asks several questions at once",
                "focus",
            ));
        }

        capped(suggestions, max)
    }

    /// Whether cached suggestions built for `old` are stale under `new`
    pub fn should_invalidate_cache(old: &ConversationContext, new: &ConversationContext) -> bool {
        old.topics != new.topics
            || old.expertise_level != new.expertise_level
            || old.complexity_level != new.complexity_level
            || old.user_intent != new.user_intent
    }

    /// Drop the conversation's cached suggestions when its context moved
    pub async fn on_context_change(
        &self,
        conversation_id: &str,
        old: &ConversationContext,
        new: &ConversationContext,
    ) -> bool {
        if !Self::should_invalidate_cache(old, new) {
            return false;
        }

        let removed = self
            .cache
            .write()
            .await
            .remove_prefix(&format!("{}:", conversation_id));
        tracing::debug!(conversation_id, removed, "suggestion cache invalidated");
        true
    }

    /// Append feedback to the user's log and relearn their preferences
    ///
    /// A missing category is looked up from the suggestions we issued.
    pub async fn track_suggestion_feedback(
        &self,
        user_id: &str,
        mut feedback: SuggestionFeedback,
    ) -> LearnedPreferences {
        if feedback.category.is_none() {
            if let CacheLookup::Hit(category) = self.issued.read().await.get(&feedback.suggestion_id) {
                feedback.category = Some(category);
            }
        }

        self.feedback.write().await.record(user_id, feedback)
    }

    pub async fn get_user_preferences(&self, user_id: &str) -> LearnedPreferences {
        self.feedback.read().await.preferences(user_id)
    }

    pub async fn feedback_history(&self, user_id: &str) -> Vec<SuggestionFeedback> {
        self.feedback.read().await.history(user_id)
    }

    pub fn learn_from_feedback(history: &[SuggestionFeedback]) -> LearnedPreferences {
        feedback::learn_from_feedback(history)
    }

    pub async fn rank_suggestions_by_relevance(
        &self,
        user_id: &str,
        suggestions: Vec<SmartSuggestion>,
    ) -> Vec<SmartSuggestion> {
        let log = self.feedback.read().await;
        Scorer::rank(suggestions, &log.preferences(user_id), &log.history(user_id))
    }

    pub async fn generate_improved_suggestions(
        &self,
        user_id: &str,
        suggestions: Vec<SmartSuggestion>,
    ) -> Vec<SmartSuggestion> {
        let preferences = self.get_user_preferences(user_id).await;
        feedback::generate_improved_suggestions(suggestions, &preferences)
    }

    /// Run requests serially, highest priority first, pausing between them
    pub async fn batch_generate_suggestions(&self, mut requests: Vec<SuggestionRequest>) -> Vec<BatchResult> {
        // Stable: equal priorities keep submission order
        requests.sort_by_key(|r| r.priority);

        let mut results = Vec::with_capacity(requests.len());
        for (index, request) in requests.into_iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.batch_pause).await;
            }

            let suggestions = match request.request_type {
                SuggestionType::QuickReply => {
                    self.generate_quick_replies(&request.messages, &request.conversation_id, request.max)
                        .await
                }
                SuggestionType::ActionSuggestion => self.generate_action_suggestions(&request.messages, request.max),
                SuggestionType::FollowUp => self.generate_follow_up_suggestions(&request.messages, request.max),
                SuggestionType::Clarification => {
                    self.generate_clarification_suggestions(&request.messages, request.max)
                }
            };

            results.push(BatchResult {
                request_type: request.request_type,
                priority: request.priority,
                conversation_id: request.conversation_id,
                suggestions,
            });
        }

        results
    }

    /// Forget a user's feedback and learned preferences
    pub async fn forget_user(&self, user_id: &str) -> bool {
        self.feedback.write().await.forget(user_id)
    }

    pub async fn sweep_cache(&self) -> usize {
        let removed = self.cache.write().await.sweep_expired();
        self.issued.write().await.sweep_expired();
        if removed > 0 {
            tracing::debug!(removed, "suggestion cache swept");
        }
        removed
    }

    /// Remember categories of what we hand out so feedback can find them
    pub async fn remember(&self, suggestions: &[SmartSuggestion]) {
        let mut issued = self.issued.write().await;
        for suggestion in suggestions {
            issued.insert(suggestion.id.clone(), suggestion.category.clone());
        }
    }
}

fn fallback_replies() -> Vec<SmartSuggestion> {
    FALLBACK_REPLIES
        .iter()
        .map(|(content, confidence)| {
            let mut suggestion =
                SmartSuggestion::new(SuggestionType::QuickReply, *content, *confidence, "Fallback reply", "general");
            suggestion.is_fallback = true;
            suggestion
        })
        .collect()
}

fn sort_by_confidence(mut suggestions: Vec<SmartSuggestion>) -> Vec<SmartSuggestion> {
    suggestions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    suggestions
}

fn capped(suggestions: Vec<SmartSuggestion>, max: usize) -> Vec<SmartSuggestion> {
    let mut sorted = sort_by_confidence(suggestions);
    sorted.truncate(max);
    sorted
}

fn dedup_by_content(suggestions: &mut Vec<SmartSuggestion>) {
    let mut seen = std::collections::HashSet::new();
    suggestions.retain(|s| seen.insert(s.content.clone()));
}

fn last_user_text(messages: &[Message]) -> Option<String> {
    messages
        .iter()
        .rev()
        .find(|m| m.is_user())
        .map(|m| m.content.to_lowercase())
        .filter(|text| !text.trim().is_empty())
}

fn recent_window(messages: &[Message]) -> &[Message] {
    &messages[messages.len().saturating_sub(WINDOW)..]
}

fn recent_text(messages: &[Message]) -> String {
    recent_window(messages)
        .iter()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

fn window_hash(messages: &[Message]) -> String {
    let mut hasher = Sha256::new();
    for message in recent_window(messages) {
        hasher.update(message.role.to_string().as_bytes());
        hasher.update(b":");
        hasher.update(message.content.as_bytes());
        hasher.update(b"\n");
    }
    hasher
        .finalize()
        .iter()
        .take(8)
        .map(|b| format!("{:02x}", b))
        .collect()
}
