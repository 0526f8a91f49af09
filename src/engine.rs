/// Engine facade
///
/// Wires the behavior tracker, context analyzer, suggestion engine and
/// session manager together behind the calls a chat widget makes. Each
/// component stays reachable for anything the facade does not cover.

use crate::config::EngineConfig;
use crate::core::{BehaviorTracker, SessionManager};
use crate::db::KeyValueStore;
use crate::error::Result;
use crate::intelligence::{ContextAnalyzer, ContextInferenceProvider, LearnedPreferences, SuggestionEngine};
use crate::models::{
    ConversationContext, InteractionInput, Message, PrivacySettings, SessionPreferences, SmartSuggestion,
    SuggestionFeedback, UserInteraction, UserSession,
};
use std::sync::Arc;
use tokio::task::JoinHandle;

pub struct AdaptiveEngine {
    config: EngineConfig,
    tracker: Arc<BehaviorTracker>,
    analyzer: Arc<ContextAnalyzer>,
    suggestions: Arc<SuggestionEngine>,
    sessions: Arc<SessionManager>,
}

impl AdaptiveEngine {
    /// Create an engine with the built-in heuristics
    ///
    /// The config is validated first; zero windows or limits are rejected.
    pub fn new(config: EngineConfig, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        Ok(Self {
            tracker: Arc::new(BehaviorTracker::new(&config)?.with_store(Arc::clone(&store))),
            analyzer: Arc::new(ContextAnalyzer::new(&config, Arc::clone(&store))),
            suggestions: Arc::new(SuggestionEngine::new(&config)),
            sessions: Arc::new(SessionManager::new(&config).with_store(store)),
            config,
        })
    }

    /// Create an engine whose analysis and topic extraction go through `provider`
    pub fn with_provider(
        config: EngineConfig,
        store: Arc<dyn KeyValueStore>,
        provider: Arc<dyn ContextInferenceProvider>,
    ) -> Result<Self> {
        Ok(Self {
            tracker: Arc::new(BehaviorTracker::new(&config)?.with_store(Arc::clone(&store))),
            analyzer: Arc::new(
                ContextAnalyzer::new(&config, Arc::clone(&store)).with_provider(Arc::clone(&provider)),
            ),
            suggestions: Arc::new(SuggestionEngine::new(&config).with_provider(provider)),
            sessions: Arc::new(SessionManager::new(&config).with_store(store)),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tracker(&self) -> &BehaviorTracker {
        &self.tracker
    }

    pub fn analyzer(&self) -> &ContextAnalyzer {
        &self.analyzer
    }

    pub fn suggestions(&self) -> &SuggestionEngine {
        &self.suggestions
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Record an interaction and count it as session activity
    pub async fn track_interaction(
        &self,
        user_id: &str,
        input: InteractionInput,
        privacy: &PrivacySettings,
    ) -> Option<UserInteraction> {
        let interaction = self.tracker.track_interaction(user_id, input, privacy).await?;
        self.sessions.update_session_activity(user_id).await;
        Some(interaction)
    }

    /// Analyze a conversation, record the context on the user's session and
    /// drop cached suggestions that no longer fit
    pub async fn analyze_messages(
        &self,
        user_id: &str,
        conversation_id: &str,
        messages: &[Message],
    ) -> ConversationContext {
        let previous = self.analyzer.get_context(conversation_id).await;
        let context = self.analyzer.analyze_conversation(conversation_id, messages).await;

        if let Some(previous) = previous {
            self.suggestions
                .on_context_change(conversation_id, &previous, &context)
                .await;
        }
        self.sessions
            .record_context(user_id, conversation_id, context.clone())
            .await;

        context
    }

    /// Quick replies and actions for the conversation, ranked for the user
    pub async fn generate_suggestions(
        &self,
        user_id: &str,
        conversation_id: &str,
        messages: &[Message],
        max: usize,
    ) -> Vec<SmartSuggestion> {
        self.analyze_messages(user_id, conversation_id, messages).await;

        let mut candidates = self
            .suggestions
            .generate_quick_replies(messages, conversation_id, max)
            .await;
        let actions = self.suggestions.generate_action_suggestions(messages, max);
        self.suggestions.remember(&actions).await;
        candidates.extend(actions);

        let mut ranked = self
            .suggestions
            .rank_suggestions_by_relevance(user_id, candidates)
            .await;
        ranked.truncate(max);
        ranked
    }

    pub async fn record_suggestion_feedback(&self, user_id: &str, feedback: SuggestionFeedback) -> LearnedPreferences {
        self.suggestions.track_suggestion_feedback(user_id, feedback).await
    }

    pub async fn start_session(
        &self,
        user_id: &str,
        preferences: Option<SessionPreferences>,
        device_type: &str,
    ) -> UserSession {
        self.sessions.create_session(user_id, preferences, device_type).await
    }

    /// End the user's session and persist their session snapshot
    pub async fn end_session(&self, user_id: &str) -> Result<Option<UserSession>> {
        let ended = self.sessions.end_session(user_id).await;
        if ended.is_some() {
            self.sessions.persist_session(user_id).await?;
        }
        Ok(ended)
    }

    pub async fn touch_session(&self, user_id: &str) -> UserSession {
        self.sessions.update_session_activity(user_id).await
    }

    /// Re-mine the user's behavior and push it into their active session
    pub async fn refresh_personalization(&self, user_id: &str) -> Option<UserSession> {
        let patterns = self.tracker.analyze_user_behavior(user_id).await;
        self.sessions.apply_behavior_patterns(user_id, patterns).await
    }

    /// Erase everything held about a user
    pub async fn forget_user(&self, user_id: &str) -> Result<()> {
        self.tracker.delete_user_data(user_id).await?;
        self.suggestions.forget_user(user_id).await;
        self.sessions.delete_user_sessions(user_id).await?;

        tracing::info!(user_id, "user data erased");
        Ok(())
    }

    /// One maintenance pass: cache sweeps, retention and session timeouts
    pub async fn run_maintenance(&self) {
        let contexts = self.analyzer.sweep_cache().await;
        let suggestions = self.suggestions.sweep_cache().await;
        let retention = self.tracker.run_retention_sweep().await;
        let ended = self.sessions.check_inactive_sessions(chrono::Utc::now()).await;

        tracing::debug!(
            contexts,
            suggestions,
            interactions_removed = retention.interactions_removed,
            sessions_ended = ended.len(),
            "maintenance pass"
        );
    }

    /// Run `run_maintenance` every `maintenance_interval_secs` until aborted
    pub fn spawn_maintenance(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        let period = self.config.maintenance_interval();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                engine.run_maintenance().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{session_key, MemoryStore};
    use crate::error::AdaptError;
    use crate::models::MESSAGE_SENT;
    use chrono::{Duration, Utc};

    fn engine() -> (AdaptiveEngine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let engine = AdaptiveEngine::new(EngineConfig::default(), store.clone()).unwrap();
        (engine, store)
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = EngineConfig {
            maintenance_interval_secs: 0,
            ..Default::default()
        };

        match AdaptiveEngine::new(config, Arc::new(MemoryStore::new())) {
            Err(AdaptError::Config(msg)) => assert!(msg.contains("maintenance_interval_secs")),
            Err(other) => panic!("Expected Config error, got {:?}", other),
            Ok(_) => panic!("Expected Config error"),
        }
    }

    #[tokio::test]
    async fn test_tracking_touches_session() {
        let (engine, _) = engine();

        let tracked = engine
            .track_interaction(
                "u1",
                InteractionInput::new(MESSAGE_SENT).with("content", "hello"),
                &PrivacySettings::default(),
            )
            .await;

        assert!(tracked.is_some());
        assert_eq!(engine.sessions().get_active_session("u1").await.unwrap().interaction_count, 1);

        let denied = engine
            .track_interaction("u2", InteractionInput::new(MESSAGE_SENT), &PrivacySettings::denied())
            .await;
        assert!(denied.is_none());
        assert!(engine.sessions().get_active_session("u2").await.is_none());
    }

    #[tokio::test]
    async fn test_analysis_is_recorded_on_session() {
        let (engine, _) = engine();
        engine.start_session("u1", None, "desktop").await;

        let context = engine
            .analyze_messages("u1", "conv1", &[Message::user("How do I center a div with CSS grid?")])
            .await;

        assert_eq!(context.id, "conv1");
        assert!(context.topics.contains(&"css".to_string()));
        let session = engine.sessions().get_active_session("u1").await.unwrap();
        assert_eq!(session.conversation_contexts["conv1"].topics, context.topics);
    }

    #[tokio::test]
    async fn test_generate_suggestions_ranked_and_capped() {
        let (engine, _) = engine();
        let messages = vec![
            Message::user("My React component throws an error"),
            Message::assistant("Can you share the code?"),
            Message::user("Sure, here is the code from App.jsx, it keeps crashing"),
        ];

        let suggestions = engine.generate_suggestions("u1", "conv1", &messages, 3).await;

        assert!(!suggestions.is_empty());
        assert!(suggestions.len() <= 3);
        for pair in suggestions.windows(2) {
            assert!(pair[0].effective_confidence() >= pair[1].effective_confidence());
        }
    }

    #[tokio::test]
    async fn test_feedback_shapes_preferences() {
        let (engine, _) = engine();

        let learned = engine
            .record_suggestion_feedback("u1", SuggestionFeedback::new("s1", true, Some(true)).for_category("code"))
            .await;

        assert!(learned.prefers("code"));
        assert!(engine.suggestions().get_user_preferences("u1").await.prefers("code"));
    }

    #[tokio::test]
    async fn test_end_session_persists_snapshot() {
        let (engine, store) = engine();
        engine.start_session("u1", None, "mobile").await;

        let ended = engine.end_session("u1").await.unwrap();

        assert!(ended.is_some());
        assert!(store.get(&session_key("u1")).await.unwrap().is_some());
        assert!(engine.end_session("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_refresh_personalization() {
        let (engine, _) = engine();
        for _ in 0..5 {
            engine
                .track_interaction(
                    "u1",
                    InteractionInput::new(MESSAGE_SENT).with("content", "short one"),
                    &PrivacySettings::default(),
                )
                .await;
        }

        let session = engine.refresh_personalization("u1").await.unwrap();
        assert_eq!(session.personalizations["response_length"], "short");
        assert!(!session.behavior_patterns.is_empty());
    }

    #[tokio::test]
    async fn test_forget_user() {
        let (engine, store) = engine();
        engine
            .track_interaction("u1", InteractionInput::new(MESSAGE_SENT), &PrivacySettings::default())
            .await;
        engine
            .record_suggestion_feedback("u1", SuggestionFeedback::new("s1", true, Some(true)).for_category("code"))
            .await;
        engine.sessions().persist_session("u1").await.unwrap();

        engine.forget_user("u1").await.unwrap();

        assert_eq!(engine.tracker().interaction_count("u1").await, 0);
        assert!(engine.suggestions().feedback_history("u1").await.is_empty());
        assert!(engine.sessions().user_sessions("u1").await.is_empty());
        assert!(store.get(&session_key("u1")).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_maintenance_ends_stale_sessions() {
        let (engine, _) = engine();
        let engine = Arc::new(engine);
        engine
            .sessions()
            .update_session_activity_at("u1", Utc::now() - Duration::minutes(45))
            .await;

        let handle = engine.spawn_maintenance();
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;

        assert!(engine.sessions().get_active_session("u1").await.is_none());
        handle.abort();
    }
}
