/// Session lifecycle: create, touch, end, resume, merge across devices
///
/// One active session per user. A session that leaves the active slot by
/// ending, being superseded or timing out lands in history, where metrics and
/// resume can find it. Merged sessions are folded into the merged one instead.
/// Each activity update re-arms a per-user inactivity timer; a timer that fires
/// without being re-armed ends the session.

use crate::config::EngineConfig;
use crate::core::debounce::Debouncer;
use crate::core::session_metrics::{self, SessionInsights, SessionMetrics};
use crate::db::{session_key, KeyValueStore};
use crate::error::{AdaptError, Result};
use crate::models::{
    BehaviorPatternType, ConversationContext, EndReason, SessionPreferences, SessionState, UserBehaviorPattern,
    UserSession,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub const DEFAULT_DEVICE: &str = "unknown";
pub const RESTORE_FAILED: &str = "restore_failed";

#[derive(Debug, Default)]
struct Sessions {
    active: HashMap<String, UserSession>,
    history: Vec<UserSession>,
}

impl Sessions {
    /// Put `session` in the active slot, retiring whatever was there
    fn activate(&mut self, session: UserSession, displaced: EndReason, now: DateTime<Utc>) {
        if let Some(mut previous) = self.active.insert(session.user_id.clone(), session) {
            previous.end(displaced, now);
            tracing::info!(user_id = %previous.user_id, session_id = %previous.id, "session superseded");
            self.history.push(previous);
        }
    }

    fn retire(&mut self, user_id: &str, reason: EndReason, now: DateTime<Utc>) -> Option<UserSession> {
        let mut session = self.active.remove(user_id)?;
        session.end(reason, now);
        self.history.push(session.clone());
        Some(session)
    }
}

/// Everything held about a user's sessions. Also the snapshot format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionExport {
    pub user_id: String,
    pub active: Option<UserSession>,
    pub history: Vec<UserSession>,
    pub exported_at: DateTime<Utc>,
}

pub struct SessionManager {
    sessions: Arc<RwLock<Sessions>>,
    timers: Debouncer,
    store: Option<Arc<dyn KeyValueStore>>,
    timeout: chrono::Duration,
    idle_after: chrono::Duration,
}

impl SessionManager {
    pub fn new(config: &EngineConfig) -> Self {
        let timeout_std = std::time::Duration::from_secs(config.session_timeout_secs);

        Self {
            sessions: Arc::new(RwLock::new(Sessions::default())),
            timers: Debouncer::new(timeout_std),
            store: None,
            timeout: config.session_timeout(),
            idle_after: config.session_idle_after(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Start a fresh active session, superseding any current one
    pub async fn create_session(
        &self,
        user_id: &str,
        preferences: Option<SessionPreferences>,
        device_type: &str,
    ) -> UserSession {
        let session = UserSession::new(user_id, preferences.unwrap_or_default(), device_type);

        self.sessions
            .write()
            .await
            .activate(session.clone(), EndReason::Superseded, Utc::now());
        self.arm_timer(user_id, &session.id);

        tracing::info!(user_id, session_id = %session.id, device_type, "session created");
        session
    }

    pub async fn update_session_activity(&self, user_id: &str) -> UserSession {
        self.update_session_activity_at(user_id, Utc::now()).await
    }

    /// Record activity, creating a session when the user has none
    pub async fn update_session_activity_at(&self, user_id: &str, now: DateTime<Utc>) -> UserSession {
        let session = {
            let mut sessions = self.sessions.write().await;
            let session = sessions.active.entry(user_id.to_string()).or_insert_with(|| {
                tracing::info!(user_id, "session created on first activity");
                UserSession::new(user_id, SessionPreferences::default(), DEFAULT_DEVICE)
            });
            session.touch(now);
            session.clone()
        };

        self.arm_timer(user_id, &session.id);
        session
    }

    pub async fn end_session(&self, user_id: &str) -> Option<UserSession> {
        self.timers.cancel(user_id);

        let ended = self
            .sessions
            .write()
            .await
            .retire(user_id, EndReason::Explicit, Utc::now());

        if let Some(session) = &ended {
            tracing::info!(user_id, session_id = %session.id, "session ended");
        }
        ended
    }

    /// Bring a historical session back into the active slot
    pub async fn resume_session(&self, user_id: &str, session_id: &str) -> Result<UserSession> {
        let now = Utc::now();

        let session = {
            let mut sessions = self.sessions.write().await;
            let index = sessions
                .history
                .iter()
                .position(|s| s.id == session_id && s.user_id == user_id)
                .ok_or_else(|| AdaptError::SessionNotFound(session_id.to_string()))?;

            let mut session = sessions.history.remove(index);
            session.is_active = true;
            session.ended_at = None;
            session.end_reason = None;
            session.error = None;
            session.last_activity = now;

            sessions.activate(session.clone(), EndReason::Superseded, now);
            session
        };

        self.arm_timer(user_id, &session.id);
        tracing::info!(user_id, session_id, "session resumed");
        Ok(session)
    }

    pub async fn get_active_session(&self, user_id: &str) -> Option<UserSession> {
        self.sessions.read().await.active.get(user_id).cloned()
    }

    pub async fn session_state(&self, user_id: &str) -> Option<SessionState> {
        self.session_state_at(user_id, Utc::now()).await
    }

    /// State of the user's active session; `None` when there is none
    pub async fn session_state_at(&self, user_id: &str, now: DateTime<Utc>) -> Option<SessionState> {
        self.sessions
            .read()
            .await
            .active
            .get(user_id)
            .map(|s| s.state_at(now, self.idle_after))
    }

    /// Active and historical sessions, oldest first
    pub async fn user_sessions(&self, user_id: &str) -> Vec<UserSession> {
        let sessions = self.sessions.read().await;
        let mut all: Vec<UserSession> = sessions
            .history
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .chain(sessions.active.get(user_id).cloned())
            .collect();
        all.sort_by_key(|s| s.start_time);
        all
    }

    pub async fn active_session_count(&self) -> usize {
        self.sessions.read().await.active.len()
    }

    /// End every active session idle for at least the timeout. Returns ended ids.
    pub async fn check_inactive_sessions(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut sessions = self.sessions.write().await;

        let expired: Vec<String> = sessions
            .active
            .values()
            .filter(|s| s.inactive_for(now) >= self.timeout)
            .map(|s| s.user_id.clone())
            .collect();

        let mut ended = Vec::new();
        for user_id in expired {
            self.timers.cancel(&user_id);
            if let Some(session) = sessions.retire(&user_id, EndReason::Inactivity, now) {
                tracing::info!(user_id = %user_id, session_id = %session.id, "session ended after inactivity");
                ended.push(session.id);
            }
        }

        ended
    }

    /// Combine sessions from several devices into one active session
    ///
    /// Interaction counts add up and device types are unioned. Preferences
    /// come from the most recently active session; equal timestamps go to
    /// the higher interaction count, then to the larger id.
    pub async fn merge_sessions(&self, user_id: &str, inputs: Vec<UserSession>) -> Result<UserSession> {
        if inputs.is_empty() {
            return Err(AdaptError::Session("no sessions to merge".to_string()));
        }
        if let Some(foreign) = inputs.iter().find(|s| s.user_id != user_id) {
            return Err(AdaptError::Session(format!(
                "session {} belongs to another user",
                foreign.id
            )));
        }

        let winner = inputs
            .iter()
            .max_by(|a, b| {
                a.last_activity
                    .cmp(&b.last_activity)
                    .then_with(|| a.interaction_count.cmp(&b.interaction_count))
                    .then_with(|| a.id.cmp(&b.id))
            })
            .cloned()
            .ok_or_else(|| AdaptError::Session("no sessions to merge".to_string()))?;

        let mut merged = UserSession::new(user_id, winner.preferences.clone(), winner.metadata.device_type.clone());
        merged.start_time = inputs.iter().map(|s| s.start_time).min().unwrap_or(winner.start_time);
        merged.last_activity = winner.last_activity;
        merged.interaction_count = inputs.iter().map(|s| s.interaction_count).sum();
        merged.session_duration = (merged.last_activity - merged.start_time).num_seconds().max(0);

        for session in &inputs {
            merged.metadata.device_types.insert(session.metadata.device_type.clone());
            merged
                .metadata
                .device_types
                .extend(session.metadata.device_types.iter().cloned());
            merged.metadata.merged_from.push(session.id.clone());

            for (conversation_id, context) in &session.conversation_contexts {
                let newer = merged
                    .conversation_contexts
                    .get(conversation_id)
                    .map_or(true, |existing| context.last_analyzed > existing.last_analyzed);
                if newer {
                    merged
                        .conversation_contexts
                        .insert(conversation_id.clone(), context.clone());
                }
            }

            if session.id != winner.id {
                for (key, value) in &session.personalizations {
                    merged
                        .personalizations
                        .entry(key.clone())
                        .or_insert_with(|| value.clone());
                }
            }
        }
        // The winner's personalizations override the rest
        for (key, value) in &winner.personalizations {
            merged.personalizations.insert(key.clone(), value.clone());
        }
        merged.behavior_patterns = winner.behavior_patterns.clone();

        let now = Utc::now();
        {
            let mut sessions = self.sessions.write().await;
            let merged_from = &merged.metadata.merged_from;

            // Merged inputs live on only inside the merged session
            sessions.history.retain(|s| !merged_from.contains(&s.id));
            let active_was_input = sessions
                .active
                .get(user_id)
                .is_some_and(|current| merged_from.contains(&current.id));
            if active_was_input {
                sessions.active.remove(user_id);
            }

            sessions.activate(merged.clone(), EndReason::Superseded, now);
        }
        self.arm_timer(user_id, &merged.id);

        tracing::info!(
            user_id,
            session_id = %merged.id,
            merged = inputs.len(),
            "sessions merged"
        );
        Ok(merged)
    }

    /// Attach an analyzed context to the active session
    pub async fn record_context(&self, user_id: &str, conversation_id: &str, context: ConversationContext) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.active.get_mut(user_id) {
            Some(session) => {
                session
                    .conversation_contexts
                    .insert(conversation_id.to_string(), context);
                true
            }
            None => false,
        }
    }

    /// Copy mined patterns into the active session and derive personalizations
    pub async fn apply_behavior_patterns(
        &self,
        user_id: &str,
        patterns: Vec<UserBehaviorPattern>,
    ) -> Option<UserSession> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.active.get_mut(user_id)?;

        for pattern in &patterns {
            match pattern.pattern_type {
                BehaviorPatternType::CommunicationStyle => {
                    let length = if pattern.pattern == "concise" { "short" } else { "detailed" };
                    session
                        .personalizations
                        .insert("response_length".to_string(), Value::from(length));
                }
                BehaviorPatternType::FeatureUsage => {
                    if let Some(features) = pattern.data.get("mostUsedFeatures") {
                        session
                            .personalizations
                            .insert("preferred_features".to_string(), features.clone());
                    }
                }
                BehaviorPatternType::TemporalPattern => {
                    session
                        .personalizations
                        .insert("active_period".to_string(), Value::from(pattern.pattern.clone()));
                }
                BehaviorPatternType::PreferencePattern => {
                    let field = |name: &str| pattern.data.get(name).and_then(Value::as_str).map(str::to_string);
                    if let Some(theme) = field("theme") {
                        session.preferences.theme = theme;
                    }
                    if let Some(language) = field("language") {
                        session.preferences.language = language;
                    }
                    if let Some(style) = field("responseStyle") {
                        session.preferences.response_style = style;
                    }
                }
            }
        }

        session.behavior_patterns = patterns;
        tracing::debug!(user_id, patterns = session.behavior_patterns.len(), "session personalized");
        Some(session.clone())
    }

    pub async fn get_session_metrics(&self, user_id: &str) -> SessionMetrics {
        session_metrics::compute_metrics(&self.user_sessions(user_id).await)
    }

    pub async fn get_session_insights(&self, user_id: &str) -> SessionInsights {
        session_metrics::compute_insights(&self.user_sessions(user_id).await)
    }

    pub async fn export_session_data(&self, user_id: &str) -> SessionExport {
        let sessions = self.sessions.read().await;

        SessionExport {
            user_id: user_id.to_string(),
            active: sessions.active.get(user_id).cloned(),
            history: sessions
                .history
                .iter()
                .filter(|s| s.user_id == user_id)
                .cloned()
                .collect(),
            exported_at: Utc::now(),
        }
    }

    /// Load exported sessions. Sessions already known by id are skipped.
    pub async fn import_session_data(&self, export: SessionExport) -> Result<usize> {
        if export.user_id.trim().is_empty() {
            return Err(AdaptError::Session("export has no user id".to_string()));
        }
        let all_match = export
            .active
            .iter()
            .chain(export.history.iter())
            .all(|s| s.user_id == export.user_id);
        if !all_match {
            return Err(AdaptError::Session("export mixes sessions of several users".to_string()));
        }

        let now = Utc::now();
        let mut imported = 0;
        let mut armed = None;

        {
            let mut sessions = self.sessions.write().await;

            for session in export.history {
                let known = sessions.history.iter().any(|s| s.id == session.id)
                    || sessions.active.values().any(|s| s.id == session.id);
                if !known {
                    sessions.history.push(session);
                    imported += 1;
                }
            }

            if let Some(session) = export.active {
                let known = sessions.active.values().any(|s| s.id == session.id);
                if !known {
                    armed = Some(session.id.clone());
                    sessions.activate(session, EndReason::Superseded, now);
                    imported += 1;
                }
            }
        }

        if let Some(session_id) = armed {
            self.arm_timer(&export.user_id, &session_id);
        }

        Ok(imported)
    }

    /// Erase every session of a user, including the persisted snapshot
    pub async fn delete_user_sessions(&self, user_id: &str) -> Result<usize> {
        self.timers.cancel(user_id);

        let removed = {
            let mut sessions = self.sessions.write().await;
            let before = sessions.history.len();
            sessions.history.retain(|s| s.user_id != user_id);
            let mut removed = before - sessions.history.len();
            if sessions.active.remove(user_id).is_some() {
                removed += 1;
            }
            removed
        };

        if let Some(store) = &self.store {
            store.remove(&session_key(user_id)).await?;
        }

        tracing::info!(user_id, removed, "user sessions erased");
        Ok(removed)
    }

    pub async fn persist_session(&self, user_id: &str) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };

        let export = self.export_session_data(user_id).await;
        store.set(&session_key(user_id), serde_json::to_value(&export)?).await
    }

    /// Restore the persisted snapshot and return the active session
    ///
    /// Without a snapshot (or without an active session in it) a new session
    /// is started. An unreadable snapshot also starts one, with `error` set so
    /// the caller can retry.
    pub async fn restore_session(&self, user_id: &str, device_type: &str) -> Result<UserSession> {
        let raw = match &self.store {
            Some(store) => store.get(&session_key(user_id)).await?,
            None => None,
        };

        if let Some(raw) = raw {
            match serde_json::from_value::<SessionExport>(raw) {
                Ok(export) if export.user_id == user_id => {
                    self.import_session_data(export).await?;
                    if let Some(session) = self.get_active_session(user_id).await {
                        return Ok(session);
                    }
                }
                Ok(_) => {
                    tracing::warn!(user_id, "session snapshot belongs to another user");
                    return Ok(self.failed_restore(user_id, device_type).await);
                }
                Err(e) => {
                    tracing::warn!(user_id, error = %e, "malformed session snapshot");
                    return Ok(self.failed_restore(user_id, device_type).await);
                }
            }
        }

        Ok(self.create_session(user_id, None, device_type).await)
    }

    async fn failed_restore(&self, user_id: &str, device_type: &str) -> UserSession {
        let mut session = self.create_session(user_id, None, device_type).await;
        session.error = Some(RESTORE_FAILED.to_string());

        if let Some(active) = self.sessions.write().await.active.get_mut(user_id) {
            active.error = session.error.clone();
        }
        session
    }

    // Ends the session when no activity re-arms the timer within the timeout
    fn arm_timer(&self, user_id: &str, session_id: &str) {
        let sessions = Arc::clone(&self.sessions);
        let user_id_owned = user_id.to_string();
        let session_id = session_id.to_string();

        // Detached: a superseded timer resolves to None on its own
        drop(self.timers.schedule(user_id, move || async move {
            let mut sessions = sessions.write().await;
            let still_current = sessions
                .active
                .get(&user_id_owned)
                .is_some_and(|s| s.id == session_id);

            if still_current {
                sessions.retire(&user_id_owned, EndReason::Inactivity, Utc::now());
                tracing::info!(user_id = %user_id_owned, session_id = %session_id, "session timed out");
            }
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::Sentiment;
    use chrono::Duration;
    use serde_json::json;

    fn manager() -> SessionManager {
        SessionManager::new(&EngineConfig::default())
    }

    #[tokio::test]
    async fn test_create_supersedes_active() {
        let manager = manager();
        let first = manager.create_session("u1", None, "desktop").await;
        let second = manager.create_session("u1", None, "mobile").await;

        assert_eq!(manager.active_session_count().await, 1);
        assert_eq!(manager.get_active_session("u1").await.unwrap().id, second.id);

        let all = manager.user_sessions("u1").await;
        let retired = all.iter().find(|s| s.id == first.id).unwrap();
        assert!(!retired.is_active);
        assert_eq!(retired.end_reason, Some(EndReason::Superseded));
    }

    #[tokio::test]
    async fn test_activity_creates_and_counts() {
        let manager = manager();

        manager.update_session_activity("u1").await;
        let session = manager.update_session_activity("u1").await;

        assert_eq!(session.interaction_count, 2);
        assert_eq!(session.metadata.device_type, DEFAULT_DEVICE);
        assert_eq!(manager.session_state("u1").await, Some(SessionState::Active));
    }

    #[tokio::test]
    async fn test_session_timeout() {
        let manager = manager();
        let start = Utc::now() - Duration::minutes(45);
        manager.update_session_activity_at("u1", start).await;

        let ended = manager.check_inactive_sessions(Utc::now()).await;

        assert_eq!(ended.len(), 1);
        assert!(manager.get_active_session("u1").await.is_none());
        let history = manager.user_sessions("u1").await;
        assert!(!history[0].is_active);
        assert_eq!(history[0].end_reason, Some(EndReason::Inactivity));
    }

    #[tokio::test]
    async fn test_recent_activity_survives_check() {
        let manager = manager();
        manager.update_session_activity_at("u1", Utc::now() - Duration::minutes(29)).await;

        assert!(manager.check_inactive_sessions(Utc::now()).await.is_empty());
        assert!(manager.get_active_session("u1").await.unwrap().is_active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inactivity_timer_ends_session() {
        let manager = manager();
        manager.create_session("u1", None, "desktop").await;

        tokio::time::sleep(std::time::Duration::from_secs(20 * 60)).await;
        manager.update_session_activity("u1").await;
        tokio::time::sleep(std::time::Duration::from_secs(20 * 60)).await;
        assert!(manager.get_active_session("u1").await.is_some());

        tokio::time::sleep(std::time::Duration::from_secs(11 * 60)).await;
        assert!(manager.get_active_session("u1").await.is_none());
    }

    #[tokio::test]
    async fn test_end_and_resume() {
        let manager = manager();
        let session = manager.create_session("u1", None, "desktop").await;

        let ended = manager.end_session("u1").await.unwrap();
        assert_eq!(ended.end_reason, Some(EndReason::Explicit));
        assert!(manager.end_session("u1").await.is_none());

        let resumed = manager.resume_session("u1", &session.id).await.unwrap();
        assert!(resumed.is_active);
        assert_eq!(manager.get_active_session("u1").await.unwrap().id, session.id);

        let err = manager.resume_session("u1", "session_missing").await.unwrap_err();
        assert!(matches!(err, AdaptError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_merge_correctness() {
        let manager = manager();
        let now = Utc::now();

        let mut desktop = UserSession::new("u1", SessionPreferences::default(), "desktop");
        desktop.interaction_count = 7;
        desktop.last_activity = now - Duration::minutes(10);

        let mut mobile = UserSession::new(
            "u1",
            SessionPreferences {
                theme: "dark".to_string(),
                ..Default::default()
            },
            "mobile",
        );
        mobile.interaction_count = 5;
        mobile.last_activity = now;

        let merged = manager
            .merge_sessions("u1", vec![desktop.clone(), mobile.clone()])
            .await
            .unwrap();

        assert!(merged.metadata.device_types.contains("desktop"));
        assert!(merged.metadata.device_types.contains("mobile"));
        assert_eq!(merged.interaction_count, 12);
        assert_eq!(merged.preferences.theme, "dark");
        assert_eq!(merged.metadata.merged_from, vec![desktop.id, mobile.id]);
        assert_eq!(manager.get_active_session("u1").await.unwrap().id, merged.id);
    }

    #[tokio::test]
    async fn test_merge_replaces_inputs_in_history() {
        let manager = manager();

        manager.create_session("u1", None, "desktop").await;
        manager.update_session_activity("u1").await;
        manager.update_session_activity("u1").await;
        let desktop = manager.end_session("u1").await.unwrap();

        manager.create_session("u1", None, "mobile").await;
        let mobile = manager.update_session_activity("u1").await;

        let merged = manager.merge_sessions("u1", vec![desktop, mobile]).await.unwrap();

        let all = manager.user_sessions("u1").await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, merged.id);

        let metrics = manager.get_session_metrics("u1").await;
        assert_eq!(metrics.total_sessions, 1);
        assert_eq!(metrics.total_interactions, 3);
    }

    #[tokio::test]
    async fn test_merge_tiebreak_and_errors() {
        let manager = manager();
        let now = Utc::now();

        let mut a = UserSession::new("u1", SessionPreferences::default(), "desktop");
        a.last_activity = now;
        a.interaction_count = 3;
        let mut b = UserSession::new(
            "u1",
            SessionPreferences {
                language: "fr".to_string(),
                ..Default::default()
            },
            "tablet",
        );
        b.last_activity = now;
        b.interaction_count = 9;

        let merged = manager.merge_sessions("u1", vec![a, b]).await.unwrap();
        assert_eq!(merged.preferences.language, "fr");

        assert!(matches!(
            manager.merge_sessions("u1", vec![]).await,
            Err(AdaptError::Session(_))
        ));
        let stranger = UserSession::new("u2", SessionPreferences::default(), "desktop");
        assert!(manager.merge_sessions("u1", vec![stranger]).await.is_err());
    }

    #[tokio::test]
    async fn test_merge_keeps_newest_context() {
        let manager = manager();
        let now = Utc::now();

        let mut old_context = ConversationContext::fallback();
        old_context.last_analyzed = now - Duration::minutes(5);
        let mut new_context = ConversationContext::fallback();
        new_context.sentiment = Sentiment::Positive;
        new_context.last_analyzed = now;

        let mut a = UserSession::new("u1", SessionPreferences::default(), "desktop");
        a.conversation_contexts.insert("conv".to_string(), new_context);
        let mut b = UserSession::new("u1", SessionPreferences::default(), "mobile");
        b.conversation_contexts.insert("conv".to_string(), old_context);

        let merged = manager.merge_sessions("u1", vec![a, b]).await.unwrap();
        assert_eq!(merged.conversation_contexts["conv"].sentiment, Sentiment::Positive);
    }

    #[tokio::test]
    async fn test_export_import_delete() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let manager = manager().with_store(Arc::clone(&store));
        manager.create_session("u1", None, "desktop").await;
        manager.end_session("u1").await;
        manager.create_session("u1", None, "mobile").await;

        let export = manager.export_session_data("u1").await;
        assert!(export.active.is_some());
        assert_eq!(export.history.len(), 1);

        let other = SessionManager::new(&EngineConfig::default());
        assert_eq!(other.import_session_data(export.clone()).await.unwrap(), 2);
        assert_eq!(other.import_session_data(export).await.unwrap(), 0);
        assert_eq!(other.user_sessions("u1").await.len(), 2);

        manager.persist_session("u1").await.unwrap();
        assert_eq!(manager.delete_user_sessions("u1").await.unwrap(), 2);
        assert!(manager.user_sessions("u1").await.is_empty());
        assert!(store.get(&session_key("u1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_persist_and_restore() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let manager = manager().with_store(Arc::clone(&store));
        let session = manager.create_session("u1", None, "desktop").await;
        manager.persist_session("u1").await.unwrap();

        let restored_manager = SessionManager::new(&EngineConfig::default()).with_store(Arc::clone(&store));
        let restored = restored_manager.restore_session("u1", "mobile").await.unwrap();
        assert_eq!(restored.id, session.id);
        assert!(restored.error.is_none());

        let fresh = restored_manager.restore_session("u2", "mobile").await.unwrap();
        assert_eq!(fresh.metadata.device_type, "mobile");
    }

    #[tokio::test]
    async fn test_failed_restore_sets_error() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store.set(&session_key("u1"), json!("garbage")).await.unwrap();
        let manager = manager().with_store(Arc::clone(&store));

        let session = manager.restore_session("u1", "desktop").await.unwrap();

        assert_eq!(session.error.as_deref(), Some(RESTORE_FAILED));
        assert!(session.is_active);
        assert_eq!(manager.get_active_session("u1").await.unwrap().error.as_deref(), Some(RESTORE_FAILED));
    }

    #[tokio::test]
    async fn test_apply_behavior_patterns() {
        let manager = manager();
        manager.create_session("u1", None, "desktop").await;
        let pattern = |kind, label: &str, data| UserBehaviorPattern {
            id: "p".to_string(),
            pattern_type: kind,
            pattern: label.to_string(),
            confidence: 0.8,
            data,
            last_updated: Utc::now(),
        };

        let session = manager
            .apply_behavior_patterns(
                "u1",
                vec![
                    pattern(BehaviorPatternType::CommunicationStyle, "concise", json!({})),
                    pattern(BehaviorPatternType::FeatureUsage, "feature_preferences", json!({"mostUsedFeatures": ["emoji"]})),
                    pattern(BehaviorPatternType::TemporalPattern, "night_owl", json!({})),
                    pattern(BehaviorPatternType::PreferencePattern, "preferences", json!({"theme": "dark"})),
                ],
            )
            .await
            .unwrap();

        assert_eq!(session.personalizations["response_length"], "short");
        assert_eq!(session.personalizations["preferred_features"], json!(["emoji"]));
        assert_eq!(session.personalizations["active_period"], "night_owl");
        assert_eq!(session.preferences.theme, "dark");
        assert_eq!(session.behavior_patterns.len(), 4);

        assert!(manager.apply_behavior_patterns("nobody", vec![]).await.is_none());
    }

    #[tokio::test]
    async fn test_record_context_and_metrics() {
        let manager = manager();
        assert!(!manager.record_context("u1", "conv", ConversationContext::fallback()).await);

        manager.create_session("u1", None, "desktop").await;
        assert!(manager.record_context("u1", "conv", ConversationContext::fallback()).await);
        assert!(manager
            .get_active_session("u1")
            .await
            .unwrap()
            .conversation_contexts
            .contains_key("conv"));

        let metrics = manager.get_session_metrics("u1").await;
        assert_eq!(metrics.total_sessions, 1);
        assert_eq!(metrics.dominant_device.as_deref(), Some("desktop"));
        assert_eq!(manager.get_session_insights("u1").await.longest_streak, 1);
    }
}
