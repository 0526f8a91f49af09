use crate::models::{ConversationContext, UserBehaviorPattern};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Created,
    Active,
    Idle,
    Ended,
}

/// Why a session stopped being active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Explicit,
    Inactivity,
    Superseded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionPreferences {
    pub theme: String,
    pub language: String,
    pub response_style: String,
    pub suggestions_enabled: bool,
    pub notifications: bool,
}

impl Default for SessionPreferences {
    fn default() -> Self {
        Self {
            theme: "light".to_string(),
            language: "en".to_string(),
            response_style: "balanced".to_string(),
            suggestions_enabled: true,
            notifications: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionMetadata {
    pub device_type: String,
    /// Every device seen for this session, including merged ones
    pub device_types: BTreeSet<String>,
    pub merged_from: Vec<String>,
}

impl SessionMetadata {
    pub fn for_device(device_type: impl Into<String>) -> Self {
        let device_type = device_type.into();
        let mut device_types = BTreeSet::new();
        device_types.insert(device_type.clone());
        Self {
            device_type,
            device_types,
            merged_from: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSession {
    pub id: String,
    pub user_id: String,
    pub start_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub is_active: bool,
    /// Seconds between start and last activity
    pub session_duration: i64,
    pub interaction_count: u64,
    pub preferences: SessionPreferences,
    #[serde(default)]
    pub personalizations: BTreeMap<String, Value>,
    #[serde(default)]
    pub metadata: SessionMetadata,
    #[serde(default)]
    pub conversation_contexts: HashMap<String, ConversationContext>,
    #[serde(default)]
    pub behavior_patterns: Vec<UserBehaviorPattern>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_reason: Option<EndReason>,
    /// Set when the session came out of a failed operation; retryable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UserSession {
    pub fn new(
        user_id: impl Into<String>,
        preferences: SessionPreferences,
        device_type: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: format!("session_{}", uuid::Uuid::new_v4().simple()),
            user_id: user_id.into(),
            start_time: now,
            last_activity: now,
            is_active: true,
            session_duration: 0,
            interaction_count: 0,
            preferences,
            personalizations: BTreeMap::new(),
            metadata: SessionMetadata::for_device(device_type),
            conversation_contexts: HashMap::new(),
            behavior_patterns: Vec::new(),
            ended_at: None,
            end_reason: None,
            error: None,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
        self.interaction_count += 1;
        self.session_duration = (now - self.start_time).num_seconds().max(0);
    }

    pub fn end(&mut self, reason: EndReason, now: DateTime<Utc>) {
        self.is_active = false;
        self.ended_at = Some(now);
        self.end_reason = Some(reason);
        self.session_duration = (self.last_activity - self.start_time).num_seconds().max(0);
    }

    pub fn inactive_for(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.last_activity
    }

    pub fn state_at(&self, now: DateTime<Utc>, idle_after: chrono::Duration) -> SessionState {
        if !self.is_active {
            SessionState::Ended
        } else if self.interaction_count == 0 && self.last_activity == self.start_time {
            SessionState::Created
        } else if self.inactive_for(now) >= idle_after {
            SessionState::Idle
        } else {
            SessionState::Active
        }
    }
}
