use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Interaction type emitted when the user sends a chat message
pub const MESSAGE_SENT: &str = "message_sent";

/// Interaction type emitted when the user touches a widget feature
pub const FEATURE_USED: &str = "feature_used";

/// A stored, consented (and possibly anonymized) interaction event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInteraction {
    pub id: String,
    #[serde(rename = "type")]
    pub interaction_type: String,
    pub timestamp: DateTime<Utc>,
    pub data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anonymized_user_id: Option<String>,
}

/// What the UI hands to the tracker
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionInput {
    #[serde(rename = "type")]
    pub interaction_type: String,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl InteractionInput {
    pub fn new(interaction_type: impl Into<String>) -> Self {
        Self {
            interaction_type: interaction_type.into(),
            ..Default::default()
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorPatternType {
    CommunicationStyle,
    FeatureUsage,
    TemporalPattern,
    PreferencePattern,
}

impl std::fmt::Display for BehaviorPatternType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BehaviorPatternType::CommunicationStyle => "communication_style",
            BehaviorPatternType::FeatureUsage => "feature_usage",
            BehaviorPatternType::TemporalPattern => "temporal_pattern",
            BehaviorPatternType::PreferencePattern => "preference_pattern",
        };
        write!(f, "{}", s)
    }
}

/// Pattern mined from a user's interactions. Replaced wholesale on each run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBehaviorPattern {
    pub id: String,
    #[serde(rename = "type")]
    pub pattern_type: BehaviorPatternType,
    pub pattern: String,
    pub confidence: f64,
    pub data: Value,
    pub last_updated: DateTime<Utc>,
}

/// Per-user consent configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivacySettings {
    pub data_collection: bool,
    pub analytics: bool,
    pub personalization: bool,
    pub anonymize_data: bool,
    /// Days to keep interactions and patterns
    #[serde(default)]
    pub retention_period: Option<i64>,
    #[serde(default)]
    pub consent_date: Option<DateTime<Utc>>,
}

impl Default for PrivacySettings {
    fn default() -> Self {
        Self {
            data_collection: true,
            analytics: true,
            personalization: true,
            anonymize_data: true,
            retention_period: None,
            consent_date: None,
        }
    }
}

impl PrivacySettings {
    /// Everything switched off
    pub fn denied() -> Self {
        Self {
            data_collection: false,
            analytics: false,
            personalization: false,
            anonymize_data: true,
            retention_period: None,
            consent_date: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interaction_input_builder() {
        let input = InteractionInput::new(MESSAGE_SENT)
            .with("messageLength", 42)
            .with("theme", "dark");

        assert_eq!(input.interaction_type, MESSAGE_SENT);
        assert_eq!(input.data["messageLength"], 42);
        assert!(input.timestamp.is_none());
    }

    #[test]
    fn test_pattern_type_display() {
        assert_eq!(BehaviorPatternType::TemporalPattern.to_string(), "temporal_pattern");
    }

    #[test]
    fn test_privacy_settings_json() {
        let settings: PrivacySettings = serde_json::from_str(
            r#"{"dataCollection":false,"analytics":true,"personalization":true,"anonymizeData":false}"#,
        )
        .unwrap();

        assert!(!settings.data_collection);
        assert!(settings.retention_period.is_none());
    }
}
