use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionType {
    QuickReply,
    ActionSuggestion,
    FollowUp,
    Clarification,
}

impl SuggestionType {
    pub const ALL: [&'static str; 4] = ["quick_reply", "action_suggestion", "follow_up", "clarification"];

    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionType::QuickReply => "quick_reply",
            SuggestionType::ActionSuggestion => "action_suggestion",
            SuggestionType::FollowUp => "follow_up",
            SuggestionType::Clarification => "clarification",
        }
    }
}

impl std::fmt::Display for SuggestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Batch priority. Declared high-first so ascending order is processing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// A candidate reply, action, follow-up or clarification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartSuggestion {
    pub id: String,
    #[serde(rename = "type")]
    pub suggestion_type: SuggestionType,
    pub content: String,
    pub confidence: f64,
    pub reason: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub is_fallback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personalization_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adaptation_reason: Option<String>,
    /// Set by ranking; always within [0, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjusted_confidence: Option<f64>,
}

impl SmartSuggestion {
    pub fn new(
        suggestion_type: SuggestionType,
        content: impl Into<String>,
        confidence: f64,
        reason: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: format!("{}_{}", suggestion_type, uuid::Uuid::new_v4().simple()),
            suggestion_type,
            content: content.into(),
            confidence: confidence.clamp(0.0, 1.0),
            reason: reason.into(),
            category: category.into(),
            action: None,
            complexity: None,
            priority: None,
            is_fallback: false,
            personalization_reason: None,
            adaptation_reason: None,
            adjusted_confidence: None,
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_complexity(mut self, complexity: impl Into<String>) -> Self {
        self.complexity = Some(complexity.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Confidence used for ordering: the adjusted value once ranked
    pub fn effective_confidence(&self) -> f64 {
        self.adjusted_confidence.unwrap_or(self.confidence)
    }
}

/// User reaction to a suggestion. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionFeedback {
    pub suggestion_id: String,
    pub used: bool,
    #[serde(default)]
    pub helpful: Option<bool>,
    #[serde(default)]
    pub follow_up_action: Option<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub category: Option<String>,
    /// 1..=5
    #[serde(default)]
    pub rating: Option<u8>,
}

impl SuggestionFeedback {
    pub fn new(suggestion_id: impl Into<String>, used: bool, helpful: Option<bool>) -> Self {
        Self {
            suggestion_id: suggestion_id.into(),
            used,
            helpful,
            follow_up_action: None,
            timestamp: Utc::now(),
            category: None,
            rating: None,
        }
    }

    pub fn for_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_rating(mut self, rating: u8) -> Self {
        self.rating = Some(rating.clamp(1, 5));
        self
    }

    /// Explicit rating, or one derived from helpfulness
    pub fn effective_rating(&self) -> f64 {
        match (self.rating, self.helpful) {
            (Some(rating), _) => rating.clamp(1, 5) as f64,
            (None, Some(true)) => 5.0,
            (None, Some(false)) => 1.0,
            (None, None) => 3.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clamps_confidence() {
        let s = SmartSuggestion::new(SuggestionType::QuickReply, "ok", 1.7, "test", "general");
        assert_eq!(s.confidence, 1.0);
        assert!(s.id.starts_with("quick_reply_"));
    }

    #[test]
    fn test_priority_order() {
        let mut priorities = vec![Priority::Low, Priority::High, Priority::Medium];
        priorities.sort();
        assert_eq!(priorities, vec![Priority::High, Priority::Medium, Priority::Low]);
    }

    #[test]
    fn test_effective_rating() {
        assert_eq!(SuggestionFeedback::new("a", true, Some(true)).effective_rating(), 5.0);
        assert_eq!(SuggestionFeedback::new("a", true, Some(false)).effective_rating(), 1.0);
        assert_eq!(SuggestionFeedback::new("a", true, None).effective_rating(), 3.0);
        assert_eq!(
            SuggestionFeedback::new("a", true, Some(false)).with_rating(4).effective_rating(),
            4.0
        );
    }

    #[test]
    fn test_type_serializes_as_snake_case() {
        let s = SmartSuggestion::new(SuggestionType::ActionSuggestion, "x", 0.5, "r", "c");
        let value = serde_json::to_value(&s).unwrap();
        assert_eq!(value["type"], "action_suggestion");
        assert!(value.get("adjustedConfidence").is_none());
    }
}
