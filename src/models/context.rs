use crate::error::{AdaptError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Error tag attached to contexts produced after a failed analysis
pub const ANALYSIS_FAILED: &str = "analysis_failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Neutral,
    Frustrated,
    SeekingHelp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLevel {
    Low,
    Medium,
    High,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpertiseLevel {
    Beginner,
    Intermediate,
    Expert,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserIntent {
    Learning,
    ProblemSolving,
    Implementation,
    Optimization,
    CodeReview,
    GeneralAssistance,
    Unknown,
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Frustrated => "frustrated",
            Sentiment::SeekingHelp => "seeking_help",
        };
        write!(f, "{}", s)
    }
}

impl std::fmt::Display for UserIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UserIntent::Learning => "learning",
            UserIntent::ProblemSolving => "problem_solving",
            UserIntent::Implementation => "implementation",
            UserIntent::Optimization => "optimization",
            UserIntent::CodeReview => "code_review",
            UserIntent::GeneralAssistance => "general_assistance",
            UserIntent::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Structured summary of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationContext {
    pub id: String,
    /// Ordered, duplicate-free
    pub topics: Vec<String>,
    pub sentiment: Sentiment,
    pub user_intent: UserIntent,
    pub complexity_level: ComplexityLevel,
    pub expertise_level: ExpertiseLevel,
    pub last_analyzed: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub fallback_used: bool,
    #[serde(default)]
    pub is_fallback: bool,
}

impl ConversationContext {
    /// Context used when there is nothing (or nothing reliable) to analyze
    pub fn fallback() -> Self {
        Self {
            id: format!("fallback_{}", uuid::Uuid::new_v4().simple()),
            topics: Vec::new(),
            sentiment: Sentiment::Neutral,
            user_intent: UserIntent::Unknown,
            complexity_level: ComplexityLevel::Unknown,
            expertise_level: ExpertiseLevel::Unknown,
            last_analyzed: Utc::now(),
            error: None,
            fallback_used: false,
            is_fallback: true,
        }
    }

    /// Fallback context tagged with the analysis failure
    pub fn failed_analysis() -> Self {
        Self {
            error: Some(ANALYSIS_FAILED.to_string()),
            fallback_used: true,
            ..Self::fallback()
        }
    }

    /// Union new topics into the existing ordered set, keeping at most `max`
    pub fn merge_topics<I, S>(&mut self, topics: I, max: usize)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for topic in topics {
            if self.topics.len() >= max {
                break;
            }
            let topic = topic.into();
            if !self.topics.contains(&topic) {
                self.topics.push(topic);
            }
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.last_analyzed
    }

    /// Reject contexts that must never reach the store
    pub fn validate(&self, max_topics: usize) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(AdaptError::InvalidContext("id must not be empty".to_string()));
        }

        if self.topics.len() > max_topics {
            return Err(AdaptError::InvalidContext(format!(
                "{} topics exceeds the limit of {}",
                self.topics.len(),
                max_topics
            )));
        }

        let mut seen = HashSet::new();
        for topic in &self.topics {
            if topic.trim().is_empty() {
                return Err(AdaptError::InvalidContext("topics must not be blank".to_string()));
            }
            if !seen.insert(topic.as_str()) {
                return Err(AdaptError::InvalidContext(format!("duplicate topic '{}'", topic)));
            }
        }

        if self.last_analyzed > Utc::now() + chrono::Duration::minutes(1) {
            return Err(AdaptError::InvalidContext(
                "lastAnalyzed is in the future".to_string(),
            ));
        }

        if self.error.is_some() && !self.fallback_used {
            return Err(AdaptError::InvalidContext(
                "error set without fallbackUsed".to_string(),
            ));
        }

        Ok(())
    }
}

/// How a conversation moved between topics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftType {
    Pivot,
    Expansion,
    Clarification,
    Progression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextShift {
    pub from_topic: String,
    pub to_topic: String,
    pub shift_type: ShiftType,
    pub confidence: f64,
    pub message_index: usize,
    pub timestamp: DateTime<Utc>,
}
