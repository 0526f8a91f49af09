/// Turns a context into guidance for the response writer
///
/// Pure table lookups on sentiment, expertise, intent and complexity.

use crate::models::{ComplexityLevel, ConversationContext, ExpertiseLevel, Sentiment, UserIntent};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationInsights {
    pub tone: String,
    pub detail_level: String,
    pub example_style: String,
    pub focus_topics: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptedResponseStyle {
    pub tone: String,
    pub verbosity: String,
    pub structure: String,
    pub include_examples: bool,
    pub include_code: bool,
}

pub fn get_conversation_insights(context: &ConversationContext) -> ConversationInsights {
    let mut recommendations = Vec::new();

    match context.sentiment {
        Sentiment::Frustrated => {
            recommendations.push("Acknowledge the difficulty before proposing a fix".to_string())
        }
        Sentiment::SeekingHelp => recommendations.push("Answer each open question explicitly".to_string()),
        Sentiment::Positive | Sentiment::Neutral => {}
    }

    match context.expertise_level {
        ExpertiseLevel::Beginner => recommendations.push("Define terms the first time they appear".to_string()),
        ExpertiseLevel::Expert => recommendations.push("Skip the basics and cover trade-offs".to_string()),
        ExpertiseLevel::Intermediate | ExpertiseLevel::Unknown => {}
    }

    if context.complexity_level == ComplexityLevel::High {
        recommendations.push("Break the answer into smaller steps".to_string());
    }

    if let Some(topic) = context.topics.first() {
        recommendations.push(format!("Keep the answer focused on {}", topic));
    }

    ConversationInsights {
        tone: tone_for(context.sentiment).to_string(),
        detail_level: detail_for(context.expertise_level).to_string(),
        example_style: example_style_for(context.user_intent).to_string(),
        focus_topics: context.topics.clone(),
        recommendations,
    }
}

pub fn get_adapted_response_style(context: &ConversationContext) -> AdaptedResponseStyle {
    let verbosity = match context.expertise_level {
        ExpertiseLevel::Beginner => "verbose",
        ExpertiseLevel::Expert => "concise",
        ExpertiseLevel::Intermediate | ExpertiseLevel::Unknown => "moderate",
    };

    let structure = match context.complexity_level {
        ComplexityLevel::High => "step_by_step",
        ComplexityLevel::Medium => "sectioned",
        ComplexityLevel::Low | ComplexityLevel::Unknown => "direct",
    };

    let include_code = matches!(
        context.user_intent,
        UserIntent::ProblemSolving | UserIntent::Implementation | UserIntent::Optimization | UserIntent::CodeReview
    );

    AdaptedResponseStyle {
        tone: tone_for(context.sentiment).to_string(),
        verbosity: verbosity.to_string(),
        structure: structure.to_string(),
        include_examples: context.expertise_level != ExpertiseLevel::Expert
            || context.user_intent == UserIntent::Learning,
        include_code,
    }
}

fn tone_for(sentiment: Sentiment) -> &'static str {
    match sentiment {
        Sentiment::Frustrated => "empathetic",
        Sentiment::SeekingHelp => "supportive",
        Sentiment::Positive => "enthusiastic",
        Sentiment::Neutral => "professional",
    }
}

fn detail_for(expertise: ExpertiseLevel) -> &'static str {
    match expertise {
        ExpertiseLevel::Beginner => "detailed",
        ExpertiseLevel::Expert => "brief",
        ExpertiseLevel::Intermediate | ExpertiseLevel::Unknown => "balanced",
    }
}

fn example_style_for(intent: UserIntent) -> &'static str {
    match intent {
        UserIntent::Learning => "step_by_step",
        UserIntent::ProblemSolving => "diagnostic",
        UserIntent::Implementation => "code_samples",
        UserIntent::Optimization => "before_after",
        UserIntent::CodeReview => "annotated",
        UserIntent::GeneralAssistance | UserIntent::Unknown => "conversational",
    }
}
