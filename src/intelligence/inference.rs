/// Context inference
///
/// `ContextInferenceProvider` is the narrow seam between caching/shift
/// detection and whatever actually reads the messages. `HeuristicInference`
/// does it with keyword tables; a model-backed provider can replace it.

use crate::error::Result;
use crate::models::{ComplexityLevel, ExpertiseLevel, Message, Sentiment, UserIntent};
use async_trait::async_trait;

/// What a provider extracts from a message list
#[derive(Debug, Clone, PartialEq)]
pub struct Inference {
    pub topics: Vec<String>,
    pub sentiment: Sentiment,
    pub user_intent: UserIntent,
    pub complexity_level: ComplexityLevel,
    pub expertise_level: ExpertiseLevel,
}

#[async_trait]
pub trait ContextInferenceProvider: Send + Sync {
    /// Full analysis of a message list
    async fn infer(&self, messages: &[Message]) -> Result<Inference>;

    /// Topics of a single piece of text, in first-match order
    async fn extract_topics(&self, text: &str) -> Result<Vec<String>>;
}

// Topic -> keywords. Order matters: topics come out in table order.
const TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
    ("css", &["css", "stylesheet", "style"]),
    ("layout", &["grid", "layout"]),
    ("flexbox", &["flexbox", "flex"]),
    ("react", &["react", "jsx", "component", "usestate", "useeffect"]),
    ("javascript", &["javascript", "typescript", "node.js", "npm"]),
    ("python", &["python", "django", "flask", "pandas"]),
    ("database", &["database", "sql", "postgres", "mongodb", "query"]),
    ("api", &["api", "endpoint", "graphql", "http request"]),
    ("testing", &["unit test", "jest", "pytest", "test case", "coverage"]),
    ("performance", &["performance", "slow", "latency", "memory leak"]),
    ("security", &["security", "authentication", "password", "encrypt", "xss"]),
    ("deployment", &["deploy", "docker", "kubernetes", "ci/cd", "hosting"]),
    ("git", &["git ", "commit", "merge conflict", "branch"]),
];

const POSITIVE_WORDS: &[&str] = &[
    "thanks", "thank you", "great", "awesome", "perfect", "love", "helpful", "excellent", "works now", "nice",
];

const NEGATIVE_WORDS: &[&str] = &[
    "frustrat", "annoying", "doesn't work", "not working", "broken", "stuck", "confus", "hate", "terrible",
    "useless", "still failing",
];

const QUESTION_WORDS: &[&str] = &["how", "what", "why", "when", "where", "which", "who"];

const TECHNICAL_TERMS: &[&str] = &[
    "api", "function", "algorithm", "database", "async", "component", "architecture", "framework",
    "deployment", "optimization", "configuration", "authentication", "interface", "variable", "recursion",
    "concurrency", "middleware", "schema", "query", "compiler",
];

const BEGINNER_PHRASES: &[&str] = &[
    "i'm new", "i am new", "beginner", "just started", "don't understand", "what is", "explain like",
    "first time", "simple terms",
];

const EXPERT_PHRASES: &[&str] = &[
    "optimiz", "architecture", "scalab", "best practice", "trade-off", "tradeoff", "benchmark", "production",
    "internals", "edge case",
];

// Checked in order; the first family with a hit wins
const INTENT_FAMILIES: &[(UserIntent, &[&str])] = &[
    (UserIntent::Learning, &["learn", "understand", "explain", "tutorial", "teach me", "what is"]),
    (UserIntent::ProblemSolving, &["error", "bug", "fix", "issue", "problem", "not working", "broken", "debug"]),
    (UserIntent::Implementation, &["implement", "build", "create", "how do i", "how to", "write a"]),
    (UserIntent::Optimization, &["optimiz", "faster", "performance", "improve", "speed up", "efficient"]),
    (UserIntent::CodeReview, &["review", "refactor", "feedback on", "clean up", "best practice"]),
];

/// Keyword and lexicon based inference
#[derive(Debug, Clone)]
pub struct HeuristicInference {
    max_topics: usize,
}

impl Default for HeuristicInference {
    fn default() -> Self {
        Self::new(5)
    }
}

impl HeuristicInference {
    pub fn new(max_topics: usize) -> Self {
        Self { max_topics }
    }

    pub fn topics_of(&self, text: &str) -> Vec<String> {
        let lowercase = text.to_lowercase();

        TOPIC_KEYWORDS
            .iter()
            .filter(|(_, keywords)| keywords.iter().any(|k| lowercase.contains(k)))
            .map(|(topic, _)| topic.to_string())
            .take(self.max_topics)
            .collect()
    }

    pub fn sentiment_of(&self, user_text: &str) -> Sentiment {
        let positive = count_hits(user_text, POSITIVE_WORDS);
        let negative = count_hits(user_text, NEGATIVE_WORDS);
        let questions = question_word_count(user_text);

        if negative > positive {
            Sentiment::Frustrated
        } else if questions > 2 {
            Sentiment::SeekingHelp
        } else if positive > 0 {
            Sentiment::Positive
        } else {
            Sentiment::Neutral
        }
    }

    pub fn complexity_of(&self, text: &str) -> ComplexityLevel {
        let words: Vec<usize> = text
            .split_whitespace()
            .map(|w| w.chars().filter(|c| c.is_alphanumeric()).count())
            .filter(|len| *len > 0)
            .collect();

        if words.is_empty() {
            return ComplexityLevel::Low;
        }

        let avg_word_length = words.iter().sum::<usize>() as f64 / words.len() as f64;
        let technical = count_hits(text, TECHNICAL_TERMS);

        if avg_word_length > 6.0 || technical >= 4 {
            ComplexityLevel::High
        } else if avg_word_length > 4.0 || technical >= 2 {
            ComplexityLevel::Medium
        } else {
            ComplexityLevel::Low
        }
    }

    pub fn expertise_of(&self, user_text: &str) -> ExpertiseLevel {
        let beginner = count_hits(user_text, BEGINNER_PHRASES);
        let expert = count_hits(user_text, EXPERT_PHRASES);

        if beginner > expert {
            ExpertiseLevel::Beginner
        } else if expert > beginner {
            ExpertiseLevel::Expert
        } else {
            ExpertiseLevel::Intermediate
        }
    }

    pub fn intent_of(&self, user_text: &str) -> UserIntent {
        let lowercase = user_text.to_lowercase();

        INTENT_FAMILIES
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lowercase.contains(k)))
            .map(|(intent, _)| *intent)
            .unwrap_or(UserIntent::GeneralAssistance)
    }

    fn infer_sync(&self, messages: &[Message]) -> Inference {
        let all_text = join_contents(messages.iter());
        let user_text = join_contents(messages.iter().filter(|m| m.is_user()));

        Inference {
            topics: self.topics_of(&all_text),
            sentiment: self.sentiment_of(&user_text),
            user_intent: self.intent_of(&user_text),
            complexity_level: self.complexity_of(&all_text),
            expertise_level: self.expertise_of(&user_text),
        }
    }
}

#[async_trait]
impl ContextInferenceProvider for HeuristicInference {
    async fn infer(&self, messages: &[Message]) -> Result<Inference> {
        Ok(self.infer_sync(messages))
    }

    async fn extract_topics(&self, text: &str) -> Result<Vec<String>> {
        Ok(self.topics_of(text))
    }
}

fn join_contents<'a>(messages: impl Iterator<Item = &'a Message>) -> String {
    messages.map(|m| m.content.as_str()).collect::<Vec<_>>().join("\n")
}

/// Number of lexicon entries present in `text` (each counted once)
fn count_hits(text: &str, lexicon: &[&str]) -> usize {
    let lowercase = text.to_lowercase();
    lexicon.iter().filter(|entry| lowercase.contains(*entry)).count()
}

fn question_word_count(text: &str) -> usize {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| QUESTION_WORDS.iter().any(|q| *q == w.as_str()))
        .count()
}
