/// Intelligence module
///
/// Context inference, behavior pattern mining, suggestion generation, ranking
/// and feedback learning.

pub mod context_analyzer;
pub mod feedback;
pub mod inference;
pub mod insights;
pub mod pattern_detector;
pub mod scorer;
pub mod suggestion_engine;
pub mod validator;

pub use context_analyzer::{ContextAnalysis, ContextAnalyzer};
pub use feedback::{FeedbackLog, LearnedPreferences};
pub use inference::{ContextInferenceProvider, HeuristicInference, Inference};
pub use insights::{get_adapted_response_style, get_conversation_insights, AdaptedResponseStyle, ConversationInsights};
pub use pattern_detector::PatternDetector;
pub use scorer::Scorer;
pub use suggestion_engine::{BatchResult, SuggestionEngine, SuggestionRequest};
pub use validator::{validate_suggestion, validate_suggestion_value};
