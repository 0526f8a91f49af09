/// Scoring algorithms for suggestions
///
/// Ranking is a pure function of the suggestion list, the user's learned
/// preferences and their feedback history. Storage of both lives elsewhere.

use crate::intelligence::feedback::LearnedPreferences;
use crate::models::{SmartSuggestion, SuggestionFeedback};

/// Scorer for calculating adjusted confidence
pub struct Scorer;

impl Scorer {
    /// Multiplier for categories the user is known to prefer
    pub const PREFERENCE_BOOST: f64 = 1.2;

    /// Score used for ranking
    ///
    /// # Arguments
    /// * `confidence` - Generator confidence (0.0-1.0)
    /// * `prefers` - Whether the user prefers this category
    /// * `feedback_factor` - Result of `feedback_factor` for the category
    ///
    /// # Returns
    /// * Score between 0.0 and 1.0
    pub fn adjusted_confidence(confidence: f64, prefers: bool, feedback_factor: f64) -> f64 {
        let boost = if prefers { Self::PREFERENCE_BOOST } else { 1.0 };
        let score = confidence * boost * feedback_factor;

        if score.is_nan() {
            return 0.0;
        }
        score.clamp(0.0, 1.0)
    }

    /// Historical helpfulness on a 0.5 baseline
    ///
    /// No history means no opinion (1.0). Otherwise 0.5 when nothing was
    /// helpful, up to 1.0 when everything was.
    pub fn feedback_factor(positive: usize, total: usize) -> f64 {
        if total == 0 {
            return 1.0;
        }

        0.5 + 0.5 * (positive as f64 / total as f64)
    }

    /// (positive, total) feedback entries for a category
    pub fn category_feedback(category: &str, history: &[SuggestionFeedback]) -> (usize, usize) {
        history
            .iter()
            .filter(|f| f.category.as_deref() == Some(category))
            .fold((0, 0), |(positive, total), f| {
                let helpful = f.effective_rating() > 3.0;
                (positive + usize::from(helpful), total + 1)
            })
    }

    /// Rank by adjusted confidence, highest first; ties keep input order
    pub fn rank(
        suggestions: Vec<SmartSuggestion>,
        preferences: &LearnedPreferences,
        history: &[SuggestionFeedback],
    ) -> Vec<SmartSuggestion> {
        let mut ranked: Vec<SmartSuggestion> = suggestions
            .into_iter()
            .map(|mut suggestion| {
                let prefers = preferences.prefers(&suggestion.category);
                let (positive, total) = Self::category_feedback(&suggestion.category, history);
                let factor = Self::feedback_factor(positive, total);

                suggestion.adjusted_confidence =
                    Some(Self::adjusted_confidence(suggestion.confidence, prefers, factor));
                if prefers {
                    suggestion.personalization_reason =
                        Some(format!("You often find {} suggestions useful", suggestion.category));
                }
                suggestion
            })
            .collect();

        // sort_by is stable
        ranked.sort_by(|a, b| b.effective_confidence().total_cmp(&a.effective_confidence()));
        ranked
    }
}
