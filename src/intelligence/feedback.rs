/// Learns which suggestion categories a user actually likes
///
/// A category is preferred once its average rating is above 3 and more than
/// half of its suggestions got used. The log per user is bounded; oldest
/// entries fall off first.

use crate::models::{SmartSuggestion, SuggestionFeedback};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};

pub const USER_FEEDBACK_DRIVEN: &str = "user_feedback_driven";

const PREFERENCE_MIN_RATING: f64 = 3.0;
const PREFERENCE_MIN_USAGE: f64 = 0.5;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnedPreferences {
    /// `prefer_<category>` -> preferred
    pub flags: BTreeMap<String, bool>,
    /// category -> strength in [0, 1]; only preferred categories appear
    pub strengths: BTreeMap<String, f64>,
}

impl LearnedPreferences {
    pub fn prefers(&self, category: &str) -> bool {
        self.flags
            .get(&preference_flag(category))
            .copied()
            .unwrap_or(false)
    }

    pub fn strength(&self, category: &str) -> f64 {
        self.strengths.get(category).copied().unwrap_or(0.0)
    }
}

pub fn preference_flag(category: &str) -> String {
    format!("prefer_{}", category)
}

/// Aggregate a feedback history into per-category preferences
///
/// Entries without a category carry no signal and are skipped.
pub fn learn_from_feedback(history: &[SuggestionFeedback]) -> LearnedPreferences {
    // category -> (rating sum, used count, total)
    let mut stats: BTreeMap<&str, (f64, usize, usize)> = BTreeMap::new();

    for feedback in history {
        let Some(category) = feedback.category.as_deref() else {
            continue;
        };
        let entry = stats.entry(category).or_insert((0.0, 0, 0));
        entry.0 += feedback.effective_rating();
        entry.1 += usize::from(feedback.used);
        entry.2 += 1;
    }

    let mut preferences = LearnedPreferences::default();
    for (category, (rating_sum, used, total)) in stats {
        let average_rating = rating_sum / total as f64;
        let usage_rate = used as f64 / total as f64;
        let prefers = average_rating > PREFERENCE_MIN_RATING && usage_rate > PREFERENCE_MIN_USAGE;

        preferences.flags.insert(preference_flag(category), prefers);
        if prefers {
            // 3 -> 0, 5 -> 1, scaled down by how often it goes unused
            let strength = ((average_rating - PREFERENCE_MIN_RATING) / 2.0 * usage_rate).clamp(0.0, 1.0);
            preferences.strengths.insert(category.to_string(), strength);
        }
    }

    preferences
}

/// Reweight by learned strength: `confidence * (1 + strength)`, clamped
pub fn generate_improved_suggestions(
    suggestions: Vec<SmartSuggestion>,
    preferences: &LearnedPreferences,
) -> Vec<SmartSuggestion> {
    let mut improved: Vec<SmartSuggestion> = suggestions
        .into_iter()
        .map(|mut suggestion| {
            let strength = preferences.strength(&suggestion.category);
            suggestion.confidence = (suggestion.confidence * (1.0 + strength)).clamp(0.0, 1.0);
            suggestion.adaptation_reason = Some(USER_FEEDBACK_DRIVEN.to_string());
            suggestion
        })
        .collect();

    improved.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    improved
}

/// Bounded per-user feedback log with the preferences learned from it
#[derive(Debug)]
pub struct FeedbackLog {
    limit: usize,
    entries: HashMap<String, VecDeque<SuggestionFeedback>>,
    preferences: HashMap<String, LearnedPreferences>,
}

impl FeedbackLog {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            entries: HashMap::new(),
            preferences: HashMap::new(),
        }
    }

    /// Append and relearn. Returns the user's updated preferences.
    pub fn record(&mut self, user_id: &str, feedback: SuggestionFeedback) -> LearnedPreferences {
        let log = self.entries.entry(user_id.to_string()).or_default();
        log.push_back(feedback);
        while log.len() > self.limit {
            log.pop_front();
        }

        let history: Vec<SuggestionFeedback> = log.iter().cloned().collect();
        let learned = learn_from_feedback(&history);
        self.preferences.insert(user_id.to_string(), learned.clone());
        learned
    }

    pub fn history(&self, user_id: &str) -> Vec<SuggestionFeedback> {
        self.entries
            .get(user_id)
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn preferences(&self, user_id: &str) -> LearnedPreferences {
        self.preferences.get(user_id).cloned().unwrap_or_default()
    }

    pub fn forget(&mut self, user_id: &str) -> bool {
        let had_entries = self.entries.remove(user_id).is_some();
        self.preferences.remove(user_id);
        had_entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SuggestionType;

    fn rated(category: &str, used: bool, rating: u8) -> SuggestionFeedback {
        SuggestionFeedback::new("s", used, None)
            .for_category(category)
            .with_rating(rating)
    }

    #[test]
    fn test_preference_thresholds() {
        let history = vec![
            rated("code", true, 5),
            rated("code", true, 4),
            rated("docs", true, 5),
            rated("docs", false, 5),
            rated("screen", true, 3),
            rated("screen", true, 3),
        ];

        let learned = learn_from_feedback(&history);

        assert!(learned.prefers("code"));
        // usage exactly 0.5 is not enough
        assert!(!learned.prefers("docs"));
        // average exactly 3 is not enough
        assert!(!learned.prefers("screen"));
        assert_eq!(learned.flags.get("prefer_docs"), Some(&false));
        assert!((learned.strength("code") - 0.75).abs() < 1e-9);
        assert_eq!(learned.strength("docs"), 0.0);
    }

    #[test]
    fn test_uncategorized_feedback_is_ignored() {
        let learned = learn_from_feedback(&[SuggestionFeedback::new("s", true, Some(true))]);
        assert!(learned.flags.is_empty());
    }

    #[test]
    fn test_improved_suggestions() {
        let learned = learn_from_feedback(&[rated("code", true, 5)]);
        let suggestions = vec![
            SmartSuggestion::new(SuggestionType::ActionSuggestion, "Share docs", 0.7, "r", "docs"),
            SmartSuggestion::new(SuggestionType::ActionSuggestion, "Share code", 0.6, "r", "code"),
        ];

        let improved = generate_improved_suggestions(suggestions, &learned);

        assert_eq!(improved[0].category, "code");
        assert_eq!(improved[0].confidence, 1.0);
        assert_eq!(improved[1].confidence, 0.7);
        assert!(improved
            .iter()
            .all(|s| s.adaptation_reason.as_deref() == Some(USER_FEEDBACK_DRIVEN)));
    }

    #[test]
    fn test_log_is_bounded() {
        let mut log = FeedbackLog::new(3);
        for rating in [1, 1, 5, 5, 5] {
            log.record("u1", rated("code", true, rating));
        }

        assert_eq!(log.history("u1").len(), 3);
        assert!(log.preferences("u1").prefers("code"));
        assert!(log.forget("u1"));
        assert!(log.history("u1").is_empty());
        assert!(!log.preferences("u1").prefers("code"));
    }
}
