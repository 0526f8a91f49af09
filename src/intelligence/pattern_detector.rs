/// Finds patterns in a user's interaction history
///
/// Like when someone always writes two-line messages, keeps opening the file
/// uploader, or only shows up after midnight. Confidence values are fixed per
/// pattern kind: they say how much we trust the heuristic, not the data.

use crate::models::{BehaviorPatternType, UserBehaviorPattern, UserInteraction, FEATURE_USED, MESSAGE_SENT};
use chrono::{DateTime, Timelike, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;

// Need this many interactions before saying anything about a user
pub const MIN_INTERACTIONS: usize = 5;

// Average message length below this is "concise"
const CONCISE_MESSAGE_LENGTH: f64 = 100.0;

const COMMUNICATION_CONFIDENCE: f64 = 0.8;
const FEATURE_USAGE_CONFIDENCE: f64 = 0.9;
const TEMPORAL_CONFIDENCE: f64 = 0.7;
const PREFERENCE_CONFIDENCE: f64 = 0.85;

const PREFERENCE_FIELDS: &[&str] = &["theme", "language", "responseStyle"];

pub struct PatternDetector {
    min_interactions: usize,
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self::new(MIN_INTERACTIONS)
    }
}

impl PatternDetector {
    pub fn new(min_interactions: usize) -> Self {
        Self { min_interactions }
    }

    // Main function - mines every pattern kind we know about
    pub fn detect_patterns(&self, interactions: &[UserInteraction]) -> Vec<UserBehaviorPattern> {
        self.detect_patterns_at(interactions, Utc::now())
    }

    pub fn detect_patterns_at(
        &self,
        interactions: &[UserInteraction],
        now: DateTime<Utc>,
    ) -> Vec<UserBehaviorPattern> {
        if interactions.len() < self.min_interactions {
            return Vec::new();
        }

        [
            self.detect_communication_style(interactions),
            self.detect_feature_usage(interactions),
            self.detect_temporal_pattern(interactions),
            self.detect_preferences(interactions),
        ]
        .into_iter()
        .flatten()
        .map(|(pattern_type, label, confidence, data)| UserBehaviorPattern {
            id: format!("{}_{}", pattern_type, uuid::Uuid::new_v4().simple()),
            pattern_type,
            pattern: label,
            confidence,
            data,
            last_updated: now,
        })
        .collect()
    }

    /// Average message length and response time over sent messages
    fn detect_communication_style(
        &self,
        interactions: &[UserInteraction],
    ) -> Option<(BehaviorPatternType, String, f64, Value)> {
        let messages: Vec<&UserInteraction> = interactions
            .iter()
            .filter(|i| i.interaction_type == MESSAGE_SENT)
            .collect();

        if messages.is_empty() {
            return None;
        }

        let lengths: Vec<f64> = messages.iter().filter_map(|m| message_length(m)).collect();
        if lengths.is_empty() {
            return None;
        }
        let avg_length = lengths.iter().sum::<f64>() / lengths.len() as f64;

        let response_times: Vec<f64> = messages
            .iter()
            .filter_map(|m| m.data.get("responseTime").and_then(Value::as_f64))
            .collect();
        let avg_response_time = if response_times.is_empty() {
            None
        } else {
            Some(response_times.iter().sum::<f64>() / response_times.len() as f64)
        };

        let label = if avg_length < CONCISE_MESSAGE_LENGTH {
            "concise"
        } else {
            "detailed"
        };

        Some((
            BehaviorPatternType::CommunicationStyle,
            label.to_string(),
            COMMUNICATION_CONFIDENCE,
            json!({
                "averageMessageLength": avg_length,
                "averageResponseTime": avg_response_time,
                "messageCount": messages.len(),
            }),
        ))
    }

    /// Top three features by use count
    fn detect_feature_usage(
        &self,
        interactions: &[UserInteraction],
    ) -> Option<(BehaviorPatternType, String, f64, Value)> {
        let mut counts: HashMap<&str, usize> = HashMap::new();

        for interaction in interactions {
            if let Some(feature) = interaction.data.get("feature").and_then(Value::as_str) {
                *counts.entry(feature).or_insert(0) += 1;
            } else if interaction.interaction_type == FEATURE_USED {
                *counts.entry("unnamed").or_insert(0) += 1;
            }
        }

        if counts.is_empty() {
            return None;
        }

        let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
        // Highest count first, name breaks ties so results are stable
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let usage: serde_json::Map<String, Value> = ranked
            .iter()
            .map(|(feature, count)| (feature.to_string(), json!(count)))
            .collect();
        let most_used: Vec<&str> = ranked.iter().take(3).map(|(feature, _)| *feature).collect();

        Some((
            BehaviorPatternType::FeatureUsage,
            "feature_preferences".to_string(),
            FEATURE_USAGE_CONFIDENCE,
            json!({
                "mostUsedFeatures": most_used,
                "featureUsage": usage,
            }),
        ))
    }

    /// When during the day the user is around
    fn detect_temporal_pattern(
        &self,
        interactions: &[UserInteraction],
    ) -> Option<(BehaviorPatternType, String, f64, Value)> {
        let mut histogram = [0usize; 24];
        for interaction in interactions {
            histogram[interaction.timestamp.hour() as usize] += 1;
        }

        // First hour with the highest count
        let (peak_hour, _) = histogram
            .iter()
            .enumerate()
            .fold((0usize, 0usize), |best, (hour, &count)| {
                if count > best.1 {
                    (hour, count)
                } else {
                    best
                }
            });

        Some((
            BehaviorPatternType::TemporalPattern,
            classify_peak_hour(peak_hour as u32).to_string(),
            TEMPORAL_CONFIDENCE,
            json!({
                "peakHour": peak_hour,
                "hourDistribution": histogram.to_vec(),
            }),
        ))
    }

    /// Majority vote over preference fields seen in interaction data
    fn detect_preferences(
        &self,
        interactions: &[UserInteraction],
    ) -> Option<(BehaviorPatternType, String, f64, Value)> {
        let mut preferences = serde_json::Map::new();

        for field in PREFERENCE_FIELDS {
            let values: Vec<&str> = interactions
                .iter()
                .filter_map(|i| i.data.get(*field).and_then(Value::as_str))
                .collect();

            if let Some(winner) = majority(&values) {
                preferences.insert(field.to_string(), json!(winner));
            }
        }

        if preferences.is_empty() {
            return None;
        }

        Some((
            BehaviorPatternType::PreferencePattern,
            "preferences".to_string(),
            PREFERENCE_CONFIDENCE,
            Value::Object(preferences),
        ))
    }
}

fn message_length(interaction: &UserInteraction) -> Option<f64> {
    interaction
        .data
        .get("messageLength")
        .and_then(Value::as_f64)
        .or_else(|| {
            interaction
                .data
                .get("content")
                .and_then(Value::as_str)
                .map(|s| s.chars().count() as f64)
        })
}

pub fn classify_peak_hour(hour: u32) -> &'static str {
    if hour >= 22 || hour <= 6 {
        "night_owl"
    } else if (5..=9).contains(&hour) {
        "early_bird"
    } else {
        "regular"
    }
}

/// Most frequent value; the earliest seen wins a tie
fn majority<'a>(values: &[&'a str]) -> Option<&'a str> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for value in values {
        match counts.iter().position(|(v, _)| v == value) {
            Some(idx) => counts[idx].1 += 1,
            None => counts.push((*value, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::Map;

    fn interaction(kind: &str, hour: u32, data: Value) -> UserInteraction {
        let data: Map<String, Value> = match data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        UserInteraction {
            id: uuid::Uuid::new_v4().to_string(),
            interaction_type: kind.to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 3, 10, hour, 15, 0).unwrap(),
            data,
            anonymized_user_id: None,
        }
    }

    fn find(patterns: &[UserBehaviorPattern], kind: BehaviorPatternType) -> &UserBehaviorPattern {
        patterns.iter().find(|p| p.pattern_type == kind).unwrap()
    }

    #[test]
    fn test_requires_minimum_interactions() {
        let detector = PatternDetector::default();
        let few: Vec<_> = (0..4)
            .map(|_| interaction(MESSAGE_SENT, 12, json!({"messageLength": 20})))
            .collect();

        assert!(detector.detect_patterns(&few).is_empty());
    }

    #[test]
    fn test_detects_all_pattern_kinds() {
        let detector = PatternDetector::default();
        let interactions = vec![
            interaction(MESSAGE_SENT, 23, json!({"messageLength": 40, "responseTime": 1000})),
            interaction(MESSAGE_SENT, 23, json!({"messageLength": 60, "responseTime": 3000})),
            interaction(FEATURE_USED, 23, json!({"feature": "file_upload", "theme": "dark"})),
            interaction(FEATURE_USED, 1, json!({"feature": "file_upload", "theme": "dark"})),
            interaction(FEATURE_USED, 14, json!({"feature": "emoji", "theme": "light"})),
            interaction(FEATURE_USED, 14, json!({"feature": "voice", "language": "de"})),
            interaction(FEATURE_USED, 23, json!({"feature": "search"})),
        ];

        let patterns = detector.detect_patterns(&interactions);
        assert_eq!(patterns.len(), 4);

        let style = find(&patterns, BehaviorPatternType::CommunicationStyle);
        assert_eq!(style.pattern, "concise");
        assert_eq!(style.data["averageMessageLength"], 50.0);
        assert_eq!(style.data["averageResponseTime"], 2000.0);
        assert_eq!(style.confidence, COMMUNICATION_CONFIDENCE);

        let usage = find(&patterns, BehaviorPatternType::FeatureUsage);
        assert_eq!(usage.data["mostUsedFeatures"], json!(["file_upload", "emoji", "search"]));

        let temporal = find(&patterns, BehaviorPatternType::TemporalPattern);
        assert_eq!(temporal.pattern, "night_owl");
        assert_eq!(temporal.data["peakHour"], 23);

        let prefs = find(&patterns, BehaviorPatternType::PreferencePattern);
        assert_eq!(prefs.data["theme"], "dark");
        assert_eq!(prefs.data["language"], "de");
        assert!(prefs.data.get("responseStyle").is_none());

        for pattern in &patterns {
            assert!((0.7..=0.9).contains(&pattern.confidence));
        }
    }

    #[test]
    fn test_detailed_style_from_content_length() {
        let detector = PatternDetector::default();
        let long = "x".repeat(150);
        let interactions: Vec<_> = (0..5)
            .map(|_| interaction(MESSAGE_SENT, 12, json!({ "content": long })))
            .collect();

        let patterns = detector.detect_patterns(&interactions);
        let style = find(&patterns, BehaviorPatternType::CommunicationStyle);
        assert_eq!(style.pattern, "detailed");
    }

    #[test]
    fn test_classify_peak_hour() {
        assert_eq!(classify_peak_hour(23), "night_owl");
        assert_eq!(classify_peak_hour(3), "night_owl");
        assert_eq!(classify_peak_hour(6), "night_owl");
        assert_eq!(classify_peak_hour(7), "early_bird");
        assert_eq!(classify_peak_hour(9), "early_bird");
        assert_eq!(classify_peak_hour(14), "regular");
    }

    #[test]
    fn test_majority_tie_keeps_first_seen() {
        assert_eq!(majority(&["dark", "light"]), Some("dark"));
        assert_eq!(majority(&["dark", "light", "light"]), Some("light"));
        assert_eq!(majority(&[]), None);
    }
}
