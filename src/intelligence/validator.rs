/// Suggestion validation
///
/// Every problem is reported, not just the first one.

use crate::error::{AdaptError, Result};
use crate::models::{SmartSuggestion, SuggestionType};
use serde_json::Value;

pub fn validate_suggestion(suggestion: &SmartSuggestion) -> Result<()> {
    let mut errors = Vec::new();

    if suggestion.id.trim().is_empty() {
        errors.push("id must not be empty".to_string());
    }
    if suggestion.content.trim().is_empty() {
        errors.push("content must not be empty".to_string());
    }
    check_confidence(suggestion.confidence, &mut errors);

    finish(errors)
}

/// Validate suggestion data that has not been typed yet (e.g. from the UI)
pub fn validate_suggestion_value(value: &Value) -> Result<()> {
    let mut errors = Vec::new();

    match value.get("id").and_then(Value::as_str) {
        Some(id) if !id.trim().is_empty() => {}
        _ => errors.push("id must not be empty".to_string()),
    }

    match value.get("content").and_then(Value::as_str) {
        Some(content) if !content.trim().is_empty() => {}
        _ => errors.push("content must not be empty".to_string()),
    }

    match value.get("confidence").and_then(Value::as_f64) {
        Some(confidence) => check_confidence(confidence, &mut errors),
        None => errors.push("confidence must be a number".to_string()),
    }

    match value.get("type").and_then(Value::as_str) {
        Some(kind) if SuggestionType::ALL.iter().any(|k| *k == kind) => {}
        Some(kind) => errors.push(format!(
            "type '{}' must be one of {}",
            kind,
            SuggestionType::ALL.join(", ")
        )),
        None => errors.push("type is required".to_string()),
    }

    finish(errors)
}

fn check_confidence(confidence: f64, errors: &mut Vec<String>) {
    if !(0.0..=1.0).contains(&confidence) {
        errors.push(format!("confidence {} is outside [0, 1]", confidence));
    }
}

fn finish(errors: Vec<String>) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AdaptError::InvalidSuggestion(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_suggestion() {
        let s = SmartSuggestion::new(SuggestionType::FollowUp, "Show an example", 0.7, "r", "learning");
        assert!(validate_suggestion(&s).is_ok());
        assert!(validate_suggestion_value(&serde_json::to_value(&s).unwrap()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut s = SmartSuggestion::new(SuggestionType::FollowUp, "x", 0.5, "r", "c");
        s.id = String::new();
        s.content = "   ".to_string();
        s.confidence = 1.5;

        match validate_suggestion(&s) {
            Err(AdaptError::InvalidSuggestion(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_value_with_unknown_type() {
        let value = json!({"id": "a", "content": "hi", "confidence": -0.1, "type": "telepathy"});

        match validate_suggestion_value(&value) {
            Err(AdaptError::InvalidSuggestion(errors)) => {
                assert_eq!(errors.len(), 2);
                assert!(errors[1].contains("telepathy"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
