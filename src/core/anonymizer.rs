/// Strips identity and message content out of interaction data before storage
///
/// Sensitive keys get a deterministic hash when they hold a string and are
/// dropped otherwise. String values under other keys that look like an email
/// address or an IP are hashed too.

use regex::Regex;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

// Keys that identify the user or carry what they typed
const SENSITIVE_KEYS: &[&str] = &["userId", "email", "name", "ip", "content", "message"];

// Values that identify a person no matter which key they sit under
const SENSITIVE_VALUE_PATTERNS: &[&str] = &[
    r"^[^@\s]+@[^@\s]+\.[a-z]{2,}$", // email
    r"^\d{1,3}(\.\d{1,3}){3}$",       // IPv4
];

pub struct Anonymizer {
    value_patterns: Vec<Regex>,
}

impl Default for Anonymizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Anonymizer {
    pub fn new() -> Self {
        // Build all the regex patterns once so we don't recompile them every time
        let value_patterns = SENSITIVE_VALUE_PATTERNS
            .iter()
            .filter_map(|pattern| Regex::new(pattern).ok())
            .collect();

        Self { value_patterns }
    }

    /// Returns an anonymized copy of `data`
    pub fn anonymize(&self, data: &Map<String, Value>) -> Map<String, Value> {
        let mut out = Map::new();

        for (key, value) in data {
            if is_sensitive_key(key) {
                // Strings keep a stable stand-in, everything else goes
                if let Value::String(s) = value {
                    out.insert(key.clone(), Value::String(hash_identifier(s)));
                }
                continue;
            }

            out.insert(key.clone(), self.anonymize_value(value));
        }

        out
    }

    fn anonymize_value(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(self.anonymize(map)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.anonymize_value(v)).collect()),
            Value::String(s) if self.looks_sensitive(s) => Value::String(hash_identifier(s)),
            other => other.clone(),
        }
    }

    fn looks_sensitive(&self, value: &str) -> bool {
        let lowercase = value.trim().to_lowercase();

        self.value_patterns
            .iter()
            .any(|regex| regex.is_match(&lowercase))
    }
}

fn is_sensitive_key(key: &str) -> bool {
    SENSITIVE_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key))
}

/// Deterministic, non-reversible stand-in for an identifier
pub fn hash_identifier(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    let hex: String = digest.iter().take(8).map(|b| format!("{:02x}", b)).collect();
    format!("anon_{}", hex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_sensitive_strings_are_hashed() {
        let anonymizer = Anonymizer::new();
        let data = as_map(json!({
            "content": "my secret message",
            "email": "jane@example.com",
            "feature": "file_upload"
        }));

        let out = anonymizer.anonymize(&data);
        assert_eq!(out["content"], Value::String(hash_identifier("my secret message")));
        assert!(out["email"].as_str().unwrap().starts_with("anon_"));
        assert_eq!(out["feature"], "file_upload");
    }

    #[test]
    fn test_sensitive_non_strings_are_removed() {
        let anonymizer = Anonymizer::new();
        let data = as_map(json!({"message": {"text": "hi"}, "ip": 12345, "theme": "dark"}));

        let out = anonymizer.anonymize(&data);
        assert!(!out.contains_key("message"));
        assert!(!out.contains_key("ip"));
        assert_eq!(out["theme"], "dark");
    }

    #[test]
    fn test_nested_and_value_scrubbing() {
        let anonymizer = Anonymizer::new();
        let data = as_map(json!({
            "meta": {"name": "Jane", "contact": "jane@example.com"},
            "peers": ["10.0.0.1", "desktop"]
        }));

        let out = anonymizer.anonymize(&data);
        let meta = out["meta"].as_object().unwrap();
        assert!(meta["name"].as_str().unwrap().starts_with("anon_"));
        assert!(meta["contact"].as_str().unwrap().starts_with("anon_"));
        assert!(out["peers"][0].as_str().unwrap().starts_with("anon_"));
        assert_eq!(out["peers"][1], "desktop");
    }

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(hash_identifier("user-1"), hash_identifier("user-1"));
        assert_ne!(hash_identifier("user-1"), hash_identifier("user-2"));
        assert_eq!(hash_identifier("x").len(), "anon_".len() + 16);
    }
}
