/// Data models for database entities

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One row of the key-value table
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct KvEntry {
    pub key: String,
    pub value: String, // JSON document
    pub updated_at: String, // ISO 8601 format from SQLite
}

impl KvEntry {
    /// Parse the stored JSON document
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.value)
    }
}

/// Key under which a conversation context is stored
pub fn context_key(conversation_id: &str) -> String {
    format!("context_{}", conversation_id)
}

/// Key under which a user's session snapshot is stored
pub fn session_key(user_id: &str) -> String {
    format!("session_{}", user_id)
}

/// Key under which a user's behavior snapshot is stored
pub fn behavior_key(user_id: &str) -> String {
    format!("behavior_{}", user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_json() {
        let entry = KvEntry {
            key: "k".to_string(),
            value: r#"{"a":1}"#.to_string(),
            updated_at: "2025-11-25T00:00:00Z".to_string(),
        };
        assert_eq!(entry.json().unwrap()["a"], 1);

        let broken = KvEntry {
            value: "{not json".to_string(),
            ..entry
        };
        assert!(broken.json().is_err());
    }

    #[test]
    fn test_keys() {
        assert_eq!(context_key("c1"), "context_c1");
        assert_eq!(session_key("u1"), "session_u1");
        assert_eq!(behavior_key("u1"), "behavior_u1");
    }
}
