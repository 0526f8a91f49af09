/// Key-value store abstraction
///
/// Contexts, session snapshots and behavior snapshots are JSON documents under
/// string keys. Absence is normal (cold start); callers decide what to do with
/// documents that no longer parse.

use crate::db::Database;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Returns whether the key existed
    async fn remove(&self, key: &str) -> Result<bool>;

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

/// In-process store
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .entries
            .read()
            .await
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl KeyValueStore for Database {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        match self.get_entry(key).await? {
            Some(entry) => match entry.json() {
                Ok(value) => Ok(Some(value)),
                Err(e) => {
                    // Surface as a non-JSON string so callers can reject it
                    tracing::warn!(key, error = %e, "stored entry is not valid JSON");
                    Ok(Some(Value::String(entry.value)))
                }
            },
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let serialized = serde_json::to_string(&value)?;
        self.put_entry(key, &serialized).await
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        self.delete_entry(key).await
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        self.entry_keys_with_prefix(prefix).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn exercise(store: &dyn KeyValueStore) {
        assert!(store.get("context_a").await.unwrap().is_none());

        store.set("context_a", json!({"id": "a"})).await.unwrap();
        store.set("context_b", json!({"id": "b"})).await.unwrap();
        store.set("session_u", json!({"id": "s"})).await.unwrap();

        assert_eq!(store.get("context_a").await.unwrap().unwrap()["id"], "a");
        assert_eq!(
            store.keys_with_prefix("context_").await.unwrap(),
            vec!["context_a".to_string(), "context_b".to_string()]
        );

        assert!(store.remove("context_a").await.unwrap());
        assert!(!store.remove("context_a").await.unwrap());
        assert!(store.get("context_a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        exercise(&store).await;
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_database_store() {
        let db = Database::new_test().await.unwrap();
        exercise(&db).await;
    }

    #[tokio::test]
    async fn test_database_store_tolerates_non_json() {
        let db = Database::new_test().await.unwrap();
        db.put_entry("context_broken", "{oops").await.unwrap();

        let value = KeyValueStore::get(&db, "context_broken").await.unwrap().unwrap();
        assert_eq!(value, Value::String("{oops".to_string()));
    }
}
