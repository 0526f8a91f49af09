/// SQL query functions for the key-value table

use crate::db::models::*;
use crate::db::Database;
use crate::error::Result;

impl Database {
    /// Fetch a raw entry by key
    pub async fn get_entry(&self, key: &str) -> Result<Option<KvEntry>> {
        let entry = sqlx::query_as::<_, KvEntry>("SELECT * FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(self.pool())
            .await?;

        Ok(entry)
    }

    /// Insert or replace an entry
    ///
    /// # Arguments
    /// * `key` - Entry key
    /// * `value` - Serialized JSON document
    pub async fn put_entry(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Delete an entry. Returns whether something was removed.
    pub async fn delete_entry(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// All keys starting with `prefix`, sorted
    ///
    /// Compares with substr instead of LIKE so `_` and `%` in ids stay literal.
    pub async fn entry_keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT key FROM kv_store WHERE substr(key, 1, length(?)) = ? ORDER BY key",
        )
        .bind(prefix)
        .bind(prefix)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(|(key,)| key).collect())
    }
}
