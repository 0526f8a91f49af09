/// Records user interactions, but only what the user agreed to
///
/// Nothing is stored without data collection consent. With anonymization on,
/// identity and message content never reach the store. Storage per user is a
/// bounded FIFO, and every Nth stored interaction re-mines behavior patterns.

use crate::config::EngineConfig;
use crate::core::anonymizer::{hash_identifier, Anonymizer};
use crate::db::{behavior_key, KeyValueStore};
use crate::error::{AdaptError, Result};
use crate::intelligence::PatternDetector;
use crate::models::{InteractionInput, PrivacySettings, UserBehaviorPattern, UserInteraction};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::num::NonZeroU64;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
struct UserBehaviorState {
    interactions: VecDeque<UserInteraction>,
    patterns: Vec<UserBehaviorPattern>,
    stored_total: u64,
    privacy: Option<PrivacySettings>,
}

/// Everything held about one user. Also the persisted snapshot format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDataExport {
    pub user_id: String,
    pub interactions: Vec<UserInteraction>,
    pub patterns: Vec<UserBehaviorPattern>,
    pub privacy_settings: Option<PrivacySettings>,
    pub exported_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetentionReport {
    pub interactions_removed: usize,
    pub patterns_removed: usize,
    pub users_removed: usize,
}

pub struct BehaviorTracker {
    users: RwLock<HashMap<String, UserBehaviorState>>,
    anonymizer: Anonymizer,
    detector: PatternDetector,
    max_interactions: usize,
    mining_every: NonZeroU64,
    default_retention_days: i64,
    store: Option<Arc<dyn KeyValueStore>>,
}

impl BehaviorTracker {
    /// Fails with `AdaptError::Config` when the config has zero intervals or limits
    pub fn new(config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        let mining_every = NonZeroU64::new(config.pattern_mining_every)
            .ok_or_else(|| AdaptError::Config("pattern_mining_every must be greater than zero".to_string()))?;

        Ok(Self {
            users: RwLock::new(HashMap::new()),
            anonymizer: Anonymizer::new(),
            detector: PatternDetector::new(config.min_interactions_for_patterns),
            max_interactions: config.max_interactions_per_user,
            mining_every,
            default_retention_days: config.default_retention_days,
            store: None,
        })
    }

    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    // Main recording function. Checks consent, scrubs the data, stores it.
    //
    // Returns the stored interaction, or None when consent says no.
    pub async fn track_interaction(
        &self,
        user_id: &str,
        input: InteractionInput,
        privacy: &PrivacySettings,
    ) -> Option<UserInteraction> {
        if !privacy.data_collection {
            tracing::debug!(user_id, "data collection disabled, interaction skipped");
            return None;
        }

        let mut data = input.data;

        // Keep the length around; the content itself may be hashed away
        if !data.contains_key("messageLength") {
            if let Some(length) = data.get("content").and_then(Value::as_str).map(|s| s.chars().count()) {
                data.insert("messageLength".to_string(), Value::from(length));
            }
        }

        let (data, anonymized_user_id) = if privacy.anonymize_data {
            (self.anonymizer.anonymize(&data), Some(hash_identifier(user_id)))
        } else {
            (data, None)
        };

        let interaction = UserInteraction {
            id: format!("interaction_{}", uuid::Uuid::new_v4().simple()),
            interaction_type: input.interaction_type,
            timestamp: input.timestamp.unwrap_or_else(Utc::now),
            data,
            anonymized_user_id,
        };

        let mut users = self.users.write().await;
        let state = users.entry(user_id.to_string()).or_default();
        state.privacy = Some(privacy.clone());

        state.interactions.push_back(interaction.clone());
        while state.interactions.len() > self.max_interactions {
            state.interactions.pop_front();
        }
        state.stored_total += 1;

        if state.stored_total % self.mining_every.get() == 0 && privacy.analytics {
            let interactions: Vec<UserInteraction> = state.interactions.iter().cloned().collect();
            state.patterns = self.detector.detect_patterns(&interactions);
            tracing::debug!(
                user_id,
                stored_total = state.stored_total,
                patterns = state.patterns.len(),
                "behavior patterns re-mined"
            );
        }

        Some(interaction)
    }

    /// Mine patterns now. Empty until the user has enough interactions.
    pub async fn analyze_user_behavior(&self, user_id: &str) -> Vec<UserBehaviorPattern> {
        let mut users = self.users.write().await;
        let Some(state) = users.get_mut(user_id) else {
            return Vec::new();
        };

        let interactions: Vec<UserInteraction> = state.interactions.iter().cloned().collect();
        let patterns = self.detector.detect_patterns(&interactions);
        if patterns.is_empty() {
            return Vec::new();
        }

        state.patterns = patterns.clone();
        patterns
    }

    pub async fn get_patterns(&self, user_id: &str) -> Vec<UserBehaviorPattern> {
        self.users
            .read()
            .await
            .get(user_id)
            .map(|state| state.patterns.clone())
            .unwrap_or_default()
    }

    pub async fn get_interactions(&self, user_id: &str) -> Vec<UserInteraction> {
        self.users
            .read()
            .await
            .get(user_id)
            .map(|state| state.interactions.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn interaction_count(&self, user_id: &str) -> usize {
        self.users
            .read()
            .await
            .get(user_id)
            .map(|state| state.interactions.len())
            .unwrap_or(0)
    }

    /// Apply new consent. Revoking data collection wipes what we hold.
    pub async fn update_consent(&self, user_id: &str, settings: PrivacySettings) {
        let mut users = self.users.write().await;
        let state = users.entry(user_id.to_string()).or_default();

        if !settings.data_collection {
            state.interactions.clear();
            state.patterns.clear();
            state.stored_total = 0;
            tracing::info!(user_id, "data collection revoked, behavior data cleared");
        } else if !settings.analytics {
            state.patterns.clear();
        }

        state.privacy = Some(settings);
    }

    pub async fn export_user_data(&self, user_id: &str) -> UserDataExport {
        let users = self.users.read().await;
        let state = users.get(user_id).cloned().unwrap_or_default();

        UserDataExport {
            user_id: user_id.to_string(),
            interactions: state.interactions.into_iter().collect(),
            patterns: state.patterns,
            privacy_settings: state.privacy,
            exported_at: Utc::now(),
        }
    }

    /// Erase everything about a user, including the persisted snapshot
    pub async fn delete_user_data(&self, user_id: &str) -> Result<bool> {
        let existed = self.users.write().await.remove(user_id).is_some();

        let mut removed_snapshot = false;
        if let Some(store) = &self.store {
            removed_snapshot = store.remove(&behavior_key(user_id)).await?;
        }

        tracing::info!(user_id, "behavior data erased");
        Ok(existed || removed_snapshot)
    }

    pub async fn run_retention_sweep(&self) -> RetentionReport {
        self.run_retention_sweep_at(Utc::now()).await
    }

    /// Drop interactions and patterns older than each user's retention period
    pub async fn run_retention_sweep_at(&self, now: DateTime<Utc>) -> RetentionReport {
        let mut report = RetentionReport::default();
        let mut users = self.users.write().await;

        for state in users.values_mut() {
            let days = state
                .privacy
                .as_ref()
                .and_then(|p| p.retention_period)
                .filter(|days| *days > 0)
                .unwrap_or(self.default_retention_days);

            // A period too long to represent keeps everything
            let Some(cutoff) = Duration::try_days(days).and_then(|period| now.checked_sub_signed(period)) else {
                continue;
            };

            let before = state.interactions.len();
            state.interactions.retain(|i| i.timestamp >= cutoff);
            report.interactions_removed += before - state.interactions.len();

            let before = state.patterns.len();
            state.patterns.retain(|p| p.last_updated >= cutoff);
            report.patterns_removed += before - state.patterns.len();
        }

        let before = users.len();
        users.retain(|_, state| !state.interactions.is_empty() || !state.patterns.is_empty());
        report.users_removed = before - users.len();

        if report != RetentionReport::default() {
            tracing::debug!(
                interactions_removed = report.interactions_removed,
                patterns_removed = report.patterns_removed,
                users_removed = report.users_removed,
                "retention sweep finished"
            );
        }

        report
    }

    /// Write the user's behavior data to the key-value store
    pub async fn persist_snapshot(&self, user_id: &str) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };

        let export = self.export_user_data(user_id).await;
        store.set(&behavior_key(user_id), serde_json::to_value(&export)?).await
    }

    /// Load a persisted snapshot. Returns false when absent or unreadable.
    pub async fn restore_snapshot(&self, user_id: &str) -> Result<bool> {
        let Some(store) = &self.store else {
            return Ok(false);
        };

        let Some(raw) = store.get(&behavior_key(user_id)).await? else {
            return Ok(false);
        };

        let export: UserDataExport = match serde_json::from_value(raw) {
            Ok(export) => export,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "ignoring malformed behavior snapshot");
                return Ok(false);
            }
        };

        let collection_allowed = export
            .privacy_settings
            .as_ref()
            .map_or(true, |p| p.data_collection);

        let mut state = UserBehaviorState {
            privacy: export.privacy_settings,
            ..Default::default()
        };
        if collection_allowed {
            state.stored_total = export.interactions.len() as u64;
            state.interactions = export.interactions.into_iter().collect();
            while state.interactions.len() > self.max_interactions {
                state.interactions.pop_front();
            }
            state.patterns = export.patterns;
        }

        self.users.write().await.insert(user_id.to_string(), state);
        Ok(true)
    }
}
