/// Engine configuration
///
/// Every tunable window, limit and TTL lives here. Values are read from a TOML
/// file; keys that are missing fall back to the defaults below.

use crate::error::{AdaptError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub context_cache_ttl_secs: u64,
    pub suggestion_cache_ttl_secs: u64,
    pub debounce_window_ms: u64,
    pub session_timeout_secs: u64,
    pub session_idle_after_secs: u64,
    pub max_interactions_per_user: usize,
    /// Pattern mining runs on every Nth stored interaction
    pub pattern_mining_every: u64,
    pub min_interactions_for_patterns: usize,
    pub feedback_history_limit: usize,
    pub batch_pause_ms: u64,
    pub default_retention_days: i64,
    pub maintenance_interval_secs: u64,
    pub max_topics: usize,
    pub shift_window: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            context_cache_ttl_secs: 5 * 60,
            suggestion_cache_ttl_secs: 2 * 60,
            debounce_window_ms: 1_000,
            session_timeout_secs: 30 * 60,
            session_idle_after_secs: 5 * 60,
            max_interactions_per_user: 1_000,
            pattern_mining_every: 10,
            min_interactions_for_patterns: 5,
            feedback_history_limit: 100,
            batch_pause_ms: 100,
            default_retention_days: 30,
            maintenance_interval_secs: 60,
            max_topics: 5,
            shift_window: 3,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AdaptError::Config(format!("could not read {}: {}", path.display(), e))
        })?;

        let config: EngineConfig = toml::from_str(&raw)
            .map_err(|e| AdaptError::Config(format!("invalid {}: {}", path.display(), e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load from the default location, or use defaults when no file exists
    pub fn load_or_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    /// `~/.adaptive-chat/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".adaptive-chat").join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("context_cache_ttl_secs", self.context_cache_ttl_secs == 0),
            ("suggestion_cache_ttl_secs", self.suggestion_cache_ttl_secs == 0),
            ("session_timeout_secs", self.session_timeout_secs == 0),
            ("max_interactions_per_user", self.max_interactions_per_user == 0),
            ("pattern_mining_every", self.pattern_mining_every == 0),
            ("feedback_history_limit", self.feedback_history_limit == 0),
            ("maintenance_interval_secs", self.maintenance_interval_secs == 0),
            ("max_topics", self.max_topics == 0),
            ("shift_window", self.shift_window == 0),
            ("default_retention_days", self.default_retention_days <= 0),
        ];

        for (name, is_zero) in checks {
            if is_zero {
                return Err(AdaptError::Config(format!("{} must be greater than zero", name)));
            }
        }

        if self.session_idle_after_secs >= self.session_timeout_secs {
            return Err(AdaptError::Config(
                "session_idle_after_secs must be below session_timeout_secs".to_string(),
            ));
        }

        Ok(())
    }

    pub fn context_cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.context_cache_ttl_secs as i64)
    }

    pub fn suggestion_cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.suggestion_cache_ttl_secs as i64)
    }

    pub fn session_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.session_timeout_secs as i64)
    }

    pub fn session_idle_after(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.session_idle_after_secs as i64)
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_window_ms)
    }

    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.context_cache_ttl_secs, 300);
        assert_eq!(config.suggestion_cache_ttl_secs, 120);
        assert_eq!(config.session_timeout_secs, 1800);
    }

    #[test]
    fn test_load_partial_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "debounce_window_ms = 250\nmax_topics = 3\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.debounce_window_ms, 250);
        assert_eq!(config.max_topics, 3);
        // Untouched keys keep their defaults
        assert_eq!(config.feedback_history_limit, 100);
    }

    #[test]
    fn test_load_rejects_zero_limits() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "shift_window = 0\n").unwrap();

        match EngineConfig::load(&path) {
            Err(AdaptError::Config(msg)) => assert!(msg.contains("shift_window")),
            other => panic!("Expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_non_positive_retention() {
        let config = EngineConfig {
            default_retention_days: -5,
            ..Default::default()
        };

        match config.validate() {
            Err(AdaptError::Config(msg)) => assert!(msg.contains("default_retention_days")),
            other => panic!("Expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_missing_file() {
        let result = EngineConfig::load("/definitely/not/here/config.toml");
        assert!(matches!(result, Err(AdaptError::Config(_))));
    }
}
