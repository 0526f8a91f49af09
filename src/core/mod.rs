/// Core functionality modules
///
/// Behavior tracking and session lifecycle, plus the shared building blocks
/// they and the analyzers rely on: TTL caches, keyed debouncing and
/// anonymization.

pub mod anonymizer;
pub mod behavior_tracker;
pub mod cache;
pub mod debounce;
pub mod session_manager;
pub mod session_metrics;

pub use anonymizer::{hash_identifier, Anonymizer};
pub use behavior_tracker::{BehaviorTracker, RetentionReport, UserDataExport};
pub use cache::{CacheLookup, CacheStatus, TtlCache};
pub use debounce::Debouncer;
pub use session_manager::{SessionExport, SessionManager};
pub use session_metrics::{SessionInsights, SessionMetrics, TimeOfDay};
