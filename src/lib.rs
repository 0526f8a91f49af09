/// adaptive-chat library
///
/// Behavior tracking, conversation context analysis, smart suggestions and
/// session management for adaptive chat widgets.

pub mod config;
pub mod core;
pub mod db;
pub mod engine;
pub mod error;
pub mod intelligence;
pub mod models;

// Re-exports for convenience
pub use config::EngineConfig;
pub use db::Database;
pub use engine::AdaptiveEngine;
pub use error::{AdaptError, Result};
