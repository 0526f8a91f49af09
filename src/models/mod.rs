/// Shared data model
///
/// Types exchanged between the tracker, analyzers, suggestion engine,
/// session manager and the UI layer. All of them serialize to camelCase JSON.

pub mod context;
pub mod interaction;
pub mod message;
pub mod session;
pub mod suggestion;

pub use context::*;
pub use interaction::*;
pub use message::*;
pub use session::*;
pub use suggestion::*;
