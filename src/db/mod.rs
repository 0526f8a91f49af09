/// Persistence module
///
/// The engine only needs a key-value store of JSON documents. `KeyValueStore`
/// is the seam; `MemoryStore` serves tests and embedding, `Database` keeps the
/// same data in SQLite through sqlx.

pub mod connection;
pub mod models;
pub mod queries;
pub mod store;

pub use connection::Database;
pub use models::*;
pub use store::{KeyValueStore, MemoryStore};
