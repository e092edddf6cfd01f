//! SQLite record store
//!
//! Message and timestamp records live in one `log_records` table; a message
//! is pending while its `timestamp_record_id` is NULL.

mod config;
mod convert;
mod records;
mod schema;
mod store;
mod timestamps;

pub use config::{SqliteConfig, StorageStats};
pub use schema::SCHEMA_VERSION;
pub use store::SqliteStore;
