//! Storage module
//!
//! Persistent backends for the [`RecordStore`] trait.

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use crate::traits::RecordStore;

#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteConfig, SqliteStore, StorageStats};
