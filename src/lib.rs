//! msglog-timestamper library exports

pub mod anchoring;
pub mod background;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod hashchain;
pub mod signature;
pub mod timestamper;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod storage;

// Re-exports
pub use config::MessageLogConfig;
pub use coordinator::TimestampCoordinator;
pub use error::{MessageLogError, MessageLogResult, StorageError};
pub use traits::{LogRecord, MessageRecord, RecordStore, TimestampRecord};

#[cfg(feature = "sqlite")]
pub use storage::SqliteStore;
