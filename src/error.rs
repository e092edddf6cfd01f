//! Message log error types

use thiserror::Error;

pub use crate::anchoring::error::AnchorError;
pub use crate::hashchain::HashChainError;
pub use crate::signature::SignatureError;

/// Main error type of the timestamping engine
#[derive(Debug, Error)]
pub enum MessageLogError {
    // ========== Configuration Errors ==========
    /// No TSA URL is configured at all
    #[error("no timestamping provider found")]
    NoTimestampingProvider,

    /// Timestamp task without records
    #[error("timestamp task has no records")]
    EmptyTask,

    /// Record ids and signature hashes of a task differ in length
    #[error("timestamp task has {records} records but {hashes} signature hashes")]
    TaskLengthMismatch { records: usize, hashes: usize },

    /// Invalid configuration value
    #[error("configuration error: {0}")]
    Config(String),

    // ========== Record Errors ==========
    /// Log record not found
    #[error("log record not found: {0}")]
    RecordNotFound(i64),

    // ========== Timestamping Errors ==========
    /// Message logging refused because timestamping has been failing for too long
    #[error("timestamping failed: {0}")]
    TimestampingFailed(String),

    /// Every configured TSA failed for one task
    #[error("failed to get timestamp from any of {attempted} timestamping providers")]
    NoProviderSucceeded { attempted: usize },

    /// Single TSA exchange error
    #[error("anchoring error: {0}")]
    Anchoring(AnchorError),

    // ========== Data Errors ==========
    /// Signature XML could not be read or rewritten
    #[error("signature error: {0}")]
    Signature(#[from] SignatureError),

    /// Hash chain construction or encoding failed
    #[error("hash chain error: {0}")]
    HashChain(#[from] HashChainError),

    /// Stored digest could not be decoded
    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    // ========== Persistence Errors ==========
    /// Optimistic update lost against a concurrent modification of the record
    #[error("record {record_id} was modified concurrently")]
    ConcurrentModification { record_id: i64 },

    /// Storage operation failed
    #[error("storage error: {0}")]
    Storage(StorageError),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

/// Storage-specific errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database connection failed
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed
    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    /// Stored data could not be decoded
    #[error("data corruption: {0}")]
    Corruption(String),

    /// Invalid argument passed to the store
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Record already linked to a timestamp record
    #[error("record {0} is already sealed")]
    AlreadySealed(i64),

    /// Signature hash no longer matches the expected prior value
    #[error("record {record_id} was modified concurrently")]
    ConcurrentModification { record_id: i64 },

    /// Entity not found
    #[error("not found: {0}")]
    NotFound(String),

    /// SQLite database error
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Message log result type alias
pub type MessageLogResult<T> = Result<T, MessageLogError>;

impl MessageLogError {
    /// Error code reported to callers and the diagnostics map
    pub fn error_code(&self) -> &'static str {
        match self {
            MessageLogError::NoTimestampingProvider => "NO_TIMESTAMPING_PROVIDER_FOUND",
            MessageLogError::EmptyTask | MessageLogError::TaskLengthMismatch { .. } => {
                "INVALID_TIMESTAMP_TASK"
            }
            MessageLogError::Config(_) => "CONFIG_ERROR",
            MessageLogError::RecordNotFound(_) => "RECORD_NOT_FOUND",
            MessageLogError::TimestampingFailed(_) => "TIMESTAMPING_FAILED",
            MessageLogError::NoProviderSucceeded { .. } => "TIMESTAMPING_FAILED",
            MessageLogError::Anchoring(e) => e.error_code(),
            MessageLogError::Signature(_) => "INVALID_SIGNATURE",
            MessageLogError::HashChain(_) => "HASH_CHAIN_ERROR",
            MessageLogError::InvalidDigest(_) => "INVALID_DIGEST",
            MessageLogError::ConcurrentModification { .. } => "CONCURRENT_MODIFICATION",
            MessageLogError::Storage(_) => "DATABASE_ERROR",
            MessageLogError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Lost an optimistic update or seal to another writer
    pub fn is_persistence_race(&self) -> bool {
        matches!(
            self,
            MessageLogError::ConcurrentModification { .. }
                | MessageLogError::Storage(StorageError::AlreadySealed(_))
        )
    }

    /// Check if a later attempt may succeed without operator action
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MessageLogError::NoProviderSucceeded { .. }
                | MessageLogError::Anchoring(AnchorError::Network(_))
                | MessageLogError::Anchoring(AnchorError::Timeout(_))
                | MessageLogError::Anchoring(AnchorError::HttpStatus(_))
                | MessageLogError::Storage(StorageError::ConnectionFailed(_))
        )
    }
}

// Conversions from external errors

impl From<AnchorError> for MessageLogError {
    fn from(e: AnchorError) -> Self {
        match e {
            AnchorError::NotConfigured(_) => MessageLogError::NoTimestampingProvider,
            other => MessageLogError::Anchoring(other),
        }
    }
}

impl From<StorageError> for MessageLogError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::ConcurrentModification { record_id } => {
                MessageLogError::ConcurrentModification { record_id }
            }
            other => MessageLogError::Storage(other),
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for MessageLogError {
    fn from(e: rusqlite::Error) -> Self {
        MessageLogError::Storage(StorageError::Sqlite(e))
    }
}

impl From<base64::DecodeError> for MessageLogError {
    fn from(e: base64::DecodeError) -> Self {
        MessageLogError::InvalidDigest(format!("base64 decode: {}", e))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Corruption(format!("json: {}", e))
    }
}

impl From<base64::DecodeError> for StorageError {
    fn from(e: base64::DecodeError) -> Self {
        StorageError::Corruption(format!("base64 decode: {}", e))
    }
}
