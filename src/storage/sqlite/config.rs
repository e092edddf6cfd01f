/// SQLite storage backend configuration
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Path to database file (or ":memory:" for in-memory)
    pub path: String,

    /// Enable WAL mode for better concurrency
    pub wal_mode: bool,

    /// Busy timeout in milliseconds
    pub busy_timeout_ms: u32,

    /// Enable foreign key enforcement
    pub foreign_keys: bool,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: "messagelog.db".to_string(),
            wal_mode: true,
            busy_timeout_ms: 5000,
            foreign_keys: true,
        }
    }
}

/// Record counts, for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StorageStats {
    /// Message records in the log
    pub message_count: u64,

    /// Message records not yet sealed by a timestamp
    pub pending_count: u64,

    /// Timestamp records
    pub timestamp_count: u64,
}
