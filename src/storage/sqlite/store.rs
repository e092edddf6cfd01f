use super::config::{SqliteConfig, StorageStats};
use super::schema;
use crate::error::StorageError;
use crate::traits::{
    LogRecord, MessageRecord, NewMessageRecord, NewTimestampRecord, RecordStore, SealedRecord,
    TimestampRecord,
};
use async_trait::async_trait;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// SQLite implementation of the RecordStore trait
pub struct SqliteStore {
    /// Database connection (protected by mutex for thread safety)
    conn: Arc<Mutex<Connection>>,

    config: SqliteConfig,
}

impl SqliteStore {
    /// Create a new SqliteStore with default configuration
    ///
    /// Creates the database file and schema if they don't exist.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let config = SqliteConfig {
            path: path.as_ref().to_string_lossy().to_string(),
            ..Default::default()
        };
        Self::with_config(config)
    }

    /// Create with custom configuration
    pub fn with_config(config: SqliteConfig) -> Result<Self, StorageError> {
        let conn = Connection::open(&config.path).map_err(|e| {
            StorageError::ConnectionFailed(format!("failed to open db: {}", e))
        })?;

        Self::configure_connection(&conn, &config)?;
        schema::create_tables(&conn)?;
        match schema::schema_version(&conn)? {
            Some(schema::SCHEMA_VERSION) => {}
            other => {
                return Err(StorageError::Corruption(format!(
                    "unsupported schema version {:?}",
                    other
                )))
            }
        }

        tracing::debug!(path = %config.path, "SQLite record store opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            config,
        })
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self, StorageError> {
        let config = SqliteConfig {
            path: ":memory:".to_string(),
            wal_mode: false,
            ..Default::default()
        };
        Self::with_config(config)
    }

    /// Configure SQLite connection pragmas
    fn configure_connection(conn: &Connection, config: &SqliteConfig) -> Result<(), StorageError> {
        if config.wal_mode {
            conn.pragma_update(None, "journal_mode", "WAL")?;
        }
        conn.pragma_update(None, "busy_timeout", config.busy_timeout_ms)?;
        if config.foreign_keys {
            conn.pragma_update(None, "foreign_keys", "ON")?;
        }
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(())
    }

    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    /// Record counts
    pub fn stats(&self) -> Result<StorageStats, StorageError> {
        let conn = self.get_conn()?;
        let (messages, pending, timestamps): (i64, i64, i64) = conn.query_row(
            "SELECT
                COALESCE(SUM(kind = 'message'), 0),
                COALESCE(SUM(kind = 'message' AND timestamp_record_id IS NULL), 0),
                COALESCE(SUM(kind = 'timestamp'), 0)
             FROM log_records",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        Ok(StorageStats {
            message_count: messages as u64,
            pending_count: pending as u64,
            timestamp_count: timestamps as u64,
        })
    }

    /// Get locked connection for internal operations
    pub(crate) fn get_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|_| StorageError::ConnectionFailed("lock poisoned".into()))
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn get(&self, id: i64) -> Result<Option<LogRecord>, StorageError> {
        self.get_record_impl(id)
    }

    async fn save_message(&self, record: NewMessageRecord) -> Result<MessageRecord, StorageError> {
        self.save_message_impl(record)
    }

    async fn find_by_query_id(&self, query_id: &str) -> Result<Vec<MessageRecord>, StorageError> {
        self.find_by_query_id_impl(query_id)
    }

    async fn pending(&self, limit: usize) -> Result<Vec<MessageRecord>, StorageError> {
        self.pending_impl(limit)
    }

    async fn update_signature(
        &self,
        record_id: i64,
        signature: &str,
        signature_hash: &str,
        expected_hash: &str,
    ) -> Result<(), StorageError> {
        self.update_signature_impl(record_id, signature, signature_hash, expected_hash)
    }

    async fn save_timestamp(
        &self,
        timestamp: NewTimestampRecord,
        sealed: &[SealedRecord],
    ) -> Result<TimestampRecord, StorageError> {
        self.save_timestamp_impl(timestamp, sealed)
    }
}
