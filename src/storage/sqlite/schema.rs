use crate::error::StorageError;
use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: u32 = 2;

/// Create all tables (idempotent)
pub fn create_tables(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO msglog_config (key, value, updated_at) VALUES ('schema_version', ?1, ?2)",
        rusqlite::params![
            SCHEMA_VERSION.to_string(),
            chrono::Utc::now().timestamp_millis()
        ],
    )?;
    Ok(())
}

/// Stored schema version, `None` before [`create_tables`]
pub fn schema_version(conn: &Connection) -> Result<Option<u32>, StorageError> {
    let result = conn.query_row(
        "SELECT value FROM msglog_config WHERE key = 'schema_version'",
        [],
        |row| row.get::<_, String>(0),
    );

    match result {
        Ok(v) => v
            .parse()
            .map(Some)
            .map_err(|_| StorageError::Corruption(format!("invalid schema version {}", v))),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(rusqlite::Error::SqliteFailure(_, Some(msg))) if msg.contains("no such table") => {
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

const SCHEMA_SQL: &str = r#"
-- Core configuration
CREATE TABLE IF NOT EXISTS msglog_config (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);

-- Message and timestamp records share one id space
CREATE TABLE IF NOT EXISTS log_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL CHECK (kind IN ('message', 'timestamp')),
    created_at INTEGER NOT NULL,            -- Unix milliseconds

    -- message records
    query_id TEXT,
    signature TEXT,
    signature_hash TEXT,                    -- base64 digest of signature
    body TEXT,
    response INTEGER,
    timestamp_record_id INTEGER REFERENCES log_records(id),
    timestamp_hash_chain_result TEXT,       -- set by batch seals only
    timestamp_hash_chain TEXT,

    -- batch signature material on messages, batch root on timestamps
    hash_chain_result TEXT,
    hash_chain TEXT,

    -- timestamp records
    timestamp BLOB                          -- DER TimeStampToken
);

CREATE INDEX IF NOT EXISTS idx_log_records_pending
    ON log_records(id) WHERE kind = 'message' AND timestamp_record_id IS NULL;
CREATE INDEX IF NOT EXISTS idx_log_records_query_id ON log_records(query_id);
CREATE INDEX IF NOT EXISTS idx_log_records_timestamp ON log_records(timestamp_record_id);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tables_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(schema_version(&conn).unwrap(), None);
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), Some(SCHEMA_VERSION));
    }

    #[test]
    fn test_kind_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        let result = conn.execute(
            "INSERT INTO log_records (kind, created_at) VALUES ('other', 0)",
            [],
        );
        assert!(result.is_err());
    }
}
