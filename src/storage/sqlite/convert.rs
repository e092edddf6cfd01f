use crate::traits::{LogRecord, MessageRecord, TimestampRecord};
use chrono::{DateTime, Utc};
use rusqlite::Row;

/// Columns selected by every record query, in [`row_to_record`] order
pub const RECORD_COLUMNS: &str = "id, kind, created_at, query_id, signature, signature_hash, \
     body, response, timestamp_record_id, hash_chain_result, hash_chain, timestamp, \
     timestamp_hash_chain_result, timestamp_hash_chain";

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// Convert a database row to LogRecord
pub fn row_to_record(row: &Row) -> rusqlite::Result<LogRecord> {
    let kind: String = row.get(1)?;
    match kind.as_str() {
        "message" => row_to_message(row).map(LogRecord::Message),
        "timestamp" => Ok(LogRecord::Timestamp(TimestampRecord {
            id: row.get(0)?,
            created_at: millis_to_datetime(row.get(2)?),
            timestamp: row.get::<_, Option<Vec<u8>>>(11)?.unwrap_or_default(),
            hash_chain_result: row.get(9)?,
        })),
        _ => Err(rusqlite::Error::InvalidColumnType(
            1,
            "kind".into(),
            rusqlite::types::Type::Text,
        )),
    }
}

/// Convert a database row to MessageRecord
pub fn row_to_message(row: &Row) -> rusqlite::Result<MessageRecord> {
    Ok(MessageRecord {
        id: row.get(0)?,
        created_at: millis_to_datetime(row.get(2)?),
        query_id: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        signature: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        signature_hash: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        body: row.get(6)?,
        response: row.get::<_, Option<bool>>(7)?.unwrap_or(false),
        timestamp_record_id: row.get(8)?,
        hash_chain_result: row.get(9)?,
        hash_chain: row.get(10)?,
        timestamp_hash_chain_result: row.get(12)?,
        timestamp_hash_chain: row.get(13)?,
    })
}
