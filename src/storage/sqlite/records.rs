use super::convert::{row_to_message, row_to_record, RECORD_COLUMNS};
use super::store::SqliteStore;
use crate::error::StorageError;
use crate::traits::{LogRecord, MessageRecord, NewMessageRecord};
use rusqlite::{params, OptionalExtension};

impl SqliteStore {
    pub(crate) fn get_record_impl(&self, id: i64) -> Result<Option<LogRecord>, StorageError> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM log_records WHERE id = ?1", RECORD_COLUMNS);
        Ok(conn.query_row(&sql, params![id], row_to_record).optional()?)
    }

    pub(crate) fn save_message_impl(
        &self,
        record: NewMessageRecord,
    ) -> Result<MessageRecord, StorageError> {
        let conn = self.get_conn()?;
        let now = chrono::Utc::now();

        conn.execute(
            "INSERT INTO log_records
                (kind, created_at, query_id, signature, signature_hash, body, response,
                 hash_chain_result, hash_chain)
             VALUES ('message', ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                now.timestamp_millis(),
                record.query_id,
                record.signature,
                record.signature_hash,
                record.body,
                record.response,
                record.hash_chain_result,
                record.hash_chain,
            ],
        )?;

        Ok(MessageRecord {
            id: conn.last_insert_rowid(),
            query_id: record.query_id,
            signature: record.signature,
            signature_hash: record.signature_hash,
            hash_chain_result: record.hash_chain_result,
            hash_chain: record.hash_chain,
            timestamp_hash_chain_result: None,
            timestamp_hash_chain: None,
            body: record.body,
            response: record.response,
            created_at: chrono::DateTime::from_timestamp_millis(now.timestamp_millis())
                .unwrap_or(now),
            timestamp_record_id: None,
        })
    }

    pub(crate) fn find_by_query_id_impl(
        &self,
        query_id: &str,
    ) -> Result<Vec<MessageRecord>, StorageError> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM log_records WHERE kind = 'message' AND query_id = ?1 ORDER BY id",
            RECORD_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![query_id], row_to_message)?;
        rows.map(|r| r.map_err(Into::into)).collect()
    }

    /// Oldest unsealed messages first
    pub(crate) fn pending_impl(&self, limit: usize) -> Result<Vec<MessageRecord>, StorageError> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM log_records
             WHERE kind = 'message' AND timestamp_record_id IS NULL
             ORDER BY id LIMIT ?1",
            RECORD_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![limit], row_to_message)?;
        rows.map(|r| r.map_err(Into::into)).collect()
    }
}
