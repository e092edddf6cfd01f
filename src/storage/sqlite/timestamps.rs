use super::store::SqliteStore;
use crate::error::StorageError;
use crate::traits::{NewTimestampRecord, SealedRecord, TimestampRecord};
use rusqlite::{params, Connection, OptionalExtension};

/// Why an optimistic update keyed on `expected_hash` matched no row
fn mismatch_cause(
    conn: &Connection,
    record_id: i64,
    expected_hash: &str,
) -> Result<StorageError, StorageError> {
    let row: Option<(Option<i64>, Option<String>)> = conn
        .query_row(
            "SELECT timestamp_record_id, signature_hash FROM log_records
             WHERE id = ?1 AND kind = 'message'",
            params![record_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    Ok(match row {
        None => StorageError::NotFound(format!("message record {}", record_id)),
        Some((_, hash)) if hash.as_deref() != Some(expected_hash) => {
            StorageError::ConcurrentModification { record_id }
        }
        Some((Some(_), _)) => StorageError::AlreadySealed(record_id),
        Some((None, _)) => StorageError::ConcurrentModification { record_id },
    })
}

impl SqliteStore {
    /// Optimistic signature replacement, keyed on the prior signature hash
    pub(crate) fn update_signature_impl(
        &self,
        record_id: i64,
        signature: &str,
        signature_hash: &str,
        expected_hash: &str,
    ) -> Result<(), StorageError> {
        let conn = self.get_conn()?;

        let updated = conn.execute(
            "UPDATE log_records SET signature = ?1, signature_hash = ?2
             WHERE id = ?3 AND kind = 'message' AND timestamp_record_id IS NULL
               AND signature_hash = ?4",
            params![signature, signature_hash, record_id, expected_hash],
        )?;

        if updated == 0 {
            return Err(StorageError::ConcurrentModification { record_id });
        }
        Ok(())
    }

    /// Insert the timestamp record and seal every listed message in one transaction
    pub(crate) fn save_timestamp_impl(
        &self,
        timestamp: NewTimestampRecord,
        sealed: &[SealedRecord],
    ) -> Result<TimestampRecord, StorageError> {
        if sealed.is_empty() {
            return Err(StorageError::InvalidArgument(
                "timestamp must seal at least one record".into(),
            ));
        }

        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| StorageError::TransactionFailed(e.to_string()))?;
        let now = chrono::Utc::now();

        tx.execute(
            "INSERT INTO log_records (kind, created_at, timestamp, hash_chain_result)
             VALUES ('timestamp', ?1, ?2, ?3)",
            params![
                now.timestamp_millis(),
                timestamp.timestamp,
                timestamp.hash_chain_result
            ],
        )?;
        let timestamp_id = tx.last_insert_rowid();

        for entry in sealed {
            let chain = entry.timestamp_hash_chain.as_deref();
            let signature = entry.signature.as_ref();
            let updated = tx.execute(
                "UPDATE log_records
                 SET timestamp_record_id = ?1,
                     timestamp_hash_chain_result = ?2,
                     timestamp_hash_chain = ?3,
                     signature = COALESCE(?4, signature),
                     signature_hash = COALESCE(?5, signature_hash)
                 WHERE id = ?6 AND kind = 'message' AND timestamp_record_id IS NULL
                   AND signature_hash = ?7",
                params![
                    timestamp_id,
                    chain.and(timestamp.hash_chain_result.as_deref()),
                    chain,
                    signature.map(|s| s.signature.as_str()),
                    signature.map(|s| s.signature_hash.as_str()),
                    entry.record_id,
                    entry.expected_hash,
                ],
            )?;

            if updated == 0 {
                // dropping the transaction rolls back
                return Err(mismatch_cause(&tx, entry.record_id, &entry.expected_hash)?);
            }
        }

        tx.commit()
            .map_err(|e| StorageError::TransactionFailed(e.to_string()))?;

        tracing::debug!(
            timestamp_id,
            records = sealed.len(),
            "Timestamp record saved"
        );

        Ok(TimestampRecord {
            id: timestamp_id,
            created_at: chrono::DateTime::from_timestamp_millis(now.timestamp_millis())
                .unwrap_or(now),
            timestamp: timestamp.timestamp,
            hash_chain_result: timestamp.hash_chain_result,
        })
    }
}
