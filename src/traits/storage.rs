//! Async record store trait definition

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StorageError;

/// A message log record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    Message(MessageRecord),
    Timestamp(TimestampRecord),
}

/// A logged message together with its signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub id: i64,

    /// Query id of the logged exchange
    pub query_id: String,

    /// Signature document (XAdES)
    pub signature: String,

    /// Base64 digest of `signature`, the value that gets timestamped
    pub signature_hash: String,

    /// Batch signature hash chain result, set when the signature covers many messages
    pub hash_chain_result: Option<String>,

    /// Proof of this message against the batch signature `hash_chain_result`
    pub hash_chain: Option<String>,

    /// Hash chain result of the timestamp sealing this record, for batch seals
    pub timestamp_hash_chain_result: Option<String>,

    /// Proof of `signature_hash` against `timestamp_hash_chain_result`
    pub timestamp_hash_chain: Option<String>,

    /// Message body (optional)
    pub body: Option<String>,

    /// Whether the message is a response
    pub response: bool,

    pub created_at: DateTime<Utc>,

    /// Timestamp record sealing this message, `None` while pending
    pub timestamp_record_id: Option<i64>,
}

/// A timestamp sealing one or more message records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampRecord {
    pub id: i64,

    pub created_at: DateTime<Utc>,

    /// TimeStampToken (DER encoded)
    pub timestamp: Vec<u8>,

    /// Root of the hash chain for batch seals
    pub hash_chain_result: Option<String>,
}

/// Parameters for logging a message
#[derive(Debug, Clone, Default)]
pub struct NewMessageRecord {
    pub query_id: String,
    pub signature: String,
    pub signature_hash: String,
    pub hash_chain_result: Option<String>,
    pub hash_chain: Option<String>,
    pub body: Option<String>,
    pub response: bool,
}

/// Parameters for storing a timestamp
#[derive(Debug, Clone)]
pub struct NewTimestampRecord {
    pub timestamp: Vec<u8>,
    pub hash_chain_result: Option<String>,
}

/// Signature with a timestamp embedded, replacing the stored one on seal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureUpdate {
    pub signature: String,
    pub signature_hash: String,
}

/// One message record linked to a new timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedRecord {
    pub record_id: i64,

    /// Signature hash the timestamp was computed over
    pub expected_hash: String,

    /// Proof of `expected_hash` against the timestamp hash chain result
    pub timestamp_hash_chain: Option<String>,

    pub signature: Option<SignatureUpdate>,
}

impl SealedRecord {
    pub fn new(record_id: i64, expected_hash: impl Into<String>) -> Self {
        Self {
            record_id,
            expected_hash: expected_hash.into(),
            timestamp_hash_chain: None,
            signature: None,
        }
    }

    #[must_use]
    pub fn with_hash_chain(mut self, chain: impl Into<String>) -> Self {
        self.timestamp_hash_chain = Some(chain.into());
        self
    }

    #[must_use]
    pub fn with_signature(mut self, update: SignatureUpdate) -> Self {
        self.signature = Some(update);
        self
    }
}

impl MessageRecord {
    pub fn is_sealed(&self) -> bool {
        self.timestamp_record_id.is_some()
    }
}

impl TimestampRecord {
    /// Token in its exported form, base64 of the DER
    pub fn timestamp_base64(&self) -> String {
        use base64::{engine::general_purpose::STANDARD, Engine};
        STANDARD.encode(&self.timestamp)
    }
}

impl LogRecord {
    pub fn id(&self) -> i64 {
        match self {
            LogRecord::Message(m) => m.id,
            LogRecord::Timestamp(t) => t.id,
        }
    }

    pub fn into_message(self) -> Option<MessageRecord> {
        match self {
            LogRecord::Message(m) => Some(m),
            LogRecord::Timestamp(_) => None,
        }
    }

    pub fn into_timestamp(self) -> Option<TimestampRecord> {
        match self {
            LogRecord::Timestamp(t) => Some(t),
            LogRecord::Message(_) => None,
        }
    }
}

/// Record store trait
///
/// Message and timestamp records share one id space.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Get a record by id
    async fn get(&self, id: i64) -> Result<Option<LogRecord>, StorageError>;

    /// Get a timestamp record by id, `None` if missing or not a timestamp
    async fn get_timestamp(&self, id: i64) -> Result<Option<TimestampRecord>, StorageError> {
        Ok(self.get(id).await?.and_then(LogRecord::into_timestamp))
    }

    /// Persist a new, unsealed message record
    async fn save_message(&self, record: NewMessageRecord) -> Result<MessageRecord, StorageError>;

    /// All message records with the given query id, oldest first
    async fn find_by_query_id(&self, query_id: &str) -> Result<Vec<MessageRecord>, StorageError>;

    /// Oldest unsealed message records, at most `limit`
    async fn pending(&self, limit: usize) -> Result<Vec<MessageRecord>, StorageError>;

    /// Replace the signature of an unsealed record
    ///
    /// Succeeds only if the stored signature hash still equals
    /// `expected_hash`; otherwise fails with
    /// [`StorageError::ConcurrentModification`] and changes nothing.
    async fn update_signature(
        &self,
        record_id: i64,
        signature: &str,
        signature_hash: &str,
        expected_hash: &str,
    ) -> Result<(), StorageError>;

    /// Store a timestamp and link it to every record in `sealed`
    ///
    /// All-or-nothing: nothing is written unless every record exists, is
    /// unsealed and still carries its `expected_hash`. A record that moved on
    /// fails with [`StorageError::ConcurrentModification`], one sealed by
    /// someone else with [`StorageError::AlreadySealed`]. Signature updates in
    /// `sealed` are applied in the same transaction.
    async fn save_timestamp(
        &self,
        timestamp: NewTimestampRecord,
        sealed: &[SealedRecord],
    ) -> Result<TimestampRecord, StorageError>;
}
