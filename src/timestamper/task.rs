use std::collections::BTreeMap;

use crate::anchoring::AnchorError;
use crate::error::{MessageLogError, MessageLogResult};
use crate::traits::{MessageRecord, SealedRecord, SignatureUpdate};

/// Records to seal under one timestamp
///
/// `record_ids` and `signature_hashes` are parallel and order-significant:
/// the n-th hash belongs to the n-th record and input order is part of the
/// hash chain commitment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampTask {
    record_ids: Vec<i64>,
    signature_hashes: Vec<String>,
}

impl TimestampTask {
    pub fn new(record_ids: Vec<i64>, signature_hashes: Vec<String>) -> MessageLogResult<Self> {
        if record_ids.is_empty() {
            return Err(MessageLogError::EmptyTask);
        }
        if record_ids.len() != signature_hashes.len() {
            return Err(MessageLogError::TaskLengthMismatch {
                records: record_ids.len(),
                hashes: signature_hashes.len(),
            });
        }
        Ok(Self {
            record_ids,
            signature_hashes,
        })
    }

    pub fn single(record: &MessageRecord) -> Self {
        Self {
            record_ids: vec![record.id],
            signature_hashes: vec![record.signature_hash.clone()],
        }
    }

    pub fn from_records(records: &[MessageRecord]) -> MessageLogResult<Self> {
        Self::new(
            records.iter().map(|r| r.id).collect(),
            records.iter().map(|r| r.signature_hash.clone()).collect(),
        )
    }

    pub fn record_ids(&self) -> &[i64] {
        &self.record_ids
    }

    pub fn signature_hashes(&self) -> &[String] {
        &self.signature_hashes
    }

    /// Never zero
    pub fn len(&self) -> usize {
        self.record_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.record_ids.is_empty()
    }
}

/// A token was obtained for the task
#[derive(Debug, Clone)]
pub struct TimestampSucceeded {
    pub records: Vec<i64>,

    /// Signature hashes the token covers, same order as `records`
    pub signature_hashes: Vec<String>,

    /// TimeStampToken (DER encoded), signer certificate embedded
    pub timestamp_der: Vec<u8>,

    /// Hash chain result JSON, present for batch seals
    pub hash_chain_result: Option<String>,

    /// One hash chain JSON per record, same order as `records`
    pub hash_chains: Option<Vec<String>>,

    /// Signature of a single record with the token embedded
    pub signature: Option<SignatureUpdate>,

    /// First TSA that answered
    pub source_url: String,

    /// TSAs tried and failed before `source_url`
    pub errors_by_url: BTreeMap<String, AnchorError>,
}

impl TimestampSucceeded {
    /// Store entries linking every record of the task to the token
    pub fn sealed_records(&self) -> Vec<SealedRecord> {
        self.records
            .iter()
            .zip(&self.signature_hashes)
            .enumerate()
            .map(|(i, (id, hash))| {
                let mut sealed = SealedRecord::new(*id, hash.clone());
                if let Some(chain) = self.hash_chains.as_ref().and_then(|c| c.get(i)) {
                    sealed = sealed.with_hash_chain(chain.clone());
                }
                if let Some(update) = &self.signature {
                    sealed = sealed.with_signature(update.clone());
                }
                sealed
            })
            .collect()
    }
}

/// No token could be obtained or finalized for the task
#[derive(Debug)]
pub struct TimestampFailed {
    pub records: Vec<i64>,
    pub cause: MessageLogError,
    pub errors_by_url: BTreeMap<String, AnchorError>,
}

/// Outcome of one timestamp task
#[derive(Debug)]
pub enum TimestampResult {
    Succeeded(TimestampSucceeded),
    Failed(TimestampFailed),
}

impl TimestampResult {
    pub fn records(&self) -> &[i64] {
        match self {
            TimestampResult::Succeeded(s) => &s.records,
            TimestampResult::Failed(f) => &f.records,
        }
    }

    pub fn errors_by_url(&self) -> &BTreeMap<String, AnchorError> {
        match self {
            TimestampResult::Succeeded(s) => &s.errors_by_url,
            TimestampResult::Failed(f) => &f.errors_by_url,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TimestampResult::Succeeded(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_rejects_empty() {
        let err = TimestampTask::new(vec![], vec![]).unwrap_err();
        assert!(matches!(err, MessageLogError::EmptyTask));
        assert_eq!(err.error_code(), "INVALID_TIMESTAMP_TASK");
    }

    #[test]
    fn test_task_rejects_length_mismatch() {
        let err = TimestampTask::new(vec![1, 2], vec!["a".into()]).unwrap_err();
        assert!(matches!(
            err,
            MessageLogError::TaskLengthMismatch {
                records: 2,
                hashes: 1
            }
        ));
    }

    #[test]
    fn test_task_keeps_order() {
        let task = TimestampTask::new(vec![3, 1, 2], vec!["c".into(), "a".into(), "b".into()])
            .unwrap();
        assert_eq!(task.record_ids(), &[3, 1, 2]);
        assert_eq!(task.signature_hashes()[0], "c");
        assert_eq!(task.len(), 3);
    }

    fn succeeded(records: Vec<i64>, hashes: Vec<&str>) -> TimestampSucceeded {
        TimestampSucceeded {
            records,
            signature_hashes: hashes.into_iter().map(String::from).collect(),
            timestamp_der: vec![0x30, 0x00],
            hash_chain_result: None,
            hash_chains: None,
            signature: None,
            source_url: "http://a".into(),
            errors_by_url: BTreeMap::new(),
        }
    }

    #[test]
    fn test_sealed_records_carry_expected_hashes_and_chains() {
        let mut ok = succeeded(vec![4, 2], vec!["h4", "h2"]);
        ok.hash_chain_result = Some("result".into());
        ok.hash_chains = Some(vec!["c4".into(), "c2".into()]);

        let sealed = ok.sealed_records();
        assert_eq!(
            sealed,
            vec![
                SealedRecord::new(4, "h4").with_hash_chain("c4"),
                SealedRecord::new(2, "h2").with_hash_chain("c2"),
            ]
        );
    }

    #[test]
    fn test_sealed_record_carries_embedded_signature() {
        let mut ok = succeeded(vec![9], vec!["old"]);
        let update = SignatureUpdate {
            signature: "<sig/>".into(),
            signature_hash: "new".into(),
        };
        ok.signature = Some(update.clone());

        let sealed = ok.sealed_records();
        assert_eq!(sealed, vec![SealedRecord::new(9, "old").with_signature(update)]);
    }

    #[test]
    fn test_result_accessors() {
        let mut errors = BTreeMap::new();
        errors.insert("http://a".to_string(), AnchorError::HttpStatus(500));

        let result = TimestampResult::Failed(TimestampFailed {
            records: vec![7],
            cause: MessageLogError::NoProviderSucceeded { attempted: 1 },
            errors_by_url: errors,
        });
        assert!(!result.is_success());
        assert_eq!(result.records(), &[7]);
        assert_eq!(result.errors_by_url().len(), 1);
    }
}
