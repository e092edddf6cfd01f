//! Custom test assertions for sealed records

use base64::{engine::general_purpose::STANDARD, Engine};
use msglog_timestamper::hashchain::{verify, HashChain, HashChainResult};
use msglog_timestamper::traits::{LogRecord, MessageRecord, RecordStore};

pub async fn load_message(store: &dyn RecordStore, id: i64) -> MessageRecord {
    store
        .get(id)
        .await
        .expect("Failed to load record")
        .and_then(LogRecord::into_message)
        .expect("Record should be a message")
}

/// Assert that every record is linked to the same, existing timestamp record
pub async fn assert_sealed_together(store: &dyn RecordStore, ids: &[i64]) -> i64 {
    let first = load_message(store, ids[0]).await;
    let timestamp_id = first
        .timestamp_record_id
        .expect("Record should be sealed");

    for id in ids {
        let record = load_message(store, *id).await;
        assert_eq!(
            record.timestamp_record_id,
            Some(timestamp_id),
            "Record {} should be sealed by timestamp {}",
            id,
            timestamp_id
        );
    }

    assert!(
        store
            .get_timestamp(timestamp_id)
            .await
            .expect("Failed to load timestamp")
            .is_some(),
        "Timestamp record {} should exist",
        timestamp_id
    );
    timestamp_id
}

/// Assert that the record's timestamp hash chain proves its signature hash
pub fn assert_chain_proves(record: &MessageRecord) {
    let result = HashChainResult::from_json(
        record
            .timestamp_hash_chain_result
            .as_deref()
            .expect("Record should carry a timestamp hash chain result"),
    )
    .expect("Hash chain result should parse");
    let chain = HashChain::from_json(
        record
            .timestamp_hash_chain
            .as_deref()
            .expect("Record should carry a timestamp hash chain"),
    )
    .expect("Hash chain should parse");
    let input = STANDARD
        .decode(&record.signature_hash)
        .expect("Signature hash should be base64");

    verify(&result, &chain, &input).expect("Hash chain should verify");
}
