use std::sync::Arc;

use async_trait::async_trait;

use super::strategy::{SealingMaterial, TimestampStrategy};
use super::task::TimestampTask;
use crate::error::MessageLogResult;
use crate::hashchain::DigestAlgorithm;
use crate::signature::{signature_hash, SignatureCodec};
use crate::traits::{MessageRecord, SignatureUpdate};

/// Timestamps one record
///
/// The stamped data is the record's SignatureValue, and the token is embedded
/// into the signature when the record is sealed. Records signed as part of a
/// batch signature are stamped over their hash chain result instead and keep
/// their signature as is.
pub struct SingleTimestampRequest {
    task: TimestampTask,
    record: MessageRecord,
    codec: Arc<dyn SignatureCodec>,
    algorithm: DigestAlgorithm,
}

impl SingleTimestampRequest {
    pub fn new(
        record: MessageRecord,
        codec: Arc<dyn SignatureCodec>,
        algorithm: DigestAlgorithm,
    ) -> Self {
        Self {
            task: TimestampTask::single(&record),
            record,
            codec,
            algorithm,
        }
    }
}

#[async_trait]
impl TimestampStrategy for SingleTimestampRequest {
    fn task(&self) -> &TimestampTask {
        &self.task
    }

    async fn data_to_stamp(&mut self) -> MessageLogResult<Vec<u8>> {
        match &self.record.hash_chain_result {
            Some(result) => Ok(result.as_bytes().to_vec()),
            None => Ok(self.codec.signature_value(&self.record.signature)?),
        }
    }

    async fn on_success(&mut self, token_der: &[u8]) -> MessageLogResult<SealingMaterial> {
        if let Some(result) = &self.record.hash_chain_result {
            return Ok(SealingMaterial {
                hash_chain_result: Some(result.clone()),
                hash_chains: self.record.hash_chain.clone().map(|chain| vec![chain]),
                signature: None,
            });
        }

        let signature = self.codec.embed_timestamp(&self.record.signature, token_der)?;
        let signature_hash = signature_hash(self.algorithm, &signature);
        tracing::debug!(record_id = self.record.id, "Signature timestamp embedded");

        Ok(SealingMaterial {
            signature: Some(SignatureUpdate {
                signature,
                signature_hash,
            }),
            ..SealingMaterial::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::XadesSignatureCodec;
    use crate::storage::SqliteStore;
    use crate::traits::{LogRecord, NewMessageRecord, RecordStore};
    use base64::{engine::general_purpose::STANDARD, Engine};

    const SIGNATURE: &str = concat!(
        r#"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#">"#,
        r#"<ds:SignatureValue>c2lnbmF0dXJlLXZhbHVl</ds:SignatureValue>"#,
        r#"<ds:Object><xades:QualifyingProperties xmlns:xades="http://uri.etsi.org/01903/v1.3.2#">"#,
        r#"<xades:SignedProperties/></xades:QualifyingProperties></ds:Object>"#,
        r#"</ds:Signature>"#
    );

    async fn saved(store: &SqliteStore, chain: Option<(&str, &str)>) -> MessageRecord {
        store
            .save_message(NewMessageRecord {
                query_id: "q".into(),
                signature: SIGNATURE.into(),
                signature_hash: signature_hash(DigestAlgorithm::Sha512, SIGNATURE),
                hash_chain_result: chain.map(|c| c.0.to_string()),
                hash_chain: chain.map(|c| c.1.to_string()),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    fn request(record: MessageRecord) -> SingleTimestampRequest {
        SingleTimestampRequest::new(record, Arc::new(XadesSignatureCodec), DigestAlgorithm::Sha512)
    }

    async fn stored(store: &SqliteStore, id: i64) -> MessageRecord {
        store
            .get(id)
            .await
            .unwrap()
            .and_then(LogRecord::into_message)
            .unwrap()
    }

    #[tokio::test]
    async fn test_stamps_signature_value() {
        let store = SqliteStore::in_memory().unwrap();
        let record = saved(&store, None).await;
        let mut req = request(record);

        assert_eq!(req.data_to_stamp().await.unwrap(), b"signature-value");
    }

    #[tokio::test]
    async fn test_success_embeds_token_and_rehashes() {
        let store = SqliteStore::in_memory().unwrap();
        let record = saved(&store, None).await;
        let mut req = request(record.clone());

        let material = req.on_success(b"\x30\x03\x02\x01\x01").await.unwrap();
        assert!(material.hash_chain_result.is_none());
        assert!(material.hash_chains.is_none());

        let update = material.signature.unwrap();
        assert!(update.signature.contains(&STANDARD.encode(b"\x30\x03\x02\x01\x01")));
        assert_eq!(
            update.signature_hash,
            signature_hash(DigestAlgorithm::Sha512, &update.signature)
        );
        assert_ne!(update.signature_hash, record.signature_hash);
    }

    #[tokio::test]
    async fn test_success_writes_nothing_by_itself() {
        let store = SqliteStore::in_memory().unwrap();
        let record = saved(&store, None).await;
        let mut req = request(record.clone());

        req.on_success(b"\x30\x00").await.unwrap();

        // the signature is replaced only together with the timestamp link
        assert_eq!(stored(&store, record.id).await, record);
    }

    #[tokio::test]
    async fn test_batch_signed_record_uses_chain_result() {
        let store = SqliteStore::in_memory().unwrap();
        let record = saved(&store, Some(("chain-result", "chain-proof"))).await;
        let mut req = request(record.clone());

        assert_eq!(req.data_to_stamp().await.unwrap(), b"chain-result");

        let material = req.on_success(b"\x30\x00").await.unwrap();
        assert_eq!(material.hash_chain_result.as_deref(), Some("chain-result"));
        assert_eq!(material.hash_chains, Some(vec!["chain-proof".to_string()]));
        assert!(material.signature.is_none());
    }

    #[tokio::test]
    async fn test_missing_signature_value_is_signature_error() {
        let mut record = saved(&SqliteStore::in_memory().unwrap(), None).await;
        record.signature = "<ds:Signature/>".into();
        let mut req = request(record);

        let err = req.data_to_stamp().await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_SIGNATURE");
    }
}
