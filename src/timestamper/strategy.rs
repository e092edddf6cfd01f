use async_trait::async_trait;

use super::task::{TimestampFailed, TimestampResult, TimestampSucceeded, TimestampTask};
use crate::anchoring::TsaService;
use crate::error::{MessageLogError, MessageLogResult};
use crate::traits::SignatureUpdate;

/// What to persist alongside a token
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SealingMaterial {
    pub hash_chain_result: Option<String>,
    pub hash_chains: Option<Vec<String>>,

    /// Replacement signature with the token embedded
    pub signature: Option<SignatureUpdate>,
}

/// How a task is turned into TSA input and how a token is finalized
#[async_trait]
pub trait TimestampStrategy: Send {
    fn task(&self) -> &TimestampTask;

    /// Bytes whose digest goes into the message imprint
    async fn data_to_stamp(&mut self) -> MessageLogResult<Vec<u8>>;

    /// Called once with the token of the first TSA that answered
    async fn on_success(&mut self, token_der: &[u8]) -> MessageLogResult<SealingMaterial>;
}

/// Run a strategy against the TSAs in order
///
/// Errors raised before any TSA is contacted (no URLs configured, unreadable
/// signature or digests) are returned as `Err`. Everything after that is
/// reported through [`TimestampResult`], including a failure of
/// [`TimestampStrategy::on_success`].
pub async fn execute<S>(strategy: &mut S, service: &TsaService) -> MessageLogResult<TimestampResult>
where
    S: TimestampStrategy + ?Sized,
{
    if !service.is_enabled() {
        return Err(MessageLogError::NoTimestampingProvider);
    }

    let data = strategy.data_to_stamp().await?;
    let records = strategy.task().record_ids().to_vec();
    let signature_hashes = strategy.task().signature_hashes().to_vec();

    let anchor = match service.timestamp_with_fallback(&data).await {
        Ok(anchor) => anchor,
        Err(failed) => {
            tracing::warn!(
                records = records.len(),
                attempted = failed.errors_by_url.len(),
                "No timestamping provider succeeded"
            );
            return Ok(TimestampResult::Failed(TimestampFailed {
                records,
                cause: MessageLogError::NoProviderSucceeded {
                    attempted: failed.errors_by_url.len(),
                },
                errors_by_url: failed.errors_by_url,
            }));
        }
    };

    match strategy.on_success(&anchor.token_der).await {
        Ok(material) => Ok(TimestampResult::Succeeded(TimestampSucceeded {
            records,
            signature_hashes,
            timestamp_der: anchor.token_der,
            hash_chain_result: material.hash_chain_result,
            hash_chains: material.hash_chains,
            signature: material.signature,
            source_url: anchor.tsa_url,
            errors_by_url: anchor.errors_by_url,
        })),
        Err(e) => {
            tracing::warn!(
                tsa_url = %anchor.tsa_url,
                error = %e,
                "Timestamp obtained but could not be finalized"
            );
            Ok(TimestampResult::Failed(TimestampFailed {
                records,
                cause: e,
                errors_by_url: anchor.errors_by_url,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchoring::{AnchorError, TsaClient, TsaResponse};
    use chrono::Utc;
    use std::sync::{Arc, Mutex};

    struct ScriptedClient {
        failing: Vec<&'static str>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TsaClient for ScriptedClient {
        async fn timestamp(&self, tsa_url: &str, _data: &[u8]) -> Result<TsaResponse, AnchorError> {
            self.calls.lock().unwrap().push(tsa_url.to_string());
            if self.failing.contains(&tsa_url) {
                return Err(AnchorError::HttpStatus(503));
            }
            Ok(TsaResponse {
                token_der: b"token".to_vec(),
                gen_time: Utc::now(),
            })
        }
    }

    struct Recording {
        task: TimestampTask,
        tokens: Vec<Vec<u8>>,
        fail_finalize: bool,
    }

    #[async_trait]
    impl TimestampStrategy for Recording {
        fn task(&self) -> &TimestampTask {
            &self.task
        }

        async fn data_to_stamp(&mut self) -> MessageLogResult<Vec<u8>> {
            Ok(b"data".to_vec())
        }

        async fn on_success(&mut self, token_der: &[u8]) -> MessageLogResult<SealingMaterial> {
            self.tokens.push(token_der.to_vec());
            if self.fail_finalize {
                return Err(MessageLogError::ConcurrentModification { record_id: 1 });
            }
            Ok(SealingMaterial::default())
        }
    }

    fn service(failing: Vec<&'static str>, urls: &[&str]) -> (TsaService, Arc<ScriptedClient>) {
        let client = Arc::new(ScriptedClient {
            failing,
            calls: Mutex::new(Vec::new()),
        });
        let service = TsaService::new(client.clone(), urls.iter().map(|u| u.to_string()).collect());
        (service, client)
    }

    fn strategy(fail_finalize: bool) -> Recording {
        Recording {
            task: TimestampTask::new(vec![1], vec!["aGFzaA==".into()]).unwrap(),
            tokens: Vec::new(),
            fail_finalize,
        }
    }

    #[tokio::test]
    async fn test_failover_reports_earlier_failures() {
        let (service, client) = service(vec!["http://a", "http://b"], &["http://a", "http://b", "http://c"]);
        let mut s = strategy(false);

        let result = execute(&mut s, &service).await.unwrap();
        match result {
            TimestampResult::Succeeded(ok) => {
                assert_eq!(ok.source_url, "http://c");
                assert_eq!(
                    ok.errors_by_url.keys().cloned().collect::<Vec<_>>(),
                    vec!["http://a".to_string(), "http://b".to_string()]
                );
                assert_eq!(ok.timestamp_der, b"token");
            }
            TimestampResult::Failed(f) => panic!("unexpected failure: {}", f.cause),
        }
        assert_eq!(s.tokens.len(), 1);
        assert_eq!(client.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_all_fail_one_error_per_url() {
        let (service, client) = service(vec!["http://a", "http://b"], &["http://a", "http://b"]);
        let mut s = strategy(false);

        let result = execute(&mut s, &service).await.unwrap();
        match result {
            TimestampResult::Failed(f) => {
                assert!(matches!(
                    f.cause,
                    MessageLogError::NoProviderSucceeded { attempted: 2 }
                ));
                assert_eq!(f.errors_by_url.len(), 2);
            }
            TimestampResult::Succeeded(_) => panic!("expected failure"),
        }
        assert!(s.tokens.is_empty());
        // each URL exactly once
        assert_eq!(*client.calls.lock().unwrap(), vec!["http://a", "http://b"]);
    }

    #[tokio::test]
    async fn test_no_urls_fails_fast() {
        let (service, client) = service(vec![], &[]);
        let mut s = strategy(false);

        let err = execute(&mut s, &service).await.unwrap_err();
        assert!(matches!(err, MessageLogError::NoTimestampingProvider));
        assert!(client.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_finalize_failure_is_failed_result() {
        let (service, _) = service(vec![], &["http://a"]);
        let mut s = strategy(true);

        let result = execute(&mut s, &service).await.unwrap();
        match result {
            TimestampResult::Failed(f) => assert!(matches!(
                f.cause,
                MessageLogError::ConcurrentModification { record_id: 1 }
            )),
            TimestampResult::Succeeded(_) => panic!("expected failure"),
        }
    }
}
