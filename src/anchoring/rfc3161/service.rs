//! TSA service with fallback logic

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::anchoring::rfc3161::async_client::TsaClient;
use crate::anchoring::rfc3161::types::{AllTsasFailed, TsaAnchor};

/// TSA service with URL list and fallback
///
/// Tries the configured TSA URLs in order until one returns a valid token.
/// Each failed URL is remembered with its error so callers can report
/// per-provider health.
pub struct TsaService {
    client: Arc<dyn TsaClient>,
    urls: Vec<String>,
}

impl TsaService {
    pub fn new(client: Arc<dyn TsaClient>, urls: Vec<String>) -> Self {
        Self { client, urls }
    }

    /// Get timestamp over `data` with fallback to the next URL on any error
    pub async fn timestamp_with_fallback(&self, data: &[u8]) -> Result<TsaAnchor, AllTsasFailed> {
        let mut errors_by_url = BTreeMap::new();

        for tsa_url in &self.urls {
            tracing::debug!(tsa_url = %tsa_url, "Attempting TSA request");

            match self.client.timestamp(tsa_url, data).await {
                Ok(response) => {
                    tracing::info!(tsa_url = %tsa_url, "TSA request succeeded");
                    return Ok(TsaAnchor {
                        tsa_url: tsa_url.clone(),
                        token_der: response.token_der,
                        gen_time: response.gen_time,
                        errors_by_url,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        tsa_url = %tsa_url,
                        error = %e,
                        "TSA request failed, trying next"
                    );
                    errors_by_url.insert(tsa_url.clone(), e);
                }
            }
        }

        Err(AllTsasFailed { errors_by_url })
    }

    /// Check if TSA is configured
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.urls.is_empty()
    }

    /// Get configured TSA URLs
    #[must_use]
    pub fn urls(&self) -> &[String] {
        &self.urls
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchoring::error::AnchorError;
    use crate::anchoring::rfc3161::types::TsaResponse;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    /// Fails for the URLs listed in `failing`, records every call
    struct MockTsaClient {
        failing: Vec<String>,
        calls: Mutex<Vec<String>>,
    }

    impl MockTsaClient {
        fn failing_for(urls: &[&str]) -> Self {
            Self {
                failing: urls.iter().map(|u| u.to_string()).collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TsaClient for MockTsaClient {
        async fn timestamp(&self, tsa_url: &str, _data: &[u8]) -> Result<TsaResponse, AnchorError> {
            self.calls.lock().unwrap().push(tsa_url.to_string());
            if self.failing.iter().any(|u| u == tsa_url) {
                return Err(AnchorError::Network(format!("{} unreachable", tsa_url)));
            }
            Ok(TsaResponse {
                token_der: vec![0x30, 0x00],
                gen_time: Utc::now(),
            })
        }
    }

    fn urls() -> Vec<String> {
        vec!["http://tsa1".into(), "http://tsa2".into(), "http://tsa3".into()]
    }

    #[tokio::test]
    async fn test_first_url_success() {
        let client = Arc::new(MockTsaClient::failing_for(&[]));
        let service = TsaService::new(client.clone(), urls());

        let anchor = service.timestamp_with_fallback(b"data").await.unwrap();
        assert_eq!(anchor.tsa_url, "http://tsa1");
        assert!(anchor.errors_by_url.is_empty());
        assert_eq!(client.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fallback_records_failed_urls() {
        let client = Arc::new(MockTsaClient::failing_for(&["http://tsa1", "http://tsa2"]));
        let service = TsaService::new(client.clone(), urls());

        let anchor = service.timestamp_with_fallback(b"data").await.unwrap();
        assert_eq!(anchor.tsa_url, "http://tsa3");
        assert_eq!(
            anchor.errors_by_url.keys().collect::<Vec<_>>(),
            vec!["http://tsa1", "http://tsa2"]
        );
        assert_eq!(
            *client.calls.lock().unwrap(),
            vec!["http://tsa1", "http://tsa2", "http://tsa3"]
        );
    }

    #[tokio::test]
    async fn test_all_fail() {
        let client = Arc::new(MockTsaClient::failing_for(&[
            "http://tsa1",
            "http://tsa2",
            "http://tsa3",
        ]));
        let service = TsaService::new(client, urls());

        let err = service.timestamp_with_fallback(b"data").await.unwrap_err();
        assert_eq!(err.errors_by_url.len(), 3);
    }

    #[tokio::test]
    async fn test_no_urls() {
        let service = TsaService::new(Arc::new(MockTsaClient::failing_for(&[])), vec![]);
        assert!(!service.is_enabled());
        let err = service.timestamp_with_fallback(b"data").await.unwrap_err();
        assert!(err.errors_by_url.is_empty());
    }
}
