//! Test fixtures and coordinator setup utilities

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use msglog_timestamper::anchoring::{AnchorError, TsaClient, TsaResponse, TsaService};
use msglog_timestamper::signature::XadesSignatureCodec;
use msglog_timestamper::traits::RecordStore;
use msglog_timestamper::{MessageLogConfig, SqliteStore, TimestampCoordinator};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Barrier;

pub const TSA_A: &str = "http://tsa-a.test/tsr";
pub const TSA_B: &str = "http://tsa-b.test/tsr";
pub const TSA_C: &str = "http://tsa-c.test/tsr";

/// Sample XAdES signature with a distinct SignatureValue per `n`
pub fn signature(n: u32) -> String {
    format!(
        concat!(
            r#"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#" Id="sig-{n}">"#,
            r#"<ds:SignedInfo><ds:Reference URI="/message"/></ds:SignedInfo>"#,
            r#"<ds:SignatureValue>{value}</ds:SignatureValue>"#,
            r#"<ds:Object><xades:QualifyingProperties xmlns:xades="http://uri.etsi.org/01903/v1.3.2#">"#,
            r#"<xades:SignedProperties Id="props-{n}"/>"#,
            r#"</xades:QualifyingProperties></ds:Object>"#,
            r#"</ds:Signature>"#
        ),
        n = n,
        value = STANDARD.encode(format!("signature-value-{}", n)),
    )
}

/// Path of a file under `tests/data`
pub fn data_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Scriptable TSA client
///
/// Fails for the URLs marked failing (or all of them), records every call and
/// hands out distinct opaque tokens. With a barrier, every call waits until
/// the configured number of callers arrived.
pub struct MockTsaClient {
    failing: Mutex<Vec<String>>,
    fail_all: AtomicBool,
    calls: Mutex<Vec<String>>,
    counter: AtomicU8,
    barrier: Option<Arc<Barrier>>,
}

impl MockTsaClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::build(None))
    }

    pub fn failing_for(urls: &[&str]) -> Arc<Self> {
        let client = Self::build(None);
        *client.failing.lock().unwrap() = urls.iter().map(|u| u.to_string()).collect();
        Arc::new(client)
    }

    /// Calls block until `parties` calls are in flight
    pub fn with_barrier(parties: usize) -> Arc<Self> {
        Arc::new(Self::build(Some(Arc::new(Barrier::new(parties)))))
    }

    fn build(barrier: Option<Arc<Barrier>>) -> Self {
        Self {
            failing: Mutex::new(Vec::new()),
            fail_all: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
            counter: AtomicU8::new(0),
            barrier,
        }
    }

    pub fn set_fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TsaClient for MockTsaClient {
    async fn timestamp(&self, tsa_url: &str, _data: &[u8]) -> Result<TsaResponse, AnchorError> {
        self.calls.lock().unwrap().push(tsa_url.to_string());

        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }

        let failing = self.fail_all.load(Ordering::SeqCst)
            || self.failing.lock().unwrap().iter().any(|u| u == tsa_url);
        if failing {
            return Err(AnchorError::Network(format!("{} unreachable", tsa_url)));
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(TsaResponse {
            token_der: vec![0x30, 0x03, 0x02, 0x01, n],
            gen_time: Utc::now(),
        })
    }
}

/// Config with the given TSA URLs and defaults otherwise
pub fn config(urls: &[&str]) -> MessageLogConfig {
    let mut config = MessageLogConfig::default();
    config.tsa.urls = urls.iter().map(|u| u.to_string()).collect();
    config
}

pub fn memory_store() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::in_memory().expect("Failed to create in-memory store"))
}

/// Coordinator over `store` talking to `client`
pub fn coordinator(
    config: MessageLogConfig,
    store: Arc<dyn RecordStore>,
    client: Arc<MockTsaClient>,
) -> Arc<TimestampCoordinator> {
    let service = TsaService::new(client, config.tsa.urls.clone());
    Arc::new(TimestampCoordinator::new(
        config,
        store,
        Arc::new(XadesSignatureCodec),
        service,
    ))
}

/// Log `n` messages without timestamping them
pub async fn log_messages(coordinator: &TimestampCoordinator, n: u32) -> Vec<i64> {
    let mut ids = Vec::new();
    for i in 0..n {
        let record = coordinator
            .log_message(
                &format!("query-{}", i),
                &signature(i),
                Some(format!("body {}", i)),
                i % 2 == 1,
            )
            .await
            .expect("Failed to log message");
        ids.push(record.id);
    }
    ids
}
