//! Timestamp coordinator
//!
//! Single entry point for everything that needs a timestamp:
//! - synchronous sealing of one record (`timestamp_immediately`, `timestamp`)
//! - batch sealing driven by the scheduler (`timestamp_batch`, `flush`)
//! - the admission check used before logging a message
//!
//! The coordinator owns the failure window and the per-TSA diagnostics, and
//! forwards success/failure signals to the scheduler once one is attached.

mod diagnostics;
mod window;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::anchoring::TsaService;
use crate::background::SchedulerHandle;
use crate::config::MessageLogConfig;
use crate::error::{MessageLogError, MessageLogResult};
use crate::signature::{signature_hash, SignatureCodec};
use crate::timestamper::{
    execute, BatchTimestampRequest, SingleTimestampRequest, TimestampFailed, TimestampResult,
    TimestampStrategy, TimestampSucceeded, TimestampTask,
};
use crate::traits::{
    LogRecord, MessageRecord, NewMessageRecord, NewTimestampRecord, PendingFlush, RecordStore,
    TimestampRecord,
};

pub use diagnostics::{DiagnosticState, DiagnosticStatus, Diagnostics};
pub use window::FailureWindow;

/// Largest period `chrono::Duration` can represent in seconds
const MAX_PERIOD_SECS: i64 = i64::MAX / 1000;

/// Totals of one flush of the pending queue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushSummary {
    pub sealed_records: usize,
    pub timestamp_records: usize,

    /// Why the flush stopped early, `None` when the queue was drained
    pub failure: Option<String>,
}

pub struct TimestampCoordinator {
    config: MessageLogConfig,
    store: Arc<dyn RecordStore>,
    codec: Arc<dyn SignatureCodec>,
    service: TsaService,
    window: FailureWindow,
    diagnostics: Diagnostics,
    scheduler: Mutex<Option<SchedulerHandle>>,
}

impl TimestampCoordinator {
    pub fn new(
        config: MessageLogConfig,
        store: Arc<dyn RecordStore>,
        codec: Arc<dyn SignatureCodec>,
        service: TsaService,
    ) -> Self {
        Self {
            config,
            store,
            codec,
            service,
            window: FailureWindow::new(),
            diagnostics: Diagnostics::new(),
            scheduler: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &MessageLogConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Route success/failure signals to a running scheduler
    pub fn attach_scheduler(&self, handle: SchedulerHandle) {
        *self
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    pub fn first_failure_at(&self) -> Option<DateTime<Utc>> {
        self.window.first_failure_at()
    }

    /// Per-TSA status snapshot
    pub fn diagnostics(&self) -> BTreeMap<String, DiagnosticStatus> {
        self.diagnostics.snapshot()
    }

    // ========== Admission ==========

    /// Check whether a message may be logged right now
    pub fn can_log_message(&self, immediate: bool) -> MessageLogResult<()> {
        self.can_log_message_at(immediate, Utc::now())
    }

    /// [`Self::can_log_message`] evaluated at `now`
    pub fn can_log_message_at(&self, immediate: bool, now: DateTime<Utc>) -> MessageLogResult<()> {
        if !self.service.is_enabled() {
            return Err(MessageLogError::NoTimestampingProvider);
        }
        if immediate {
            return Ok(());
        }

        let period = self.config.acceptable_failure_period_secs;
        if period == 0 {
            return Ok(());
        }

        let Some(failed_at) = self.window.first_failure_at() else {
            return Ok(());
        };
        let period = i64::try_from(period).unwrap_or(i64::MAX).min(MAX_PERIOD_SECS);
        let period = Duration::seconds(period);
        if now.checked_sub_signed(period).is_some_and(|limit| limit > failed_at) {
            return Err(MessageLogError::TimestampingFailed(format!(
                "timestamping has been failing since {}, longer than the acceptable {} s",
                failed_at.to_rfc3339(),
                self.config.acceptable_failure_period_secs
            )));
        }
        Ok(())
    }

    // ========== Logging ==========

    /// Log a signed message
    ///
    /// In immediate mode the record is sealed before returning and the
    /// returned record reflects the embedded timestamp.
    pub async fn log_message(
        &self,
        query_id: &str,
        signature_xml: &str,
        body: Option<String>,
        response: bool,
    ) -> MessageLogResult<MessageRecord> {
        let immediate = self.config.timestamp_immediately;
        self.can_log_message(immediate)?;

        // a signature without a readable SignatureValue could never be sealed
        self.codec.signature_value(signature_xml)?;

        let record = self
            .store
            .save_message(NewMessageRecord {
                query_id: query_id.to_string(),
                signature: signature_xml.to_string(),
                signature_hash: signature_hash(self.config.digest_algorithm, signature_xml),
                body,
                response,
                ..Default::default()
            })
            .await?;

        tracing::debug!(record_id = record.id, query_id, "Message logged");

        if !immediate {
            return Ok(record);
        }

        self.timestamp(record.id).await?;
        self.load_message(record.id).await
    }

    // ========== Timestamping ==========

    /// Seal one record synchronously, without touching the failure window
    pub async fn timestamp_immediately(
        &self,
        record: &MessageRecord,
    ) -> MessageLogResult<TimestampRecord> {
        let mut strategy = SingleTimestampRequest::new(
            record.clone(),
            Arc::clone(&self.codec),
            self.config.digest_algorithm,
        );

        match self.run(&mut strategy).await? {
            (TimestampResult::Succeeded(_), Some(timestamp)) => Ok(timestamp),
            (TimestampResult::Failed(failed), _) => Err(failed.cause),
            (TimestampResult::Succeeded(_), None) => Err(MessageLogError::Internal(
                "timestamp succeeded without a stored record".into(),
            )),
        }
    }

    /// Timestamp record of `record_id`, sealing it first if needed
    pub async fn timestamp(&self, record_id: i64) -> MessageLogResult<TimestampRecord> {
        let record = self.load_message(record_id).await?;

        if let Some(timestamp_id) = record.timestamp_record_id {
            return self
                .store
                .get_timestamp(timestamp_id)
                .await?
                .ok_or(MessageLogError::RecordNotFound(timestamp_id));
        }

        let timestamp = self.timestamp_immediately(&record).await?;
        // any successful timestamp proves the TSAs are reachable again
        self.notify_success();
        Ok(timestamp)
    }

    /// Seal records under one batch timestamp
    ///
    /// A token that could not be persisted is reported as `Failed`.
    pub async fn timestamp_batch(
        &self,
        record_ids: Vec<i64>,
        signature_hashes: Vec<String>,
    ) -> MessageLogResult<TimestampResult> {
        let task = TimestampTask::new(record_ids, signature_hashes)?;
        let mut strategy = BatchTimestampRequest::new(task, self.config.digest_algorithm);
        Ok(self.run(&mut strategy).await?.0)
    }

    /// Execute a strategy, persist a success and update diagnostics
    async fn run<S>(
        &self,
        strategy: &mut S,
    ) -> MessageLogResult<(TimestampResult, Option<TimestampRecord>)>
    where
        S: TimestampStrategy,
    {
        let result = execute(strategy, &self.service).await?;
        self.diagnostics.record(&result, Utc::now());

        let succeeded = match result {
            TimestampResult::Succeeded(succeeded) => succeeded,
            failed => return Ok((failed, None)),
        };

        match self.save_timestamp_record(&succeeded).await {
            Ok(timestamp) => Ok((TimestampResult::Succeeded(succeeded), Some(timestamp))),
            Err(e) => {
                tracing::error!(
                    records = succeeded.records.len(),
                    error = %e,
                    "Failed to persist timestamp"
                );
                Ok((
                    TimestampResult::Failed(TimestampFailed {
                        records: succeeded.records,
                        cause: e,
                        errors_by_url: succeeded.errors_by_url,
                    }),
                    None,
                ))
            }
        }
    }

    async fn save_timestamp_record(
        &self,
        succeeded: &TimestampSucceeded,
    ) -> MessageLogResult<TimestampRecord> {
        let timestamp = self
            .store
            .save_timestamp(
                NewTimestampRecord {
                    timestamp: succeeded.timestamp_der.clone(),
                    hash_chain_result: succeeded.hash_chain_result.clone(),
                },
                &succeeded.sealed_records(),
            )
            .await?;

        tracing::info!(
            timestamp_id = timestamp.id,
            records = succeeded.records.len(),
            tsa_url = %succeeded.source_url,
            "Timestamp saved"
        );
        Ok(timestamp)
    }

    async fn load_message(&self, record_id: i64) -> MessageLogResult<MessageRecord> {
        self.store
            .get(record_id)
            .await?
            .and_then(LogRecord::into_message)
            .ok_or(MessageLogError::RecordNotFound(record_id))
    }

    // ========== Failure window ==========

    pub fn notify_success(&self) {
        if self.window.record_success() {
            tracing::info!("Timestamping recovered");
        }
        if let Some(handle) = self.scheduler() {
            handle.success();
        }
    }

    pub fn notify_failure(&self) {
        self.notify_failure_at(Utc::now());
    }

    pub fn notify_failure_at(&self, at: DateTime<Utc>) {
        if self.window.record_failure(at) {
            tracing::warn!(first_failure_at = %at, "Timestamping failure window opened");
        }
        if let Some(handle) = self.scheduler() {
            handle.failure();
        }
    }

    /// Handle of the attached scheduler, if any
    pub fn scheduler(&self) -> Option<SchedulerHandle> {
        self.scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // ========== Pending queue ==========

    /// Seal pending records in chunks of at most `records_limit`
    ///
    /// Stops at the first failed chunk; its records stay queued.
    pub async fn flush(&self) -> FlushSummary {
        let limit = self.config.records_limit.max(1);
        let mut summary = FlushSummary::default();

        loop {
            let pending = match self.store.pending(limit).await {
                Ok(pending) => pending,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read pending records");
                    self.notify_failure();
                    summary.failure = Some(e.to_string());
                    break;
                }
            };
            if pending.is_empty() {
                break;
            }
            let drained = pending.len() < limit;

            match self.seal_chunk(pending).await {
                Ok(records) => {
                    summary.sealed_records += records;
                    summary.timestamp_records += 1;
                    self.notify_success();
                }
                Err(e) if e.is_persistence_race() => {
                    // lost to another sealer, the TSAs are fine
                    tracing::warn!(error = %e, "Record sealed concurrently, flush stopped");
                    summary.failure = Some(e.to_string());
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, code = e.error_code(), "Timestamping failed");
                    self.notify_failure();
                    summary.failure = Some(e.to_string());
                    break;
                }
            }

            if drained {
                break;
            }
        }

        if summary.timestamp_records > 0 || summary.failure.is_some() {
            tracing::info!(
                sealed = summary.sealed_records,
                timestamps = summary.timestamp_records,
                failure = ?summary.failure,
                "Pending records flushed"
            );
        }
        summary
    }

    /// Seal one chunk, returning the number of sealed records
    async fn seal_chunk(&self, mut chunk: Vec<MessageRecord>) -> MessageLogResult<usize> {
        let result = if chunk.len() == 1 && self.is_sealable_alone(&chunk[0]) {
            let record = chunk.remove(0);
            let mut strategy = SingleTimestampRequest::new(
                record,
                Arc::clone(&self.codec),
                self.config.digest_algorithm,
            );
            self.run(&mut strategy).await?.0
        } else {
            let (ids, hashes) = chunk
                .into_iter()
                .map(|r| (r.id, r.signature_hash))
                .unzip();
            self.timestamp_batch(ids, hashes).await?
        };

        match result {
            TimestampResult::Succeeded(s) => Ok(s.records.len()),
            TimestampResult::Failed(f) => Err(f.cause),
        }
    }

    /// Whether `record` can take the single record path
    ///
    /// A queued signature without a readable SignatureValue is stamped over
    /// its signature hash like a batch of one, so it never blocks the queue.
    fn is_sealable_alone(&self, record: &MessageRecord) -> bool {
        if record.hash_chain_result.is_some() {
            return true;
        }
        match self.codec.signature_value(&record.signature) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(
                    record_id = record.id,
                    error = %e,
                    "Unreadable signature queued, stamping its hash"
                );
                false
            }
        }
    }
}

#[async_trait]
impl PendingFlush for TimestampCoordinator {
    async fn flush_pending(&self) {
        self.flush().await;
    }
}
