//! Background job management for timestamping
//!
//! The timestamper job seals pending message records in batches. It runs
//! continuously, discovers pending work by querying the record store and never
//! blocks the logging path.

pub mod config;
pub mod timestamper_job;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::coordinator::TimestampCoordinator;
use crate::error::MessageLogResult;

pub use config::BackgroundConfig;
pub use timestamper_job::{
    CachedInterval, HttpInterval, IntervalSource, SchedulerHandle, SchedulerMode, StaticInterval,
    TimestamperJob, TimestamperJobConfig,
};

/// Background job runner
pub struct BackgroundJobRunner {
    coordinator: Arc<TimestampCoordinator>,
    interval: Arc<dyn IntervalSource>,
    config: BackgroundConfig,
    shutdown_tx: broadcast::Sender<()>,
}

impl BackgroundJobRunner {
    /// Runner with the interval source described by `config`
    pub fn new(
        coordinator: Arc<TimestampCoordinator>,
        config: BackgroundConfig,
    ) -> MessageLogResult<Self> {
        let interval = interval_source(&config.timestamper)?;
        Ok(Self::with_interval_source(coordinator, interval, config))
    }

    pub fn with_interval_source(
        coordinator: Arc<TimestampCoordinator>,
        interval: Arc<dyn IntervalSource>,
        config: BackgroundConfig,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            coordinator,
            interval,
            config,
            shutdown_tx,
        }
    }

    /// Start all background jobs
    ///
    /// The scheduler handle is attached to the coordinator so that immediate
    /// timestamps and flush outcomes reach the scheduler.
    pub async fn start(&self) -> MessageLogResult<Vec<tokio::task::JoinHandle<()>>> {
        if self.config.disabled {
            tracing::info!("Background jobs disabled via MSGLOG_BACKGROUND_DISABLED=true");
            return Ok(vec![]);
        }

        let mut handles = Vec::new();

        if self.coordinator.config().is_timestamping_enabled() {
            let (job, handle) = TimestamperJob::new(
                Arc::clone(&self.coordinator) as Arc<dyn crate::traits::PendingFlush>,
                Arc::clone(&self.interval),
                self.config.timestamper.clone(),
            );
            self.coordinator.attach_scheduler(handle);

            let shutdown_rx = self.shutdown_tx.subscribe();
            handles.push(tokio::spawn(job.run(shutdown_rx)));
            tracing::info!(
                initial_delay_ms = self.config.timestamper.initial_delay_ms,
                retry_delay_secs = self.config.timestamper.retry_delay_secs,
                "Timestamper job started"
            );
        } else {
            tracing::warn!("Timestamper job disabled: no MSGLOG_TSA_URLS configured");
        }

        tracing::info!(job_count = handles.len(), "Background jobs started");

        Ok(handles)
    }

    /// Signal all jobs to shutdown gracefully
    pub fn shutdown(&self) {
        tracing::info!("Signaling background jobs to shutdown");
        let _ = self.shutdown_tx.send(());
    }
}

fn interval_source(config: &TimestamperJobConfig) -> MessageLogResult<Arc<dyn IntervalSource>> {
    match &config.interval_url {
        Some(url) => {
            let remote = HttpInterval::new(url.clone(), Duration::from_secs(10))?;
            Ok(Arc::new(CachedInterval::new(
                remote,
                Duration::from_secs(config.interval_cache_ttl_secs),
            )))
        }
        None => Ok(Arc::new(StaticInterval(config.interval_secs))),
    }
}
