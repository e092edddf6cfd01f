use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{sleep_until, Instant};

use super::config::TimestamperJobConfig;
use super::interval::{next_interval, IntervalSource, FALLBACK_INTERVAL_SECS};
use crate::traits::PendingFlush;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerMode {
    Normal,
    RetryBackoff,
}

/// Outcome signal sent to the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerCommand {
    Success,
    Failure,
}

/// Observable scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStatus {
    pub mode: SchedulerMode,
    pub next_fire_at: Instant,
    pub interval_secs: u64,
    pub flushes: u64,
}

/// Sends outcome signals to a running [`TimestamperJob`]
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    commands: mpsc::UnboundedSender<SchedulerCommand>,
    status: watch::Receiver<SchedulerStatus>,
}

impl SchedulerHandle {
    pub fn success(&self) {
        self.send(SchedulerCommand::Success);
    }

    pub fn failure(&self) {
        self.send(SchedulerCommand::Failure);
    }

    fn send(&self, command: SchedulerCommand) {
        if self.commands.send(command).is_err() {
            tracing::debug!(?command, "Timestamper scheduler stopped, signal dropped");
        }
    }

    pub fn status(&self) -> SchedulerStatus {
        *self.status.borrow()
    }

    /// Receiver that changes whenever the scheduler reschedules
    pub fn subscribe(&self) -> watch::Receiver<SchedulerStatus> {
        self.status.clone()
    }
}

/// Periodic flush of the pending queue
///
/// Runs in Normal mode until told about a failure, then in RetryBackoff mode
/// (with the shorter retry delay) until told about a success. Exactly one
/// tick is pending at any time; rescheduling replaces it.
pub struct TimestamperJob {
    flush: Arc<dyn PendingFlush>,
    interval: Arc<dyn IntervalSource>,
    config: TimestamperJobConfig,
    commands: mpsc::UnboundedReceiver<SchedulerCommand>,
    status: watch::Sender<SchedulerStatus>,
    mode: SchedulerMode,
    deadline: Instant,
}

impl TimestamperJob {
    pub fn new(
        flush: Arc<dyn PendingFlush>,
        interval: Arc<dyn IntervalSource>,
        config: TimestamperJobConfig,
    ) -> (Self, SchedulerHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let deadline = Instant::now() + Duration::from_millis(config.initial_delay_ms);
        let (status_tx, status_rx) = watch::channel(SchedulerStatus {
            mode: SchedulerMode::Normal,
            next_fire_at: deadline,
            interval_secs: 0,
            flushes: 0,
        });

        let job = Self {
            flush,
            interval,
            config,
            commands: rx,
            status: status_tx,
            mode: SchedulerMode::Normal,
            deadline,
        };
        let handle = SchedulerHandle {
            commands: tx,
            status: status_rx,
        };
        (job, handle)
    }

    /// Run the scheduler as a background task
    ///
    /// Runs until shutdown signal is received via broadcast channel. A flush
    /// in progress completes before the signal is observed.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        let mut commands_open = true;

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Timestamper job shutting down");
                    break;
                }
                command = self.commands.recv(), if commands_open => match command {
                    Some(command) => self.handle(command).await,
                    None => commands_open = false,
                },
                _ = sleep_until(self.deadline) => {
                    self.tick().await;
                }
            }
        }
    }

    async fn tick(&mut self) {
        self.run_flush().await;
        self.reschedule().await;
    }

    async fn handle(&mut self, command: SchedulerCommand) {
        match (command, self.mode) {
            (SchedulerCommand::Success, SchedulerMode::RetryBackoff) => {
                tracing::info!("Timestamping succeeded, leaving retry mode");
                self.mode = SchedulerMode::Normal;
                self.tick().await;
            }
            (SchedulerCommand::Failure, SchedulerMode::Normal) => {
                tracing::warn!("Timestamping failed, entering retry mode");
                self.mode = SchedulerMode::RetryBackoff;
                self.reschedule().await;
            }
            _ => {}
        }
    }

    async fn run_flush(&mut self) {
        tracing::debug!(mode = ?self.mode, "Timestamper tick");
        self.flush.flush_pending().await;
        self.status.send_modify(|s| s.flushes += 1);

        // the flush reports its own outcome; apply it without flushing again
        while let Ok(command) = self.commands.try_recv() {
            self.mode = match command {
                SchedulerCommand::Success => SchedulerMode::Normal,
                SchedulerCommand::Failure => SchedulerMode::RetryBackoff,
            };
        }
    }

    async fn reschedule(&mut self) {
        let base = match self.interval.interval_secs().await {
            Ok(secs) => secs,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    fallback_secs = FALLBACK_INTERVAL_SECS,
                    "Failed to read timestamping interval"
                );
                FALLBACK_INTERVAL_SECS
            }
        };
        let secs = next_interval(base, self.mode, self.config.retry_delay_secs);

        self.deadline = Instant::now() + Duration::from_secs(secs);
        let (mode, deadline) = (self.mode, self.deadline);
        self.status.send_modify(|s| {
            s.mode = mode;
            s.next_fire_at = deadline;
            s.interval_secs = secs;
        });

        tracing::debug!(mode = ?self.mode, interval_secs = secs, "Next timestamper tick scheduled");
    }
}
