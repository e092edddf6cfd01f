//! Timestamper scheduler job
//!
//! Periodically flushes the pending queue through the coordinator. Success and
//! failure signals switch between the normal interval and the retry delay.

pub mod config;
pub mod interval;
pub mod job;

pub use config::TimestamperJobConfig;
pub use interval::{
    next_interval, CachedInterval, HttpInterval, IntervalSource, StaticInterval,
    FALLBACK_INTERVAL_SECS, MAX_INTERVAL_SECS, MIN_INTERVAL_SECS,
};
pub use job::{SchedulerCommand, SchedulerHandle, SchedulerMode, SchedulerStatus, TimestamperJob};
