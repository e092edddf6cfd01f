use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::job::SchedulerMode;
use crate::error::{MessageLogError, MessageLogResult};

/// Shortest interval between flushes
pub const MIN_INTERVAL_SECS: u64 = 60;

/// Longest interval between flushes (one day)
pub const MAX_INTERVAL_SECS: u64 = 86_400;

/// Interval used when the source cannot be read
pub const FALLBACK_INTERVAL_SECS: u64 = 60;

/// Provides the base interval between flushes
#[async_trait]
pub trait IntervalSource: Send + Sync {
    async fn interval_secs(&self) -> MessageLogResult<u64>;
}

/// Fixed interval
#[derive(Debug, Clone, Copy)]
pub struct StaticInterval(pub u64);

#[async_trait]
impl IntervalSource for StaticInterval {
    async fn interval_secs(&self) -> MessageLogResult<u64> {
        Ok(self.0)
    }
}

/// Interval published by a configuration server as a plain integer body
pub struct HttpInterval {
    url: String,
    client: reqwest::Client,
}

impl HttpInterval {
    pub fn new(url: impl Into<String>, timeout: Duration) -> MessageLogResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MessageLogError::Config(format!("interval client: {}", e)))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl IntervalSource for HttpInterval {
    async fn interval_secs(&self) -> MessageLogResult<u64> {
        let fetch = |e: reqwest::Error| {
            MessageLogError::Config(format!("interval fetch from {}: {}", self.url, e))
        };

        let body = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(fetch)?
            .text()
            .await
            .map_err(fetch)?;

        body.trim().parse().map_err(|_| {
            MessageLogError::Config(format!("interval from {} is not a number", self.url))
        })
    }
}

/// Reuses the inner source's answer for `ttl`
///
/// Failed lookups are not cached.
pub struct CachedInterval<S> {
    inner: S,
    ttl: Duration,
    cached: Mutex<Option<(Instant, u64)>>,
}

impl<S: IntervalSource> CachedInterval<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cached: Mutex::new(None),
        }
    }
}

#[async_trait]
impl<S: IntervalSource> IntervalSource for CachedInterval<S> {
    async fn interval_secs(&self) -> MessageLogResult<u64> {
        let mut cached = self.cached.lock().await;
        if let Some((fetched_at, secs)) = *cached {
            if fetched_at.elapsed() < self.ttl {
                return Ok(secs);
            }
        }

        let secs = self.inner.interval_secs().await?;
        *cached = Some((Instant::now(), secs));
        Ok(secs)
    }
}

/// Interval until the next flush
///
/// While backing off, a positive retry delay shorter than the base interval
/// replaces it. The result is clamped to
/// [`MIN_INTERVAL_SECS`]..=[`MAX_INTERVAL_SECS`].
pub fn next_interval(base_secs: u64, mode: SchedulerMode, retry_delay_secs: u64) -> u64 {
    let secs = match mode {
        SchedulerMode::RetryBackoff if retry_delay_secs > 0 && retry_delay_secs < base_secs => {
            retry_delay_secs
        }
        _ => base_secs,
    };
    secs.clamp(MIN_INTERVAL_SECS, MAX_INTERVAL_SECS)
}
