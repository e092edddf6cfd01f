use crate::config::env_or;

/// Timestamper scheduler configuration
#[derive(Debug, Clone)]
pub struct TimestamperJobConfig {
    /// Delay before the first flush (milliseconds)
    pub initial_delay_ms: u64,

    /// Base interval between flushes when no remote source is configured
    pub interval_secs: u64,

    /// Interval used while recovering from failures, if smaller than the base
    pub retry_delay_secs: u64,

    /// URL serving the base interval as a plain integer
    pub interval_url: Option<String>,

    /// How long a fetched interval is reused
    pub interval_cache_ttl_secs: u64,
}

impl Default for TimestamperJobConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            interval_secs: 60,
            retry_delay_secs: 60,
            interval_url: None,
            interval_cache_ttl_secs: 300,
        }
    }
}

impl TimestamperJobConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            initial_delay_ms: env_or("MSGLOG_TIMESTAMPER_INITIAL_DELAY_MS", defaults.initial_delay_ms),
            interval_secs: env_or("MSGLOG_TIMESTAMPER_INTERVAL_SECS", defaults.interval_secs),
            retry_delay_secs: env_or("MSGLOG_TIMESTAMPER_RETRY_DELAY_SECS", defaults.retry_delay_secs),
            interval_url: std::env::var("MSGLOG_TIMESTAMPER_INTERVAL_URL")
                .ok()
                .filter(|u| !u.trim().is_empty()),
            interval_cache_ttl_secs: env_or(
                "MSGLOG_TIMESTAMPER_INTERVAL_CACHE_TTL_SECS",
                defaults.interval_cache_ttl_secs,
            ),
        }
    }
}
