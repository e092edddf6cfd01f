//! Message log configuration

use std::path::PathBuf;

use crate::anchoring::{
    TsaConfig, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_MAX_RESPONSE_BYTES, DEFAULT_READ_TIMEOUT_MS,
};
use crate::hashchain::DigestAlgorithm;

/// Default acceptable failure period (4 hours)
pub const DEFAULT_ACCEPTABLE_FAILURE_PERIOD_SECS: u64 = 14_400;

/// Default maximum number of records sealed by one timestamp
pub const DEFAULT_RECORDS_LIMIT: usize = 10_000;

/// Message log configuration
#[derive(Debug, Clone)]
pub struct MessageLogConfig {
    pub database_path: String,
    pub log_level: String,

    /// Digest used for signature hashes, hash chains and message imprints
    pub digest_algorithm: DigestAlgorithm,

    /// TSA URLs (fallback order), timeouts and pinned certificates
    pub tsa: TsaConfig,

    /// Timestamp every message synchronously when it is logged
    pub timestamp_immediately: bool,

    /// How long timestamping may keep failing before logging is refused.
    /// Zero disables the check.
    pub acceptable_failure_period_secs: u64,

    /// Maximum records per timestamp
    pub records_limit: usize,
}

impl Default for MessageLogConfig {
    fn default() -> Self {
        Self {
            database_path: "./messagelog.db".to_string(),
            log_level: "info".to_string(),
            digest_algorithm: DigestAlgorithm::default(),
            tsa: TsaConfig::default(),
            timestamp_immediately: false,
            acceptable_failure_period_secs: DEFAULT_ACCEPTABLE_FAILURE_PERIOD_SECS,
            records_limit: DEFAULT_RECORDS_LIMIT,
        }
    }
}

impl MessageLogConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        let urls = std::env::var("MSGLOG_TSA_URLS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|u| u.trim().to_string())
                    .filter(|u| !u.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let tsa = TsaConfig {
            urls,
            connect_timeout_ms: env_or("MSGLOG_TSA_CONNECT_TIMEOUT_MS", DEFAULT_CONNECT_TIMEOUT_MS),
            read_timeout_ms: env_or("MSGLOG_TSA_READ_TIMEOUT_MS", DEFAULT_READ_TIMEOUT_MS),
            trusted_certs: std::env::var("MSGLOG_TSA_TRUSTED_CERTS")
                .ok()
                .map(PathBuf::from),
            max_response_bytes: env_or("MSGLOG_TSA_MAX_RESPONSE_BYTES", DEFAULT_MAX_RESPONSE_BYTES),
        };

        Self {
            database_path: std::env::var("MSGLOG_DATABASE_PATH")
                .unwrap_or_else(|_| "./messagelog.db".to_string()),
            log_level: std::env::var("MSGLOG_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            digest_algorithm: env_or("MSGLOG_DIGEST_ALGORITHM", DigestAlgorithm::default()),
            tsa,
            timestamp_immediately: std::env::var("MSGLOG_TIMESTAMP_IMMEDIATELY")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            acceptable_failure_period_secs: env_or(
                "MSGLOG_ACCEPTABLE_FAILURE_PERIOD_SECS",
                DEFAULT_ACCEPTABLE_FAILURE_PERIOD_SECS,
            ),
            records_limit: env_or("MSGLOG_RECORDS_LIMIT", DEFAULT_RECORDS_LIMIT).max(1),
        }
    }

    /// Check if any TSA is configured
    pub fn is_timestamping_enabled(&self) -> bool {
        !self.tsa.urls.is_empty()
    }
}

/// Parsed env var, `default` when unset or invalid
pub(crate) fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}
