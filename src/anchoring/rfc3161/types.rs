//! RFC 3161 types and configuration

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::anchoring::error::AnchorError;

/// Default TCP connect timeout towards a TSA
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 20_000;

/// Default read timeout towards a TSA
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 60_000;

/// Default cap on a TimeStampResp body
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 1024 * 1024;

/// Validated timestamp returned by one TSA
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TsaResponse {
    /// TimeStampToken (DER encoded), signer certificate embedded
    pub token_der: Vec<u8>,

    /// genTime of the token
    pub gen_time: DateTime<Utc>,
}

/// Outcome of a successful failover round
#[derive(Debug, Clone)]
pub struct TsaAnchor {
    /// URL of the TSA that signed this timestamp
    pub tsa_url: String,

    /// TimeStampToken (DER encoded)
    pub token_der: Vec<u8>,

    pub gen_time: DateTime<Utc>,

    /// Failures of the TSAs tried before `tsa_url`
    pub errors_by_url: BTreeMap<String, AnchorError>,
}

/// Every configured TSA failed
#[derive(Debug, Clone, Error)]
#[error("all {} TSAs failed", .errors_by_url.len())]
pub struct AllTsasFailed {
    pub errors_by_url: BTreeMap<String, AnchorError>,
}

/// TSA client configuration
#[derive(Debug, Clone)]
pub struct TsaConfig {
    /// List of TSA URLs to try (fallback order)
    pub urls: Vec<String>,

    /// TCP connect timeout per TSA request in milliseconds
    pub connect_timeout_ms: u64,

    /// Read timeout per TSA request in milliseconds
    pub read_timeout_ms: u64,

    /// PEM file with the pinned TSA certificates
    pub trusted_certs: Option<PathBuf>,

    /// Largest response body accepted from a TSA
    pub max_response_bytes: usize,
}

impl Default for TsaConfig {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            trusted_certs: None,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

impl TsaConfig {
    /// Create config with multiple fallback TSAs
    #[must_use]
    pub fn with_fallback(urls: Vec<String>) -> Self {
        Self {
            urls,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeouts() {
        let config = TsaConfig::default();
        assert!(config.urls.is_empty());
        assert_eq!(config.connect_timeout_ms, 20_000);
        assert_eq!(config.read_timeout_ms, 60_000);
        assert!(config.trusted_certs.is_none());
        assert_eq!(config.max_response_bytes, 1024 * 1024);
    }

    #[test]
    fn test_with_fallback_keeps_order() {
        let config = TsaConfig::with_fallback(vec!["http://a".into(), "http://b".into()]);
        assert_eq!(config.urls, vec!["http://a", "http://b"]);
        assert_eq!(config.read_timeout_ms, DEFAULT_READ_TIMEOUT_MS);
    }

    #[test]
    fn test_all_failed_display() {
        let mut errors_by_url = BTreeMap::new();
        errors_by_url.insert("http://a".to_string(), AnchorError::HttpStatus(500));
        errors_by_url.insert("http://b".to_string(), AnchorError::Timeout(10));
        assert_eq!(AllTsasFailed { errors_by_url }.to_string(), "all 2 TSAs failed");
    }
}
