//! Anchoring-specific error types

use thiserror::Error;

/// Errors of a single TSA exchange
///
/// Every variant is attributable to one TSA URL; the failover loop records
/// them per URL and moves on to the next provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnchorError {
    /// Network communication error
    #[error("network error: {0}")]
    Network(String),

    /// Request timeout
    #[error("timeout after {0} ms")]
    Timeout(u64),

    /// TSA answered with a non-success HTTP status
    #[error("TSA returned HTTP status {0}")]
    HttpStatus(u16),

    /// Invalid response from service
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// TSA rejected the request (PKIStatus other than granted)
    #[error("TSA rejected request with status {status}: {text}")]
    Rejected { status: u8, text: String },

    /// Response does not belong to the request that was sent
    #[error("response does not match request: {0}")]
    BindingMismatch(String),

    /// Token structure is not a valid timestamp token
    #[error("token invalid: {0}")]
    TokenInvalid(String),

    /// Untrusted TSA certificate
    #[error("untrusted TSA: {0}")]
    UntrustedTsa(String),

    /// No certificate matching the token signer was found
    #[error("signer certificate not found: {0}")]
    SignerNotFound(String),

    /// Service not configured
    #[error("not configured: {0}")]
    NotConfigured(String),

    /// ASN.1 encoding/decoding error
    #[error("ASN.1 error: {0}")]
    Asn1Error(String),
}

impl AnchorError {
    /// Error code recorded in the diagnostics map
    pub fn error_code(&self) -> &'static str {
        match self {
            AnchorError::Network(_) => "TSA_NETWORK_ERROR",
            AnchorError::Timeout(_) => "TSA_TIMEOUT",
            AnchorError::HttpStatus(_) => "TSA_HTTP_ERROR",
            AnchorError::InvalidResponse(_) | AnchorError::Asn1Error(_) => "TSA_INVALID_RESPONSE",
            AnchorError::Rejected { .. } => "TSA_REJECTED",
            AnchorError::BindingMismatch(_) => "TSA_RESPONSE_MISMATCH",
            AnchorError::TokenInvalid(_) => "TSA_TOKEN_INVALID",
            AnchorError::UntrustedTsa(_) => "UNTRUSTED_TSA",
            AnchorError::SignerNotFound(_) => "TSA_SIGNER_NOT_FOUND",
            AnchorError::NotConfigured(_) => "NO_TIMESTAMPING_PROVIDER_FOUND",
        }
    }

    /// Transport-level failure (as opposed to a protocol failure)
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            AnchorError::Network(_) | AnchorError::Timeout(_) | AnchorError::HttpStatus(_)
        )
    }

    /// Maps a reqwest failure, reporting timeouts with the configured budget
    pub fn from_reqwest(e: reqwest::Error, timeout_ms: u64) -> Self {
        if e.is_timeout() {
            AnchorError::Timeout(timeout_ms)
        } else if let Some(status) = e.status() {
            AnchorError::HttpStatus(status.as_u16())
        } else {
            AnchorError::Network(e.to_string())
        }
    }
}

impl From<der::Error> for AnchorError {
    fn from(e: der::Error) -> Self {
        AnchorError::Asn1Error(e.to_string())
    }
}
