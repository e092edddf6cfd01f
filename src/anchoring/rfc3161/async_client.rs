//! Asynchronous RFC 3161 TSA client

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use der::Encode;

use crate::anchoring::error::AnchorError;
use crate::anchoring::rfc3161::asn1::{build_timestamp_request, parse_timestamp_response};
use crate::anchoring::rfc3161::token::validate_response;
use crate::anchoring::rfc3161::trust::TsaTrustProvider;
use crate::anchoring::rfc3161::types::{TsaConfig, TsaResponse};
use crate::hashchain::DigestAlgorithm;

/// Async TSA client trait
#[async_trait]
pub trait TsaClient: Send + Sync {
    /// Request a validated timestamp over `data` from a specific TSA URL
    async fn timestamp(&self, tsa_url: &str, data: &[u8]) -> Result<TsaResponse, AnchorError>;
}

/// Async RFC 3161 client implementation
pub struct AsyncRfc3161Client {
    /// HTTP client (reqwest with async runtime)
    client: reqwest::Client,

    /// Message imprint algorithm
    algorithm: DigestAlgorithm,

    trust: Arc<dyn TsaTrustProvider>,

    read_timeout_ms: u64,

    max_response_bytes: usize,

    /// Fixed request nonce, random when unset
    fixed_nonce: Option<u64>,
}

impl AsyncRfc3161Client {
    /// Create with custom configuration
    pub fn with_config(
        config: &TsaConfig,
        algorithm: DigestAlgorithm,
        trust: Arc<dyn TsaTrustProvider>,
    ) -> Result<Self, AnchorError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .read_timeout(Duration::from_millis(config.read_timeout_ms))
            .build()
            .map_err(|e| AnchorError::Network(e.to_string()))?;

        Ok(Self {
            client,
            algorithm,
            trust,
            read_timeout_ms: config.read_timeout_ms,
            max_response_bytes: config.max_response_bytes,
            fixed_nonce: None,
        })
    }

    /// Sends `nonce` with every request instead of a random one
    #[must_use]
    pub fn with_fixed_nonce(mut self, nonce: u64) -> Self {
        self.fixed_nonce = Some(nonce);
        self
    }

    fn nonce(&self) -> u64 {
        self.fixed_nonce.unwrap_or_else(rand::random)
    }

    /// Reads the response body, refusing more than `max_response_bytes`
    async fn read_body(&self, mut response: reqwest::Response) -> Result<Vec<u8>, AnchorError> {
        let limit = self.max_response_bytes;
        let too_large = || {
            AnchorError::InvalidResponse(format!("response body exceeds {} bytes", limit))
        };

        if response.content_length().is_some_and(|len| len > limit as u64) {
            return Err(too_large());
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| AnchorError::from_reqwest(e, self.read_timeout_ms))?
        {
            if body.len() + chunk.len() > limit {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

#[async_trait]
impl TsaClient for AsyncRfc3161Client {
    async fn timestamp(&self, tsa_url: &str, data: &[u8]) -> Result<TsaResponse, AnchorError> {
        tracing::debug!(tsa_url = %tsa_url, "Async timestamp request");

        let request = build_timestamp_request(self.algorithm, data, Some(self.nonce()))?;
        let body = request.to_der()?;

        let response = self
            .client
            .post(tsa_url)
            .header("Content-Type", "application/timestamp-query")
            .body(body)
            .send()
            .await
            .map_err(|e| AnchorError::from_reqwest(e, self.read_timeout_ms))?;

        if !response.status().is_success() {
            return Err(AnchorError::HttpStatus(response.status().as_u16()));
        }

        let bytes = self.read_body(response).await?;

        let parsed = parse_timestamp_response(&bytes)?;
        let token = validate_response(&request, &parsed)?;
        let gen_time = token.gen_time()?;

        let signer = self.trust.resolve_signer(
            &token.signer_identifier()?,
            &token.certificates()?,
            gen_time,
        )?;
        token.verify_signature(&signer)?;
        let token_der = token.with_certificate(&signer)?;

        tracing::info!(tsa_url = %tsa_url, gen_time = %gen_time, "Async timestamp received");

        Ok(TsaResponse {
            token_der,
            gen_time,
        })
    }
}
