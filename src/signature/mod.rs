//! Signature document handling
//!
//! Records carry a detached XML signature. Timestamping needs two things
//! from it: the raw SignatureValue bytes to stamp, and a way to embed the
//! resulting token back as a signature timestamp.

mod xades;

use base64::{engine::general_purpose::STANDARD, Engine};
use thiserror::Error;

use crate::hashchain::DigestAlgorithm;

pub use xades::XadesSignatureCodec;

/// Signature document errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("element {0} not found in signature")]
    MissingElement(&'static str),

    #[error("malformed signature: {0}")]
    Malformed(String),

    #[error("invalid base64 in {element}: {reason}")]
    InvalidBase64 {
        element: &'static str,
        reason: String,
    },
}

/// Reads signature values from and embeds timestamps into signature documents
pub trait SignatureCodec: Send + Sync {
    /// Decoded SignatureValue of the document
    fn signature_value(&self, signature_xml: &str) -> Result<Vec<u8>, SignatureError>;

    /// Document with `token_der` embedded as its signature timestamp
    fn embed_timestamp(&self, signature_xml: &str, token_der: &[u8])
        -> Result<String, SignatureError>;

    /// Embedded signature timestamp token, if any
    fn timestamp_token(&self, signature_xml: &str) -> Result<Option<Vec<u8>>, SignatureError>;
}

/// Base64 digest of the signature document's UTF-8 bytes
pub fn signature_hash(algorithm: DigestAlgorithm, signature_xml: &str) -> String {
    STANDARD.encode(algorithm.digest(signature_xml.as_bytes()))
}
