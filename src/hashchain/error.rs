use thiserror::Error;

/// Hash chain construction and verification errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashChainError {
    #[error("hash chain has no inputs")]
    NoInputs,

    #[error("unsupported digest algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("input digest does not match the data reference of the chain")]
    InputMismatch,

    #[error("computed chain digest does not match the hash chain result")]
    ResultMismatch,

    #[error("input digest is not referenced by the hash chain")]
    InputNotReferenced,

    #[error("hash chain and result use different digest algorithms")]
    AlgorithmMismatch,

    #[error("invalid step reference {reference} in step {step}")]
    InvalidStepReference { step: usize, reference: usize },

    #[error("malformed hash chain: {0}")]
    Malformed(String),

    #[error("DER encoding failed: {0}")]
    Encoding(String),
}

impl From<der::Error> for HashChainError {
    fn from(e: der::Error) -> Self {
        HashChainError::Encoding(e.to_string())
    }
}

impl From<serde_json::Error> for HashChainError {
    fn from(e: serde_json::Error) -> Self {
        HashChainError::Malformed(e.to_string())
    }
}
