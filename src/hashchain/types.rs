//! Hash chain data model and its JSON encoding

use serde::{Deserialize, Serialize};

use super::algorithm::DigestAlgorithm;
use super::error::HashChainError;

/// Root digest of a hash chain tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashChainResult {
    pub digest_method: DigestAlgorithm,
    #[serde(with = "base64_bytes")]
    pub digest_value: Vec<u8>,
}

/// Inclusion proof of one input against a [`HashChainResult`]
///
/// `steps[0]` is the step closest to the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashChain {
    pub digest_method: DigestAlgorithm,
    pub steps: Vec<HashStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashStep {
    pub left: StepValue,
    pub right: StepValue,
}

/// One side of a hash step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepValue {
    /// Literal sibling digest
    HashValue {
        #[serde(with = "base64_bytes")]
        digest: Vec<u8>,
    },
    /// Index of a later step in the same chain whose digest goes here
    StepRef { step: usize },
    /// The input digest being proven
    DataRef {
        #[serde(with = "base64_bytes")]
        digest: Vec<u8>,
    },
}

impl HashChainResult {
    pub fn to_json(&self) -> Result<String, HashChainError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, HashChainError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl HashChain {
    pub fn to_json(&self) -> Result<String, HashChainError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, HashChainError> {
        Ok(serde_json::from_str(json)?)
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}
