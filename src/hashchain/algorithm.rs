//! Digest algorithms usable for hash chains and timestamp requests

use std::fmt;
use std::str::FromStr;

use const_oid::ObjectIdentifier;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};
use spki::AlgorithmIdentifierOwned;

use super::error::HashChainError;

/// Supported digest algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DigestAlgorithm {
    #[serde(rename = "SHA-256")]
    Sha256,
    #[serde(rename = "SHA-384")]
    Sha384,
    #[default]
    #[serde(rename = "SHA-512")]
    Sha512,
}

impl DigestAlgorithm {
    /// Algorithm OID (NIST hash algorithm arc)
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            DigestAlgorithm::Sha256 => const_oid::db::rfc5912::ID_SHA_256,
            DigestAlgorithm::Sha384 => const_oid::db::rfc5912::ID_SHA_384,
            DigestAlgorithm::Sha512 => const_oid::db::rfc5912::ID_SHA_512,
        }
    }

    /// Resolves an algorithm from its OID
    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        [
            DigestAlgorithm::Sha256,
            DigestAlgorithm::Sha384,
            DigestAlgorithm::Sha512,
        ]
        .into_iter()
        .find(|alg| alg.oid() == *oid)
    }

    /// Canonical algorithm name
    pub fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "SHA-256",
            DigestAlgorithm::Sha384 => "SHA-384",
            DigestAlgorithm::Sha512 => "SHA-512",
        }
    }

    /// Digest output length in bytes
    pub fn output_len(&self) -> usize {
        match self {
            DigestAlgorithm::Sha256 => 32,
            DigestAlgorithm::Sha384 => 48,
            DigestAlgorithm::Sha512 => 64,
        }
    }

    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            DigestAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            DigestAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
            DigestAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        }
    }

    /// AlgorithmIdentifier with absent parameters
    pub fn algorithm_identifier(&self) -> AlgorithmIdentifierOwned {
        AlgorithmIdentifierOwned {
            oid: self.oid(),
            parameters: None,
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = HashChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_uppercase();

        match normalized.as_str() {
            "SHA256" => Ok(DigestAlgorithm::Sha256),
            "SHA384" => Ok(DigestAlgorithm::Sha384),
            "SHA512" => Ok(DigestAlgorithm::Sha512),
            _ => Err(HashChainError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_sha512() {
        assert_eq!(DigestAlgorithm::default(), DigestAlgorithm::Sha512);
    }

    #[test]
    fn test_from_str_accepts_common_spellings() {
        assert_eq!(
            "SHA-256".parse::<DigestAlgorithm>().unwrap(),
            DigestAlgorithm::Sha256
        );
        assert_eq!(
            "sha384".parse::<DigestAlgorithm>().unwrap(),
            DigestAlgorithm::Sha384
        );
        assert_eq!(
            "Sha_512".parse::<DigestAlgorithm>().unwrap(),
            DigestAlgorithm::Sha512
        );
        assert!("MD5".parse::<DigestAlgorithm>().is_err());
    }

    #[test]
    fn test_oid_lookup() {
        for alg in [
            DigestAlgorithm::Sha256,
            DigestAlgorithm::Sha384,
            DigestAlgorithm::Sha512,
        ] {
            assert_eq!(DigestAlgorithm::from_oid(&alg.oid()), Some(alg));
        }
        assert_eq!(
            DigestAlgorithm::Sha256.oid().to_string(),
            "2.16.840.1.101.3.4.2.1"
        );
        assert_eq!(
            DigestAlgorithm::from_oid(&const_oid::db::rfc5911::ID_DATA),
            None
        );
    }

    #[test]
    fn test_digest_lengths() {
        for alg in [
            DigestAlgorithm::Sha256,
            DigestAlgorithm::Sha384,
            DigestAlgorithm::Sha512,
        ] {
            assert_eq!(alg.digest(b"abc").len(), alg.output_len());
        }
    }

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            hex::encode(DigestAlgorithm::Sha256.digest(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&DigestAlgorithm::Sha512).unwrap();
        assert_eq!(json, "\"SHA-512\"");
        let parsed: DigestAlgorithm = serde_json::from_str("\"SHA-256\"").unwrap();
        assert_eq!(parsed, DigestAlgorithm::Sha256);
    }
}
