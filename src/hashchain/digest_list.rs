//! DER encoding of hash step inputs
//!
//! A hash step digests the DER encoding of
//! `SEQUENCE OF DigestInfo { AlgorithmIdentifier, OCTET STRING }` built from
//! its left and right values, in that order.

use der::asn1::OctetString;
use der::{Encode, Sequence};
use spki::AlgorithmIdentifierOwned;

use super::algorithm::DigestAlgorithm;
use super::error::HashChainError;

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
struct DigestInfo {
    digest_algorithm: AlgorithmIdentifierOwned,
    digest: OctetString,
}

/// DER encoding of the digest list made of `digests`
pub fn concat_digests(
    algorithm: DigestAlgorithm,
    digests: &[&[u8]],
) -> Result<Vec<u8>, HashChainError> {
    let list = digests
        .iter()
        .map(|d| {
            Ok(DigestInfo {
                digest_algorithm: algorithm.algorithm_identifier(),
                digest: OctetString::new(d.to_vec())?,
            })
        })
        .collect::<Result<Vec<_>, der::Error>>()?;

    Ok(list.to_der()?)
}

/// Digest of one hash step: `H(DER(DigestList(left, right)))`
pub fn digest_hash_step(
    algorithm: DigestAlgorithm,
    left: &[u8],
    right: &[u8],
) -> Result<Vec<u8>, HashChainError> {
    let encoded = concat_digests(algorithm, &[left, right])?;
    Ok(algorithm.digest(&encoded))
}
