//! Hash chains over signature digests
//!
//! A batch of records is sealed by one timestamp over the root of a binary
//! hash tree built from their signature digests. Each record keeps the chain
//! of steps proving its digest is part of that root.

mod algorithm;
mod builder;
mod digest_list;
mod error;
mod types;
mod verifier;

pub use algorithm::DigestAlgorithm;
pub use builder::{BuiltHashChain, HashChainBuilder};
pub use digest_list::{concat_digests, digest_hash_step};
pub use error::HashChainError;
pub use types::{HashChain, HashChainResult, HashStep, StepValue};
pub use verifier::verify;
