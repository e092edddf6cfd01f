//! RFC 3161 Time-Stamp Protocol implementation
//!
//! Builds TimeStampReq messages, validates TimeStampResp answers against the
//! request that produced them and resolves the signing TSA against a pinned
//! trust store.

mod asn1;
mod async_client;
mod service;
mod token;
mod trust;
mod types;

pub use asn1::{
    build_timestamp_request, parse_timestamp_response, SignerIdentifier, TimeStampReq,
    TimeStampResp, TstInfo, UnorderedSet, ID_CT_TST_INFO,
};
pub use async_client::{AsyncRfc3161Client, TsaClient};
pub use service::TsaService;
pub use token::{validate_response, TimeStampToken};
pub use trust::{PinnedTrustStore, TsaTrustProvider};
pub use types::{
    AllTsasFailed, TsaAnchor, TsaConfig, TsaResponse, DEFAULT_CONNECT_TIMEOUT_MS,
    DEFAULT_MAX_RESPONSE_BYTES, DEFAULT_READ_TIMEOUT_MS,
};
