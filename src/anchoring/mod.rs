//! Anchoring implementations

pub mod error;
mod rfc3161;

pub use error::AnchorError;
pub use rfc3161::*;
