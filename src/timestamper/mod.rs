//! Timestamp tasks and the strategies that fulfil them
//!
//! A task names the records to seal. A strategy decides which bytes are sent
//! to the TSA and what happens once a token comes back:
//! - [`SingleTimestampRequest`] stamps one record's SignatureValue and embeds
//!   the token into the signature document
//! - [`BatchTimestampRequest`] stamps the root of a hash chain built over the
//!   signature hashes of many records
//!
//! Both share the failover loop in [`execute`].

mod batch;
mod single;
mod strategy;
mod task;

pub use batch::BatchTimestampRequest;
pub use single::SingleTimestampRequest;
pub use strategy::{execute, SealingMaterial, TimestampStrategy};
pub use task::{TimestampFailed, TimestampResult, TimestampSucceeded, TimestampTask};
