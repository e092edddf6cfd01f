//! Trait definitions for storage and scheduling seams

pub mod flush;
pub mod storage;

pub use flush::PendingFlush;
pub use storage::{
    LogRecord, MessageRecord, NewMessageRecord, NewTimestampRecord, RecordStore, SealedRecord,
    SignatureUpdate, TimestampRecord,
};
