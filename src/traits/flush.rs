//! Pending-queue flush trait

use async_trait::async_trait;

/// Seals whatever records are waiting for a timestamp
///
/// Driven by the timestamper scheduler. Outcomes are reported back through
/// the scheduler handle rather than the return value.
#[async_trait]
pub trait PendingFlush: Send + Sync + 'static {
    async fn flush_pending(&self);
}
