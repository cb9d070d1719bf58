//! Admission control for WebSocket upgrades.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Fixed pool of connection slots.
///
/// A slot is reserved before the upgrade is accepted and held until the
/// socket task finishes, so concurrent upgrades can never exceed the limit.
#[derive(Debug)]
pub struct ConnectionSlots {
    limit: usize,
    permits: Arc<Semaphore>,
}

impl ConnectionSlots {
    /// Pool of `limit` slots, capped at [`Semaphore::MAX_PERMITS`].
    pub fn new(limit: usize) -> Self {
        let limit = limit.min(Semaphore::MAX_PERMITS);
        Self {
            limit,
            permits: Arc::new(Semaphore::new(limit)),
        }
    }

    /// Reserve a slot without waiting, or `None` when the pool is exhausted.
    pub fn try_acquire(&self) -> Option<SlotGuard> {
        Arc::clone(&self.permits)
            .try_acquire_owned()
            .ok()
            .map(|permit| SlotGuard { _permit: permit })
    }

    /// Slots currently held.
    pub fn in_use(&self) -> usize {
        self.limit - self.permits.available_permits()
    }

    /// Configured maximum.
    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// A reserved slot, released on drop.
#[derive(Debug)]
pub struct SlotGuard {
    _permit: OwnedSemaphorePermit,
}
