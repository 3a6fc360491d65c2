//! Bounded admission for concurrent downloads.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::utils::{Error, Result};

/// Admits at most `capacity` holders at once.
///
/// Waiters are admitted in the order they called [`acquire`](Self::acquire),
/// which is what `tokio::sync::Semaphore` guarantees for single-permit
/// acquisitions.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    slots: Arc<Semaphore>,
    capacity: usize,
}

/// A held slot. Dropping it (or calling [`release`](Self::release)) frees the slot.
#[derive(Debug)]
pub struct SlotPermit {
    _permit: OwnedSemaphorePermit,
}

impl SlotPermit {
    pub fn release(self) {}
}

impl ConcurrencyLimiter {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Waits until a slot is free and takes it.
    pub async fn acquire(&self) -> Result<SlotPermit> {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|e| Error::Limiter(e.to_string()))?;
        Ok(SlotPermit { _permit: permit })
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots not currently held.
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }
}
