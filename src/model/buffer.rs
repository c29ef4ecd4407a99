//! Drain-once event buffer shared by the saver decorators.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Thread-safe append-only buffer whose contents are handed out exactly once.
///
/// Every pushed item appears in exactly one [`drain`](EventBuffer::drain)
/// result, in push order.
#[derive(Debug)]
pub struct EventBuffer<T> {
    items: Mutex<Vec<T>>,
}

impl<T> EventBuffer<T> {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }

    /// Appends an item.
    pub fn push(&self, item: T) {
        self.lock().push(item);
    }

    /// Returns everything pushed since the last drain and empties the buffer.
    pub fn drain(&self) -> Vec<T> {
        std::mem::take(&mut *self.lock())
    }

    /// Number of items waiting to be drained.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the buffer holds no items.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock cannot leave the Vec half-written.
    fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for EventBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}
