//! Drops responses that arrive after their view moved on.
//!
//! Each load takes a [`LoadTicket`]. Starting a newer load or leaving the view makes every earlier
//! ticket stale, and a stale ticket refuses its result. The request itself keeps running.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct ViewGuard {
    generation: Arc<AtomicU64>,
}

impl ViewGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> LoadTicket {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        LoadTicket {
            generation,
            current: Arc::clone(&self.generation),
        }
    }

    /// Invalidates every outstanding ticket.
    pub fn leave(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
pub struct LoadTicket {
    generation: u64,
    current: Arc<AtomicU64>,
}

impl LoadTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }

    pub fn accept<T>(&self, result: T) -> Option<T> {
        if self.is_current() {
            Some(result)
        } else {
            tracing::debug!(generation = self.generation, "discarding stale response");
            None
        }
    }
}
