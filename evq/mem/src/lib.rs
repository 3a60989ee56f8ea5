#![no_std]
#![allow(unsafe_code)] // Inline callbacks erase closure types behind raw storage

//! # evq Memory Management
//!
//! Static slot pools and inline callback storage for the evq event queue.
//! Nothing here allocates from a heap: the worst-case footprint of a queue
//! is fixed at compile time by its slot count and callback size.

pub mod callback;
pub mod pool;

pub use callback::*;
pub use pool::*;

/// Slot pool statistics for debugging and monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Total number of slots in the pool
    pub total_slots: usize,
    /// Number of free slots currently available
    pub free_slots: usize,
    /// Number of slots currently in use
    pub used_slots: usize,
    /// Minimum number of free slots ever reached
    pub min_free_slots: usize,
}

impl PoolStats {
    /// Create new pool statistics
    pub const fn new(total_slots: usize) -> Self {
        Self {
            total_slots,
            free_slots: total_slots,
            used_slots: 0,
            min_free_slots: total_slots,
        }
    }

    /// Update statistics after allocation
    pub fn on_alloc(&mut self) {
        self.used_slots += 1;
        self.free_slots -= 1;
        if self.free_slots < self.min_free_slots {
            self.min_free_slots = self.free_slots;
        }
    }

    /// Update statistics after a slot is returned
    pub fn on_free(&mut self) {
        if self.used_slots > 0 {
            self.used_slots -= 1;
            self.free_slots += 1;
        }
    }

    /// Check if every slot is in use
    pub const fn is_exhausted(&self) -> bool {
        self.free_slots == 0
    }

    /// Check if no slot is in use
    pub const fn is_empty(&self) -> bool {
        self.used_slots == 0
    }

    /// Get utilization as a percentage (0-100)
    pub fn utilization(&self) -> u8 {
        if self.total_slots == 0 {
            0
        } else {
            ((self.used_slots * 100) / self.total_slots) as u8
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for PoolStats {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "PoolStats{{ total: {}, free: {}, used: {}, min_free: {} }}",
            self.total_slots,
            self.free_slots,
            self.used_slots,
            self.min_free_slots
        );
    }
}
