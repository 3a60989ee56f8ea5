//! Opaque event handles

use core::fmt;

/// Handle returned to callers for a posted event
///
/// The raw value packs the slot generation in the upper 16 bits and the
/// slot index in the lower 16 bits. Generations start at 1, so a handle
/// that refers to a live event is never 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EventId(u32);

impl EventId {
    /// Invalid handle, reported when a post fails
    pub const NONE: Self = Self(0);

    const INDEX_BITS: u32 = 16;
    const INDEX_MASK: u32 = (1 << Self::INDEX_BITS) - 1;

    /// Pack a slot index and its generation
    pub const fn from_parts(index: u16, generation: u16) -> Self {
        Self(((generation as u32) << Self::INDEX_BITS) | index as u32)
    }

    /// Rebuild a handle from its raw value
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw handle value
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Slot index the handle was issued for
    pub const fn index(self) -> u16 {
        (self.0 & Self::INDEX_MASK) as u16
    }

    /// Slot generation the handle was issued for
    pub const fn generation(self) -> u16 {
        (self.0 >> Self::INDEX_BITS) as u16
    }

    /// Check if this is not the invalid handle
    pub const fn is_valid(self) -> bool {
        self.generation() != 0
    }
}

impl From<EventId> for u32 {
    fn from(id: EventId) -> Self {
        id.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({}:{})", self.index(), self.generation())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for EventId {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "EventId({}:{})", self.index(), self.generation());
    }
}
