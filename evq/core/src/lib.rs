#![no_std]
#![forbid(unsafe_code)]

//! # evq Core
//!
//! Core types and traits shared by every layer of the evq event queue:
//! wrap-aware tick arithmetic, event handles, the error type and the
//! clock-source abstraction the dispatcher sleeps on.

use core::fmt;

pub mod clock;
pub mod id;
pub mod time;

pub use clock::*;
pub use id::*;
pub use time::*;

/// evq version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result type used throughout evq
pub type EvqResult<T> = Result<T, EvqError>;

/// Error types for event queue operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvqError {
    /// Every event slot is in use
    OutOfMemory,
    /// The callable is null
    InvalidCallback,
    /// The closure does not fit the inline callback storage
    CallbackTooLarge,
    /// Periodic events need a non-zero period
    InvalidPeriod,
}

impl EvqError {
    /// Raw id reported in place of a real handle when a post fails
    pub const fn sentinel(self) -> EventId {
        EventId::NONE
    }

    /// Stable numeric code used in trace records
    pub const fn code(self) -> u8 {
        match self {
            EvqError::OutOfMemory => 1,
            EvqError::InvalidCallback => 2,
            EvqError::CallbackTooLarge => 3,
            EvqError::InvalidPeriod => 4,
        }
    }
}

impl fmt::Display for EvqError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvqError::OutOfMemory => write!(f, "Event slots exhausted"),
            EvqError::InvalidCallback => write!(f, "Null callback"),
            EvqError::CallbackTooLarge => write!(f, "Callback exceeds inline storage"),
            EvqError::InvalidPeriod => write!(f, "Period must be non-zero"),
        }
    }
}

#[cfg(feature = "std")]
extern crate std;

#[cfg(feature = "std")]
impl std::error::Error for EvqError {}

#[cfg(feature = "defmt")]
impl defmt::Format for EvqError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            EvqError::OutOfMemory => defmt::write!(fmt, "OutOfMemory"),
            EvqError::InvalidCallback => defmt::write!(fmt, "InvalidCallback"),
            EvqError::CallbackTooLarge => defmt::write!(fmt, "CallbackTooLarge"),
            EvqError::InvalidPeriod => defmt::write!(fmt, "InvalidPeriod"),
        }
    }
}
