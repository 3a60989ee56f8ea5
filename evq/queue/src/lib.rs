#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

//! # evq Queue
//!
//! A single-threaded cooperative queue of deferred calls and timers.
//!
//! Callers post one-shot or periodic callbacks with a delay in clock
//! ticks. Events wait in a deadline-ordered list backed by a static slot
//! pool; one context runs [`EventQueue::dispatch`], which sleeps on the
//! [`ClockSource`] until the earliest deadline, runs due callbacks and
//! re-arms periodic ones. Posting and cancellation are safe from any
//! context, interrupts included, and never block.
//!
//! Ids carry a slot generation, so cancelling an event that already fired
//! is a harmless no-op even after its slot was reused.

pub mod config;
pub mod dispatch;
pub mod lifecycle;
pub mod queue;
pub mod registry;
mod trace;

pub use config::*;
pub use dispatch::{next_deadline, wait_for_interrupt};
pub use evq_core::*;
pub use evq_mem::{Callback, PoolStats, DEFAULT_CALLBACK_WORDS};
pub use lifecycle::EventQueue;
pub use queue::{DeadlineList, EventRecord, EventState, Link, Linked};
pub use registry::resolve;

#[cfg(test)]
mod tests;
