//! Hosted port of the evq event queue.
//!
//! Provides a wall-clock [`StdClock`], a [`PosixRuntime`] that shares a
//! queue between the dispatching thread and the rest of the process, and,
//! behind the `trace` feature, helpers that ship the binary trace stream
//! over UDP.
//!
//! Critical sections come from the `critical-section` crate's `std`
//! implementation, re-exported here so applications link exactly one.

use std::sync::Arc;

use evq_queue::{ClockSource, EventQueue, QueueConfig, DEFAULT_CALLBACK_WORDS};
use log::info;

pub mod clock;
pub mod trace;

pub use clock::{StdClock, TickRate};
pub use critical_section;

/// Event queue driven by wall-clock time
pub type HostQueue<const N: usize, const W: usize = DEFAULT_CALLBACK_WORDS> = EventQueue<StdClock, N, W>;

/// Shared queue plus the process glue around its dispatcher
pub struct PosixRuntime<const N: usize, const W: usize = DEFAULT_CALLBACK_WORDS> {
    queue: Arc<HostQueue<N, W>>,
}

impl<const N: usize, const W: usize> PosixRuntime<N, W> {
    /// Create a runtime with a fresh clock ticking at `rate`
    pub fn new(rate: TickRate, config: QueueConfig) -> Self {
        Self {
            queue: Arc::new(EventQueue::new(StdClock::new(rate), config)),
        }
    }

    /// Handle for posting from other threads
    pub fn queue(&self) -> Arc<HostQueue<N, W>> {
        Arc::clone(&self.queue)
    }

    /// Tick frequency of the queue clock
    pub fn rate(&self) -> TickRate {
        self.queue.clock().rate()
    }

    /// Make Ctrl-C end a running [`run`](Self::run)
    ///
    /// Only one handler can be installed per process.
    pub fn break_on_ctrlc(&self) -> Result<(), ctrlc::Error> {
        let queue = Arc::clone(&self.queue);
        ctrlc::set_handler(move || {
            info!("{}: interrupt, stopping dispatch", queue.config().name);
            queue.break_dispatch();
        })
    }

    /// Dispatch until [`EventQueue::break_dispatch`] is called
    pub fn run(&self) -> usize {
        info!(
            "{}: dispatching at {} Hz from tick {}",
            self.queue.config().name,
            self.rate().hz(),
            self.queue.clock().now()
        );
        let fired = self.queue.dispatch_forever();
        info!("{}: dispatch ended after {} callbacks", self.queue.config().name, fired);
        fired
    }
}

impl<const N: usize, const W: usize> Default for PosixRuntime<N, W> {
    fn default() -> Self {
        Self::new(TickRate::DEFAULT, QueueConfig::DEFAULT)
    }
}
