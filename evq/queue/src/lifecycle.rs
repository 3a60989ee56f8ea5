//! Event queue construction, posting and cancellation

use core::cell::RefCell;

use critical_section::Mutex;
use evq_core::{ClockSource, Duration, EventId, EvqError, EvqResult, Tick};
use evq_mem::{Callback, PoolStats, SlotPool, DEFAULT_CALLBACK_WORDS};
use log::{debug, trace};

use crate::config::QueueConfig;
use crate::queue::{DeadlineList, EventRecord};
use crate::registry::Cancellation;
use crate::trace as evtrace;

/// Shared state, only touched inside a critical section
pub(crate) struct QueueState<const N: usize, const W: usize> {
    pub(crate) pool: SlotPool<EventRecord<W>, N>,
    pub(crate) pending: DeadlineList,
    pub(crate) batch: DeadlineList,
    pub(crate) break_requested: bool,
    pub(crate) dispatching: bool,
}

impl<const N: usize, const W: usize> QueueState<N, W> {
    const fn new() -> Self {
        Self {
            pool: SlotPool::new(),
            pending: DeadlineList::new(),
            batch: DeadlineList::new(),
            break_requested: false,
            dispatching: false,
        }
    }

    /// Store and link a record; hands it back when every slot is taken
    ///
    /// On success also reports whether a sleeping dispatcher must be woken.
    fn schedule(&mut self, record: EventRecord<W>) -> Result<(EventId, bool), EventRecord<W>> {
        let handle = self.pool.allocate(record)?;
        let new_head = self.pending.insert(&mut self.pool, handle.index());
        Ok((handle.id(), new_head && self.dispatching))
    }
}

/// Cooperative deferred-call and timer queue
///
/// Holds up to `N` live events whose callbacks fit `W` machine words.
/// Posting and cancelling take `&self` and may run in any context,
/// including interrupt handlers; they never block. Callbacks run on the
/// context that calls [`dispatch`](Self::dispatch).
///
/// ```rust,no_run
/// use evq_core::{ManualClock, Timeout};
/// use evq_queue::{EventQueue, QueueConfig};
///
/// static QUEUE: EventQueue<ManualClock, 16> =
///     EventQueue::new(ManualClock::new(), QueueConfig::DEFAULT);
///
/// QUEUE.post_in(10, || {}).unwrap();
/// QUEUE.dispatch(Timeout::Ticks(20));
/// ```
pub struct EventQueue<C, const N: usize, const W: usize = DEFAULT_CALLBACK_WORDS> {
    pub(crate) clock: C,
    pub(crate) config: QueueConfig,
    pub(crate) state: Mutex<RefCell<QueueState<N, W>>>,
}

impl<C: ClockSource, const N: usize, const W: usize> EventQueue<C, N, W> {
    /// Bytes taken by a queue of this shape, callbacks included
    pub const FOOTPRINT: usize = core::mem::size_of::<Self>();

    /// Create an empty queue driven by `clock`
    pub const fn new(clock: C, config: QueueConfig) -> Self {
        Self {
            clock,
            config,
            state: Mutex::new(RefCell::new(QueueState::new())),
        }
    }

    /// Run `f` on the next dispatch pass
    pub fn post<F>(&self, f: F) -> EvqResult<EventId>
    where
        F: FnMut() + Send + 'static,
    {
        self.post_in(Duration::ZERO, f)
    }

    /// Run `f` once, `delay` ticks from now
    pub fn post_in<F>(&self, delay: impl Into<Duration>, f: F) -> EvqResult<EventId>
    where
        F: FnMut() + Send + 'static,
    {
        let callback = Callback::new(f).map_err(|err| self.reject(err))?;
        self.post_callback(delay, None, callback)
    }

    /// Run `f` every `period` ticks, first after one period
    pub fn post_every<F>(&self, period: impl Into<Duration>, f: F) -> EvqResult<EventId>
    where
        F: FnMut() + Send + 'static,
    {
        let period = period.into();
        if period.is_zero() {
            return Err(self.reject(EvqError::InvalidPeriod));
        }
        let callback = Callback::new(f).map_err(|err| self.reject(err))?;
        self.post_callback(period, Some(period), callback)
    }

    /// Schedule a prepared callback
    ///
    /// Delays and periods longer than [`Duration::MAX`] are clamped. The
    /// null callable and zero periods are rejected without side effects.
    pub fn post_callback(
        &self,
        delay: impl Into<Duration>,
        period: Option<Duration>,
        callback: Callback<W>,
    ) -> EvqResult<EventId> {
        if callback.is_null() {
            return Err(self.reject(EvqError::InvalidCallback));
        }
        if period.is_some_and(|period| period.is_zero()) {
            return Err(self.reject(EvqError::InvalidPeriod));
        }

        let now = self.clock.now();
        let deadline = now.add(delay.into().clamped());
        let period = period.map(Duration::clamped);
        let record = EventRecord::new(callback, deadline, period);

        let scheduled =
            critical_section::with(|cs| self.state.borrow_ref_mut(cs).schedule(record));

        match scheduled {
            Ok((id, wake)) => {
                if wake {
                    self.clock.wake();
                }
                trace!("{}: post {} due {}", self.config.name, id, deadline);
                evtrace::post(now, id, deadline, period);
                Ok(id)
            }
            // The rejected record, and its callback, is dropped here
            Err(_) => Err(self.reject(EvqError::OutOfMemory)),
        }
    }

    fn reject(&self, err: EvqError) -> EvqError {
        debug!("{}: post rejected: {}", self.config.name, err);
        evtrace::post_attempt(self.clock.now(), err);
        err
    }

    /// Cancel a pending event
    ///
    /// Returns `true` if this call stopped the event from firing again. An
    /// event whose callback is executing keeps running; a periodic one is
    /// then not re-armed. Unknown, stale and already cancelled ids are
    /// ignored and return `false`.
    pub fn cancel(&self, id: EventId) -> bool {
        let outcome = critical_section::with(|cs| self.state.borrow_ref_mut(cs).cancel(id));

        match outcome {
            Cancellation::Removed(record) => {
                drop(record);
                trace!("{}: cancel {}", self.config.name, id);
                evtrace::cancel(self.clock.now(), id);
                true
            }
            Cancellation::Stopped => {
                trace!("{}: cancel {} while running", self.config.name, id);
                evtrace::cancel(self.clock.now(), id);
                true
            }
            Cancellation::Unchanged => {
                debug!("{}: cancel of unknown {}", self.config.name, id);
                evtrace::cancel_attempt(self.clock.now(), id);
                false
            }
        }
    }

    /// Ticks until `id` fires
    ///
    /// `Some(Duration::ZERO)` when the event is due or executing, `None`
    /// when the id does not refer to a live event.
    pub fn time_left(&self, id: EventId) -> Option<Duration> {
        let now = self.clock.now();
        critical_section::with(|cs| self.state.borrow_ref(cs).time_left(id, now))
    }

    /// Current tick of the queue clock
    pub fn now(&self) -> Tick {
        self.clock.now()
    }

    /// Number of live events, including one that is executing
    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.state.borrow_ref(cs).pool.len())
    }

    /// Check if no event is live
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the maximum number of live events
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Slot usage statistics
    pub fn stats(&self) -> PoolStats {
        critical_section::with(|cs| self.state.borrow_ref(cs).pool.stats())
    }

    /// Clock driving this queue
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Returns the queue configuration.
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }
}
