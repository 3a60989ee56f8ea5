//! The cooperative dispatch loop
//!
//! Each iteration snapshots the clock, moves every due event from the
//! pending list into the batch, then runs the batch one callback at a
//! time with no critical section held. Events posted while the batch runs
//! are only considered by the next iteration, so a callback re-posting
//! itself with no delay cannot starve the loop. When nothing is due the
//! dispatcher arms the clock alarm at the earlier of the next deadline and
//! the end of the pass, and sleeps in [`ClockSource::wait`].

use evq_core::{ClockSource, Duration, EventId, Tick, Timeout};
use evq_mem::Callback;
use log::{trace, warn};

use crate::config::Overrun;
use crate::lifecycle::{EventQueue, QueueState};
use crate::queue::EventState;
use crate::trace as evtrace;

/// What happened to an event after its callback returned
pub(crate) enum Finished<const W: usize> {
    /// Periodic event linked again at the new deadline
    Rearmed(Tick),
    /// Slot freed; the callback is dropped outside the critical section
    Released(Callback<W>),
}

impl<const N: usize, const W: usize> QueueState<N, W> {
    /// Move every event due at `now` into the batch
    fn gather_due(&mut self, now: Tick) -> usize {
        let mut moved = 0;
        while let Some(index) = self.pending.pop_if_due(&mut self.pool, now) {
            if let Some(record) = self.pool.get_index_mut(index) {
                record.state = EventState::Batched;
            }
            self.batch.push_back(&mut self.pool, index);
            moved += 1;
        }
        moved
    }

    /// Take the next batched callback out of its slot
    fn take_batched(&mut self) -> Option<(EventId, u16, Tick, Callback<W>)> {
        let index = self.batch.pop_front(&mut self.pool)?;
        let id = self.pool.handle_at(index)?.id();
        let record = self.pool.get_index_mut(index)?;
        record.state = EventState::Running { cancelled: false };
        Some((id, index, record.deadline, record.callback.take()))
    }

    /// Re-arm or free the event whose callback just returned
    fn finish(&mut self, index: u16, callback: Callback<W>, now: Tick, overrun: Overrun) -> Finished<W> {
        let Some(record) = self.pool.get_index_mut(index) else {
            return Finished::Released(callback);
        };

        match (record.period, record.state) {
            (Some(period), EventState::Running { cancelled: false }) => {
                record.deadline = next_deadline(record.deadline, period, now, overrun);
                record.callback = callback;
                record.state = EventState::Queued;
                let deadline = record.deadline;
                self.pending.insert(&mut self.pool, index);
                Finished::Rearmed(deadline)
            }
            _ => {
                self.pool.free(index);
                Finished::Released(callback)
            }
        }
    }

    /// Free the slot of an event whose callback unwound
    fn abandon(&mut self, index: u16) -> bool {
        self.pool.free(index).is_some()
    }

    fn take_break(&mut self) -> bool {
        core::mem::take(&mut self.break_requested)
    }
}

/// Next deadline of a periodic event that was due at `deadline`
pub fn next_deadline(deadline: Tick, period: Duration, now: Tick, overrun: Overrun) -> Tick {
    let next = deadline.add(period);
    match overrun {
        Overrun::CatchUp => next,
        Overrun::Coalesce if next.is_after(now) => next,
        Overrun::Coalesce => {
            // First period boundary strictly after `now`
            let behind = now.diff(deadline) as u32;
            let skip = behind - behind % period.ticks() + period.ticks();
            deadline.add(Duration::from_ticks(skip))
        }
    }
}

/// Idle hook that halts the core until the next interrupt
///
/// On targets without a wait-for-interrupt instruction it only hints the
/// processor that it is spinning.
pub fn wait_for_interrupt() {
    #[cfg(target_arch = "arm")]
    cortex_m::asm::wfi();
    #[cfg(not(target_arch = "arm"))]
    core::hint::spin_loop();
}

/// Releases the slot of the running event if its callback unwinds
struct Firing<'a, C: ClockSource, const N: usize, const W: usize> {
    queue: &'a EventQueue<C, N, W>,
    index: u16,
}

impl<C: ClockSource, const N: usize, const W: usize> Firing<'_, C, N, W> {
    /// The callback returned; the slot is settled by `finish`
    fn returned(self) {
        core::mem::forget(self);
    }
}

impl<C: ClockSource, const N: usize, const W: usize> Drop for Firing<'_, C, N, W> {
    fn drop(&mut self) {
        let freed = critical_section::with(|cs| self.queue.state.borrow_ref_mut(cs).abandon(self.index));
        if freed {
            warn!("{}: callback panicked, slot {} released", self.queue.config.name, self.index);
        }
    }
}

/// Marks the queue as dispatching for the lifetime of one pass
struct DispatchGuard<'a, C: ClockSource, const N: usize, const W: usize> {
    queue: &'a EventQueue<C, N, W>,
}

impl<'a, C: ClockSource, const N: usize, const W: usize> DispatchGuard<'a, C, N, W> {
    fn enter(queue: &'a EventQueue<C, N, W>) -> Option<Self> {
        let entered = critical_section::with(|cs| {
            let mut state = queue.state.borrow_ref_mut(cs);
            !core::mem::replace(&mut state.dispatching, true)
        });
        entered.then_some(Self { queue })
    }
}

impl<C: ClockSource, const N: usize, const W: usize> Drop for DispatchGuard<'_, C, N, W> {
    fn drop(&mut self) {
        critical_section::with(|cs| {
            self.queue.state.borrow_ref_mut(cs).dispatching = false;
        });
        self.queue.clock.disarm();
    }
}

impl<C: ClockSource, const N: usize, const W: usize> EventQueue<C, N, W> {
    /// Run due callbacks until `timeout` ticks have passed
    ///
    /// [`Timeout::IMMEDIATE`] runs what is due now and returns.
    /// [`Timeout::Forever`] only returns after
    /// [`break_dispatch`](Self::break_dispatch). Returns the number of
    /// callbacks run. A call from inside a callback returns 0 at once.
    ///
    /// Panics raised by callbacks propagate to the caller. The event whose
    /// callback panicked is released, periodic or not, and the queue stays
    /// usable.
    pub fn dispatch(&self, timeout: impl Into<Timeout>) -> usize {
        let timeout = timeout.into();
        let Some(_guard) = DispatchGuard::enter(self) else {
            warn!("{}: nested dispatch ignored", self.config.name);
            return 0;
        };

        let start = self.clock.now();
        let end = match timeout {
            Timeout::Ticks(ticks) => Some(start.add(Duration::from_ticks(ticks).clamped())),
            Timeout::Forever => None,
        };
        evtrace::dispatch_begin(start, timeout);

        let mut fired = 0;
        loop {
            let now = self.clock.now();
            let broken = critical_section::with(|cs| {
                let mut state = self.state.borrow_ref_mut(cs);
                if state.take_break() {
                    return true;
                }
                state.gather_due(now);
                false
            });
            if broken {
                break;
            }

            fired += self.run_batch(now);

            let now = self.clock.now();
            let (broken, next) = critical_section::with(|cs| {
                let mut state = self.state.borrow_ref_mut(cs);
                let broken = state.take_break();
                (broken, state.pending.peek_earliest(&state.pool))
            });
            if broken || end.is_some_and(|end| end.is_due(now)) {
                break;
            }
            if next.is_some_and(|next| next.is_due(now)) {
                continue;
            }

            let wake_at = match (next, end) {
                (Some(next), Some(end)) if next.is_after(end) => Some(end),
                (Some(next), _) => Some(next),
                (None, end) => end,
            };
            match wake_at {
                Some(tick) => self.clock.arm(tick),
                None => self.clock.disarm(),
            }
            if let Some(idle) = self.config.idle_callback {
                idle();
            }
            self.clock.wait();
        }

        evtrace::dispatch_end(self.clock.now(), fired);
        fired
    }

    fn run_batch(&self, gathered_at: Tick) -> usize {
        let mut fired = 0;
        while let Some((id, index, deadline, mut callback)) =
            critical_section::with(|cs| self.state.borrow_ref_mut(cs).take_batched())
        {
            trace!("{}: fire {} due {} at {}", self.config.name, id, deadline, gathered_at);
            evtrace::fire(gathered_at, id, deadline);
            let firing = Firing { queue: self, index };
            callback.call();
            firing.returned();
            fired += 1;

            let now = self.clock.now();
            let finished = critical_section::with(|cs| {
                self.state
                    .borrow_ref_mut(cs)
                    .finish(index, callback, now, self.config.overrun)
            });
            match finished {
                Finished::Rearmed(next) => evtrace::rearm(now, id, next),
                Finished::Released(callback) => drop(callback),
            }
        }
        fired
    }

    /// Run what is due now and return
    pub fn dispatch_once(&self) -> usize {
        self.dispatch(Timeout::IMMEDIATE)
    }

    /// Dispatch until [`break_dispatch`](Self::break_dispatch) is called
    pub fn dispatch_forever(&self) -> usize {
        self.dispatch(Timeout::Forever)
    }

    /// Repeat [`dispatch_once`](Self::dispatch_once) until a pass runs
    /// nothing or `max_passes` passes were made, then call the idle hook
    pub fn run_until_idle(&self, max_passes: usize) -> usize {
        let mut fired = 0;
        for _ in 0..max_passes {
            match self.dispatch_once() {
                0 => break,
                n => fired += n,
            }
        }
        if let Some(idle) = self.config.idle_callback {
            idle();
        }
        fired
    }

    /// Make the running, or the next, dispatch pass return
    ///
    /// Safe to call from callbacks, other threads and interrupt handlers.
    /// The request is consumed by the pass that honours it; pending events
    /// are left untouched.
    pub fn break_dispatch(&self) {
        critical_section::with(|cs| {
            self.state.borrow_ref_mut(cs).break_requested = true;
        });
        evtrace::brk(self.clock.now());
        self.clock.wake();
    }
}
