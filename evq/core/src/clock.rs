//! Clock source abstraction
//!
//! The dispatcher never reads hardware directly. It asks a [`ClockSource`]
//! for the current tick, arms its single one-shot alarm at the next
//! deadline, and sleeps in [`ClockSource::wait`] until the alarm fires or
//! another context calls [`ClockSource::wake`].

use core::cell::Cell;
use core::convert::Infallible;

use critical_section::Mutex;

use crate::time::{Duration, Tick};

/// Monotonic tick counter with a single one-shot alarm
///
/// `wake` and `arm` may be called from interrupt context. A wake-up is
/// sticky: if it happens before the dispatcher reaches `wait`, the next
/// `wait` returns immediately.
pub trait ClockSource {
    /// Current tick
    fn now(&self) -> Tick;

    /// Arm the alarm at `deadline`, replacing any earlier request
    fn arm(&self, deadline: Tick);

    /// Cancel the pending alarm, if any
    fn disarm(&self);

    /// Wake a context suspended in [`wait`](Self::wait)
    fn wake(&self);

    /// Consume a pending wake-up or an expired alarm
    fn poll_wake(&self) -> nb::Result<(), Infallible>;

    /// Suspend until the alarm fires or [`wake`](Self::wake) is called
    ///
    /// Spurious returns are allowed. The default spins on
    /// [`poll_wake`](Self::poll_wake); hosted clocks block instead.
    fn wait(&self) {
        match nb::block!(self.poll_wake()) {
            Ok(()) => {}
            Err(never) => match never {},
        }
    }
}

impl<C: ClockSource + ?Sized> ClockSource for &C {
    fn now(&self) -> Tick {
        (**self).now()
    }

    fn arm(&self, deadline: Tick) {
        (**self).arm(deadline)
    }

    fn disarm(&self) {
        (**self).disarm()
    }

    fn wake(&self) {
        (**self).wake()
    }

    fn poll_wake(&self) -> nb::Result<(), Infallible> {
        (**self).poll_wake()
    }

    fn wait(&self) {
        (**self).wait()
    }
}

#[derive(Debug, Clone, Copy)]
struct ManualState {
    now: Tick,
    alarm: Option<Tick>,
    pending: bool,
}

/// Virtual clock driven by the caller
///
/// Time only moves through [`advance`](Self::advance), [`set`](Self::set)
/// or by waiting: `poll_wake` jumps straight to the armed alarm. This makes
/// dispatch runs deterministic on a host and in simulation.
pub struct ManualClock {
    state: Mutex<Cell<ManualState>>,
}

impl ManualClock {
    /// Create a clock standing at tick 0
    pub const fn new() -> Self {
        Self::starting_at(Tick::ZERO)
    }

    /// Create a clock standing at `start`
    pub const fn starting_at(start: Tick) -> Self {
        Self {
            state: Mutex::new(Cell::new(ManualState {
                now: start,
                alarm: None,
                pending: false,
            })),
        }
    }

    /// Move time forward
    pub fn advance(&self, by: Duration) {
        self.update(|state| state.now = state.now.add(by));
    }

    /// Jump to an absolute tick
    pub fn set(&self, now: Tick) {
        self.update(|state| state.now = now);
    }

    /// Deadline of the armed alarm
    pub fn alarm(&self) -> Option<Tick> {
        critical_section::with(|cs| self.state.borrow(cs).get().alarm)
    }

    fn update<R>(&self, f: impl FnOnce(&mut ManualState) -> R) -> R {
        critical_section::with(|cs| {
            let cell = self.state.borrow(cs);
            let mut state = cell.get();
            let result = f(&mut state);
            cell.set(state);
            result
        })
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for ManualClock {
    fn now(&self) -> Tick {
        critical_section::with(|cs| self.state.borrow(cs).get().now)
    }

    fn arm(&self, deadline: Tick) {
        self.update(|state| state.alarm = Some(deadline));
    }

    fn disarm(&self) {
        self.update(|state| state.alarm = None);
    }

    fn wake(&self) {
        self.update(|state| state.pending = true);
    }

    fn poll_wake(&self) -> nb::Result<(), Infallible> {
        self.update(|state| {
            if state.pending {
                state.pending = false;
                return Ok(());
            }
            match state.alarm.take() {
                Some(deadline) => {
                    if deadline.is_after(state.now) {
                        state.now = deadline;
                    }
                    Ok(())
                }
                None => Err(nb::Error::WouldBlock),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_jumps_to_alarm() {
        let clock = ManualClock::new();
        clock.arm(Tick::new(40));
        clock.wait();
        assert_eq!(clock.now(), Tick::new(40));
        assert_eq!(clock.alarm(), None);
    }

    #[test]
    fn test_wake_is_sticky() {
        let clock = ManualClock::new();
        clock.arm(Tick::new(40));
        clock.wake();

        // The pending wake-up is consumed without moving time
        assert_eq!(clock.poll_wake(), Ok(()));
        assert_eq!(clock.now(), Tick::ZERO);

        // The alarm is still armed
        assert_eq!(clock.poll_wake(), Ok(()));
        assert_eq!(clock.now(), Tick::new(40));
    }

    #[test]
    fn test_stale_alarm_does_not_rewind() {
        let clock = ManualClock::starting_at(Tick::new(100));
        clock.arm(Tick::new(90));
        clock.wait();
        assert_eq!(clock.now(), Tick::new(100));
    }

    #[test]
    fn test_idle_clock_would_block() {
        let clock = ManualClock::new();
        assert_eq!(clock.poll_wake(), Err(nb::Error::WouldBlock));
        clock.advance(Duration::from_ticks(7));
        assert_eq!(clock.now(), Tick::new(7));
    }
}
