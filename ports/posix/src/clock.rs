//! Wall-clock tick source for hosted targets
//!
//! Ticks count from the moment the clock was created, derived from the
//! monotonic `Instant` so they never drift against real time. The
//! dispatcher blocks on a `Condvar` until the armed alarm is reached or
//! another thread calls `wake`.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use evq_core::{ClockSource, Tick};

/// Nanoseconds per second
const NSEC_PER_SEC: u128 = 1_000_000_000;

/// Tick frequency of a [`StdClock`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickRate {
    hz: u32,
}

impl TickRate {
    /// One tick per millisecond
    pub const DEFAULT: Self = Self { hz: 1_000 };

    /// Rate of `hz` ticks per second; zero is raised to 1 Hz
    pub const fn from_hz(hz: u32) -> Self {
        Self {
            hz: if hz == 0 { 1 } else { hz },
        }
    }

    /// Ticks per second
    pub const fn hz(&self) -> u32 {
        self.hz
    }

    /// Wall-clock length of one tick
    pub fn period(&self) -> Duration {
        self.duration_of(1)
    }

    /// Wall-clock length of `ticks` ticks, rounded up to whole nanoseconds
    pub fn duration_of(&self, ticks: u64) -> Duration {
        let nanos = (ticks as u128 * NSEC_PER_SEC).div_ceil(self.hz as u128);
        Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
    }

    /// Whole ticks contained in `elapsed`
    pub fn ticks_in(&self, elapsed: Duration) -> u64 {
        (elapsed.as_nanos() * self.hz as u128 / NSEC_PER_SEC) as u64
    }

    /// Ticks in `millis` milliseconds, rounded down
    pub fn millis(&self, millis: u32) -> evq_core::Duration {
        let ticks = millis as u64 * self.hz as u64 / 1_000;
        evq_core::Duration::from_ticks(ticks.min(u32::MAX as u64) as u32)
    }
}

impl Default for TickRate {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Default)]
struct AlarmState {
    alarm: Option<Tick>,
    pending: bool,
}

/// Monotonic clock with a blocking wait
pub struct StdClock {
    origin: Instant,
    rate: TickRate,
    state: Mutex<AlarmState>,
    cond: Condvar,
}

impl StdClock {
    /// Create a clock that reads tick 0 now
    pub fn new(rate: TickRate) -> Self {
        Self {
            origin: Instant::now(),
            rate,
            state: Mutex::new(AlarmState::default()),
            cond: Condvar::new(),
        }
    }

    /// Tick frequency
    pub fn rate(&self) -> TickRate {
        self.rate
    }

    fn elapsed_ticks(&self) -> u64 {
        self.rate.ticks_in(self.origin.elapsed())
    }

    fn lock(&self) -> MutexGuard<'_, AlarmState> {
        // A panicking callback must not wedge the clock
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Consume a pending wake-up or an expired alarm
    fn take_ready(&self, state: &mut AlarmState, now: Tick) -> bool {
        if state.pending {
            state.pending = false;
            return true;
        }
        match state.alarm {
            Some(deadline) if deadline.is_due(now) => {
                state.alarm = None;
                true
            }
            _ => false,
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new(TickRate::DEFAULT)
    }
}

impl ClockSource for StdClock {
    fn now(&self) -> Tick {
        Tick::new(self.elapsed_ticks() as u32)
    }

    fn arm(&self, deadline: Tick) {
        self.lock().alarm = Some(deadline);
        self.cond.notify_all();
    }

    fn disarm(&self) {
        self.lock().alarm = None;
    }

    fn wake(&self) {
        self.lock().pending = true;
        self.cond.notify_all();
    }

    fn poll_wake(&self) -> nb::Result<(), core::convert::Infallible> {
        let now = self.now();
        let mut state = self.lock();
        if self.take_ready(&mut state, now) {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    fn wait(&self) {
        let mut state = self.lock();
        loop {
            let elapsed = self.elapsed_ticks();
            let now = Tick::new(elapsed as u32);
            if self.take_ready(&mut state, now) {
                return;
            }

            state = match state.alarm {
                Some(deadline) => {
                    // Sleep until the start of the deadline tick
                    let remaining = deadline.diff(now).max(0) as u64;
                    let target = self.rate.duration_of(elapsed + remaining);
                    let timeout = target.saturating_sub(self.origin.elapsed());
                    self.cond
                        .wait_timeout(state, timeout)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self.cond.wait(state).unwrap_or_else(PoisonError::into_inner),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_tick_rate_period() {
        assert_eq!(TickRate::from_hz(100).period(), Duration::from_millis(10));
        assert_eq!(TickRate::DEFAULT.period(), Duration::from_millis(1));
        assert_eq!(TickRate::from_hz(0).hz(), 1);
    }

    #[test]
    fn test_tick_rate_conversions() {
        let rate = TickRate::from_hz(250);
        assert_eq!(rate.ticks_in(Duration::from_millis(1_000)), 250);
        assert_eq!(rate.ticks_in(Duration::from_millis(3)), 0);
        assert_eq!(rate.millis(100).ticks(), 25);
        assert_eq!(rate.duration_of(3), Duration::from_millis(12));
    }

    #[test]
    fn test_clock_advances() {
        let clock = StdClock::new(TickRate::from_hz(1_000));
        let start = clock.now();
        thread::sleep(Duration::from_millis(20));
        let elapsed = clock.now().diff(start);
        assert!(elapsed >= 15, "expected ~20 ticks, got {}", elapsed);
    }

    #[test]
    fn test_wait_returns_at_alarm() {
        let clock = StdClock::new(TickRate::DEFAULT);
        let deadline = clock.now().add(evq_core::Duration::from_ticks(30));
        clock.arm(deadline);

        let started = Instant::now();
        clock.wait();

        assert!(deadline.is_due(clock.now()));
        assert!(started.elapsed() >= Duration::from_millis(25));
        assert_eq!(clock.poll_wake(), Err(nb::Error::WouldBlock));
    }

    #[test]
    fn test_wake_interrupts_wait() {
        let clock = Arc::new(StdClock::new(TickRate::DEFAULT));
        clock.arm(clock.now().add(evq_core::Duration::from_secs(60)));

        let waker = {
            let clock = Arc::clone(&clock);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                clock.wake();
            })
        };

        let started = Instant::now();
        clock.wait();
        waker.join().unwrap();

        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_wake_is_sticky() {
        let clock = StdClock::default();
        clock.wake();
        assert_eq!(clock.poll_wake(), Ok(()));
        assert_eq!(clock.poll_wake(), Err(nb::Error::WouldBlock));
    }
}
