//! Time management types and utilities

use core::fmt;

/// Largest distance two live ticks may be apart and still compare correctly
pub const MAX_DELAY_TICKS: u32 = i32::MAX as u32;

/// Absolute tick value read from a [`ClockSource`](crate::ClockSource)
///
/// Ticks wrap at `u32::MAX`. Ordering between two ticks is only meaningful
/// while they are less than [`MAX_DELAY_TICKS`] apart, so `Tick` does not
/// implement `Ord`; use [`Tick::is_after`] and [`Tick::diff`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Tick(u32);

impl Tick {
    /// Zero tick
    pub const ZERO: Self = Self(0);

    /// Create a tick from a raw counter value
    pub const fn new(ticks: u32) -> Self {
        Self(ticks)
    }

    /// Get the raw tick value
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Signed distance from `earlier` to `self`, wrap-aware
    pub const fn diff(self, earlier: Tick) -> i32 {
        self.0.wrapping_sub(earlier.0) as i32
    }

    /// Check if this tick is strictly after another tick (handles wraparound)
    pub const fn is_after(self, other: Tick) -> bool {
        self.diff(other) > 0
    }

    /// Check if this tick has been reached at `now`
    pub const fn is_due(self, now: Tick) -> bool {
        now.diff(self) >= 0
    }

    /// Tick `duration` after this one
    pub const fn add(self, duration: Duration) -> Self {
        Self(self.0.wrapping_add(duration.ticks))
    }

    /// Time remaining until this tick, clamped at zero once it has passed
    pub const fn saturating_until(self, now: Tick) -> Duration {
        let left = self.diff(now);
        if left > 0 {
            Duration::from_ticks(left as u32)
        } else {
            Duration::ZERO
        }
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tick:{}", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Tick {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "tick:{}", self.0);
    }
}

/// Relative span of clock ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Duration {
    ticks: u32,
}

impl Duration {
    /// Zero duration
    pub const ZERO: Self = Self { ticks: 0 };

    /// Longest delay the queue can order correctly
    pub const MAX: Self = Self {
        ticks: MAX_DELAY_TICKS,
    };

    /// Create duration from ticks
    pub const fn from_ticks(ticks: u32) -> Self {
        Self { ticks }
    }

    /// Create duration from milliseconds at a 1 kHz tick rate
    ///
    /// On clocks running at another rate, convert with the port's tick
    /// rate instead (`TickRate::millis` on the hosted port).
    pub const fn from_millis(millis: u32) -> Self {
        Self { ticks: millis }
    }

    /// Create duration from seconds at a 1 kHz tick rate, saturating
    pub const fn from_secs(secs: u32) -> Self {
        Self {
            ticks: secs.saturating_mul(1000),
        }
    }

    /// Get tick count
    pub const fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Check if duration is zero
    pub const fn is_zero(&self) -> bool {
        self.ticks == 0
    }

    /// Clamp to [`Duration::MAX`] so the resulting deadline stays comparable
    pub const fn clamped(self) -> Self {
        if self.ticks > MAX_DELAY_TICKS {
            Self::MAX
        } else {
            self
        }
    }
}

impl From<u32> for Duration {
    fn from(ticks: u32) -> Self {
        Self::from_ticks(ticks)
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ticks", self.ticks)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Duration {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}ticks", self.ticks);
    }
}

/// How long a dispatch pass may run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Return once this many ticks have elapsed (0 = process what is due)
    Ticks(u32),
    /// Never return until the dispatch loop is broken
    Forever,
}

impl Timeout {
    /// Process everything currently due, then return
    pub const IMMEDIATE: Self = Self::Ticks(0);

    /// Check if this timeout never expires
    pub const fn is_forever(&self) -> bool {
        matches!(self, Self::Forever)
    }
}

impl From<u32> for Timeout {
    fn from(ticks: u32) -> Self {
        Self::Ticks(ticks)
    }
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        Self::Ticks(duration.ticks())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Timeout {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::Ticks(ticks) => defmt::write!(fmt, "Ticks({})", ticks),
            Self::Forever => defmt::write!(fmt, "Forever"),
        }
    }
}

/// Macro to create compile-time durations
#[macro_export]
macro_rules! duration {
    ($value:literal ms) => {
        $crate::Duration::from_millis($value)
    };
    ($value:literal s) => {
        $crate::Duration::from_secs($value)
    };
    ($value:literal ticks) => {
        $crate::Duration::from_ticks($value)
    };
}
