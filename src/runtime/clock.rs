//! Time sources for timed waits
//!
//! The scheduler only ever asks "how many seconds since start". Hosts with
//! their own notion of time (an editor's `timeSinceStartup`, a game loop's
//! accumulated frame time) drive a [`ManualClock`]; everything else can use
//! [`MonotonicClock`].

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Monotonic time source, in seconds since an implementation-defined epoch.
pub trait Clock {
    /// Seconds elapsed since the clock's epoch. Never decreases.
    fn now(&self) -> f64;
}

impl<C: Clock + ?Sized> Clock for Rc<C> {
    #[inline]
    fn now(&self) -> f64 {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    #[inline]
    fn now(&self) -> f64 {
        (**self).now()
    }
}

/// Wall-clock backed time source starting at construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    /// Create a clock whose epoch is "now".
    #[inline]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }
}

/// Externally driven time source.
///
/// Clones share the same underlying time, so the host can keep one clone to
/// advance while the scheduler reads another. Attempts to move the clock
/// backwards are ignored.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    /// Create a clock reading `0.0`.
    #[inline]
    pub fn new() -> Self {
        Self::starting_at(0.0)
    }

    /// Create a clock reading `start` seconds.
    pub fn starting_at(start: f64) -> Self {
        let start = if start.is_finite() { start.max(0.0) } else { 0.0 };
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    /// Jump to an absolute time. Earlier or non-finite values are ignored.
    pub fn set(
        &self,
        seconds: f64,
    ) {
        if seconds.is_finite() && seconds > self.now.get() {
            self.now.set(seconds);
        }
    }

    /// Move forward by `seconds`.
    #[inline]
    pub fn advance(
        &self,
        seconds: f64,
    ) {
        self.set(self.now.get() + seconds);
    }

    /// Move forward by a [`Duration`].
    #[inline]
    pub fn advance_by(
        &self,
        duration: Duration,
    ) {
        self.advance(duration.as_secs_f64());
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now(&self) -> f64 {
        self.now.get()
    }
}
