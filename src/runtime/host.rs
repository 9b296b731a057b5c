//! Simulated host loop
//!
//! Real hosts own the update callback and call [`Scheduler::tick`] from it.
//! [`SimulatedHost`] plays that role for the CLI, for tests, and for hosts
//! without a time source of their own: every frame ticks the scheduler at the
//! current time, then moves a [`ManualClock`] forward by a fixed step.

use tracing::debug;

use super::clock::{Clock, ManualClock};
use super::scheduler::{ErrorSink, Scheduler, SchedulerConfig, SchedulerResult, TickReport};

/// Fixed-step host driving one scheduler.
#[derive(Debug)]
pub struct SimulatedHost {
    scheduler: Scheduler,
    clock: ManualClock,
    frame_dt: f64,
}

impl SimulatedHost {
    /// Host with default scheduler config, starting at `t = 0`.
    #[inline]
    pub fn new(frame_dt: f64) -> Self {
        Self::with_config(SchedulerConfig::default(), frame_dt)
    }

    /// Host with a custom scheduler config. Non-positive steps fall back to 60 Hz.
    pub fn with_config(
        config: SchedulerConfig,
        frame_dt: f64,
    ) -> Self {
        let clock = ManualClock::new();
        let frame_dt = if frame_dt.is_finite() && frame_dt > 0.0 {
            frame_dt
        } else {
            1.0 / 60.0
        };
        Self {
            scheduler: Scheduler::with_config(config, clock.clone()),
            clock,
            frame_dt,
        }
    }

    /// Route step faults to `sink`.
    pub fn with_error_sink<S>(
        self,
        sink: S,
    ) -> Self
    where
        S: ErrorSink + 'static,
    {
        Self {
            scheduler: self.scheduler.with_error_sink(sink),
            ..self
        }
    }

    /// The driven scheduler.
    #[inline]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// The host clock. Advancing it by hand is allowed.
    #[inline]
    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    /// Seconds per frame.
    #[inline]
    pub fn frame_dt(&self) -> f64 {
        self.frame_dt
    }

    /// Run one frame: tick at the current time, then advance the clock.
    pub fn frame(&self) -> SchedulerResult<TickReport> {
        let report = self.scheduler.tick()?;
        self.clock.advance(self.frame_dt);
        Ok(report)
    }

    /// Run `frames` frames and collect their reports.
    pub fn run_frames(
        &self,
        frames: u64,
    ) -> SchedulerResult<Vec<TickReport>> {
        (0..frames).map(|_| self.frame()).collect()
    }

    /// Run frames until no task is left or `max_frames` is reached.
    ///
    /// Returns the number of frames run.
    pub fn run_until_idle(
        &self,
        max_frames: u64,
    ) -> SchedulerResult<u64> {
        let mut frames = 0;
        while frames < max_frames && !self.scheduler.is_idle() {
            self.frame()?;
            frames += 1;
        }
        debug!(
            "host stopped after {} frames at {:.3}s, {} tasks left",
            frames,
            self.clock.now(),
            self.scheduler.live_count()
        );
        Ok(frames)
    }
}
