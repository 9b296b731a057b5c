//! Yield values and the directives they turn into
//!
//! A step hands back a raw [`Yield`]; the flattener classifies it once into a
//! [`YieldDirective`] and keeps asking that directive whether the step may
//! resume until it says yes.

use std::rc::Rc;
use std::time::Duration;

use super::task::TaskHandle;
use super::Scheduler;

/// Anything that can report that some outside operation has finished.
///
/// Implemented for every `Fn() -> bool`, so a closure polling a flag or a
/// request handle is enough.
pub trait Completion {
    /// `true` once the awaited operation is complete.
    fn is_complete(&self) -> bool;
}

impl<F> Completion for F
where
    F: Fn() -> bool,
{
    #[inline]
    fn is_complete(&self) -> bool {
        self()
    }
}

/// Raw value reported by a step at a suspension point.
#[derive(Clone)]
pub enum Yield {
    /// No condition; resume on the next tick.
    Next,
    /// Wait this many seconds, measured from the moment of the yield.
    Seconds(f64),
    /// Wait until another task is done.
    Task(TaskHandle),
    /// Wait until an external operation reports completion.
    External(Rc<dyn Completion>),
}

impl Yield {
    /// Timed wait in seconds.
    #[inline]
    pub fn seconds(seconds: f64) -> Self {
        Yield::Seconds(seconds)
    }

    /// Timed wait from a [`Duration`].
    #[inline]
    pub fn duration(duration: Duration) -> Self {
        Yield::Seconds(duration.as_secs_f64())
    }

    /// Wait on another task.
    #[inline]
    pub fn task(handle: &TaskHandle) -> Self {
        Yield::Task(handle.clone())
    }

    /// Wait on an external completion query.
    #[inline]
    pub fn until<C>(completion: C) -> Self
    where
        C: Completion + 'static,
    {
        Yield::External(Rc::new(completion))
    }
}

impl Default for Yield {
    fn default() -> Self {
        Yield::Next
    }
}

impl From<()> for Yield {
    fn from(_: ()) -> Self {
        Yield::Next
    }
}

impl From<Duration> for Yield {
    fn from(duration: Duration) -> Self {
        Yield::duration(duration)
    }
}

impl From<TaskHandle> for Yield {
    fn from(handle: TaskHandle) -> Self {
        Yield::Task(handle)
    }
}

impl From<&TaskHandle> for Yield {
    fn from(handle: &TaskHandle) -> Self {
        Yield::task(handle)
    }
}

impl std::fmt::Debug for Yield {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Yield::Next => f.write_str("Next"),
            Yield::Seconds(s) => f.debug_tuple("Seconds").field(s).finish(),
            Yield::Task(h) => f.debug_tuple("Task").field(&h.id()).finish(),
            Yield::External(_) => f.write_str("External(..)"),
        }
    }
}

/// Condition a suspended step waits on.
#[derive(Clone)]
pub enum YieldDirective {
    /// Resume on the next tick unconditionally.
    Immediate,
    /// Resume once the clock reads at least `target` seconds.
    TimedWait {
        /// Absolute clock time, fixed when the directive was installed
        target: f64,
    },
    /// Resume once the child task is done.
    TaskWait(TaskHandle),
    /// Resume once the completion query returns `true`.
    ExternalWait(Rc<dyn Completion>),
}

impl YieldDirective {
    /// Classify a raw yield. Timed waits are anchored at `now`.
    pub fn classify(
        yielded: Yield,
        now: f64,
    ) -> Self {
        match yielded {
            Yield::Next => YieldDirective::Immediate,
            Yield::Seconds(seconds) => {
                let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
                YieldDirective::TimedWait {
                    target: now + seconds,
                }
            }
            Yield::Task(handle) => YieldDirective::TaskWait(handle),
            Yield::External(completion) => YieldDirective::ExternalWait(completion),
        }
    }

    /// Whether a step parked on this directive may resume during the current
    /// tick of `scheduler`.
    ///
    /// A child task on the same scheduler only counts once it became done on
    /// an earlier tick, so a parent resumes on the tick after its child
    /// finishes no matter which of the two the scheduler visits first. A
    /// child on another scheduler counts as soon as it is done.
    pub fn is_satisfied(
        &self,
        now: f64,
        scheduler: &Scheduler,
    ) -> bool {
        match self {
            YieldDirective::Immediate => true,
            YieldDirective::TimedWait { target } => now >= *target,
            YieldDirective::TaskWait(child) => {
                child.done_before(scheduler.id(), scheduler.current_tick())
            }
            YieldDirective::ExternalWait(completion) => completion.is_complete(),
        }
    }

    /// Whether `yielded` is the very object this directive already waits on.
    pub fn waits_on(
        &self,
        yielded: &Yield,
    ) -> bool {
        match (self, yielded) {
            (YieldDirective::TaskWait(current), Yield::Task(next)) => current.ptr_eq(next),
            (YieldDirective::ExternalWait(current), Yield::External(next)) => {
                Rc::ptr_eq(current, next)
            }
            _ => false,
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            YieldDirective::Immediate => "immediate",
            YieldDirective::TimedWait { .. } => "timed-wait",
            YieldDirective::TaskWait(_) => "task-wait",
            YieldDirective::ExternalWait(_) => "external-wait",
        }
    }
}

impl Default for YieldDirective {
    fn default() -> Self {
        YieldDirective::Immediate
    }
}

impl std::fmt::Debug for YieldDirective {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            YieldDirective::Immediate => f.write_str("Immediate"),
            YieldDirective::TimedWait { target } => {
                f.debug_struct("TimedWait").field("target", target).finish()
            }
            YieldDirective::TaskWait(h) => f.debug_tuple("TaskWait").field(&h.id()).finish(),
            YieldDirective::ExternalWait(_) => f.write_str("ExternalWait(..)"),
        }
    }
}
