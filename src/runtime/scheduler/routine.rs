//! Resumable routines
//!
//! Rust has no stable generators, so a task body is a state machine: every
//! call to [`Routine::resume`] runs one step, up to the next suspension
//! point, and reports what happened as a [`Step`]. Small bodies can be
//! written as closures with [`from_fn`] or as a fixed list of steps with
//! [`sequence`].

use super::directive::{Completion, Yield};
use super::errors::StepFault;
use super::owner::OwnerToken;
use super::task::TaskHandle;
use super::{Scheduler, SchedulerResult};

/// Outcome of one step.
pub enum Step {
    /// Suspend until the yielded condition holds.
    Yield(Yield),
    /// Run a sub-routine to completion, then continue this one.
    Call(Box<dyn Routine>),
    /// The routine is exhausted.
    Done,
}

impl Step {
    /// Suspend until the next tick.
    #[inline]
    pub fn next() -> Self {
        Step::Yield(Yield::Next)
    }

    /// Suspend for `seconds`.
    #[inline]
    pub fn wait(seconds: f64) -> Self {
        Step::Yield(Yield::seconds(seconds))
    }

    /// Suspend until `handle` is done.
    #[inline]
    pub fn wait_for(handle: &TaskHandle) -> Self {
        Step::Yield(Yield::task(handle))
    }

    /// Suspend until `completion` reports completion.
    #[inline]
    pub fn until<C>(completion: C) -> Self
    where
        C: Completion + 'static,
    {
        Step::Yield(Yield::until(completion))
    }

    /// Descend into a sub-routine.
    #[inline]
    pub fn call<R>(routine: R) -> Self
    where
        R: Routine + 'static,
    {
        Step::Call(Box::new(routine))
    }
}

impl From<Yield> for Step {
    fn from(yielded: Yield) -> Self {
        Step::Yield(yielded)
    }
}

impl std::fmt::Debug for Step {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Step::Yield(y) => f.debug_tuple("Yield").field(y).finish(),
            Step::Call(_) => f.write_str("Call(..)"),
            Step::Done => f.write_str("Done"),
        }
    }
}

/// Result of resuming a routine.
pub type StepResult = Result<Step, StepFault>;

/// A resumable unit of work.
pub trait Routine {
    /// Run until the next suspension point.
    fn resume(
        &mut self,
        cx: &mut Context<'_>,
    ) -> StepResult;
}

impl<R: Routine + ?Sized> Routine for Box<R> {
    fn resume(
        &mut self,
        cx: &mut Context<'_>,
    ) -> StepResult {
        (**self).resume(cx)
    }
}

/// What a running step can see and do.
pub struct Context<'a> {
    scheduler: &'a Scheduler,
    task: &'a TaskHandle,
    now: f64,
    tick: u64,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        scheduler: &'a Scheduler,
        task: &'a TaskHandle,
        now: f64,
        tick: u64,
    ) -> Self {
        Self {
            scheduler,
            task,
            now,
            tick,
        }
    }

    /// The scheduler driving this step.
    #[inline]
    pub fn scheduler(&self) -> &'a Scheduler {
        self.scheduler
    }

    /// Handle of the task this step belongs to.
    #[inline]
    pub fn task(&self) -> &'a TaskHandle {
        self.task
    }

    /// Clock reading taken at the start of this task's advancement.
    #[inline]
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Current tick number.
    #[inline]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Start another task. It is first advanced on the next tick.
    #[inline]
    pub fn start<R>(
        &self,
        routine: R,
    ) -> TaskHandle
    where
        R: Routine + 'static,
    {
        self.scheduler.start(routine)
    }

    /// Start another task tied to `owner`.
    #[inline]
    pub fn start_owned<R>(
        &self,
        routine: R,
        owner: &OwnerToken,
    ) -> SchedulerResult<TaskHandle>
    where
        R: Routine + 'static,
    {
        self.scheduler.start_owned(routine, owner)
    }

    /// Stop a task. Stopping the current task takes effect once this step returns.
    #[inline]
    pub fn stop(
        &self,
        handle: &TaskHandle,
    ) -> SchedulerResult<()> {
        self.scheduler.stop(handle)
    }
}

/// Routine backed by a closure; see [`from_fn`].
pub struct FnRoutine<F> {
    body: F,
}

/// Build a routine from a closure called once per step.
///
/// ```rust
/// use tickwork::runtime::scheduler::{from_fn, Step};
///
/// let mut remaining = 3;
/// let countdown = from_fn(move |_cx| {
///     if remaining == 0 {
///         return Ok(Step::Done);
///     }
///     remaining -= 1;
///     Ok(Step::wait(1.0))
/// });
/// # let _ = countdown;
/// ```
pub fn from_fn<F>(body: F) -> FnRoutine<F>
where
    F: FnMut(&mut Context<'_>) -> StepResult,
{
    FnRoutine { body }
}

impl<F> Routine for FnRoutine<F>
where
    F: FnMut(&mut Context<'_>) -> StepResult,
{
    #[inline]
    fn resume(
        &mut self,
        cx: &mut Context<'_>,
    ) -> StepResult {
        (self.body)(cx)
    }
}

/// Routine replaying a fixed series of steps; see [`sequence`].
pub struct Sequence<I> {
    steps: I,
}

/// Build a routine that reports the given steps in order, then finishes.
pub fn sequence<I>(steps: I) -> Sequence<I::IntoIter>
where
    I: IntoIterator<Item = Step>,
{
    Sequence {
        steps: steps.into_iter(),
    }
}

impl<I> Routine for Sequence<I>
where
    I: Iterator<Item = Step>,
{
    #[inline]
    fn resume(
        &mut self,
        _cx: &mut Context<'_>,
    ) -> StepResult {
        Ok(self.steps.next().unwrap_or(Step::Done))
    }
}

/// Routine that waits `seconds`, then finishes.
pub fn delay(seconds: f64) -> impl Routine {
    sequence([Step::wait(seconds)])
}

/// Routine that runs `action` once on its first resumption, then finishes.
pub fn once<F>(action: F) -> impl Routine
where
    F: FnOnce(&mut Context<'_>) -> Result<(), StepFault>,
{
    let mut action = Some(action);
    from_fn(move |cx| {
        if let Some(action) = action.take() {
            action(cx)?;
        }
        Ok(Step::Done)
    })
}
