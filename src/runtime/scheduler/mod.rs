//! Cooperative task scheduler
//!
//! This module provides the [`Scheduler`], a single-threaded registry of
//! resumable tasks driven by a host that can only call us back once per
//! frame. Every [`Scheduler::tick`] gives each live task at most one chance to
//! run its next step, provided the condition it is parked on holds.
//!
//! # Propagation rule
//!
//! One logical step per task per tick. Calling a sub-routine and returning
//! from a finished one do not end the step; it ends at the next yield. A
//! task waiting on another task resumes on the tick *after* that task became
//! done.

pub mod directive;
pub mod errors;
mod frames;
pub mod owner;
pub mod routine;
pub mod task;

pub use directive::{Completion, Yield, YieldDirective};
pub use errors::{ErrorSink, LogSink, SchedulerError, SchedulerResult, StepFault, TaskFault};
pub use owner::{OwnerId, OwnerToken};
pub use routine::{delay, from_fn, once, sequence, Context, FnRoutine, Routine, Sequence, Step, StepResult};
pub use task::{TaskHandle, TaskId, TaskState};

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::runtime::clock::{Clock, MonotonicClock};
use frames::{Advance, FrameStack};
use owner::OwnerRef;

static NEXT_SCHEDULER_ID: AtomicU64 = AtomicU64::new(1);

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum number of nested routines per task.
    pub max_nesting_depth: usize,
    /// Turn panics inside steps into task faults instead of unwinding through `tick`.
    pub catch_panics: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_nesting_depth: 64,
            catch_panics: true,
        }
    }
}

/// Scheduler statistics.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    ticks: Cell<u64>,
    started: Cell<u64>,
    finished: Cell<u64>,
    cancelled: Cell<u64>,
    orphaned: Cell<u64>,
    failed: Cell<u64>,
    resumes: Cell<u64>,
}

fn bump(counter: &Cell<u64>) {
    counter.set(counter.get() + 1);
}

impl SchedulerStats {
    /// Ticks run so far.
    #[inline]
    pub fn ticks(&self) -> u64 {
        self.ticks.get()
    }

    /// Tasks ever started.
    #[inline]
    pub fn started(&self) -> u64 {
        self.started.get()
    }

    /// Tasks that ran to completion.
    #[inline]
    pub fn finished(&self) -> u64 {
        self.finished.get()
    }

    /// Tasks stopped explicitly.
    #[inline]
    pub fn cancelled(&self) -> u64 {
        self.cancelled.get()
    }

    /// Tasks dropped because their owner died.
    #[inline]
    pub fn orphaned(&self) -> u64 {
        self.orphaned.get()
    }

    /// Tasks killed by a step fault.
    #[inline]
    pub fn failed(&self) -> u64 {
        self.failed.get()
    }

    /// Steps resumed across all tasks.
    #[inline]
    pub fn resumes(&self) -> u64 {
        self.resumes.get()
    }
}

/// What a single tick did.
///
/// A task that stops itself during its step counts in none of the per-task
/// fields; it shows up in [`SchedulerStats::cancelled`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickReport {
    /// Tick number, starting at 1.
    pub tick: u64,
    /// Clock reading used for the whole tick.
    pub now: f64,
    /// Tasks that ran a step and are parked again.
    pub advanced: usize,
    /// Tasks whose directive did not hold.
    pub blocked: usize,
    /// Tasks that ran to completion.
    pub completed: usize,
    /// Tasks dropped because their owner died.
    pub orphaned: usize,
    /// Tasks killed by a step fault.
    pub failed: usize,
    /// Tasks still registered after the tick.
    pub live: usize,
}

/// Registry of live tasks, advanced once per host tick.
///
/// The scheduler is `!Send`: tasks, handles and the registry live on the
/// host's update thread. Steps reach the scheduler through their
/// [`Context`] and may start or stop tasks while a tick is in progress.
pub struct Scheduler {
    id: u64,
    config: SchedulerConfig,
    clock: Rc<dyn Clock>,
    tasks: RefCell<IndexMap<TaskId, TaskHandle>>,
    tick: Cell<u64>,
    ticking: Cell<bool>,
    sink: Box<dyn ErrorSink>,
    stats: SchedulerStats,
}

/// Clears the re-entrancy flag even if a step unwinds through `tick`.
struct TickGuard<'a>(&'a Cell<bool>);

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Retires a task as failed if its step unwinds through `tick`.
struct UnwindGuard<'a> {
    scheduler: &'a Scheduler,
    handle: &'a TaskHandle,
    tick: u64,
    armed: bool,
}

impl Drop for UnwindGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Ok(mut tasks) = self.scheduler.tasks.try_borrow_mut() {
            tasks.shift_remove(&self.handle.id());
        }
        if self.handle.retire(TaskState::Failed, self.tick) {
            bump(&self.scheduler.stats.failed);
        }
        warn!(
            "{} '{}' panicked on tick {}",
            self.handle.id(),
            self.handle.name(),
            self.tick
        );
    }
}

impl Scheduler {
    /// Create a scheduler with default config.
    #[inline]
    pub fn new<C>(clock: C) -> Self
    where
        C: Clock + 'static,
    {
        Self::with_config(SchedulerConfig::default(), clock)
    }

    /// Create a scheduler with custom configuration.
    pub fn with_config<C>(
        config: SchedulerConfig,
        clock: C,
    ) -> Self
    where
        C: Clock + 'static,
    {
        let id = NEXT_SCHEDULER_ID.fetch_add(1, Ordering::Relaxed);
        debug!("scheduler {} created ({:?})", id, config);
        Self {
            id,
            config,
            clock: Rc::new(clock),
            tasks: RefCell::new(IndexMap::new()),
            tick: Cell::new(0),
            ticking: Cell::new(false),
            sink: Box::new(LogSink),
            stats: SchedulerStats::default(),
        }
    }

    /// Route step faults to `sink` instead of the log.
    pub fn with_error_sink<S>(
        mut self,
        sink: S,
    ) -> Self
    where
        S: ErrorSink + 'static,
    {
        self.sink = Box::new(sink);
        self
    }

    /// Register an unowned task. It runs until it finishes or is stopped.
    #[inline]
    pub fn start<R>(
        &self,
        routine: R,
    ) -> TaskHandle
    where
        R: Routine + 'static,
    {
        self.register(None, Box::new(routine), None)
    }

    /// Register an unowned task under a readable name.
    #[inline]
    pub fn start_named<R>(
        &self,
        name: impl Into<String>,
        routine: R,
    ) -> TaskHandle
    where
        R: Routine + 'static,
    {
        self.register(Some(name.into()), Box::new(routine), None)
    }

    /// Register a task that lives no longer than `owner`.
    pub fn start_owned<R>(
        &self,
        routine: R,
        owner: &OwnerToken,
    ) -> SchedulerResult<TaskHandle>
    where
        R: Routine + 'static,
    {
        if !owner.is_alive() {
            return Err(SchedulerError::DeadOwner(owner.id()));
        }
        Ok(self.register(None, Box::new(routine), Some(owner.downgrade())))
    }

    /// Register an owned task under a readable name.
    pub fn start_owned_named<R>(
        &self,
        name: impl Into<String>,
        routine: R,
        owner: &OwnerToken,
    ) -> SchedulerResult<TaskHandle>
    where
        R: Routine + 'static,
    {
        if !owner.is_alive() {
            return Err(SchedulerError::DeadOwner(owner.id()));
        }
        Ok(self.register(
            Some(name.into()),
            Box::new(routine),
            Some(owner.downgrade()),
        ))
    }

    fn register(
        &self,
        name: Option<String>,
        routine: Box<dyn Routine>,
        owner: Option<OwnerRef>,
    ) -> TaskHandle {
        let id = TaskId::next();
        let name = name.unwrap_or_else(|| format!("task-{}", id.inner()));
        let handle = TaskHandle::new(id, name, self.id, FrameStack::new(routine), owner);
        self.tasks.borrow_mut().insert(id, handle.clone());
        bump(&self.stats.started);
        debug!(
            "{} '{}' started{}",
            id,
            handle.name(),
            handle
                .owner_id()
                .map(|owner| format!(" for {}", owner))
                .unwrap_or_default()
        );
        handle
    }

    /// Deregister a task immediately.
    ///
    /// Stopping a task that is already done is a no-op. A step in progress is
    /// never interrupted: a task stopping itself finishes its current step
    /// and is discarded afterwards.
    pub fn stop(
        &self,
        handle: &TaskHandle,
    ) -> SchedulerResult<()> {
        if handle.scheduler_id() != self.id {
            return Err(SchedulerError::ForeignTask(handle.id()));
        }
        self.tasks.borrow_mut().shift_remove(&handle.id());
        if handle.retire(TaskState::Cancelled, self.tick.get()) {
            bump(&self.stats.cancelled);
            debug!("{} '{}' stopped", handle.id(), handle.name());
        }
        Ok(())
    }

    /// Stop a task on behalf of `owner`, checking that it really owns it.
    pub fn stop_as(
        &self,
        handle: &TaskHandle,
        owner: &OwnerToken,
    ) -> SchedulerResult<()> {
        if handle.scheduler_id() != self.id {
            return Err(SchedulerError::ForeignTask(handle.id()));
        }
        match handle.owner_id() {
            None => Err(SchedulerError::Ownerless(handle.id())),
            Some(actual) if actual != owner.id() => Err(SchedulerError::ForeignOwner {
                task: handle.id(),
                owner: actual,
                caller: owner.id(),
            }),
            Some(_) => self.stop(handle),
        }
    }

    /// Stop every task started for `owner`. Returns how many were stopped.
    pub fn stop_owned_by(
        &self,
        owner: &OwnerToken,
    ) -> usize {
        let owned: Vec<TaskHandle> = self
            .tasks
            .borrow()
            .values()
            .filter(|handle| handle.owner_id() == Some(owner.id()))
            .cloned()
            .collect();
        owned
            .iter()
            .filter(|handle| self.stop(handle).is_ok())
            .count()
    }

    /// Stop every registered task. Returns how many were stopped.
    pub fn stop_all(&self) -> usize {
        let all: Vec<TaskHandle> = self.tasks.borrow().values().cloned().collect();
        all.iter().filter(|handle| self.stop(handle).is_ok()).count()
    }

    /// Advance every live task whose directive holds.
    ///
    /// Call exactly once per host frame. The set of tasks to visit is fixed
    /// when the tick begins: tasks started by a step are first advanced on the
    /// next tick, tasks stopped by a step are skipped.
    pub fn tick(&self) -> SchedulerResult<TickReport> {
        if self.ticking.replace(true) {
            return Err(SchedulerError::ReentrantTick);
        }
        let _guard = TickGuard(&self.ticking);

        let tick = self.tick.get() + 1;
        self.tick.set(tick);
        let now = self.clock.now();
        let snapshot: Vec<TaskHandle> = self.tasks.borrow().values().cloned().collect();
        trace!("tick {} at {:.3}s over {} tasks", tick, now, snapshot.len());

        let mut report = TickReport {
            tick,
            now,
            ..TickReport::default()
        };

        for handle in &snapshot {
            if handle.is_done() {
                continue;
            }
            if !handle.owner_alive() {
                if handle.retire(TaskState::Orphaned, tick) {
                    bump(&self.stats.orphaned);
                    report.orphaned += 1;
                    debug!("{} '{}' dropped: owner is gone", handle.id(), handle.name());
                }
                continue;
            }
            self.advance(handle, now, tick, &mut report);
        }

        self.tasks.borrow_mut().retain(|_, handle| !handle.is_done());
        report.live = self.tasks.borrow().len();
        bump(&self.stats.ticks);
        Ok(report)
    }

    fn advance(
        &self,
        handle: &TaskHandle,
        now: f64,
        tick: u64,
        report: &mut TickReport,
    ) {
        let Some(mut frames) = handle.take_frames() else {
            return;
        };

        let max_depth = self.config.max_nesting_depth;
        let result = {
            let mut cx = Context::new(self, handle, now, tick);
            if self.config.catch_panics {
                panic::catch_unwind(AssertUnwindSafe(|| frames.advance(&mut cx, max_depth)))
                    .unwrap_or_else(|payload| Err(StepFault::Panicked(panic_message(payload.as_ref()))))
            } else {
                let mut guard = UnwindGuard {
                    scheduler: self,
                    handle,
                    tick,
                    armed: true,
                };
                let result = frames.advance(&mut cx, max_depth);
                guard.armed = false;
                result
            }
        };

        match result {
            Ok(Advance::Blocked) => {
                report.blocked += 1;
                handle.restore_frames(frames);
            }
            Ok(Advance::Suspended) => {
                self.record_resume(handle);
                if handle.is_done() {
                    trace!("{} stopped during its own step", handle.id());
                    return;
                }
                report.advanced += 1;
                handle.set_state(TaskState::Suspended);
                handle.restore_frames(frames);
            }
            Ok(Advance::Completed) => {
                self.record_resume(handle);
                drop(frames);
                if handle.retire(TaskState::Finished, tick) {
                    bump(&self.stats.finished);
                    report.completed += 1;
                    debug!("{} '{}' finished on tick {}", handle.id(), handle.name(), tick);
                }
            }
            Err(fault) => {
                drop(frames);
                if handle.retire(TaskState::Failed, tick) {
                    bump(&self.stats.failed);
                    report.failed += 1;
                }
                warn!("{} '{}' faulted on tick {}", handle.id(), handle.name(), tick);
                self.sink.report(TaskFault {
                    task: handle.id(),
                    name: handle.name().to_string(),
                    tick,
                    fault,
                });
            }
        }
    }

    #[inline]
    fn record_resume(
        &self,
        handle: &TaskHandle,
    ) {
        handle.record_resume();
        bump(&self.stats.resumes);
    }

    /// Whether a task with this ID is still registered.
    pub fn contains(
        &self,
        id: TaskId,
    ) -> bool {
        self.tasks.borrow().contains_key(&id)
    }

    /// Handle of a registered task.
    pub fn get(
        &self,
        id: TaskId,
    ) -> Option<TaskHandle> {
        self.tasks.borrow().get(&id).cloned()
    }

    /// Number of registered tasks.
    #[inline]
    pub fn live_count(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Whether no task is registered.
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    #[inline]
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Number of ticks run so far.
    #[inline]
    pub fn current_tick(&self) -> u64 {
        self.tick.get()
    }

    /// Current clock reading.
    #[inline]
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    /// Get the configuration.
    #[inline]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Get statistics.
    #[inline]
    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(MonotonicClock::new())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        let stopped = self.stop_all();
        if stopped > 0 {
            debug!("scheduler {} dropped with {} live tasks", self.id, stopped);
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("tick", &self.tick.get())
            .field("live", &self.live_count())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests;
