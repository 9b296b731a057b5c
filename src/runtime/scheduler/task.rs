//! Task definitions for the scheduler.
//!
//! A task is one resumable unit of cooperative work. The scheduler keeps the
//! task itself; callers only ever see a [`TaskHandle`], which can be cloned,
//! yielded to make another task wait on it, or passed to `stop`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::directive::YieldDirective;
use super::frames::FrameStack;
use super::owner::{OwnerId, OwnerRef};

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Unique task identifier, process-wide across schedulers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl TaskId {
    /// Allocate a fresh ID.
    #[inline]
    pub fn next() -> Self {
        TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the inner value.
    #[inline]
    pub fn inner(&self) -> u64 {
        self.0
    }
}

impl From<u64> for TaskId {
    fn from(val: u64) -> Self {
        Self(val)
    }
}

impl From<TaskId> for u64 {
    fn from(val: TaskId) -> Self {
        val.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "Task({})", self.0)
    }
}

/// Task state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Registered, never resumed yet.
    Pending,
    /// Resumed at least once and parked on a directive.
    Suspended,
    /// The outermost routine ran to completion.
    Finished,
    /// Stopped explicitly.
    Cancelled,
    /// The owner went away before the task finished.
    Orphaned,
    /// A step returned an error or panicked.
    Failed,
}

impl TaskState {
    /// Whether the task has reached a terminal state.
    #[inline]
    pub fn is_done(&self) -> bool {
        matches!(
            self,
            TaskState::Finished | TaskState::Cancelled | TaskState::Orphaned | TaskState::Failed
        )
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let label = match self {
            TaskState::Pending => "pending",
            TaskState::Suspended => "suspended",
            TaskState::Finished => "finished",
            TaskState::Cancelled => "cancelled",
            TaskState::Orphaned => "orphaned",
            TaskState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Scheduler-side task record.
pub(crate) struct Task {
    id: TaskId,
    name: String,
    /// Identity of the scheduler the task was registered with.
    scheduler_id: u64,
    state: Cell<TaskState>,
    /// Tick on which the task reached a terminal state.
    done_on_tick: Cell<Option<u64>>,
    /// `None` while a step is executing and after the task is done.
    frames: RefCell<Option<FrameStack>>,
    owner: RefCell<Option<OwnerRef>>,
    owner_id: Option<OwnerId>,
    resumes: Cell<u64>,
}

/// Shared handle to a scheduled task.
///
/// Handles compare equal when they refer to the same task. Holding a handle
/// keeps the task record alive but does not keep the task running.
#[derive(Clone)]
pub struct TaskHandle(Rc<Task>);

impl TaskHandle {
    pub(crate) fn new(
        id: TaskId,
        name: String,
        scheduler_id: u64,
        frames: FrameStack,
        owner: Option<OwnerRef>,
    ) -> Self {
        let owner_id = owner.as_ref().map(OwnerRef::id);
        Self(Rc::new(Task {
            id,
            name,
            scheduler_id,
            state: Cell::new(TaskState::Pending),
            done_on_tick: Cell::new(None),
            frames: RefCell::new(Some(frames)),
            owner: RefCell::new(owner),
            owner_id,
            resumes: Cell::new(0),
        }))
    }

    /// Get the task ID.
    #[inline]
    pub fn id(&self) -> TaskId {
        self.0.id
    }

    /// Get the task name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Get the current state.
    #[inline]
    pub fn state(&self) -> TaskState {
        self.0.state.get()
    }

    /// Check if the task has finished, failed, or been stopped or orphaned.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.state().is_done()
    }

    /// Check if the task ran its routine to completion.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.state() == TaskState::Finished
    }

    /// Tick on which the task became done, if it is.
    #[inline]
    pub fn done_on_tick(&self) -> Option<u64> {
        self.0.done_on_tick.get()
    }

    /// Owner the task was started for, if any.
    #[inline]
    pub fn owner_id(&self) -> Option<OwnerId> {
        self.0.owner_id
    }

    /// Number of times a step of this task has been resumed.
    #[inline]
    pub fn resumes(&self) -> u64 {
        self.0.resumes.get()
    }

    /// Current nesting depth of the routine stack (0 once done).
    pub fn depth(&self) -> usize {
        self.0
            .frames
            .borrow()
            .as_ref()
            .map(FrameStack::depth)
            .unwrap_or(0)
    }

    /// Directive the innermost routine is parked on.
    ///
    /// `None` once the task is done, and while one of its steps is running.
    pub fn directive(&self) -> Option<YieldDirective> {
        self.0
            .frames
            .borrow()
            .as_ref()
            .and_then(|frames| frames.leaf_directive().cloned())
    }

    /// Whether both handles refer to the same task.
    #[inline]
    pub fn ptr_eq(
        &self,
        other: &TaskHandle,
    ) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    #[inline]
    pub(crate) fn scheduler_id(&self) -> u64 {
        self.0.scheduler_id
    }

    /// Whether a task waiting on this one may resume on `tick` of scheduler
    /// `scheduler_id`.
    ///
    /// Within one scheduler the task must have become done on an earlier
    /// tick. Tick numbers of different schedulers are unrelated, so for a
    /// waiter elsewhere being done is enough.
    pub(crate) fn done_before(
        &self,
        scheduler_id: u64,
        tick: u64,
    ) -> bool {
        match self.done_on_tick() {
            None => false,
            Some(_) if self.scheduler_id() != scheduler_id => true,
            Some(done) => done < tick,
        }
    }

    /// Whether the owner, if any, is still alive. Ownerless tasks always are.
    pub(crate) fn owner_alive(&self) -> bool {
        self.0
            .owner
            .borrow()
            .as_ref()
            .map_or(true, OwnerRef::is_alive)
    }

    #[inline]
    pub(crate) fn set_state(
        &self,
        state: TaskState,
    ) {
        self.0.state.set(state);
    }

    #[inline]
    pub(crate) fn record_resume(&self) {
        self.0.resumes.set(self.0.resumes.get() + 1);
    }

    /// Take the routine stack out for the duration of one advancement.
    #[inline]
    pub(crate) fn take_frames(&self) -> Option<FrameStack> {
        self.0.frames.borrow_mut().take()
    }

    /// Put the routine stack back, unless the task became done meanwhile.
    pub(crate) fn restore_frames(
        &self,
        frames: FrameStack,
    ) {
        if !self.is_done() {
            *self.0.frames.borrow_mut() = Some(frames);
        }
    }

    /// Move into a terminal state and release the routine stack and owner.
    ///
    /// Returns `false` if the task was already done.
    pub(crate) fn retire(
        &self,
        state: TaskState,
        tick: u64,
    ) -> bool {
        debug_assert!(state.is_done());
        if self.is_done() {
            return false;
        }
        self.0.state.set(state);
        self.0.done_on_tick.set(Some(tick));
        // Drop outside the borrow: routine destructors may touch other handles.
        let frames = self.0.frames.borrow_mut().take();
        let owner = self.0.owner.borrow_mut().take();
        drop(frames);
        drop(owner);
        true
    }
}

impl PartialEq for TaskHandle {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for TaskHandle {}

impl std::fmt::Debug for TaskHandle {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("state", &self.state())
            .field("owner", &self.owner_id())
            .finish()
    }
}
