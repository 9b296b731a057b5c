//! Scheduler errors

use thiserror::Error;

use super::owner::OwnerId;
use super::task::TaskId;

/// Scheduler result
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Misuse of the scheduler API, reported at the call site.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("owner {0} is already dead; refusing to start a task for it")]
    DeadOwner(OwnerId),

    #[error("{0} is ownerless; stop it with Scheduler::stop")]
    Ownerless(TaskId),

    #[error("{task} is owned by {owner}, not by {caller}")]
    ForeignOwner {
        /// The task the caller tried to stop
        task: TaskId,
        /// The task's actual owner
        owner: OwnerId,
        /// The owner the caller claimed to be
        caller: OwnerId,
    },

    #[error("{0} belongs to a different scheduler")]
    ForeignTask(TaskId),

    #[error("tick() called from inside a running step")]
    ReentrantTick,
}

/// Failure raised by task body code while a step was resuming.
#[derive(Debug, Error)]
pub enum StepFault {
    #[error(transparent)]
    Failed(#[from] anyhow::Error),

    #[error("step panicked: {0}")]
    Panicked(String),

    #[error("routine nesting exceeded {limit} frames")]
    NestingTooDeep {
        /// Configured maximum depth
        limit: usize,
    },
}

impl StepFault {
    /// Build a fault from a plain message.
    pub fn msg<M>(message: M) -> Self
    where
        M: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        StepFault::Failed(anyhow::Error::msg(message))
    }
}

/// A step fault together with the task it killed.
#[derive(Debug)]
pub struct TaskFault {
    /// The failed task
    pub task: TaskId,
    /// The failed task's name
    pub name: String,
    /// Tick during which the fault happened
    pub tick: u64,
    /// What went wrong
    pub fault: StepFault,
}

impl std::fmt::Display for TaskFault {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(
            f,
            "{} '{}' failed on tick {}: {}",
            self.task, self.name, self.tick, self.fault
        )
    }
}

/// Receiver for task faults.
pub trait ErrorSink {
    /// Called once per failed task, after it has been removed.
    fn report(
        &self,
        fault: TaskFault,
    );
}

impl<F> ErrorSink for F
where
    F: Fn(TaskFault),
{
    fn report(
        &self,
        fault: TaskFault,
    ) {
        self(fault)
    }
}

/// Default sink: logs every fault at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ErrorSink for LogSink {
    fn report(
        &self,
        fault: TaskFault,
    ) {
        tracing::error!("{}", fault);
    }
}
