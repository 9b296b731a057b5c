//! Routine frames
//!
//! A task body may call sub-routines, which may call their own. Instead of
//! recursing on the native stack, every task keeps an explicit stack of
//! frames, outermost first. The top frame is the leaf: the only routine that
//! is actually suspended, and the only directive that gets checked.

use smallvec::SmallVec;
use tracing::trace;

use super::directive::{Yield, YieldDirective};
use super::errors::StepFault;
use super::routine::{Context, Routine, Step};

/// One in-progress routine and the directive it is parked on.
pub(crate) struct Frame {
    routine: Box<dyn Routine>,
    directive: YieldDirective,
}

impl Frame {
    fn new(routine: Box<dyn Routine>) -> Self {
        Self {
            routine,
            directive: YieldDirective::Immediate,
        }
    }

    /// Replace the directive, unless the yield is the object already awaited.
    fn install(
        &mut self,
        yielded: Yield,
        now: f64,
    ) {
        if self.directive.waits_on(&yielded) {
            trace!("directive unchanged ({})", self.directive.kind());
            return;
        }
        self.directive = YieldDirective::classify(yielded, now);
    }
}

/// What one advancement attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Advance {
    /// The leaf's directive does not hold yet; nothing ran.
    Blocked,
    /// A step ran and the task is parked on a new directive.
    Suspended,
    /// The outermost routine is exhausted.
    Completed,
}

/// Explicit stack of nested routines for one task.
pub(crate) struct FrameStack {
    frames: SmallVec<[Frame; 4]>,
}

impl FrameStack {
    /// Stack holding only the task's outermost routine, ready to run.
    pub(crate) fn new(root: Box<dyn Routine>) -> Self {
        let mut frames = SmallVec::new();
        frames.push(Frame::new(root));
        Self { frames }
    }

    /// Number of routines currently in progress.
    #[inline]
    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Directive the leaf is parked on.
    #[inline]
    pub(crate) fn leaf_directive(&self) -> Option<&YieldDirective> {
        self.frames.last().map(|frame| &frame.directive)
    }

    /// Resume the leaf if its directive holds.
    ///
    /// Runs one logical step: descending into freshly called sub-routines and
    /// popping exhausted ones both continue within this call, until some
    /// routine yields or the outermost one is exhausted. Faults from the
    /// routines propagate to the caller untouched; the stack is left as it
    /// was at the failing frame.
    pub(crate) fn advance(
        &mut self,
        cx: &mut Context<'_>,
        max_depth: usize,
    ) -> Result<Advance, StepFault> {
        let Some(leaf) = self.frames.last() else {
            return Ok(Advance::Completed);
        };
        if !leaf.directive.is_satisfied(cx.now(), cx.scheduler()) {
            return Ok(Advance::Blocked);
        }

        loop {
            let depth = self.frames.len();
            let Some(leaf) = self.frames.last_mut() else {
                return Ok(Advance::Completed);
            };
            match leaf.routine.resume(cx)? {
                Step::Yield(yielded) => {
                    leaf.install(yielded, cx.now());
                    trace!(
                        "{} suspended at depth {} on {:?}",
                        cx.task().id(),
                        depth,
                        leaf.directive
                    );
                    return Ok(Advance::Suspended);
                }
                Step::Call(child) => {
                    if depth >= max_depth {
                        return Err(StepFault::NestingTooDeep { limit: max_depth });
                    }
                    leaf.directive = YieldDirective::Immediate;
                    self.frames.push(Frame::new(child));
                    trace!("{} descended to depth {}", cx.task().id(), self.frames.len());
                }
                Step::Done => {
                    self.frames.pop();
                    if self.frames.is_empty() {
                        return Ok(Advance::Completed);
                    }
                    trace!("{} returned to depth {}", cx.task().id(), self.frames.len());
                }
            }
        }
    }
}
