//! Scheduler 单元测试
//!
//! 测试指令分类、嵌套展开、任务生命周期和调度属性

use std::cell::RefCell;
use std::rc::Rc;

use crate::runtime::clock::ManualClock;
use crate::runtime::scheduler::{
    from_fn, Routine, Scheduler, SchedulerConfig, Step, TaskFault, TickReport,
};


/// Scheduler over a manual clock starting at zero.
fn manual_scheduler() -> (ManualClock, Scheduler) {
    let clock = ManualClock::new();
    let scheduler = Scheduler::new(clock.clone());
    (clock, scheduler)
}

type Faults = Rc<RefCell<Vec<TaskFault>>>;

/// Scheduler whose faults land in the returned list.
fn recording_scheduler(config: SchedulerConfig) -> (ManualClock, Scheduler, Faults) {
    let clock = ManualClock::new();
    let faults: Faults = Rc::default();
    let sink = faults.clone();
    let scheduler = Scheduler::with_config(config, clock.clone())
        .with_error_sink(move |fault: TaskFault| sink.borrow_mut().push(fault));
    (clock, scheduler, faults)
}

fn tick(scheduler: &Scheduler) -> TickReport {
    scheduler.tick().expect("tick should not be re-entrant here")
}

/// Routine yielding `Next` `n` times, then finishing.
fn immediates(n: usize) -> impl Routine {
    let mut left = n;
    from_fn(move |_cx| {
        if left == 0 {
            return Ok(Step::Done);
        }
        left -= 1;
        Ok(Step::next())
    })
}
