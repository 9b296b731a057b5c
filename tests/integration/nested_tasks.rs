use std::cell::RefCell;
use std::rc::Rc;

use tickwork::runtime::scheduler::{
    from_fn, sequence, Context, Routine, Step, StepResult, TaskHandle,
};
use tickwork::runtime::SimulatedHost;

type Log = Rc<RefCell<Vec<String>>>;

/// Loads `count` assets one after another, each in its own task.
struct Loader {
    log: Log,
    count: usize,
    loaded: usize,
    current: Option<TaskHandle>,
}

impl Routine for Loader {
    fn resume(
        &mut self,
        cx: &mut Context<'_>,
    ) -> StepResult {
        if let Some(done) = self.current.take() {
            self.log
                .borrow_mut()
                .push(format!("tick {}: asset {} {}", cx.tick(), self.loaded, done.state()));
        }
        if self.loaded == self.count {
            return Ok(Step::Done);
        }
        self.loaded += 1;
        let asset = cx.start(sequence([Step::wait(0.5)]));
        self.log
            .borrow_mut()
            .push(format!("tick {}: loading asset {}", cx.tick(), self.loaded));
        let step = Step::wait_for(&asset);
        self.current = Some(asset);
        Ok(step)
    }
}

#[test]
fn test_loader_waits_for_each_asset() {
    let host = SimulatedHost::new(0.25);
    let log: Log = Rc::default();

    let loader = Loader {
        log: log.clone(),
        count: 2,
        loaded: 0,
        current: None,
    };
    let task = host.scheduler().start_named("loader", loader);

    host.run_until_idle(50).unwrap();
    assert!(task.is_finished());
    // Each asset: started on tick n, waits 0.5s from tick n + 1, done on
    // tick n + 3, and the loader resumes on tick n + 4.
    assert_eq!(
        *log.borrow(),
        [
            "tick 1: loading asset 1",
            "tick 5: asset 1 finished",
            "tick 5: loading asset 2",
            "tick 9: asset 2 finished",
        ]
    );
}

#[test]
fn test_sub_routine_inside_custom_routine() {
    let host = SimulatedHost::new(0.5);
    let log: Log = Rc::default();

    let outer_log = log.clone();
    let mut stage = 0;
    let task = host.scheduler().start(from_fn(move |cx| {
        stage += 1;
        outer_log.borrow_mut().push(format!("outer {} at depth {}", stage, cx.task().depth()));
        match stage {
            1 => Ok(Step::call(sequence([Step::wait(1.0), Step::next()]))),
            _ => Ok(Step::Done),
        }
    }));

    host.run_until_idle(20).unwrap();
    assert!(task.is_finished());
    // Frames are taken out of the task while a step runs.
    assert_eq!(*log.borrow(), ["outer 1 at depth 0", "outer 2 at depth 0"]);
    assert_eq!(task.resumes(), 3);
}
