use std::cell::RefCell;
use std::rc::Rc;

use tickwork::runtime::scheduler::{delay, from_fn, sequence, Step, StepFault, TaskFault, TaskState};
use tickwork::runtime::{Clock, SimulatedHost};

#[test]
fn test_timed_wait_spans_frames() {
    let host = SimulatedHost::new(0.25);
    let task = host.scheduler().start(delay(1.0));

    let frames = host.run_until_idle(100).unwrap();
    // t = 0 installs the wait, t = 1.0 is the first frame past it.
    assert_eq!(frames, 5);
    assert!(task.is_finished());
    assert_eq!(host.clock().now(), 1.25);
}

#[test]
fn test_run_frames_reports_every_tick() {
    let host = SimulatedHost::new(0.5);
    host.scheduler().start(sequence([Step::next(), Step::wait(1.0)]));

    let reports = host.run_frames(4).unwrap();
    let ticks: Vec<u64> = reports.iter().map(|report| report.tick).collect();
    let times: Vec<f64> = reports.iter().map(|report| report.now).collect();
    assert_eq!(ticks, [1, 2, 3, 4]);
    assert_eq!(times, [0.0, 0.5, 1.0, 1.5]);
    // Wait installed at t = 0.5, satisfied at t = 1.5.
    assert_eq!(reports[2].blocked, 1);
    assert_eq!(reports[3].completed, 1);
}

#[test]
fn test_bad_frame_step_falls_back() {
    assert_eq!(SimulatedHost::new(0.0).frame_dt(), 1.0 / 60.0);
    assert_eq!(SimulatedHost::new(-1.0).frame_dt(), 1.0 / 60.0);
    assert_eq!(SimulatedHost::new(f64::NAN).frame_dt(), 1.0 / 60.0);
    assert_eq!(SimulatedHost::new(0.5).frame_dt(), 0.5);
}

#[test]
fn test_budget_exhausted_leaves_tasks() {
    let host = SimulatedHost::new(0.5);
    let task = host.scheduler().start(delay(60.0));

    assert_eq!(host.run_until_idle(10).unwrap(), 10);
    assert_eq!(task.state(), TaskState::Suspended);
    assert_eq!(host.scheduler().live_count(), 1);
}

#[test]
fn test_faults_reach_custom_sink() {
    let faults: Rc<RefCell<Vec<String>>> = Rc::default();
    let sink = faults.clone();
    let host = SimulatedHost::new(0.5)
        .with_error_sink(move |fault: TaskFault| sink.borrow_mut().push(fault.to_string()));

    let mut calls = 0;
    let flaky = host.scheduler().start_named(
        "flaky",
        from_fn(move |_cx| {
            calls += 1;
            if calls == 3 {
                return Err(StepFault::msg("lost connection"));
            }
            Ok(Step::next())
        }),
    );
    let survivor = host.scheduler().start(delay(2.0));

    host.run_until_idle(20).unwrap();
    assert!(survivor.is_finished());
    assert_eq!(
        *faults.borrow(),
        [format!("{} 'flaky' failed on tick 3: lost connection", flaky.id())]
    );
    assert_eq!(host.scheduler().stats().failed(), 1);
}
