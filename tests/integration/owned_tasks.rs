use std::cell::Cell;
use std::rc::Rc;

use tickwork::runtime::scheduler::{delay, from_fn, OwnerToken, SchedulerError, Step, TaskState};
use tickwork::runtime::SimulatedHost;

/// A UI element owning a progress task; closing it ends the task.
struct Window {
    token: OwnerToken,
}

impl Window {
    fn open(title: &str) -> Self {
        Self {
            token: OwnerToken::new(title),
        }
    }
}

#[test]
fn test_closing_window_drops_its_tasks() {
    let host = SimulatedHost::new(0.25);
    let window = Window::open("settings");
    let spinner = host
        .scheduler()
        .start_owned_named("spinner", from_fn(|_cx| Ok(Step::next())), &window.token)
        .unwrap();
    let unrelated = host.scheduler().start(delay(1.0));

    host.run_frames(3).unwrap();
    assert_eq!(spinner.resumes(), 3);

    drop(window);
    let report = host.frame().unwrap();
    assert_eq!(report.orphaned, 1);
    assert_eq!(spinner.state(), TaskState::Orphaned);
    assert!(!unrelated.is_done());

    host.run_until_idle(10).unwrap();
    assert!(unrelated.is_finished());
}

#[test]
fn test_owner_outliving_task() {
    let host = SimulatedHost::new(0.25);
    let window = Window::open("about");
    let task = host.scheduler().start_owned(delay(0.5), &window.token).unwrap();

    host.run_until_idle(10).unwrap();
    assert!(task.is_finished());
    assert!(window.token.is_alive());
}

#[test]
fn test_owned_task_started_from_step() {
    let host = SimulatedHost::new(0.25);
    let window = Window::open("editor");
    let started = Rc::new(Cell::new(false));

    let token = window.token.clone();
    let flag = started.clone();
    host.scheduler().start(from_fn(move |cx| {
        if flag.replace(true) {
            return Ok(Step::Done);
        }
        cx.start_owned(delay(10.0), &token).map_err(anyhow::Error::from)?;
        Ok(Step::next())
    }));

    host.frame().unwrap();
    assert_eq!(host.scheduler().live_count(), 2);

    window.token.invalidate();
    host.run_until_idle(5).unwrap();
    assert!(host.scheduler().is_idle());
    assert_eq!(host.scheduler().stats().orphaned(), 1);
}

#[test]
fn test_stop_as_other_window_is_refused() {
    let host = SimulatedHost::new(0.25);
    let mine = Window::open("mine");
    let theirs = Window::open("theirs");
    let task = host.scheduler().start_owned(delay(1.0), &mine.token).unwrap();

    let err = host.scheduler().stop_as(&task, &theirs.token).unwrap_err();
    assert!(matches!(err, SchedulerError::ForeignOwner { .. }));
    assert!(err.to_string().contains("is owned by"));

    host.scheduler().stop_as(&task, &mine.token).unwrap();
    assert_eq!(task.state(), TaskState::Cancelled);
}
