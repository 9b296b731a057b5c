//! Built-in demo scenarios
//!
//! Each scenario wires a handful of tasks into a [`SimulatedHost`] and runs it
//! until every task is gone, recording what the tasks did along the way.

use std::cell::{Cell, RefCell};
use std::fmt::Display;
use std::rc::Rc;

use anyhow::{anyhow, Result};
use tracing::info;

use crate::runtime::scheduler::{from_fn, sequence, Context, OwnerToken, Step, TaskFault};
use crate::runtime::{Clock, SimulatedHost};
use crate::util::config::TickworkConfig;

/// Available demo scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// One task: next tick, a one second wait, next tick.
    Timed,
    /// A parent calling a sub-routine, then waiting on a child task.
    Nested,
    /// A task polling a download, tied to a window that closes early.
    Owned,
    /// A failing and a panicking task next to a healthy one.
    Fault,
}

impl Scenario {
    /// Every scenario, in presentation order.
    pub const ALL: [Scenario; 4] = [
        Scenario::Timed,
        Scenario::Nested,
        Scenario::Owned,
        Scenario::Fault,
    ];

    /// Scenario name as accepted on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Scenario::Timed => "timed",
            Scenario::Nested => "nested",
            Scenario::Owned => "owned",
            Scenario::Fault => "fault",
        }
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of a demo run.
#[derive(Debug, Clone, Default)]
pub struct DemoSummary {
    /// Frames the host ran
    pub frames: u64,
    /// Host clock at the end of the run
    pub elapsed: f64,
    /// Tasks that ran to completion
    pub finished: u64,
    /// Tasks stopped explicitly
    pub cancelled: u64,
    /// Tasks dropped with their owner
    pub orphaned: u64,
    /// Tasks killed by a fault
    pub failed: u64,
    /// Timestamped task events, in order
    pub events: Vec<String>,
    /// Reported faults
    pub faults: Vec<String>,
}

#[derive(Debug, Clone, Default)]
struct Journal(Rc<RefCell<Vec<String>>>);

impl Journal {
    fn log(
        &self,
        cx: &Context<'_>,
        message: impl Display,
    ) {
        let line = format!("[{:>6.2}s] {}: {}", cx.now(), cx.task().name(), message);
        info!("{}", line);
        self.0.borrow_mut().push(line);
    }

    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

/// Run one scenario to completion on a simulated host.
pub fn run_scenario(
    scenario: Scenario,
    config: &TickworkConfig,
) -> Result<DemoSummary> {
    let journal = Journal::default();
    let faults: Rc<RefCell<Vec<String>>> = Rc::default();

    let sink = faults.clone();
    let host = SimulatedHost::with_config(config.scheduler.clone(), config.host.frame_dt)
        .with_error_sink(move |fault: TaskFault| sink.borrow_mut().push(fault.to_string()));

    match scenario {
        Scenario::Timed => timed(&host, &journal),
        Scenario::Nested => nested(&host, &journal),
        Scenario::Owned => owned(&host, &journal)?,
        Scenario::Fault => fault(&host, &journal),
    }

    let frames = host.run_until_idle(config.host.max_frames)?;
    if !host.scheduler().is_idle() {
        return Err(anyhow!(
            "scenario '{}' still had {} tasks after {} frames",
            scenario,
            host.scheduler().live_count(),
            frames
        ));
    }

    let stats = host.scheduler().stats();
    let faults = faults.borrow().clone();
    Ok(DemoSummary {
        frames,
        elapsed: host.clock().now(),
        finished: stats.finished(),
        cancelled: stats.cancelled(),
        orphaned: stats.orphaned(),
        failed: stats.failed(),
        events: journal.take(),
        faults,
    })
}

fn timed(
    host: &SimulatedHost,
    journal: &Journal,
) {
    let journal = journal.clone();
    let mut stage = 0;
    host.scheduler().start_named(
        "timed",
        from_fn(move |cx| {
            stage += 1;
            match stage {
                1 => {
                    journal.log(cx, "started");
                    Ok(Step::next())
                }
                2 => {
                    journal.log(cx, "waiting one second");
                    Ok(Step::wait(1.0))
                }
                3 => {
                    journal.log(cx, "woke up");
                    Ok(Step::next())
                }
                _ => {
                    journal.log(cx, "done");
                    Ok(Step::Done)
                }
            }
        }),
    );
}

fn nested(
    host: &SimulatedHost,
    journal: &Journal,
) {
    let journal = journal.clone();
    let mut stage = 0;
    let mut child = None;
    host.scheduler().start_named(
        "parent",
        from_fn(move |cx| {
            stage += 1;
            match stage {
                1 => {
                    journal.log(cx, "calling prepare");
                    let inner = journal.clone();
                    let mut prepared = false;
                    Ok(Step::call(from_fn(move |cx| {
                        if prepared {
                            inner.log(cx, "prepare finished");
                            return Ok(Step::Done);
                        }
                        prepared = true;
                        inner.log(cx, "prepare waiting 0.3s");
                        Ok(Step::wait(0.3))
                    })))
                }
                2 => {
                    let worker_journal = journal.clone();
                    let mut round = 0;
                    let handle = cx.scheduler().start_named(
                        "worker",
                        from_fn(move |cx| {
                            round += 1;
                            if round > 3 {
                                worker_journal.log(cx, "done");
                                return Ok(Step::Done);
                            }
                            worker_journal.log(cx, format!("round {}", round));
                            Ok(Step::next())
                        }),
                    );
                    journal.log(cx, format!("waiting on {}", handle.id()));
                    let step = Step::wait_for(&handle);
                    child = Some(handle);
                    Ok(step)
                }
                _ => {
                    let state = child.as_ref().map(|handle| handle.state().to_string());
                    journal.log(
                        cx,
                        format!("worker is {}", state.unwrap_or_else(|| "gone".to_string())),
                    );
                    Ok(Step::Done)
                }
            }
        }),
    );
}

fn owned(
    host: &SimulatedHost,
    journal: &Journal,
) -> Result<()> {
    let window = OwnerToken::new("window");
    let downloaded = Rc::new(Cell::new(false));

    let poll_journal = journal.clone();
    let flag = downloaded.clone();
    let mut polls = 0;
    host.scheduler().start_owned_named(
        "progress-bar",
        from_fn(move |cx| {
            polls += 1;
            if polls == 1 {
                poll_journal.log(cx, "waiting for download");
                let flag = flag.clone();
                return Ok(Step::until(move || flag.get()));
            }
            poll_journal.log(cx, "download finished");
            Ok(Step::Done)
        }),
        &window,
    )?;

    let download_journal = journal.clone();
    let mut stage = 0;
    host.scheduler().start_named(
        "download",
        from_fn(move |cx| {
            stage += 1;
            if stage == 1 {
                return Ok(Step::wait(2.0));
            }
            downloaded.set(true);
            download_journal.log(cx, "bytes on disk");
            Ok(Step::Done)
        }),
    );

    let close_journal = journal.clone();
    let mut closed = false;
    host.scheduler().start_named(
        "close-window",
        from_fn(move |cx| {
            if closed {
                window.invalidate();
                close_journal.log(cx, "window closed");
                return Ok(Step::Done);
            }
            closed = true;
            Ok(Step::wait(0.5))
        }),
    );

    Ok(())
}

fn fault(
    host: &SimulatedHost,
    journal: &Journal,
) {
    let healthy = journal.clone();
    let mut beats = 0;
    host.scheduler().start_named(
        "healthy",
        from_fn(move |cx| {
            beats += 1;
            if beats > 5 {
                healthy.log(cx, "done");
                return Ok(Step::Done);
            }
            healthy.log(cx, format!("beat {}", beats));
            Ok(Step::next())
        }),
    );

    let broken = journal.clone();
    let mut attempts = 0;
    host.scheduler().start_named(
        "broken",
        from_fn(move |cx| {
            attempts += 1;
            if attempts == 2 {
                broken.log(cx, "giving up");
                return Err(anyhow!("disk on fire").into());
            }
            Ok(Step::next())
        }),
    );

    let panicky = journal.clone();
    host.scheduler().start_named(
        "panicky",
        sequence([
            Step::next(),
            Step::next(),
            Step::call(from_fn(move |cx| {
                panicky.log(cx, "about to panic");
                panic!("unexpected state");
            })),
        ]),
    );
}
