use tickwork::demo::{run_scenario, Scenario};
use tickwork::util::config::TickworkConfig;

fn run(scenario: Scenario) -> tickwork::demo::DemoSummary {
    run_scenario(scenario, &TickworkConfig::default()).expect("scenario should settle")
}

#[test]
fn test_timed_scenario() {
    let summary = run(Scenario::Timed);
    assert_eq!(summary.finished, 1);
    assert!(summary.faults.is_empty());
    assert!(summary.elapsed >= 1.0);
    assert!(summary.events.iter().any(|event| event.ends_with("timed: woke up")));
}

#[test]
fn test_nested_scenario() {
    let summary = run(Scenario::Nested);
    assert_eq!(summary.finished, 2);
    let last = summary.events.last().expect("parent reports at the end");
    assert!(last.ends_with("parent: worker is finished"), "{}", last);
}

#[test]
fn test_owned_scenario() {
    let summary = run(Scenario::Owned);
    assert_eq!(summary.orphaned, 1);
    assert_eq!(summary.finished, 2);
    assert!(!summary
        .events
        .iter()
        .any(|event| event.ends_with("download finished")));
}

#[test]
fn test_fault_scenario() {
    let summary = run(Scenario::Fault);
    assert_eq!(summary.finished, 1);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.faults.len(), 2);
    assert!(summary.faults.iter().any(|fault| fault.contains("disk on fire")));
    assert!(summary
        .faults
        .iter()
        .any(|fault| fault.contains("step panicked: unexpected state")));
}

#[test]
fn test_frame_budget_too_small() {
    let mut config = TickworkConfig::default();
    config.host.max_frames = 2;
    let err = run_scenario(Scenario::Timed, &config).unwrap_err();
    assert!(err.to_string().contains("still had 1 tasks"));
}

#[test]
fn test_scenario_names() {
    let names: Vec<String> = Scenario::ALL.iter().map(ToString::to_string).collect();
    assert_eq!(names, ["timed", "nested", "owned", "fault"]);
}
