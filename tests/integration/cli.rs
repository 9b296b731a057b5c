use std::path::Path;
use std::process::{Command, Output};

fn tickwork(
    config: &Path,
    args: &[&str],
) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tickwork"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("TICKWORK_LOG")
        .output()
        .expect("Failed to run tickwork")
}

#[test]
fn test_cli_demo_timed() {
    let dir = tempfile::tempdir().unwrap();
    let output = tickwork(&dir.path().join("missing.toml"), &["demo", "timed"]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("timed: woke up"));
    assert!(stdout.contains("finished"));
}

#[test]
fn test_cli_version() {
    let dir = tempfile::tempdir().unwrap();
    let output = tickwork(&dir.path().join("missing.toml"), &["version"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("tickwork {}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_config_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[scheduler]\nmax_nesting_depth = 8\n").unwrap();

    let output = tickwork(&path, &["config"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("max_nesting_depth = 8"));
    assert!(stdout.contains("frame_dt = 0.1"));
}

#[test]
fn test_cli_rejects_bad_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[host]\nframe_dt = -1.0\n").unwrap();

    let output = tickwork(&path, &["demo"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("frame_dt"));
}
