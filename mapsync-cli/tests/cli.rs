//! Running the `mapsync` binary end to end

use std::process::{Command, Output};
use tempfile::TempDir;

fn mapsync(args: &[&str]) -> Output {
    mapsync_with_env(args, &[])
}

fn mapsync_with_env(args: &[&str], vars: &[(&str, &str)]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_mapsync"));
    command.args(args).env_remove("RUST_LOG");
    for (key, value) in vars {
        command.env(key, value);
    }
    command.output().expect("failed to run mapsync")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn simulate_reports_convergence() {
    let output = mapsync(&["--log-level", "error", "simulate", "--peers", "3", "--rounds", "10", "--seed", "7"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout(&output).contains("converged"));
}

#[test]
fn simulate_seed_falls_back_to_configuration() {
    let args = ["--log-level", "error", "simulate", "--rounds", "3"];
    let output = mapsync_with_env(&args, &[("MAPSYNC_SESSION_PEER_SELECTION_SEED", "9")]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout(&output).contains("seed: 9"));

    // The flag wins over the configuration
    let output = mapsync_with_env(
        &["--log-level", "error", "simulate", "--rounds", "3", "--seed", "4"],
        &[("MAPSYNC_SESSION_PEER_SELECTION_SEED", "9")],
    );
    assert!(stdout(&output).contains("seed: 4"));
}

#[test]
fn simulate_edits_only_configured_subjects() {
    let args = ["--log-level", "error", "simulate", "--rounds", "10", "--seed", "3"];
    let output = mapsync_with_env(&args, &[("MAPSYNC_NODE_SUBJECTS", "map")]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout(&output).contains("converged"));
}

#[test]
fn simulate_rejects_a_zero_token_timeout() {
    let args = ["--log-level", "error", "simulate", "--rounds", "1"];
    let output = mapsync_with_env(&args, &[("MAPSYNC_SYNC_TOKEN_TIMEOUT", "0s")]);
    assert!(!output.status.success());
}

#[test]
fn hlc_parse_prints_fields() {
    let output = mapsync(&["--log-level", "error", "hlc", "parse", "001700000000000:0000000003:node-a"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("walltime: 1700000000000"));
    assert!(text.contains("counter:  3"));
    assert!(text.contains("node_id:  node-a"));
}

#[test]
fn hlc_parse_rejects_garbage() {
    let output = mapsync(&["--log-level", "error", "hlc", "parse", "not-a-timestamp"]);
    assert!(!output.status.success());
}

#[test]
fn hlc_tick_is_increasing() {
    let output = mapsync(&["--log-level", "error", "hlc", "tick", "--count", "5"]);
    assert!(output.status.success());
    let text = stdout(&output);
    let ticks: Vec<&str> = text.lines().collect();
    assert_eq!(ticks.len(), 5);
    // Fixed-width encoding sorts like the clock
    assert!(ticks.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn config_init_then_check() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mapsync.toml");
    let path = path.to_str().unwrap();

    let output = mapsync(&["--log-level", "error", "config", "init", path]);
    assert!(output.status.success());
    let output = mapsync(&["--log-level", "error", "config", "check", path]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("ok"));

    // Refuses to overwrite
    let output = mapsync(&["--log-level", "error", "config", "init", path]);
    assert!(!output.status.success());
}
