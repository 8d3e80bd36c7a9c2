//! Integration tests for strata-cli.
//!
//! Tests invoke the `strata` binary on pipeline files written to a temp dir
//! and check output and exit codes.

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

/// Helper to get the path to the `strata` binary built by cargo.
fn strata_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_strata"))
}

fn write_pipeline(dir: &TempDir, text: &str) -> PathBuf {
    let path = dir.path().join("pipeline.toml");
    std::fs::write(&path, text).unwrap();
    path
}

fn run_strata(args: &[&str], file: &Path) -> std::process::Output {
    strata_bin()
        .args(args)
        .arg(file)
        .output()
        .expect("failed to run strata")
}

const RAMP: &str = r#"
[scheduler]
threads = 2
print_level_states = true

[[component]]
name = "src"
type = "signal_source"
[component.params]
frames = 300
width = 3

[[component]]
name = "gain"
type = "scale"
thread = 1
[component.params]
gain = 2.0
[component.reader]
levels = "src"

[[component]]
name = "mon"
type = "monitor"
[component.reader]
levels = "gain"
"#;

// ---------------------------------------------------------------------------
// `strata components`
// ---------------------------------------------------------------------------

#[test]
fn cli_components_lists_all_types() {
    let output = strata_bin().arg("components").output().unwrap();
    assert!(output.status.success(), "strata components failed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Available Components"), "got: {stdout}");
    for id in [
        "signal_source",
        "external_source",
        "scale",
        "framer",
        "delta",
        "monitor",
        "external_sink",
    ] {
        assert!(stdout.contains(id), "listing should contain '{id}'");
    }
}

#[test]
fn cli_components_detail_shows_parameters() {
    let output = strata_bin().args(["components", "framer"]).output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("length_sec"), "got: {stdout}");
    assert!(stdout.contains("[component.reader]"), "got: {stdout}");
}

#[test]
fn cli_components_unknown_type_fails() {
    let output = strata_bin().args(["components", "reverb"]).output().unwrap();
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unknown component type"), "got: {stderr}");
}

#[test]
fn cli_help_works() {
    let output = strata_bin().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for cmd in ["run", "validate", "components"] {
        assert!(stdout.contains(cmd), "help should mention '{cmd}'");
    }
}

// ---------------------------------------------------------------------------
// `strata run`
// ---------------------------------------------------------------------------

#[test]
fn cli_run_completes_with_text_report() {
    let dir = TempDir::new().unwrap();
    let file = write_pipeline(&dir, RAMP);

    let output = run_strata(&["run"], &file);
    assert_eq!(output.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("completed"), "got: {stdout}");
    assert!(stdout.contains("gain"), "got: {stdout}");
    assert!(stdout.contains("300"), "level table should show 300 frames written: {stdout}");
}

#[test]
fn cli_run_json_report() {
    let dir = TempDir::new().unwrap();
    let file = write_pipeline(&dir, RAMP);

    let output = run_strata(&["run", "--report", "json", "--threads", "1"], &file);
    assert_eq!(output.status.code(), Some(0));

    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(report["status"], "completed");
    assert_eq!(report["eoi_count"], 1);
    let levels = report["levels"].as_array().unwrap();
    let gain = levels.iter().find(|l| l["name"] == "gain").unwrap();
    assert_eq!(gain["cur_w"], 300);
    assert_eq!(gain["width"], 3);
    assert_eq!(report["profiles"].as_array().unwrap().len(), 3);
}

#[test]
fn cli_run_honors_max_ticks() {
    let dir = TempDir::new().unwrap();
    let file = write_pipeline(
        &dir,
        r#"
[[component]]
name = "src"
type = "signal_source"
[component.params]
frames = 0
block = 1
"#,
    );

    let output = run_strata(&["run", "--report", "json", "--max-ticks", "25"], &file);
    assert_eq!(output.status.code(), Some(0));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["ticks"], 25);
}

#[test]
fn cli_run_invalid_pipeline_exits_with_2() {
    let dir = TempDir::new().unwrap();
    let file = write_pipeline(
        &dir,
        r#"
[[component]]
name = "mon"
type = "monitor"
[component.reader]
levels = "nothing"
"#,
    );

    let output = run_strata(&["run"], &file);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("nothing"), "got: {stderr}");
}

#[test]
fn cli_run_bad_parameter_exits_with_2() {
    let dir = TempDir::new().unwrap();
    let file = write_pipeline(
        &dir,
        "[[component]]\nname = \"src\"\ntype = \"signal_source\"\n[component.params]\nwidth = 0\n",
    );

    let output = run_strata(&["run"], &file);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn cli_run_missing_file_exits_with_1() {
    let dir = TempDir::new().unwrap();
    let output = run_strata(&["run"], &dir.path().join("missing.toml"));
    assert_eq!(output.status.code(), Some(1));
}

// ---------------------------------------------------------------------------
// `strata validate`
// ---------------------------------------------------------------------------

#[test]
fn cli_validate_reports_counts() {
    let dir = TempDir::new().unwrap();
    let file = write_pipeline(&dir, RAMP);

    let output = run_strata(&["validate", "--setup"], &file);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("OK (3 components, 2 levels)"), "got: {stdout}");
}

#[test]
fn cli_validate_rejects_duplicate_names() {
    let dir = TempDir::new().unwrap();
    let file = write_pipeline(
        &dir,
        r#"
[[component]]
name = "a"
type = "signal_source"

[[component]]
name = "a"
type = "signal_source"
[component.writer]
level = "b"
"#,
    );

    let output = run_strata(&["validate"], &file);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("duplicate component name 'a'"), "got: {stderr}");
}

#[test]
fn cli_validates_shipped_pipelines() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../pipelines");
    for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().is_some_and(|e| e == "toml") {
            let output = run_strata(&["validate"], &path);
            assert!(
                output.status.success(),
                "{}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr)
            );
        }
    }
}
