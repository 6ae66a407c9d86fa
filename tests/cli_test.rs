//! CLI contract tests
//!
//! Runs the built binary against the billing fixture and checks exit codes,
//! output formats and config discovery.

use std::path::{Path, PathBuf};
use std::process::Command;

fn splinter_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_splinter"))
}

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("billing.json")
}

/// Temp dir holding a copy of the fixture, so config discovery is isolated
fn workspace() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("scope.json");
    std::fs::copy(fixture(), &input).unwrap();
    (dir, input)
}

fn run(args: &[&str], input: Option<&Path>) -> (i32, String, String) {
    let mut cmd = Command::new(splinter_bin());
    cmd.args(args.iter().take(1));
    if let Some(input) = input {
        cmd.arg(input);
    }
    cmd.args(args.iter().skip(1));
    let output = cmd.output().expect("Failed to run splinter");
    (
        output.status.code().unwrap_or(-1),
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}

#[test]
fn test_scan_text_output() {
    let (_dir, input) = workspace();
    let (code, stdout, _) = run(&["scan"], Some(&input));
    assert_eq!(code, 0);
    assert!(stdout.contains("Splinter Scan"));
    assert!(stdout.contains("naming-convention"));
    assert!(stdout.contains("processAll"));
}

#[test]
fn test_scan_json_output_is_valid() {
    let (_dir, input) = workspace();
    let (code, stdout, _) = run(&["scan", "--format", "json"], Some(&input));
    assert_eq!(code, 0);

    let v: serde_json::Value = serde_json::from_str(&stdout).expect("Invalid JSON");
    assert_eq!(v["complete"], true);
    assert_eq!(v["summary"]["nodes"], 9);
    let diagnostics = v["diagnostics"].as_array().unwrap();
    assert_eq!(diagnostics.len(), 3);
    assert_eq!(diagnostics[0]["rule_id"], "naming-convention");
    assert_eq!(diagnostics[0]["severity"], "critical");
    assert!(v["fingerprint"].as_str().unwrap().len() == 16);
}

#[test]
fn test_json_output_is_reproducible() {
    let (_dir, input) = workspace();
    let (_, first, _) = run(&["scan", "-f", "json", "--workers", "1"], Some(&input));
    let (_, second, _) = run(&["scan", "-f", "json", "--workers", "8"], Some(&input));
    assert_eq!(first, second);
}

#[test]
fn test_fail_on_threshold() {
    let (_dir, input) = workspace();
    let (code, _, stderr) = run(&["scan", "--fail-on", "0.9"], Some(&input));
    assert_eq!(code, 1);
    assert!(stderr.contains("--fail-on"));

    let (code, _, _) = run(
        &["scan", "--fail-on", "0.9", "--disable-rule", "naming-convention"],
        Some(&input),
    );
    assert_eq!(code, 0);
}

#[test]
fn test_warning_threshold_filters_diagnostics() {
    let (_dir, input) = workspace();
    let (_, stdout, _) = run(
        &["scan", "-f", "json", "--warning-threshold", "0.1"],
        Some(&input),
    );
    let v: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    // adds create/too-many-calls, processAll/too-many-parameters and the
    // class's shared-parameters result
    assert_eq!(v["diagnostics"].as_array().unwrap().len(), 6);
}

#[test]
fn test_output_file_written() {
    let (dir, input) = workspace();
    let out = dir.path().join("report.md");
    let out_str = out.to_string_lossy().to_string();
    let (code, stdout, _) = run(&["scan", "-f", "markdown", "-o", &out_str], Some(&input));
    assert_eq!(code, 0);
    assert!(stdout.trim().is_empty());
    let content = std::fs::read_to_string(&out).unwrap();
    assert!(content.starts_with("# Splinter Report"));
}

#[test]
fn test_config_next_to_input_is_applied() {
    let (dir, input) = workspace();
    std::fs::write(
        dir.path().join("splinter.toml"),
        concat!(
            "[rules.NamingConvention]\nenabled = false\n\n",
            "[defaults]\nformat = \"json\"\nfail_on = 0.9\n",
        ),
    )
    .unwrap();

    let (code, stdout, _) = run(&["scan"], Some(&input));
    assert_eq!(code, 0);
    let v: serde_json::Value = serde_json::from_str(&stdout).expect("config selects json");
    let results = v["results"].as_array().unwrap();
    assert!(results.iter().all(|r| r["rule_id"] != "naming-convention"));
}

#[test]
fn test_unknown_rule_in_config_warns() {
    let (dir, input) = workspace();
    std::fs::write(
        dir.path().join("splinter.toml"),
        "[rules.no-such-rule]\nthreshold = 3\n",
    )
    .unwrap();
    let (code, _, stderr) = run(&["scan"], Some(&input));
    assert_eq!(code, 0);
    assert!(stderr.contains("no-such-rule"));
}

#[test]
fn test_disable_unknown_rule_fails() {
    let (_dir, input) = workspace();
    let (code, _, stderr) = run(&["scan", "--disable-rule", "nope"], Some(&input));
    assert_ne!(code, 0);
    assert!(stderr.contains("nope"));
}

#[test]
fn test_missing_input_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.json");
    let (code, _, stderr) = run(&["scan"], Some(&missing));
    assert_ne!(code, 0);
    assert!(stderr.contains("Failed to load scope tree"));
}

#[test]
fn test_rules_lists_builtin_rules() {
    let (code, stdout, _) = run(&["rules"], None);
    assert_eq!(code, 0);
    for id in [
        "too-many-calls",
        "too-many-parameters",
        "callback-parameters",
        "too-many-methods",
        "shared-parameters",
        "naming-convention",
        "module-size",
    ] {
        assert!(stdout.contains(id), "missing {}", id);
    }
}

#[test]
fn test_init_writes_config_once() {
    let dir = tempfile::tempdir().unwrap();
    let (code, _, _) = run(&["init"], Some(dir.path()));
    assert_eq!(code, 0);
    let config_path = dir.path().join("splinter.toml");
    let written = std::fs::read_to_string(&config_path).unwrap();
    assert!(written.contains("[rules.too-many-calls]"));

    std::fs::write(&config_path, "# edited\n").unwrap();
    let (code, stdout, _) = run(&["init"], Some(dir.path()));
    assert_eq!(code, 0);
    assert!(stdout.contains("Already initialized"));
    assert_eq!(std::fs::read_to_string(&config_path).unwrap(), "# edited\n");
}
