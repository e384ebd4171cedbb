mod common;

use common::{fixture_arg, spawn_command};

#[test]
fn version_human() {
    let output = spawn_command(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("navicue "), "unexpected output: {stdout}");
}

#[test]
fn version_json() {
    let output = spawn_command(&["version", "--format", "json"]);
    assert!(output.status.success());
    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("output should be valid JSON");
    assert_eq!(parsed["name"], "navicue");
    assert_eq!(parsed["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn validate_valid_catalog() {
    let config = fixture_arg("command_center.yaml");
    let output = spawn_command(&["cue", "validate", &config, "--quiet"]);
    assert!(
        output.status.success(),
        "validate should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ok: "), "unexpected output: {stdout}");
    assert!(stdout.contains("(2 cue(s))"), "unexpected output: {stdout}");
}

#[test]
fn validate_invalid_catalog_exits_with_config_error() {
    let config = fixture_arg("invalid_catalog.yaml");
    let output = spawn_command(&["cue", "validate", &config, "--quiet"]);
    assert_eq!(output.status.code(), Some(2));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("FAILED: "), "unexpected output: {stdout}");
    assert!(
        stdout.contains("Did you mean 'resonant'?"),
        "missing suggestion: {stdout}"
    );
    assert!(
        String::from_utf8_lossy(&output.stderr).contains("1 of 1 file(s) failed validation")
    );
}

#[test]
fn validate_reports_every_file() {
    let good = fixture_arg("command_center.yaml");
    let bad = fixture_arg("invalid_catalog.yaml");
    let output = spawn_command(&["cue", "validate", "--format", "json", &good, &bad, "--quiet"]);
    assert_eq!(output.status.code(), Some(2));

    let reports: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("output should be valid JSON");
    let reports = reports.as_array().expect("reports should be an array");
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0]["valid"], true);
    assert_eq!(reports[1]["valid"], false);
    assert!(
        reports[1]["errors"]
            .as_array()
            .is_some_and(|errors| errors.len() >= 3)
    );
}

#[test]
fn validate_strict_fails_on_warnings() {
    let config = fixture_arg("warnings_catalog.yaml");

    let lenient = spawn_command(&["cue", "validate", &config, "--quiet"]);
    assert!(lenient.status.success());
    let stdout = String::from_utf8_lossy(&lenient.stdout);
    assert!(stdout.contains("warning: "), "unexpected output: {stdout}");

    let strict = spawn_command(&["cue", "validate", "--strict", &config, "--quiet"]);
    assert_eq!(strict.status.code(), Some(2));
}

#[test]
fn validate_missing_file() {
    let output = spawn_command(&[
        "cue",
        "validate",
        "/tmp/nonexistent_navicue_catalog.yaml",
        "--quiet",
    ]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn list_json() {
    let config = fixture_arg("command_center.yaml");
    let output = spawn_command(&["cue", "list", "--config", &config, "--format", "json", "--quiet"]);
    assert!(output.status.success());

    let cues: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("output should be valid JSON");
    let ids: Vec<&str> = cues
        .as_array()
        .expect("cues should be an array")
        .iter()
        .filter_map(|c| c["id"].as_str())
        .collect();
    assert_eq!(ids, ["boundary-breath", "quick-glance"]);
    assert_eq!(cues[1]["timed_ms"], 400);
}

#[test]
fn list_filters_by_tag() {
    let config = fixture_arg("command_center.yaml");
    let output = spawn_command(&["cue", "list", "-c", &config, "--tag", "focus", "--quiet"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("Command Center"));
    assert!(stdout.contains("quick-glance"));
    assert!(!stdout.contains("boundary-breath"));
}

#[test]
fn run_unknown_cue_is_usage_error() {
    let config = fixture_arg("command_center.yaml");
    let output = spawn_command(&["cue", "run", "-c", &config, "--cue", "boundry-breath", "--quiet"]);
    assert_eq!(output.status.code(), Some(64));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Did you mean 'boundary-breath'?"),
        "missing suggestion: {stderr}"
    );
}

#[test]
fn run_invalid_catalog_is_config_error() {
    let config = fixture_arg("invalid_catalog.yaml");
    let output = spawn_command(&["cue", "run", "-c", &config, "--quiet"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn run_events_file() {
    let dir = tempfile::tempdir().unwrap();
    let events = dir.path().join("events.jsonl");
    let config = fixture_arg("command_center.yaml");
    let output = spawn_command(&[
        "cue",
        "run",
        "-c",
        &config,
        "--cue",
        "quick-glance",
        "--events-file",
        events.to_str().unwrap(),
        "--quiet",
    ]);
    assert!(output.status.success());
    assert!(output.stdout.is_empty());

    let content = std::fs::read_to_string(&events).unwrap();
    let types: Vec<String> = content
        .lines()
        .map(|l| {
            let v: serde_json::Value = serde_json::from_str(l).unwrap();
            v["type"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(
        types,
        ["CueStarted", "StageEntered", "StageEntered", "CueCompleted"]
    );
}

#[test]
fn validate_huge_delays_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("forever.yaml");
    std::fs::write(
        &path,
        "cues:\n  - id: forever\n    stages:\n      - { name: a, advance: { after: 18446744073709551615s } }\n      - { name: b, advance: { after: 18446744073709551615s } }\n      - { name: c }\n",
    )
    .unwrap();

    let output = spawn_command(&["cue", "validate", path.to_str().unwrap(), "--quiet"]);
    assert_eq!(output.status.code(), Some(2));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("exceeds the maximum of 1h"),
        "unexpected output: {stdout}"
    );
}
