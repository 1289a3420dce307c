//! Integration tests for session lifecycle, the tool manifest, configuration,
//! and `lookout serve --no-tui` via CLI.

mod common;

use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};

use common::TestEnv;
use predicates::prelude::*;

#[test]
fn test_session_status_of_fresh_session() {
    let env = TestEnv::new();

    let summary = env.json(&["session", "status"]);
    assert_eq!(summary["name"], "default");
    assert_eq!(summary["remaining"], 0);
    assert_eq!(summary["unread"], 0);
    assert_eq!(summary["complete"], false);
}

#[test]
fn test_session_complete_and_status() {
    let env = TestEnv::new();

    env.json(&["task", "add", "a", "-s", "work"]);
    env.json(&["inbox", "send", "hi", "-s", "work"]);

    let done = env.json(&["session", "complete", "-s", "work"]);
    assert_eq!(done["complete"], true);

    let summary = env.json(&["session", "status", "-s", "work"]);
    assert_eq!(summary["remaining"], 1);
    assert_eq!(summary["unread"], 1);
    assert_eq!(summary["complete"], true);

    env.lookout()
        .args(["session", "status", "-s", "work", "-H"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Session 'work' (complete)"));
}

#[test]
fn test_session_clear_removes_state() {
    let env = TestEnv::new();

    env.json(&["task", "add", "a"]);
    env.json(&["session", "complete"]);
    env.json(&["session", "clear"]);

    let summary = env.json(&["session", "status"]);
    assert_eq!(summary["remaining"], 0);
    assert_eq!(summary["complete"], false);
}

#[test]
fn test_session_list() {
    let env = TestEnv::new();

    env.json(&["task", "add", "a", "-s", "beta"]);
    env.json(&["note", "add", "n", "-t", "tip", "-s", "alpha"]);

    let listed = env.json(&["session", "list"]);
    assert_eq!(listed["sessions"], serde_json::json!(["alpha", "beta"]));
}

#[test]
fn test_session_from_environment() {
    let env = TestEnv::new();

    env.lookout()
        .env("LOOKOUT_SESSION", "from-env")
        .args(["task", "add", "a"])
        .assert()
        .success();

    let summary = env.json(&["session", "status", "-s", "from-env"]);
    assert_eq!(summary["remaining"], 1);
}

// === MCP manifest ===

#[test]
fn test_mcp_manifest_lists_all_tools() {
    let env = TestEnv::new();

    let manifest = env.json(&["mcp", "manifest"]);
    let names: Vec<&str> = manifest["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names.len(), 10);
    assert!(names.contains(&"ask_questions"));
    assert!(names.contains(&"finish_spec"));
    assert!(names.contains(&"inbox_mark_read"));
    assert!(manifest["tools"][0]["inputSchema"].is_object());
}

#[test]
fn test_mcp_manifest_human_marks_waiting_tools() {
    let env = TestEnv::new();

    env.lookout()
        .args(["mcp", "manifest", "-H"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(waits for human)"));
}

// === Configuration ===

#[test]
fn test_system_config_sets_output_format() {
    let env = TestEnv::new();
    std::fs::write(
        env.config_path().join("config.kdl"),
        "output-format \"human\"\n",
    )
    .unwrap();

    env.lookout()
        .args(["task", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No tasks."));
}

#[test]
fn test_invalid_system_config_fails() {
    let env = TestEnv::new();
    std::fs::write(env.config_path().join("config.kdl"), "log-level \"loud\"\n").unwrap();

    env.lookout()
        .args(["task", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"kind\":\"config\""));
}

#[test]
fn test_missing_project_path_fails() {
    let env = TestEnv::new();

    env.lookout_bare()
        .args(["-C", "/definitely/not/here", "task", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("project path does not exist"))
        .stderr(predicate::str::contains("\"kind\":\"not_found\""));
}

#[test]
fn test_project_path_from_environment() {
    let env = TestEnv::new();

    env.lookout_bare()
        .env("LOOKOUT_PROJECT", env.project_path())
        .current_dir(env.data_path())
        .args(["task", "add", "a"])
        .assert()
        .success();

    let buckets = env.json(&["task", "list"]);
    assert_eq!(buckets["remaining"][0]["content"], "a");
}

// === Serve ===

#[test]
fn test_serve_no_tui_prints_endpoint() {
    let env = TestEnv::new();

    let mut child = Command::new(env!("CARGO_BIN_EXE_lookout"))
        .args(["serve", "--no-tui", "-s", "demo", "-C"])
        .arg(env.project_path())
        .env("LOOKOUT_DATA_DIR", env.data_path())
        .env("LOOKOUT_CONFIG_DIR", env.config_path())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let mut line = String::new();
    let stdout = child.stdout.take().unwrap();
    BufReader::new(stdout).read_line(&mut line).unwrap();
    child.kill().unwrap();
    child.wait().unwrap();

    let started: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(started["session"], "demo");
    let port = started["port"].as_u64().unwrap();
    assert!(port > 0);
    assert_eq!(
        started["url"],
        format!("http://localhost:{}/mcp", port).as_str()
    );
}
