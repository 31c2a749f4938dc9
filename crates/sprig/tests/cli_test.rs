//! Integration tests for the `sprig` CLI binary.
//!
//! Every test runs against its own temporary catalog and preference
//! file. Telemetry points at a closed port unless a mock server is used.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `sprig` binary isolated in `dir`.
///
/// Clears `SPRIG_*` variables and points config and data directories at
/// the temp dir so tests never touch the user's real files.
fn sprig_cmd(dir: &TempDir) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("sprig");
    cmd.env("HOME", dir.path())
        .env("XDG_CONFIG_HOME", dir.path().join("config"))
        .env("XDG_DATA_HOME", dir.path().join("data"))
        .env_remove("SPRIG_CONFIG")
        .env_remove("SPRIG_OUTPUT")
        .env_remove("RUST_LOG")
        .env("SPRIG_STORAGE__DATABASE", dir.path().join("catalog.db"))
        .env("SPRIG_STORAGE__PREFERENCES", dir.path().join("prefs.json"))
        .env("SPRIG_TELEMETRY__BASE_URL", "http://127.0.0.1:9/")
        .env("SPRIG_TELEMETRY__OWNER", "tester")
        .env("SPRIG_TELEMETRY__TIMEOUT_SECS", "2");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn json_stdout(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

fn add_plant(dir: &TempDir, name: &str) -> String {
    let output = sprig_cmd(dir)
        .args(["-o", "plain", "add", name])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    String::from_utf8_lossy(&output.stdout).trim().to_owned()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let dir = tempfile::tempdir().unwrap();
    let output = sprig_cmd(&dir).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    assert!(combined_output(&output).contains("Usage"));
}

#[test]
fn test_help_flag() {
    let dir = tempfile::tempdir().unwrap();
    sprig_cmd(&dir).arg("--help").assert().success().stdout(
        predicate::str::contains("plants")
            .and(predicate::str::contains("bind"))
            .and(predicate::str::contains("alias"))
            .and(predicate::str::contains("watch")),
    );
}

#[test]
fn test_version_flag() {
    let dir = tempfile::tempdir().unwrap();
    sprig_cmd(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sprig"));
}

#[test]
fn test_completions_zsh() {
    let dir = tempfile::tempdir().unwrap();
    sprig_cmd(&dir)
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_invalid_subcommand() {
    let dir = tempfile::tempdir().unwrap();
    let output = sprig_cmd(&dir).arg("prune").output().unwrap();
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("prune"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honors_flag() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("custom.toml");
    sprig_cmd(&dir)
        .args(["--config", file.to_str().unwrap(), "config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.toml"));
}

#[test]
fn test_config_show_merges_file_and_env() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("sprig.toml");
    std::fs::write(&file, "[sync]\nrecent_limit = 9\n").unwrap();

    let output = sprig_cmd(&dir)
        .args(["--config", file.to_str().unwrap(), "-o", "json", "config", "show"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let cfg = json_stdout(&output);
    assert_eq!(cfg["telemetry"]["owner"], "tester");
    assert_eq!(cfg["sync"]["recent_limit"], 9);
}

#[test]
fn test_config_init_requires_terminal() {
    let dir = tempfile::tempdir().unwrap();
    let output = sprig_cmd(&dir).args(["config", "init"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("interactive"));
}

#[test]
fn test_invalid_base_url_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = sprig_cmd(&dir)
        .env("SPRIG_TELEMETRY__BASE_URL", "not a url")
        .arg("list")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("base_url"));
}

// ── Plants ──────────────────────────────────────────────────────────

#[test]
fn test_add_then_list() {
    let dir = tempfile::tempdir().unwrap();
    sprig_cmd(&dir)
        .args([
            "add",
            "Monstera deliciosa",
            "--nickname",
            "Monty",
            "--location",
            "Porch",
        ])
        .assert()
        .success();

    let output = sprig_cmd(&dir).args(["-o", "json", "list"]).output().unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let plants = json_stdout(&output);
    let plants = plants.as_array().unwrap();
    assert_eq!(plants.len(), 1);
    assert_eq!(plants[0]["entity"]["nickname"], "Monty");
    assert_eq!(plants[0]["entity"]["location"], "Porch");
    assert!(plants[0]["readings"]["temperature"].is_null());
}

#[test]
fn test_list_table_shows_unknown_readings() {
    let dir = tempfile::tempdir().unwrap();
    add_plant(&dir, "Ficus lyrata");
    sprig_cmd(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Ficus lyrata").and(predicate::str::contains("--")));
}

#[test]
fn test_rename_and_clear_nickname() {
    let dir = tempfile::tempdir().unwrap();
    let id = add_plant(&dir, "Ficus lyrata");

    sprig_cmd(&dir).args(["rename", &id, "Fiddle"]).assert().success();
    sprig_cmd(&dir)
        .arg("list")
        .assert()
        .stdout(predicate::str::contains("Fiddle"));

    sprig_cmd(&dir).args(["rename", &id]).assert().success();
    let output = sprig_cmd(&dir).args(["-o", "json", "list"]).output().unwrap();
    assert!(json_stdout(&output)[0]["entity"]["nickname"].is_null());
}

#[test]
fn test_unknown_plant_exits_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let output = sprig_cmd(&dir)
        .args(["locate", "404", "Attic"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("not found"));
}

#[test]
fn test_blank_name_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let output = sprig_cmd(&dir).args(["add", "   "]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_delete_needs_confirmation() {
    let dir = tempfile::tempdir().unwrap();
    let id = add_plant(&dir, "Aloe vera");

    let output = sprig_cmd(&dir).args(["delete", &id]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));

    sprig_cmd(&dir).args(["-y", "delete", &id]).assert().success();
    let output = sprig_cmd(&dir).args(["-o", "json", "list"]).output().unwrap();
    assert_eq!(json_stdout(&output), serde_json::json!([]));
}

#[test]
fn test_recent_respects_limit() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["Aloe vera", "Basil", "Cactus"] {
        add_plant(&dir, name);
    }
    let output = sprig_cmd(&dir)
        .args(["-o", "plain", "recent", "--limit", "2"])
        .output()
        .unwrap();
    let ids: Vec<String> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_owned)
        .collect();
    assert_eq!(ids, vec!["3".to_owned(), "2".to_owned()]);
}

// ── Devices ─────────────────────────────────────────────────────────

#[test]
fn test_bind_moves_device_and_unreachable_telemetry_degrades() {
    let dir = tempfile::tempdir().unwrap();
    let first = add_plant(&dir, "Aloe vera");
    let second = add_plant(&dir, "Basil");

    sprig_cmd(&dir).args(["bind", &first, "devA"]).assert().success();
    sprig_cmd(&dir)
        .args(["bind", &second, "devA"])
        .assert()
        .success()
        .stderr(predicate::str::contains(format!("unbound from plant {first}")));

    let output = sprig_cmd(&dir).args(["-o", "json", "list"]).output().unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let plants = json_stdout(&output);
    assert!(plants[0]["entity"]["device_id"].is_null());
    assert_eq!(plants[1]["entity"]["device_id"], "devA");
    assert!(plants[1]["readings"]["temperature"].is_null());
    assert!(String::from_utf8_lossy(&output.stderr).contains("devA"));

    sprig_cmd(&dir).args(["unbind", &second]).assert().success();
}

#[test]
fn test_bind_accepts_raw_id_with_parenthesis() {
    let dir = tempfile::tempdir().unwrap();
    let id = add_plant(&dir, "Aloe vera");

    sprig_cmd(&dir)
        .args(["bind", &id, "sensor(2)"])
        .assert()
        .success();

    let output = sprig_cmd(&dir).args(["-o", "json", "list"]).output().unwrap();
    assert_eq!(json_stdout(&output)[0]["entity"]["device_id"], "sensor(2)");
}

#[test]
fn test_alias_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    sprig_cmd(&dir)
        .args(["alias", "set", "dev-1", "Balcony"])
        .assert()
        .success();
    sprig_cmd(&dir)
        .args(["alias", "get", "dev-1"])
        .assert()
        .success()
        .stdout(predicate::str::diff("Balcony\n"));
    sprig_cmd(&dir)
        .args(["alias", "clear", "dev-1"])
        .assert()
        .success();

    let output = sprig_cmd(&dir)
        .args(["alias", "get", "dev-1"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn test_watch_exits_after_count() {
    let dir = tempfile::tempdir().unwrap();
    add_plant(&dir, "Aloe vera");
    sprig_cmd(&dir)
        .args(["-o", "plain", "watch", "--interval", "1", "--count", "2"])
        .timeout(std::time::Duration::from_secs(20))
        .assert()
        .success()
        .stdout(predicate::str::contains("1"));
}

// ── Against a mock telemetry service ────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_devices_and_logs_from_service() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/iot/tester"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!(["devA", "devB"])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/logs/tester/devA"))
        .and(query_param("page_size", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "deviceId": "devA", "temp": 19.0, "moistureDirt": 35.0, "moistureAir": 48.0,
              "createdAt": "2025-03-01T08:00:00Z" },
            { "deviceId": "devA", "temp": 22.5, "moistureDirt": 36.0, "moistureAir": 52.0,
              "createdAt": "2025-03-01T10:00:00Z" }
        ])))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let uri = server.uri();
    let run = move |args: &'static [&'static str]| {
        let mut cmd = sprig_cmd(&dir);
        cmd.env("SPRIG_TELEMETRY__BASE_URL", &uri).args(args);
        cmd
    };

    let mut alias = run(&["alias", "set", "devA", "Kitchen"]);
    let mut devices = run(&["devices"]);
    let mut logs = run(&["logs", "devA", "--limit", "2"]);

    let (alias, devices, logs) = tokio::task::spawn_blocking(move || {
        (
            alias.output().unwrap(),
            devices.output().unwrap(),
            logs.output().unwrap(),
        )
    })
    .await
    .unwrap();

    assert!(alias.status.success(), "{}", combined_output(&alias));

    let table = String::from_utf8_lossy(&devices.stdout);
    assert!(table.contains("Kitchen (devA)"), "{table}");
    assert!(table.contains("devB"), "{table}");

    let history = String::from_utf8_lossy(&logs.stdout);
    let newest = history.find("22.5°C").unwrap();
    let oldest = history.find("19.0°C").unwrap();
    assert!(newest < oldest, "{history}");
}
