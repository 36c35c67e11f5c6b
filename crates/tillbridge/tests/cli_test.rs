//! Integration tests for the `tillbridge` CLI binary.
//!
//! Settings live in per-test temp directories and the simulator runs
//! entirely in-process, so nothing here touches a real configuration,
//! reader, or network.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `tillbridge` binary with env isolation.
fn tillbridge_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("tillbridge");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home)
        .env_remove("RUST_LOG")
        .env_remove("TILLBRIDGE_CONFIG")
        .env_remove("TILLBRIDGE_OUTPUT")
        .env_remove("TILLBRIDGE_PLATFORM")
        .env_remove("TILLBRIDGE_EVENT_BUFFER")
        .env_remove("TILLBRIDGE_WEB__API_BASE")
        .env_remove("TILLBRIDGE_WEB__TIMEOUT");
    cmd
}

fn settings_file(dir: &Path, body: &str) -> String {
    let path = dir.join("config.toml");
    std::fs::write(&path, body).unwrap();
    path.display().to_string()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = tempfile::tempdir().unwrap();
    let output = tillbridge_cmd(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_lists_commands() {
    let home = tempfile::tempdir().unwrap();
    tillbridge_cmd(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("config").and(predicate::str::contains("simulate")));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honours_flag() {
    let home = tempfile::tempdir().unwrap();
    let path = home.path().join("custom.toml");
    tillbridge_cmd(home.path())
        .args(["config", "path", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.toml"));
}

#[test]
fn test_config_init_refuses_to_overwrite() {
    let home = tempfile::tempdir().unwrap();
    let path = home.path().join("settings").join("config.toml");

    tillbridge_cmd(home.path())
        .args(["config", "init", "--platform", "android", "--config"])
        .arg(&path)
        .assert()
        .success();
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains(r#"platform = "android""#), "{written}");

    tillbridge_cmd(home.path())
        .args(["config", "init", "--config"])
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("already exists"));

    tillbridge_cmd(home.path())
        .args(["config", "init", "--force", "--config"])
        .arg(&path)
        .assert()
        .success();
}

#[test]
fn test_config_show_layers_env_over_file() {
    let home = tempfile::tempdir().unwrap();
    let path = settings_file(home.path(), "platform = \"android\"\nevent_buffer = 16\n");

    tillbridge_cmd(home.path())
        .env("TILLBRIDGE_EVENT_BUFFER", "4")
        .args(["config", "show", "-o", "json", "--config", &path])
        .assert()
        .success()
        .stdout(
            predicate::str::contains(r#""platform": "android""#)
                .and(predicate::str::contains(r#""event_buffer": 4"#)),
        );
}

#[test]
fn test_config_show_rejects_invalid_settings() {
    let home = tempfile::tempdir().unwrap();
    let path = settings_file(home.path(), "event_buffer = 0\n");

    tillbridge_cmd(home.path())
        .args(["config", "show", "--config", &path])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("event_buffer"));
}

// ── Simulator ───────────────────────────────────────────────────────

#[test]
fn test_discover_both_merges_backends() {
    let home = tempfile::tempdir().unwrap();
    let output = tillbridge_cmd(home.path())
        .args([
            "simulate", "discover", "--platform", "ios", "--method", "both", "--readers", "2",
            "-o", "plain",
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "{output:?}");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let serials: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        serials,
        ["CHB20-SIM-0001", "CHB20-SIM-0002", "WPE-SIM-0001", "WPE-SIM-0002"]
    );
}

#[test]
fn test_discover_clears_placeholder_battery() {
    let home = tempfile::tempdir().unwrap();
    let output = tillbridge_cmd(home.path())
        .args(["simulate", "discover", "--platform", "android", "--readers", "2", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{output:?}");

    let readers: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(readers[0]["battery_level"], 0.82);
    assert!(readers[1]["battery_level"].is_null());
    assert!(readers[1]["device_software_version"].is_null());
}

#[test]
fn test_discover_on_web_platform_uses_browser_backend() {
    let home = tempfile::tempdir().unwrap();
    tillbridge_cmd(home.path())
        .args(["simulate", "discover", "--readers", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("WPE-SIM-0001").and(predicate::str::contains("CHB20").not()));
}

#[test]
fn test_checkout_bluetooth_succeeds() {
    let home = tempfile::tempdir().unwrap();
    tillbridge_cmd(home.path())
        .args(["simulate", "checkout", "--platform", "ios", "--amount", "2500"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("CHB20-SIM-0001")
                .and(predicate::str::contains("Backend:  native"))
                .and(predicate::str::contains("RequiresCapture"))
                .and(predicate::str::contains("2500 usd"))
                .and(predicate::str::contains("pm_sim_visa")),
        );
}

#[test]
fn test_checkout_internet_routes_to_browser_sdk() {
    let home = tempfile::tempdir().unwrap();
    tillbridge_cmd(home.path())
        .args(["simulate", "checkout", "--platform", "android", "--internet"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("WPE-SIM-0001")
                .and(predicate::str::contains("Backend:  web")),
        );
}

#[test]
fn test_checkout_decline_reports_code() {
    let home = tempfile::tempdir().unwrap();
    tillbridge_cmd(home.path())
        .args(["simulate", "checkout", "--platform", "ios", "--card", "insufficient-funds"])
        .assert()
        .code(4)
        .stderr(
            predicate::str::contains("declined")
                .and(predicate::str::contains("insufficient_funds")),
        );
}
