//! Binary behavior that needs no AWS access: settings validation and
//! trigger rejection.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

const VALID_ENV: [(&str, &str); 7] = [
    ("ROTATION_PERIOD", "90"),
    ("INSTALLATION_GRACE_PERIOD", "7"),
    ("RECOVERY_GRACE_PERIOD", "7"),
    ("PENDING_ACTION_WARN_PERIOD", "5"),
    ("IAM_EXEMPTION_GROUP", "key-rotation-exempt"),
    ("EMAIL_TEMPLATE_AUDIT", "audit.html"),
    ("EMAIL_TEMPLATE_ENFORCE", "enforce.html"),
];

fn keycycle() -> Command {
    let mut cmd = Command::cargo_bin("keycycle").unwrap();
    cmd.env_clear().env("KEYCYCLE_LOG", "error");
    cmd
}

fn configured() -> Command {
    let mut cmd = keycycle();
    cmd.envs(VALID_ENV);
    cmd
}

#[test]
fn check_config_accepts_environment_settings() {
    configured()
        .arg("check-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("settings ok"))
        .stdout(predicate::str::contains("rotation_period:            90 days"))
        .stdout(predicate::str::contains("role_session_name:          keycycle"))
        .stdout(predicate::str::contains("(ambient credentials)"));
}

#[test]
fn check_config_rejects_zero_rotation_period() {
    configured()
        .env("ROTATION_PERIOD", "0")
        .arg("check-config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid settings"));
}

#[test]
fn check_config_reports_missing_required_setting() {
    keycycle()
        .env("ROTATION_PERIOD", "90")
        .arg("check-config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid settings"));
}

#[test]
fn environment_overrides_config_file() {
    // GIVEN a settings file and one overriding environment variable
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keycycle.toml");
    fs::write(
        &path,
        r#"
rotation_period = 60
installation_grace_period = 7
recovery_grace_period = 14
pending_action_warn_period = 3
iam_exemption_group = "exempt"
email_template_audit = "audit.html"
email_template_enforce = "enforce.html"
iam_assumed_role_name = "KeyRotation"
"#,
    )
    .unwrap();

    // WHEN checking with both sources
    keycycle()
        .env("RECOVERY_GRACE_PERIOD", "30")
        .arg("--config")
        .arg(&path)
        .arg("check-config")
        .assert()
        // THEN file values load and the environment wins
        .success()
        .stdout(predicate::str::contains("rotation_period:            60 days"))
        .stdout(predicate::str::contains("recovery_grace_period:      30 days"))
        .stdout(predicate::str::contains("iam_assumed_role_name:      KeyRotation"));
}

#[test]
fn missing_config_file_is_fatal() {
    configured()
        .args(["--config", "/nonexistent/keycycle.toml", "check-config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn malformed_trigger_is_rejected_before_any_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("event.json");
    fs::write(&path, r#"{"account": "111122223333"}"#).unwrap();

    configured()
        .args(["run", "--event"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing name, email"));
}

#[test]
fn malformed_trigger_on_stdin_is_rejected() {
    configured()
        .args(["run", "--event", "-"])
        .write_stdin(r#"[{"account": "111122223333", "name": "sandbox", "email": ""}]"#)
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing email"));
}

#[test]
fn run_needs_an_event_or_an_account() {
    configured().arg("run").assert().failure().code(2);
}

#[test]
fn event_and_account_flags_conflict() {
    configured()
        .args(["run", "--event", "-", "--account", "111122223333"])
        .assert()
        .failure()
        .code(2);
}
