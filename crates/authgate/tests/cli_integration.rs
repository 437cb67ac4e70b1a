//! CLI integration tests for the authgate binary.
//!
//! Only parsing and `--check-config` are exercised; nothing here binds a
//! port.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// The authgate binary with a clean environment rooted in `dir`, so no
/// user or project config leaks in.
fn authgate(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("authgate").unwrap();
    cmd.env_clear()
        .env("AUTHGATE_CONFIG_DIR", dir)
        .env("RUST_LOG", "error")
        .current_dir(dir);
    cmd
}

const VALID_CONFIG: &str = r#"
[upstream]
target = "http://localhost:3000"

[cookie]
seed = "0123456789abcdefghijklmnopqrstuv"
key = "0123456789abcdef"

[provider]
client_id = "id"
client_secret = "secret"
callback_url = "https://app.example.com/auth/google/callback"
"#;

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_displays() {
    let dir = TempDir::new().unwrap();
    authgate(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("authgate"))
        .stdout(predicate::str::contains("--check-config"))
        .stdout(predicate::str::contains("--target"));
}

#[test]
fn test_version_displays() {
    let dir = TempDir::new().unwrap();
    authgate(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("authgate"));
}

#[test]
fn test_invalid_log_format_rejected() {
    let dir = TempDir::new().unwrap();
    authgate(dir.path())
        .args(["--log-format", "xml", "--check-config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Config Check Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_check_config_without_secrets_fails() {
    let dir = TempDir::new().unwrap();
    authgate(dir.path())
        .arg("--check-config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cookie.seed"));
}

#[test]
fn test_check_config_with_project_file() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("authgate.toml"), VALID_CONFIG).unwrap();

    authgate(dir.path())
        .arg("--check-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration OK"))
        .stdout(predicate::str::contains("authgate.toml"));
}

#[test]
fn test_check_config_from_environment() {
    let dir = TempDir::new().unwrap();
    authgate(dir.path())
        .arg("--check-config")
        .env("TARGET", "localhost:3000")
        .env("COOKIE_SEED", "0123456789abcdefghijklmnopqrstuv")
        .env("COOKIE_KEY", "0123456789abcdef0123456789abcdef")
        .env("GOOGLE_OAUTH_CLIENT_ID", "id")
        .env("GOOGLE_OAUTH_CLIENT_SECRET", "secret")
        .env("GOOGLE_OAUTH_CALLBACK_URL", "https://app/auth/google/callback")
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration OK"));
}

#[test]
fn test_check_config_rejects_bad_key_length() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("authgate.toml"), VALID_CONFIG).unwrap();

    authgate(dir.path())
        .arg("--check-config")
        .env("COOKIE_KEY", "0123456789abcde")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cookie.key"));
}

#[test]
fn test_explicit_config_must_exist() {
    let dir = TempDir::new().unwrap();
    authgate(dir.path())
        .args(["--config", "missing.toml", "--check-config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing.toml"));
}

#[test]
fn test_cli_target_overrides_file() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("authgate.toml"), VALID_CONFIG).unwrap();

    authgate(dir.path())
        .args(["--target", "ftp://nope", "--check-config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("upstream.target"));
}
