//! CLI integration tests using assert_cmd.
//!
//! Tests without database: always run (help, arg validation, startup checks).
//! Tests with database: gated on TEST_DATABASE_URL environment variable.

#[macro_use]
mod common;

use assert_cmd::Command;
use predicates::prelude::*;

const SERVER_ENV: [&str; 8] = [
    "ADMIN_PASSWORD",
    "ADMIN_PASSWORD_HASH",
    "ADMIN_USERNAME",
    "SESSION_SECRET",
    "ENVIRONMENT",
    "SESSION_TTL_HOURS",
    "PORT",
    "DATABASE_URL",
];

/// The binary with every server setting cleared from the environment.
#[allow(deprecated)]
fn ai_tutor() -> Command {
    let mut cmd = Command::cargo_bin("ai-tutor").unwrap();
    for var in SERVER_ENV {
        cmd.env_remove(var);
    }
    cmd
}

// --- Help and arg validation (no database needed) ---

#[test]
fn help_shows_all_subcommands() {
    ai_tutor().arg("--help").assert().success().stdout(
        predicate::str::contains("serve")
            .and(predicate::str::contains("migrate"))
            .and(predicate::str::contains("rollback"))
            .and(predicate::str::contains("migrate-status"))
            .and(predicate::str::contains("hash-password")),
    );
}

#[test]
fn help_serve_shows_settings() {
    ai_tutor()
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("--port")
                .and(predicate::str::contains("--admin-password"))
                .and(predicate::str::contains("--session-secret"))
                .and(predicate::str::contains("--migrate")),
        );
}

#[test]
fn hash_password_prints_sha256_hex() {
    ai_tutor()
        .args(["hash-password", "secret"])
        .assert()
        .success()
        .stdout("2bb80d537b1da3e38bd30361aa855686bde0eacd7162fef6a25fe97bf527a25b\n");
}

#[test]
fn unknown_subcommand_fails() {
    ai_tutor().arg("nonexistent").assert().failure();
}

#[test]
fn rollback_rejects_both_targets() {
    ai_tutor()
        .args(["--database-url", "postgres://fake/db", "rollback", "--to", "0", "--steps", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn missing_database_url_fails() {
    ai_tutor()
        .arg("migrate-status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("DATABASE_URL is required"));
}

// --- Startup configuration checks (fail before connecting) ---

#[test]
fn serve_without_admin_password_fails() {
    ai_tutor()
        .args(["--database-url", "postgres://u:p@127.0.0.1:1/none", "serve"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no admin password configured"));
}

#[test]
fn serve_in_prod_requires_session_secret() {
    ai_tutor()
        .args([
            "--database-url",
            "postgres://u:p@127.0.0.1:1/none",
            "serve",
            "--environment",
            "PROD",
            "--admin-password",
            "pw",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("SESSION_SECRET is required in PROD"));
}

#[test]
fn serve_rejects_malformed_password_hash() {
    ai_tutor()
        .args(["--database-url", "postgres://u:p@127.0.0.1:1/none", "serve"])
        .env("ADMIN_PASSWORD_HASH", "not-hex")
        .assert()
        .failure()
        .stderr(predicate::str::contains("64 hex characters"));
}

// --- With database ---

#[test]
fn migrate_then_status_reports_applied() {
    require_db!();
    let url = common::test_db_url();
    ai_tutor().args(["--database-url", &url, "migrate"]).assert().success();
    ai_tutor()
        .args(["--database-url", &url, "migrate-status"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("applied")
                .and(predicate::str::contains("core schema"))
                .and(predicate::str::contains("pending").not()),
        );
}
