//! Shared E2E test helpers for `smgr` binary tests.

#![allow(dead_code)]

use assert_cmd::cargo::cargo_bin_cmd;
use std::time::Duration;

/// Default timeout for CLI tests.
pub const TIMEOUT_BASIC: Duration = Duration::from_secs(10);

/// Environment variables read by the config loader.
const SMGR_ENV_VARS: &[&str] = &[
    "SMGR_ENABLED",
    "SMGR_PROMPT_TESTING",
    "SMGR_PROMPT_TESTING_ALLOW",
    "SMGR_DEFAULT_QUOTA",
    "RUST_LOG",
];

/// Build a Command for the `smgr` binary isolated from the user's config.
///
/// HOME and the project root both point at a fresh temp directory, and
/// `SMGR_*` variables are cleared. Returns (command, _guard); keep the
/// guard alive for the test's duration.
pub fn smgr_cmd() -> (assert_cmd::Command, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("create temp dir for config");
    let cmd = smgr_cmd_in(tmp.path());
    (cmd, tmp)
}

/// Build an isolated Command whose HOME and project root are `dir`.
pub fn smgr_cmd_in(dir: &std::path::Path) -> assert_cmd::Command {
    let mut cmd: assert_cmd::Command = cargo_bin_cmd!("smgr");
    cmd.timeout(TIMEOUT_BASIC);
    for var in SMGR_ENV_VARS {
        cmd.env_remove(var);
    }
    cmd.env("HOME", dir);
    cmd.args(["-C", dir.to_str().expect("valid utf8")]);
    cmd
}

/// Writes `<dir>/.smgr/config.toml`.
pub fn write_project_config(dir: &std::path::Path, toml: &str) {
    let config_dir = dir.join(".smgr");
    std::fs::create_dir_all(&config_dir).expect("create .smgr dir");
    std::fs::write(config_dir.join("config.toml"), toml).expect("write config.toml");
}
