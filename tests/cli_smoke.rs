//! Behavioural smoke test for the CLI entrypoint.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;

#[test]
fn cli_without_arguments_prints_usage() {
    let mut cmd = cargo_bin_cmd!("fuelcheck");
    cmd.assert()
        .failure()
        .stdout("")
        .stderr(contains("Usage"));
}

#[test]
fn cli_lists_subcommands_in_help() {
    let mut cmd = cargo_bin_cmd!("fuelcheck");
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(contains("nodes"))
        .stdout(contains("exec"))
        .stdout(contains("wait-ready"));
}

#[test]
fn cli_rejects_control_characters_before_loading_configuration() {
    let mut cmd = cargo_bin_cmd!("fuelcheck");
    cmd.args(["exec", "--role", "compute", "--", "echo", "bad\nline"]);
    cmd.assert()
        .failure()
        .code(1)
        .stderr(contains("control characters"));
}
