//! Behavioural tests for `fuelcheck exec`, driven through the fake execution
//! modes compiled in with the `test-backdoors` feature.

use std::sync::LazyLock;

use escargot::CargoBuild;
use predicates::str::contains;
use rstest::rstest;

#[expect(
    clippy::expect_used,
    reason = "test setup requires panic on build failure"
)]
static FUELCHECK_BIN: LazyLock<escargot::CargoRun> = LazyLock::new(|| {
    CargoBuild::new()
        .bin("fuelcheck")
        .features("test-backdoors")
        .run()
        .expect("failed to build fuelcheck with test-backdoors feature")
});

fn fuelcheck_cmd(mode: &str) -> assert_cmd::Command {
    let mut cmd: assert_cmd::Command = FUELCHECK_BIN.command().into();
    cmd.env("FUELCHECK_FAKE_EXEC_MODE", mode);
    cmd
}

#[test]
fn exec_renders_escaped_remote_command() {
    let mut cmd = fuelcheck_cmd("echo");
    cmd.args(["exec", "--fqdn", "node-1.test.domain.local", "--", "ls", "a b", "c'd"]);

    cmd.assert()
        .success()
        .stdout(contains("node-1.test.domain.local: ls 'a b' 'c'\\''d'"));
}

#[test]
fn exec_propagates_remote_exit_status_and_streams_output() {
    let mut cmd = fuelcheck_cmd("exit-7");
    cmd.args(["exec", "--role", "compute", "--", "false"]);

    cmd.assert()
        .code(7)
        .stdout(contains("fake-stdout"))
        .stderr(contains("fake-stderr"));
}

#[rstest]
#[case::strict_failure("strict-failure", "exited with status 3")]
#[case::no_targets("no-targets", "no nodes matched role mongo")]
fn exec_reports_failures_with_exit_code_one(#[case] mode: &str, #[case] message: &str) {
    let mut cmd = fuelcheck_cmd(mode);
    cmd.args(["exec", "--role", "mongo", "--strict", "--", "false"]);

    cmd.assert().failure().code(1).stderr(contains(message));
}

#[test]
fn exec_requires_exactly_one_target() {
    let mut cmd = fuelcheck_cmd("echo");
    cmd.args(["exec", "--", "uptime"]);

    cmd.assert().failure().code(2);
}
