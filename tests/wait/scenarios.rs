//! BDD scenarios for poll-wait.

use rstest_bdd_macros::scenario;

use super::test_helpers::{WaitContext, wait_context};

#[scenario(
    path = "tests/features/wait.feature",
    name = "Return the ready value after repeated misses"
)]
fn scenario_ready_after_misses(wait_context: WaitContext) {
    let _ = wait_context;
}

#[scenario(
    path = "tests/features/wait.feature",
    name = "Check once even with a zero timeout"
)]
fn scenario_zero_timeout(wait_context: WaitContext) {
    let _ = wait_context;
}

#[scenario(
    path = "tests/features/wait.feature",
    name = "Time out while connection errors are tolerated"
)]
fn scenario_tolerated_errors_time_out(wait_context: WaitContext) {
    let _ = wait_context;
}

#[scenario(
    path = "tests/features/wait.feature",
    name = "Stop at the first untolerated error"
)]
fn scenario_untolerated_error_propagates(wait_context: WaitContext) {
    let _ = wait_context;
}
