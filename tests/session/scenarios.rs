//! BDD scenarios for SSH sessions.

use rstest_bdd_macros::scenario;

use super::test_helpers::{SessionContext, session_context};

#[scenario(
    path = "tests/features/session.feature",
    name = "Offer private keys in the configured order"
)]
fn scenario_keys_in_order(session_context: SessionContext) {
    let _ = session_context;
}

#[scenario(
    path = "tests/features/session.feature",
    name = "Keep the password out of the argument vector"
)]
fn scenario_password_in_env(session_context: SessionContext) {
    let _ = session_context;
}

#[scenario(
    path = "tests/features/session.feature",
    name = "Release the session after a strict failure"
)]
fn scenario_strict_failure_releases(session_context: SessionContext) {
    let _ = session_context;
}

#[scenario(
    path = "tests/features/session.feature",
    name = "Report a refused connection"
)]
fn scenario_refused_connection(session_context: SessionContext) {
    let _ = session_context;
}
