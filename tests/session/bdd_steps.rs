//! BDD step definitions for SSH session behaviour.

use fuelcheck::ssh::SSHPASS_ENV;
use fuelcheck::{Credentials, SshError};
use rstest_bdd_macros::{given, then, when};

use super::test_helpers::{SessionContext, args_of};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("key credentials \"{first}\" and \"{second}\" for user \"{user}\"")]
fn key_credentials(session_context: &SessionContext, first: String, second: String, user: String) {
    *session_context.credentials.borrow_mut() =
        Some(Credentials::private_keys(user, [first, second]));
}

#[given("password credentials \"{password}\" for user \"{user}\"")]
fn password_credentials(session_context: &SessionContext, password: String, user: String) {
    *session_context.credentials.borrow_mut() = Some(Credentials::password(user, password));
}

#[given("the remote command exits with status {code:i32} and prints \"{stdout}\"")]
fn remote_command_exits(session_context: &SessionContext, code: i32, stdout: String) {
    session_context
        .runner
        .push_session(code, format!("{stdout}\n"), "remote failure\n");
}

#[given("the host refuses the connection")]
fn host_refuses(session_context: &SessionContext) {
    session_context
        .runner
        .push_output(Some(255), "", "ssh: connect to host 10.20.0.3 port 22: Connection refused");
}

#[when("I run \"{command}\" on \"{host}\"")]
fn run_command(session_context: &SessionContext, command: String, host: String) {
    let result =
        session_context
            .executor()
            .execute(&host, &session_context.credentials(), &command);
    *session_context.outcome.borrow_mut() = Some(result);
}

#[when("I run \"{command}\" strictly on \"{host}\"")]
fn run_command_strictly(session_context: &SessionContext, command: String, host: String) {
    let result =
        session_context
            .executor()
            .check_call(&host, &session_context.credentials(), &command);
    *session_context.outcome.borrow_mut() = Some(result);
}

#[then("the run prints \"{line}\"")]
fn run_prints(session_context: &SessionContext, line: String) -> Result<(), StepError> {
    match session_context.outcome.borrow().as_ref() {
        Some(Ok(result)) if result.stdout_string().trim_end() == line => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected stdout {line}, got {other:?}"
        ))),
    }
}

#[then("the run fails with exit status {code:i32}")]
fn run_fails_with_status(session_context: &SessionContext, code: i32) -> Result<(), StepError> {
    match session_context.outcome.borrow().as_ref() {
        Some(Err(SshError::Command { status, .. })) if *status == Some(code) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected exit status {code}, got {other:?}"
        ))),
    }
}

#[then("the run fails to connect")]
fn run_fails_to_connect(session_context: &SessionContext) -> Result<(), StepError> {
    match session_context.outcome.borrow().as_ref() {
        Some(Err(err)) if err.is_connection() => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected connection failure, got {other:?}"
        ))),
    }
}

#[then("the session was released {count:usize} times")]
fn session_released(session_context: &SessionContext, count: usize) -> Result<(), StepError> {
    let released = session_context.runner.release_count();
    if released == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} releases, got {released}"
        )))
    }
}

#[then("the master connection offers \"{first}\" before \"{second}\"")]
fn keys_offered_in_order(
    session_context: &SessionContext,
    first: String,
    second: String,
) -> Result<(), StepError> {
    let args = args_of(&session_context.master_call());
    let first_at = args.iter().position(|arg| *arg == first);
    let second_at = args.iter().position(|arg| *arg == second);
    match (first_at, second_at) {
        (Some(a), Some(b)) if a < b && args.iter().any(|arg| arg == "IdentitiesOnly=yes") => {
            Ok(())
        }
        _ => Err(StepError::Assertion(format!(
            "keys not offered in order: {args:?}"
        ))),
    }
}

#[then("no argument mentions \"{secret}\"")]
fn no_argument_mentions(session_context: &SessionContext, secret: String) -> Result<(), StepError> {
    let leaked = session_context
        .runner
        .invocations()
        .iter()
        .flat_map(args_of)
        .any(|arg| arg.contains(&secret));
    if leaked {
        Err(StepError::Assertion(String::from(
            "secret leaked into an argument vector",
        )))
    } else {
        Ok(())
    }
}

#[then("the master connection reads \"{secret}\" from the sshpass environment")]
fn password_in_env(session_context: &SessionContext, secret: String) -> Result<(), StepError> {
    let call = session_context.master_call();
    let in_env = call
        .env
        .iter()
        .any(|(key, value)| key == SSHPASS_ENV && *value == secret);
    if call.program == "sshpass" && in_env {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "password not passed through {SSHPASS_ENV}: {call:?}"
        )))
    }
}
