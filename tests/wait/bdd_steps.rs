//! BDD step definitions for poll-wait behaviour.

use std::time::Duration;

use fuelcheck::{SshError, WaitError, WaitOptions, Waiter};
use rstest_bdd_macros::{given, then, when};

use super::test_helpers::{WaitContext, command_failed, connection_refused};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn options(timeout: u64, sleep: u64) -> WaitOptions {
    WaitOptions::new(Duration::from_secs(timeout))
        .sleep(Duration::from_secs(sleep))
        .waiting_for("scripted check")
}

#[given("a check that is not ready {misses:u32} times and then returns \"{value}\"")]
fn check_ready_after_misses(wait_context: &WaitContext, misses: u32, value: String) {
    let mut answers = wait_context.answers.borrow_mut();
    for _ in 0..misses {
        answers.push_back(Ok(None));
    }
    answers.push_back(Ok(Some(value)));
}

#[given("a check that always fails to connect")]
fn check_always_refused(wait_context: &WaitContext) {
    wait_context
        .answers
        .borrow_mut()
        .push_back(Err(connection_refused()));
}

#[given("a check that fails to connect once and then fails a command")]
fn check_then_command_error(wait_context: &WaitContext) {
    let mut answers = wait_context.answers.borrow_mut();
    answers.push_back(Err(connection_refused()));
    answers.push_back(Err(command_failed()));
}

#[when("I poll the check for {timeout:u64} seconds every {sleep:u64} seconds")]
fn poll_check(wait_context: &WaitContext, timeout: u64, sleep: u64) {
    let waiter = Waiter::with_clock(wait_context.clock.clone());
    let result = waiter.until(&options(timeout, sleep), || wait_context.check());
    *wait_context.outcome.borrow_mut() = Some(result);
}

#[when("I poll the check tolerating connection errors for {timeout:u64} seconds every {sleep:u64} seconds")]
fn poll_check_tolerating(wait_context: &WaitContext, timeout: u64, sleep: u64) {
    let waiter = Waiter::with_clock(wait_context.clock.clone());
    let result = waiter.until_tolerating(
        &options(timeout, sleep),
        SshError::is_connection,
        || wait_context.check(),
    );
    *wait_context.outcome.borrow_mut() = Some(result);
}

#[then("the wait returns \"{value}\"")]
fn wait_returns(wait_context: &WaitContext, value: String) -> Result<(), StepError> {
    match wait_context.outcome.borrow().as_ref() {
        Some(Ok(actual)) if *actual == value => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected {value}, got {other:?}"
        ))),
    }
}

#[then("{seconds:u64} seconds of virtual time have passed")]
fn virtual_time_passed(wait_context: &WaitContext, seconds: u64) -> Result<(), StepError> {
    let elapsed = wait_context.clock.elapsed();
    if elapsed == Duration::from_secs(seconds) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {seconds}s elapsed, got {elapsed:?}"
        )))
    }
}

#[then("the wait times out after {attempts:u32} attempts")]
fn wait_times_out(wait_context: &WaitContext, attempts: u32) -> Result<(), StepError> {
    match wait_context.outcome.borrow().as_ref() {
        Some(Err(WaitError::Timeout {
            attempts: actual, ..
        })) if *actual == attempts => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected timeout after {attempts} attempts, got {other:?}"
        ))),
    }
}

#[then("the wait fails with the command error")]
fn wait_fails_with_command_error(wait_context: &WaitContext) -> Result<(), StepError> {
    match wait_context.outcome.borrow().as_ref() {
        Some(Err(WaitError::Failed {
            source: SshError::Command { status, .. },
            ..
        })) if *status == Some(1) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected command failure, got {other:?}"
        ))),
    }
}

#[then("the check ran {count:u32} times")]
fn check_ran(wait_context: &WaitContext, count: u32) -> Result<(), StepError> {
    let calls = wait_context.calls.get();
    if calls == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} check calls, got {calls}"
        )))
    }
}
