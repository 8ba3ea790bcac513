//! Unit tests for the poll-wait loop.

use super::*;
use crate::test_support::ManualClock;
use rstest::{fixture, rstest};
use std::cell::Cell;

#[derive(Debug, Error, PartialEq, Eq)]
enum CheckError {
    #[error("transient")]
    Transient,
    #[error("fatal")]
    Fatal,
}

#[fixture]
fn clock() -> ManualClock {
    ManualClock::new()
}

fn options(timeout_secs: u64, sleep_secs: u64) -> WaitOptions {
    WaitOptions::new(Duration::from_secs(timeout_secs))
        .sleep(Duration::from_secs(sleep_secs))
        .waiting_for("check")
}

#[rstest]
fn returns_structured_value_after_three_misses(clock: ManualClock) {
    let waiter = Waiter::with_clock(clock.clone());
    let calls = Cell::new(0_u32);

    let value = waiter
        .until(&options(10, 1), || {
            calls.set(calls.get() + 1);
            let ready = calls.get() > 3;
            Ok::<_, CheckError>(ready.then(|| serde_json::json!({ "done": true })))
        })
        .expect("wait should succeed");

    assert_eq!(value, serde_json::json!({ "done": true }));
    assert_eq!(calls.get(), 4);
    assert_eq!(clock.elapsed(), Duration::from_secs(3));
}

#[rstest]
fn boolean_predicate_yields_true(clock: ManualClock) {
    let waiter = Waiter::with_clock(clock);
    let value = waiter
        .until(&options(5, 1), || Ok::<_, CheckError>(true))
        .expect("wait should succeed");
    assert!(value);
}

#[rstest]
fn zero_timeout_still_evaluates_predicate(clock: ManualClock) {
    let waiter = Waiter::with_clock(clock.clone());
    let calls = Cell::new(0_u32);

    let err = waiter
        .until(&options(0, 1), || {
            calls.set(calls.get() + 1);
            Ok::<_, CheckError>(false)
        })
        .expect_err("zero timeout should time out");

    assert_eq!(calls.get(), 1);
    assert!(err.is_timeout(), "unexpected error: {err}");
    assert_eq!(clock.elapsed(), Duration::ZERO);
}

#[rstest]
fn zero_timeout_returns_ready_value(clock: ManualClock) {
    let waiter = Waiter::with_clock(clock);
    let value = waiter
        .until(&options(0, 1), || Ok::<_, CheckError>(Some(7_u8)))
        .expect("first attempt is ready");
    assert_eq!(value, 7);
}

#[rstest]
#[case::aligned(10, 1)]
#[case::coarse_sleep(10, 3)]
#[case::sleep_longer_than_timeout(2, 5)]
fn tolerated_errors_time_out_near_deadline(
    clock: ManualClock,
    #[case] timeout_secs: u64,
    #[case] sleep_secs: u64,
) {
    let waiter = Waiter::with_clock(clock.clone());

    let err = waiter
        .until_tolerating(
            &options(timeout_secs, sleep_secs),
            |err: &CheckError| *err == CheckError::Transient,
            || Err::<bool, _>(CheckError::Transient),
        )
        .expect_err("tolerated errors must not satisfy the wait");

    let WaitError::Timeout {
        waiting_for,
        elapsed,
        attempts,
    } = err
    else {
        panic!("expected timeout, got {err:?}");
    };
    let timeout = Duration::from_secs(timeout_secs);
    let sleep = Duration::from_secs(sleep_secs);
    assert_eq!(waiting_for, "check");
    assert!(elapsed >= timeout, "elapsed {elapsed:?} below timeout");
    assert!(elapsed <= timeout + sleep, "elapsed {elapsed:?} overshoots");
    assert!(attempts >= 1);
}

#[rstest]
fn untolerated_error_propagates_immediately(clock: ManualClock) {
    let waiter = Waiter::with_clock(clock.clone());
    let calls = Cell::new(0_u32);

    let err = waiter
        .until_tolerating(
            &options(30, 1),
            |err: &CheckError| *err == CheckError::Transient,
            || {
                calls.set(calls.get() + 1);
                if calls.get() == 1 {
                    Err::<bool, _>(CheckError::Transient)
                } else {
                    Err(CheckError::Fatal)
                }
            },
        )
        .expect_err("fatal error should abort");

    assert!(
        matches!(
            err,
            WaitError::Failed {
                source: CheckError::Fatal,
                ..
            }
        ),
        "unexpected error: {err:?}"
    );
    assert_eq!(calls.get(), 2);
    assert_eq!(clock.elapsed(), Duration::from_secs(1));
}

#[rstest]
fn until_treats_every_error_as_fatal(clock: ManualClock) {
    let waiter = Waiter::with_clock(clock);
    let err = waiter
        .until(&options(30, 1), || Err::<bool, _>(CheckError::Transient))
        .expect_err("plain wait should not tolerate errors");
    assert!(matches!(err, WaitError::Failed { .. }));
    assert!(err.to_string().contains("check"), "message: {err}");
}

#[rstest]
fn sleeps_are_capped_by_remaining_time(clock: ManualClock) {
    let waiter = Waiter::with_clock(clock.clone());
    let result = waiter.until(&options(4, 3), || Ok::<_, CheckError>(false));

    assert!(result.is_err());
    assert_eq!(
        clock.sleeps(),
        vec![Duration::from_secs(3), Duration::from_secs(1)]
    );
}

#[rstest]
#[case(1, 1)]
#[case(2, 5)]
#[case(3, 25)]
#[case(4, 60)]
#[case(9, 60)]
fn backoff_grows_and_caps(#[case] attempt: u32, #[case] expected_secs: u64) {
    let schedule = SleepSchedule::Backoff {
        initial: Duration::from_secs(1),
        max: Duration::from_secs(60),
        factor: 5,
    };
    assert_eq!(schedule.delay(attempt), Duration::from_secs(expected_secs));
}

#[test]
fn backoff_survives_overflowing_exponent() {
    let schedule = SleepSchedule::Backoff {
        initial: Duration::from_secs(1),
        max: Duration::from_secs(60),
        factor: 5,
    };
    assert_eq!(schedule.delay(u32::MAX), Duration::from_secs(60));
}

#[rstest]
fn backoff_schedule_drives_sleeps(clock: ManualClock) {
    let waiter = Waiter::with_clock(clock.clone());
    let options = WaitOptions::new(Duration::from_secs(100)).backoff(
        Duration::from_secs(1),
        Duration::from_secs(60),
        5,
    );
    let calls = Cell::new(0_u32);

    let value = waiter
        .until(&options, || {
            calls.set(calls.get() + 1);
            Ok::<_, CheckError>(calls.get() == 4)
        })
        .expect("fourth attempt is ready");

    assert!(value);
    assert_eq!(
        clock.sleeps(),
        vec![
            Duration::from_secs(1),
            Duration::from_secs(5),
            Duration::from_secs(25)
        ]
    );
}

#[test]
fn timeout_message_names_label() {
    let err: WaitError<CheckError> = WaitError::Timeout {
        waiting_for: String::from("nova computes"),
        elapsed: Duration::from_secs(12),
        attempts: 4,
    };
    assert_eq!(
        err.to_string(),
        "timed out after 12s waiting for nova computes (4 attempts)"
    );
}
