//! Deadline-driven polling of external state.
//!
//! A predicate is evaluated repeatedly until it reports readiness or the
//! configured timeout elapses. Errors the caller marks as tolerable are
//! treated as "not ready yet"; any other error aborts the wait immediately.
//! The loop is strictly sequential: every attempt blocks on the predicate and
//! then sleeps before the next one.

use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info};

/// Default pause between attempts.
pub const DEFAULT_SLEEP: Duration = Duration::from_secs(1);

/// Label used when the caller does not describe what is awaited.
pub const DEFAULT_WAITING_FOR: &str = "condition";

/// Source of time for the polling loop.
pub trait Clock {
    /// Returns the current instant.
    fn now(&self) -> Instant;

    /// Blocks the caller for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by [`Instant::now`] and [`thread::sleep`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Outcome of a single predicate evaluation.
///
/// `bool` is ready when `true`; `Option<T>` is ready when `Some` and yields
/// the wrapped value unchanged, so structured results survive the wait.
pub trait Readiness {
    /// Value handed back to the caller once the condition holds.
    type Value;

    /// Returns the ready value, or `None` when polling should continue.
    fn into_ready(self) -> Option<Self::Value>;
}

impl Readiness for bool {
    type Value = Self;

    fn into_ready(self) -> Option<Self> {
        self.then_some(true)
    }
}

impl<T> Readiness for Option<T> {
    type Value = T;

    fn into_ready(self) -> Option<T> {
        self
    }
}

/// Pause applied between attempts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SleepSchedule {
    /// Sleep the same duration after every attempt.
    Fixed(Duration),
    /// Start at `initial`, multiply by `factor` after each attempt, and never
    /// exceed `max`.
    Backoff {
        /// Delay after the first attempt.
        initial: Duration,
        /// Upper bound for any single delay.
        max: Duration,
        /// Growth multiplier applied per attempt.
        factor: u32,
    },
}

impl SleepSchedule {
    /// Returns the delay to apply after the given 1-based attempt.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Self::Fixed(duration) => duration,
            Self::Backoff {
                initial,
                max,
                factor,
            } => factor
                .checked_pow(attempt.saturating_sub(1))
                .and_then(|multiplier| initial.checked_mul(multiplier))
                .map_or(max, |delay| delay.min(max)),
        }
    }
}

/// Timeout, sleep schedule, and diagnostic label for a wait.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WaitOptions {
    timeout: Duration,
    sleep: SleepSchedule,
    waiting_for: String,
}

impl WaitOptions {
    /// Creates options with the given timeout and a one second fixed sleep.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            sleep: SleepSchedule::Fixed(DEFAULT_SLEEP),
            waiting_for: DEFAULT_WAITING_FOR.to_owned(),
        }
    }

    /// Uses a fixed pause between attempts.
    #[must_use]
    pub const fn sleep(mut self, interval: Duration) -> Self {
        self.sleep = SleepSchedule::Fixed(interval);
        self
    }

    /// Uses an exponential pause between attempts.
    #[must_use]
    pub const fn backoff(mut self, initial: Duration, max: Duration, factor: u32) -> Self {
        self.sleep = SleepSchedule::Backoff {
            initial,
            max,
            factor,
        };
        self
    }

    /// Describes what is being awaited; reported when the wait times out.
    #[must_use]
    pub fn waiting_for(mut self, label: impl Into<String>) -> Self {
        self.waiting_for = label.into();
        self
    }

    /// Returns the configured timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the configured sleep schedule.
    #[must_use]
    pub const fn schedule(&self) -> SleepSchedule {
        self.sleep
    }

    /// Returns the diagnostic label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.waiting_for
    }
}

/// Errors surfaced by a wait.
#[derive(Debug, Error)]
pub enum WaitError<E>
where
    E: std::error::Error + 'static,
{
    /// The deadline passed before the predicate reported readiness.
    #[error(
        "timed out after {}s waiting for {waiting_for} ({attempts} attempts)",
        .elapsed.as_secs()
    )]
    Timeout {
        /// Label describing what was awaited.
        waiting_for: String,
        /// Time spent polling.
        elapsed: Duration,
        /// Number of predicate evaluations.
        attempts: u32,
    },
    /// The predicate raised an error that was not tolerated.
    #[error("failed while waiting for {waiting_for}: {source}")]
    Failed {
        /// Label describing what was awaited.
        waiting_for: String,
        /// Error raised by the predicate.
        #[source]
        source: E,
    },
}

impl<E> WaitError<E>
where
    E: std::error::Error + 'static,
{
    /// Returns `true` for [`WaitError::Timeout`].
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Polls predicates against a [`Clock`].
#[derive(Clone, Debug, Default)]
pub struct Waiter<C = SystemClock> {
    clock: C,
}

impl Waiter<SystemClock> {
    /// Creates a waiter driven by the wall clock.
    #[must_use]
    pub const fn new() -> Self {
        Self { clock: SystemClock }
    }
}

impl<C: Clock> Waiter<C> {
    /// Creates a waiter driven by `clock`.
    #[must_use]
    pub const fn with_clock(clock: C) -> Self {
        Self { clock }
    }

    /// Returns the clock driving this waiter.
    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// Polls `predicate` until it is ready; every error is fatal.
    ///
    /// # Errors
    ///
    /// Returns [`WaitError::Timeout`] when the deadline passes and
    /// [`WaitError::Failed`] as soon as the predicate errors.
    pub fn until<R, E, P>(
        &self,
        options: &WaitOptions,
        predicate: P,
    ) -> Result<R::Value, WaitError<E>>
    where
        R: Readiness,
        E: std::error::Error + 'static,
        P: FnMut() -> Result<R, E>,
    {
        self.until_tolerating(options, |_: &E| false, predicate)
    }

    /// Polls `predicate` until it is ready, treating errors accepted by
    /// `tolerate` as "not ready yet".
    ///
    /// The predicate runs at least once, even with a zero timeout.
    ///
    /// # Errors
    ///
    /// Returns [`WaitError::Timeout`] when the deadline passes and
    /// [`WaitError::Failed`] as soon as the predicate raises an error that
    /// `tolerate` rejects.
    pub fn until_tolerating<R, E, T, P>(
        &self,
        options: &WaitOptions,
        tolerate: T,
        mut predicate: P,
    ) -> Result<R::Value, WaitError<E>>
    where
        R: Readiness,
        E: std::error::Error + 'static,
        T: Fn(&E) -> bool,
        P: FnMut() -> Result<R, E>,
    {
        let started = self.clock.now();
        let deadline = started.checked_add(options.timeout);
        let mut attempts: u32 = 0;
        info!(
            waiting_for = %options.waiting_for,
            timeout_secs = options.timeout.as_secs(),
            "waiting"
        );

        loop {
            attempts = attempts.saturating_add(1);
            match predicate() {
                Ok(outcome) => {
                    if let Some(value) = outcome.into_ready() {
                        debug!(waiting_for = %options.waiting_for, attempts, "condition met");
                        return Ok(value);
                    }
                    debug!(waiting_for = %options.waiting_for, attempt = attempts, "not ready");
                }
                Err(err) if tolerate(&err) => {
                    debug!(
                        waiting_for = %options.waiting_for,
                        attempt = attempts,
                        error = %err,
                        "tolerated error while polling"
                    );
                }
                Err(err) => {
                    return Err(WaitError::Failed {
                        waiting_for: options.waiting_for.clone(),
                        source: err,
                    });
                }
            }

            let now = self.clock.now();
            let remaining = deadline.map(|limit| limit.saturating_duration_since(now));
            if remaining == Some(Duration::ZERO) {
                return Err(WaitError::Timeout {
                    waiting_for: options.waiting_for.clone(),
                    elapsed: now.saturating_duration_since(started),
                    attempts,
                });
            }

            let delay = options.sleep.delay(attempts);
            self.clock
                .sleep(remaining.map_or(delay, |left| delay.min(left)));
        }
    }
}

/// Polls `predicate` on the wall clock; every error is fatal.
///
/// # Errors
///
/// See [`Waiter::until`].
pub fn wait<R, E, P>(options: &WaitOptions, predicate: P) -> Result<R::Value, WaitError<E>>
where
    R: Readiness,
    E: std::error::Error + 'static,
    P: FnMut() -> Result<R, E>,
{
    Waiter::new().until(options, predicate)
}

/// Polls `predicate` on the wall clock, tolerating errors accepted by
/// `tolerate`.
///
/// # Errors
///
/// See [`Waiter::until_tolerating`].
pub fn wait_tolerating<R, E, T, P>(
    options: &WaitOptions,
    tolerate: T,
    predicate: P,
) -> Result<R::Value, WaitError<E>>
where
    R: Readiness,
    E: std::error::Error + 'static,
    T: Fn(&E) -> bool,
    P: FnMut() -> Result<R, E>,
{
    Waiter::new().until_tolerating(options, tolerate, predicate)
}

#[cfg(test)]
mod tests;
