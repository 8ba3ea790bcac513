//! Shared fixtures for poll-wait scenarios.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use fuelcheck::test_support::ManualClock;
use fuelcheck::{SshError, WaitError};
use rstest::fixture;

/// One scripted check answer.
pub type CheckAnswer = Result<Option<String>, SshError>;

pub struct WaitContext {
    pub clock: ManualClock,
    pub answers: RefCell<VecDeque<CheckAnswer>>,
    pub calls: Cell<u32>,
    pub outcome: RefCell<Option<Result<String, WaitError<SshError>>>>,
}

impl WaitContext {
    /// Serves queued answers in order, repeating the last one.
    pub fn check(&self) -> CheckAnswer {
        self.calls.set(self.calls.get() + 1);
        let mut answers = self.answers.borrow_mut();
        if answers.len() > 1 {
            answers.pop_front().expect("answers checked non-empty")
        } else {
            answers
                .front()
                .cloned()
                .expect("test setup requires a scripted check")
        }
    }
}

#[fixture]
pub fn wait_context() -> WaitContext {
    WaitContext {
        clock: ManualClock::new(),
        answers: RefCell::new(VecDeque::new()),
        calls: Cell::new(0),
        outcome: RefCell::new(None),
    }
}

pub fn connection_refused() -> SshError {
    SshError::Connection {
        host: String::from("10.20.0.3"),
        message: String::from("Connection refused"),
    }
}

pub fn command_failed() -> SshError {
    SshError::Command {
        host: String::from("10.20.0.3"),
        command: String::from("pcs status"),
        status: Some(1),
        status_text: String::from("1"),
        stderr: String::from("Error: cluster is not currently running on this node"),
    }
}
