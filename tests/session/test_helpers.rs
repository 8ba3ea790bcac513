//! Shared fixtures and helpers for SSH session scenarios.

use std::cell::RefCell;

use fuelcheck::test_support::{CommandInvocation, ScriptedRunner};
use fuelcheck::{CommandResult, Credentials, SshConfig, SshError, SshExecutor};
use rstest::fixture;

pub struct SessionContext {
    pub runner: ScriptedRunner,
    pub credentials: RefCell<Option<Credentials>>,
    pub outcome: RefCell<Option<Result<CommandResult, SshError>>>,
}

impl SessionContext {
    pub fn executor(&self) -> SshExecutor<ScriptedRunner> {
        SshExecutor::new(ssh_config(), self.runner.clone())
            .unwrap_or_else(|err| panic!("ssh config should be valid: {err}"))
    }

    pub fn credentials(&self) -> Credentials {
        self.credentials
            .borrow()
            .clone()
            .unwrap_or_else(|| panic!("test setup requires credentials"))
    }

    /// The first recorded call, which starts the master connection.
    pub fn master_call(&self) -> CommandInvocation {
        self.runner
            .invocations()
            .into_iter()
            .next()
            .unwrap_or_else(|| panic!("no master connection was started"))
    }
}

#[fixture]
pub fn session_context() -> SessionContext {
    SessionContext {
        runner: ScriptedRunner::new(),
        credentials: RefCell::new(None),
        outcome: RefCell::new(None),
    }
}

pub fn ssh_config() -> SshConfig {
    SshConfig {
        ssh_bin: String::from("ssh"),
        sshpass_bin: String::from("sshpass"),
        port: 22,
        connect_timeout_secs: 30,
        strict_host_key_checking: false,
        known_hosts_file: String::from("/dev/null"),
        control_dir: Some(String::from("/tmp/fuelcheck-bdd")),
    }
}

pub fn args_of(call: &CommandInvocation) -> Vec<String> {
    call.args
        .iter()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect()
}
