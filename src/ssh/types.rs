//! Process runner abstraction, credentials, and captured command results.

use std::ffi::OsString;
use std::process::Command;

use camino::Utf8PathBuf;

use super::SshError;

/// Result of running a local process.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandOutput {
    /// Exit code reported by the process, if available.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns `true` when the exit code equals zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// Abstraction over local process execution to support fakes in tests.
pub trait CommandRunner {
    /// Runs `program` with `args` and extra environment variables, capturing
    /// stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`SshError::Spawn`] if the process cannot be started.
    fn run_with_env(
        &self,
        program: &str,
        args: &[OsString],
        env: &[(&str, &str)],
    ) -> Result<CommandOutput, SshError>;

    /// Runs `program` with `args` in the inherited environment.
    ///
    /// # Errors
    ///
    /// Returns [`SshError::Spawn`] if the process cannot be started.
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, SshError> {
        self.run_with_env(program, args, &[])
    }
}

/// Real command runner that shells out to the host operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn run_with_env(
        &self,
        program: &str,
        args: &[OsString],
        env: &[(&str, &str)],
    ) -> Result<CommandOutput, SshError> {
        let output = Command::new(program)
            .args(args)
            .envs(env.iter().copied())
            .output()
            .map_err(|err| SshError::Spawn {
                program: program.to_owned(),
                message: err.to_string(),
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// How a session authenticates against the remote host.
#[derive(Clone, Eq, PartialEq)]
pub struct Credentials {
    username: String,
    password: Option<String>,
    private_keys: Vec<Utf8PathBuf>,
}

impl Credentials {
    /// Authenticates with a password.
    #[must_use]
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Some(password.into()),
            private_keys: Vec::new(),
        }
    }

    /// Authenticates with private keys, offered in the given order.
    #[must_use]
    pub fn private_keys<I, P>(username: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Utf8PathBuf>,
    {
        Self {
            username: username.into(),
            password: None,
            private_keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Remote login name.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Password, when password authentication is used.
    #[must_use]
    pub fn password_value(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Private key files in offer order.
    #[must_use]
    pub fn keys(&self) -> &[Utf8PathBuf] {
        &self.private_keys
    }

    /// Keys take precedence; the password is used only when no key is set.
    pub(crate) fn uses_keys(&self) -> bool {
        !self.private_keys.is_empty()
    }

    pub(crate) fn validate(&self) -> Result<(), SshError> {
        if self.username.trim().is_empty() {
            return Err(SshError::InvalidConfig {
                field: String::from("username"),
            });
        }
        let has_password = self
            .password
            .as_deref()
            .is_some_and(|value| !value.is_empty());
        if !has_password && !self.uses_keys() {
            return Err(SshError::InvalidConfig {
                field: String::from("credentials"),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("private_keys", &self.private_keys)
            .finish()
    }
}

/// Captured output of a remote command. Immutable once returned.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandResult {
    command: String,
    stdout: Vec<String>,
    stderr: Vec<String>,
    exit_status: Option<i32>,
}

impl CommandResult {
    /// Builds a result from raw process output, splitting streams into lines
    /// that keep their terminators.
    #[must_use]
    pub fn new(command: impl Into<String>, output: CommandOutput) -> Self {
        Self {
            command: command.into(),
            stdout: split_lines(&output.stdout),
            stderr: split_lines(&output.stderr),
            exit_status: output.code,
        }
    }

    /// Command string that produced this result.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Standard output lines.
    #[must_use]
    pub fn stdout(&self) -> &[String] {
        &self.stdout
    }

    /// Standard error lines.
    #[must_use]
    pub fn stderr(&self) -> &[String] {
        &self.stderr
    }

    /// Remote exit status; `None` when the process ended without one.
    #[must_use]
    pub const fn exit_status(&self) -> Option<i32> {
        self.exit_status
    }

    /// Returns `true` when the remote command exited with status zero.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self.exit_status, Some(0))
    }

    /// Standard output exactly as captured.
    #[must_use]
    pub fn stdout_string(&self) -> String {
        self.stdout.concat()
    }

    /// Standard error exactly as captured.
    #[must_use]
    pub fn stderr_string(&self) -> String {
        self.stderr.concat()
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.split_inclusive('\n').map(str::to_owned).collect()
}
