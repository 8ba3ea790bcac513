//! Scoped remote sessions multiplexed over an OpenSSH control socket.

use std::cell::Cell;
use std::ffi::OsString;

use camino::Utf8PathBuf;
use shell_escape::unix::escape;
use tracing::{debug, warn};

use super::{CommandResult, CommandRunner, SshError, SshExecutor};

/// Exit status OpenSSH reserves for its own failures.
pub const SSH_FAILURE_STATUS: i32 = 255;

/// An open, authenticated transport to one host.
///
/// Commands share the master connection started by
/// [`SshExecutor::connect`]. The master is torn down by [`RemoteSession::close`]
/// or, failing that, when the session is dropped; either way it happens once.
#[derive(Debug)]
pub struct RemoteSession<'a, R: CommandRunner> {
    executor: &'a SshExecutor<R>,
    host: String,
    username: String,
    control_path: Utf8PathBuf,
    released: Cell<bool>,
}

impl<'a, R: CommandRunner> RemoteSession<'a, R> {
    pub(super) const fn new(
        executor: &'a SshExecutor<R>,
        host: String,
        username: String,
        control_path: Utf8PathBuf,
    ) -> Self {
        Self {
            executor,
            host,
            username,
            control_path,
            released: Cell::new(false),
        }
    }

    /// Remote host this session is bound to.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Control socket backing the session.
    #[must_use]
    pub const fn control_path(&self) -> &Utf8PathBuf {
        &self.control_path
    }

    /// Runs `command` and returns its output whatever the exit status.
    ///
    /// # Errors
    ///
    /// Returns [`SshError::Connection`] when the transport fails (OpenSSH
    /// exit status 255) and [`SshError::Spawn`] when the client cannot start.
    pub fn execute(&self, command: &str) -> Result<CommandResult, SshError> {
        if self.released.get() {
            return Err(SshError::Connection {
                host: self.host.clone(),
                message: String::from("session already released"),
            });
        }
        debug!(host = %self.host, command, "executing remote command");
        let mut args = self.multiplexed_args();
        args.push(OsString::from(self.destination()));
        args.push(OsString::from(command));
        let output = self
            .executor
            .runner()
            .run(&self.executor.config().ssh_bin, &args)?;

        if output.code == Some(SSH_FAILURE_STATUS) {
            return Err(SshError::Connection {
                host: self.host.clone(),
                message: output.stderr.trim().to_owned(),
            });
        }
        Ok(CommandResult::new(command, output))
    }

    /// Runs `command` and fails unless it exits with status zero.
    ///
    /// # Errors
    ///
    /// Returns [`SshError::Command`] carrying the captured stderr on a
    /// non-zero exit, or any error from [`RemoteSession::execute`].
    pub fn check_call(&self, command: &str) -> Result<CommandResult, SshError> {
        let result = self.execute(command)?;
        if result.is_ok() {
            return Ok(result);
        }

        let status_text = result
            .exit_status()
            .map_or_else(|| String::from("unknown"), |code| code.to_string());
        Err(SshError::Command {
            host: self.host.clone(),
            command: command.to_owned(),
            status: result.exit_status(),
            status_text,
            stderr: result.stderr_string().trim_end().to_owned(),
        })
    }

    /// Reads the remote file at `path` verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`SshError::Command`] when the file cannot be read.
    pub fn read_file(&self, path: &str) -> Result<String, SshError> {
        let command = format!("cat {}", escape(path.into()));
        self.check_call(&command)
            .map(|result| result.stdout_string())
    }

    /// Releases the master connection.
    ///
    /// # Errors
    ///
    /// Returns [`SshError::Release`] when OpenSSH fails to stop the master.
    pub fn close(self) -> Result<(), SshError> {
        self.release()
    }

    fn release(&self) -> Result<(), SshError> {
        if self.released.replace(true) {
            return Ok(());
        }
        debug!(host = %self.host, control_path = %self.control_path, "releasing ssh session");
        let mut args = self.multiplexed_args();
        args.push(OsString::from("-O"));
        args.push(OsString::from("exit"));
        args.push(OsString::from(self.destination()));
        let output = self
            .executor
            .runner()
            .run(&self.executor.config().ssh_bin, &args)
            .map_err(|err| SshError::Release {
                host: self.host.clone(),
                message: err.to_string(),
            })?;
        if output.is_success() {
            Ok(())
        } else {
            Err(SshError::Release {
                host: self.host.clone(),
                message: output.stderr.trim().to_owned(),
            })
        }
    }

    fn multiplexed_args(&self) -> Vec<OsString> {
        vec![
            OsString::from("-S"),
            OsString::from(self.control_path.as_str()),
            OsString::from("-p"),
            OsString::from(self.executor.config().port.to_string()),
        ]
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.username, self.host)
    }
}

impl<R: CommandRunner> Drop for RemoteSession<'_, R> {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!(host = %self.host, error = %err, "ssh session release failed");
        }
    }
}
