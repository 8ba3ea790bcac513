//! Remote command execution over the system OpenSSH client.
//!
//! [`SshExecutor::connect`] starts a master connection bound to a private
//! control socket; every command of the resulting [`RemoteSession`] is
//! multiplexed over it. Private keys are offered in order with
//! `IdentitiesOnly=yes`. Password authentication wraps the client in
//! `sshpass -e`, so the secret travels through the environment and never
//! appears in an argument vector.

use std::ffi::OsString;

use camino::Utf8PathBuf;
use tracing::{debug, info, warn};
use uuid::Uuid;

mod config;
mod error;
mod session;
mod types;

pub use config::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_SSH_PORT, SshConfig, SshConfigLoadError};
pub use error::SshError;
pub use session::{RemoteSession, SSH_FAILURE_STATUS};
pub use types::{CommandOutput, CommandResult, CommandRunner, Credentials, ProcessCommandRunner};

/// Environment variable `sshpass -e` reads the password from.
pub const SSHPASS_ENV: &str = "SSHPASS";

/// Opens sessions and runs commands on remote hosts.
#[derive(Clone, Debug)]
pub struct SshExecutor<R: CommandRunner> {
    config: SshConfig,
    runner: R,
}

impl SshExecutor<ProcessCommandRunner> {
    /// Convenience constructor that wires the real process runner.
    ///
    /// # Errors
    ///
    /// Returns [`SshError::InvalidConfig`] when validation fails.
    pub fn with_process_runner(config: SshConfig) -> Result<Self, SshError> {
        Self::new(config, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> SshExecutor<R> {
    /// Creates an executor using the provided runner and configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SshError::InvalidConfig`] when configuration validation
    /// fails.
    pub fn new(config: SshConfig, runner: R) -> Result<Self, SshError> {
        config.validate()?;
        Ok(Self { config, runner })
    }

    /// Returns the executor configuration.
    #[must_use]
    pub const fn config(&self) -> &SshConfig {
        &self.config
    }

    /// Returns the underlying process runner.
    #[must_use]
    pub const fn runner(&self) -> &R {
        &self.runner
    }

    /// Authenticates against `host` and starts a master connection.
    ///
    /// # Errors
    ///
    /// Returns [`SshError::InvalidConfig`] for unusable credentials,
    /// [`SshError::Spawn`] when the client cannot start, and
    /// [`SshError::Connection`] when authentication or the network fails.
    pub fn connect(
        &self,
        host: &str,
        credentials: &Credentials,
    ) -> Result<RemoteSession<'_, R>, SshError> {
        if host.trim().is_empty() {
            return Err(SshError::InvalidConfig {
                field: String::from("host"),
            });
        }
        credentials.validate()?;

        let control_path = self.control_path();
        let mut args = self.master_args(&control_path, credentials);
        args.push(OsString::from(format!(
            "{}@{host}",
            credentials.username()
        )));

        let output = match credentials.password_value() {
            Some(password) if !credentials.uses_keys() => {
                let mut wrapped = vec![OsString::from("-e"), OsString::from(&self.config.ssh_bin)];
                wrapped.extend(args);
                self.runner.run_with_env(
                    &self.config.sshpass_bin,
                    &wrapped,
                    &[(SSHPASS_ENV, password)],
                )?
            }
            _ => self.runner.run(&self.config.ssh_bin, &args)?,
        };

        if !output.is_success() {
            return Err(SshError::Connection {
                host: host.to_owned(),
                message: connection_message(&output),
            });
        }

        info!(host, user = credentials.username(), "ssh session opened");
        Ok(RemoteSession::new(
            self,
            host.to_owned(),
            credentials.username().to_owned(),
            control_path,
        ))
    }

    /// Whether `host` answers SSH.
    ///
    /// A server that opens a session, or that rejects the credentials during
    /// authentication, is ready. A refused or unreachable port is not ready
    /// yet.
    ///
    /// # Errors
    ///
    /// Returns [`SshError::InvalidConfig`] for unusable credentials,
    /// [`SshError::Spawn`] when the client cannot start, and
    /// [`SshError::Release`] when the test session cannot be closed.
    pub fn is_ssh_ready(&self, host: &str, credentials: &Credentials) -> Result<bool, SshError> {
        match self.connect(host, credentials) {
            Ok(session) => session.close().map(|()| true),
            Err(SshError::Connection { message, .. }) if rejects_credentials(&message) => {
                debug!(host, "sshd rejected credentials; treating as ready");
                Ok(true)
            }
            Err(SshError::Connection { message, .. }) => {
                debug!(host, reason = %message, "ssh not ready yet");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// Opens a session, runs `f` against it, and releases the session on
    /// every exit path.
    ///
    /// An error from `f` takes precedence over a release failure, which is
    /// then only logged.
    ///
    /// # Errors
    ///
    /// Returns any error from [`SshExecutor::connect`], from `f`, or from
    /// releasing the session.
    pub fn with_session<T, E, F>(&self, host: &str, credentials: &Credentials, f: F) -> Result<T, E>
    where
        E: From<SshError>,
        F: FnOnce(&RemoteSession<'_, R>) -> Result<T, E>,
    {
        let session = self.connect(host, credentials)?;
        let outcome = f(&session);
        let released = session.close();
        match (outcome, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) => Err(err.into()),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(release_err)) => {
                warn!(host, error = %release_err, "ssh session release failed");
                Err(err)
            }
        }
    }

    /// Runs one command in a fresh session, whatever its exit status.
    ///
    /// # Errors
    ///
    /// See [`SshExecutor::with_session`] and [`RemoteSession::execute`].
    pub fn execute(
        &self,
        host: &str,
        credentials: &Credentials,
        command: &str,
    ) -> Result<CommandResult, SshError> {
        self.with_session(host, credentials, |session| session.execute(command))
    }

    /// Runs one command in a fresh session and fails on a non-zero exit.
    ///
    /// # Errors
    ///
    /// See [`SshExecutor::with_session`] and [`RemoteSession::check_call`].
    pub fn check_call(
        &self,
        host: &str,
        credentials: &Credentials,
        command: &str,
    ) -> Result<CommandResult, SshError> {
        self.with_session(host, credentials, |session| session.check_call(command))
    }

    fn control_path(&self) -> Utf8PathBuf {
        let file_name = format!("fuelcheck-{}.sock", Uuid::new_v4().simple());
        let dir = self.config.control_dir.as_ref().map_or_else(
            || Utf8PathBuf::from(std::env::temp_dir().to_string_lossy().into_owned()),
            Utf8PathBuf::from,
        );
        dir.join(file_name)
    }

    fn master_args(&self, control_path: &Utf8PathBuf, credentials: &Credentials) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("-M"),
            OsString::from("-S"),
            OsString::from(control_path.as_str()),
            OsString::from("-o"),
            OsString::from("ControlPersist=yes"),
            OsString::from("-f"),
            OsString::from("-N"),
            OsString::from("-p"),
            OsString::from(self.config.port.to_string()),
            OsString::from("-o"),
            OsString::from(format!(
                "ConnectTimeout={}",
                self.config.connect_timeout_secs
            )),
        ];

        if !self.config.strict_host_key_checking {
            args.push(OsString::from("-o"));
            args.push(OsString::from("StrictHostKeyChecking=no"));
        }

        if !self.config.known_hosts_file.trim().is_empty() {
            args.push(OsString::from("-o"));
            args.push(OsString::from(format!(
                "UserKnownHostsFile={}",
                self.config.known_hosts_file
            )));
        }

        if credentials.uses_keys() {
            args.push(OsString::from("-o"));
            args.push(OsString::from("BatchMode=yes"));
            args.push(OsString::from("-o"));
            args.push(OsString::from("IdentitiesOnly=yes"));
            for key in credentials.keys() {
                args.push(OsString::from("-i"));
                args.push(OsString::from(key.as_str()));
            }
        } else {
            args.push(OsString::from("-o"));
            args.push(OsString::from(
                "PreferredAuthentications=password,keyboard-interactive",
            ));
            args.push(OsString::from("-o"));
            args.push(OsString::from("PubkeyAuthentication=no"));
            args.push(OsString::from("-o"));
            args.push(OsString::from("NumberOfPasswordPrompts=1"));
        }

        args
    }
}

fn rejects_credentials(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("permission denied") || lower.contains("authentication")
}

fn connection_message(output: &CommandOutput) -> String {
    let stderr = output.stderr.trim();
    if stderr.is_empty() {
        output.code.map_or_else(
            || String::from("client terminated without an exit status"),
            |code| format!("client exited with status {code}"),
        )
    } else {
        stderr.to_owned()
    }
}
