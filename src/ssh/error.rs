//! Errors surfaced by the remote command executor.

use thiserror::Error;

/// Errors surfaced while opening sessions or running remote commands.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SshError {
    /// A required setting is blank, or the credentials carry neither a
    /// password nor a private key.
    #[error("invalid ssh configuration: {field} must be set")]
    InvalidConfig {
        /// Setting that failed validation.
        field: String,
    },
    /// The local client binary could not be started.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Operating system error string.
        message: String,
    },
    /// The transport could not be established or was lost.
    #[error("ssh connection to {host} failed: {message}")]
    Connection {
        /// Remote host.
        host: String,
        /// Diagnostic text reported by the client.
        message: String,
    },
    /// A strict command exited with a non-zero status.
    #[error("command `{command}` on {host} exited with status {status_text}: {stderr}")]
    Command {
        /// Remote host.
        host: String,
        /// Command string that was executed.
        command: String,
        /// Exit status, when the remote process reported one.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Captured standard error.
        stderr: String,
    },
    /// Tearing down the master connection failed.
    #[error("failed to release ssh session to {host}: {message}")]
    Release {
        /// Remote host.
        host: String,
        /// Diagnostic text reported by the client.
        message: String,
    },
}

impl SshError {
    /// Returns `true` for [`SshError::Connection`]; handy as a poll-wait
    /// tolerance filter while hosts reboot.
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}
