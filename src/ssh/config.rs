//! SSH client configuration loaded via `ortho-config`.
//!
//! Defaults favour ephemeral lab hosts: host key checking is off and the
//! known hosts file is `/dev/null`. Every value can be overridden from
//! `fuelcheck-ssh.toml` or `FUELCHECK_SSH_*` environment variables.

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use super::SshError;

/// Default SSH port.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Default connection timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// SSH client settings.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "FUELCHECK_SSH",
    discovery(
        app_name = "fuelcheck",
        env_var = "FUELCHECK_SSH_CONFIG_PATH",
        config_file_name = "ssh.toml",
        dotfile_name = ".fuelcheck-ssh.toml",
        project_file_name = "fuelcheck-ssh.toml"
    )
)]
pub struct SshConfig {
    /// Path to the `ssh` executable.
    #[ortho_config(default = "ssh".to_owned())]
    pub ssh_bin: String,
    /// Path to the `sshpass` executable used for password authentication.
    #[ortho_config(default = "sshpass".to_owned())]
    pub sshpass_bin: String,
    /// Remote SSH port.
    #[ortho_config(default = DEFAULT_SSH_PORT)]
    pub port: u16,
    /// Seconds to wait for the TCP connection and authentication.
    #[ortho_config(default = DEFAULT_CONNECT_TIMEOUT_SECS)]
    pub connect_timeout_secs: u64,
    /// Whether to enforce host key checking.
    #[ortho_config(default = false)]
    pub strict_host_key_checking: bool,
    /// Known hosts file override.
    #[ortho_config(default = "/dev/null".to_owned())]
    pub known_hosts_file: String,
    /// Directory holding control sockets; the system temp dir when unset.
    pub control_dir: Option<String>,
}

/// Errors raised when loading the SSH configuration from layered sources.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum SshConfigLoadError {
    /// Parsing or merging configuration layers failed.
    #[error("ssh configuration parsing failed: {0}")]
    Parse(String),
}

impl SshConfig {
    /// Loads configuration from defaults, configuration files, and
    /// environment variables, ignoring the process arguments.
    ///
    /// # Errors
    ///
    /// Returns [`SshConfigLoadError::Parse`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, SshConfigLoadError> {
        Self::load_from_iter([std::ffi::OsString::from("fuelcheck")])
            .map_err(|err| SshConfigLoadError::Parse(err.to_string()))
    }

    /// Ensures required values are present after trimming whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`SshError::InvalidConfig`] naming the first blank field.
    pub fn validate(&self) -> Result<(), SshError> {
        Self::require_value(&self.ssh_bin, "ssh_bin")?;
        Self::require_value(&self.sshpass_bin, "sshpass_bin")?;
        if self.port == 0 {
            return Err(SshError::InvalidConfig {
                field: String::from("port"),
            });
        }
        Self::require_optional_value(
            self.control_dir.as_deref(),
            "control_dir",
        )
    }

    fn require_optional_value(value: Option<&str>, field: &str) -> Result<(), SshError> {
        match value {
            None => Ok(()),
            Some(v) if !v.trim().is_empty() => Ok(()),
            Some(_) => Err(SshError::InvalidConfig {
                field: field.to_owned(),
            }),
        }
    }

    fn require_value(value: &str, field: &str) -> Result<(), SshError> {
        Self::require_optional_value(Some(value), field)
    }
}
