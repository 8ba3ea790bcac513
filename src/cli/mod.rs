//! Command-line interface definitions for the `fuelcheck` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Default upper bound for `wait-ready`, matching the OSTF run timeout.
pub(crate) const DEFAULT_READY_TIMEOUT_SECS: u64 = 600;

/// Top-level CLI for the `fuelcheck` binary.
#[derive(Debug, Parser)]
#[command(
    name = "fuelcheck",
    about = "Inspect and exercise the newest cluster of a Fuel master",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// List the nodes of the newest cluster.
    #[command(name = "nodes", about = "List the nodes of the newest cluster")]
    Nodes(NodesCommand),
    /// Run a command on cluster nodes over SSH.
    #[command(name = "exec", about = "Run a command on cluster nodes over SSH")]
    Exec(ExecCommand),
    /// Wait until OSTF passes and every Nova compute is up.
    #[command(
        name = "wait-ready",
        about = "Wait until OSTF passes and every Nova compute is up"
    )]
    WaitReady(WaitReadyCommand),
}

/// Arguments for the `fuelcheck nodes` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct NodesCommand {
    /// Only list nodes carrying this role, e.g. `controller`.
    #[arg(long, value_name = "ROLE")]
    pub(crate) role: Option<String>,
}

/// Arguments for the `fuelcheck exec` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct ExecCommand {
    /// Run on the node with this fully qualified domain name.
    #[arg(long, value_name = "FQDN", conflicts_with = "role", required_unless_present = "role")]
    pub(crate) fqdn: Option<String>,
    /// Run on every node carrying this role.
    #[arg(long, value_name = "ROLE")]
    pub(crate) role: Option<String>,
    /// Fail as soon as a node reports a non-zero exit status.
    #[arg(long)]
    pub(crate) strict: bool,
    /// Command to execute on the nodes (use -- to separate flags).
    #[arg(required = true, trailing_var_arg = true)]
    pub(crate) command: Vec<String>,
}

/// Arguments for the `fuelcheck wait-ready` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct WaitReadyCommand {
    /// Upper bound, in seconds, for each of the OSTF and Nova waits.
    #[arg(long, value_name = "SECONDS", default_value_t = DEFAULT_READY_TIMEOUT_SECS)]
    pub(crate) timeout_secs: u64,
}
