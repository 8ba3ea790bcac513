//! Binary entry point for the `fuelcheck` CLI.

#[cfg(feature = "test-backdoors")]
use std::env;
use std::io::{self, Write};
use std::process;
use std::time::Duration;

use clap::Parser;
use shell_escape::unix::escape;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fuelcheck::fuel::Environment;
use fuelcheck::openstack::checks::is_nova_ready;
use fuelcheck::ssh::SshConfigLoadError;
use fuelcheck::{
    Clock, CommandResult, CommandRunner, ConfigError, FuelApi, FuelClient, FuelConfig, FuelError,
    HttpFuelApi, LifecycleError, Node, OpenStackClient, OpenStackConfig, OpenStackError,
    ProcessCommandRunner, SshConfig, SshError, SshExecutor, WaitOptions,
};

mod cli;

use cli::{Cli, ExecCommand, NodesCommand, WaitReadyCommand};

const OSTF_POLL_INTERVAL: Duration = Duration::from_secs(30);
const NOVA_POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("configuration error: {0}")]
    SshConfig(#[from] SshConfigLoadError),
    #[error("ssh error: {0}")]
    Ssh(#[from] SshError),
    #[error(transparent)]
    Fuel(#[from] FuelError),
    #[error(transparent)]
    OpenStack(#[from] OpenStackError),
    #[error(transparent)]
    Wait(#[from] LifecycleError),
    #[error("invalid command argument: {0}")]
    InvalidCommand(String),
    #[error("no nodes matched {0}")]
    NoTargets(String),
    #[error("remote command on {0} terminated without an exit status")]
    MissingExitCode(String),
    #[error("cluster is not ready: {0}")]
    NotReady(String),
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli) {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();
}

fn dispatch(cli: Cli) -> Result<i32, CliError> {
    match cli {
        Cli::Nodes(args) => list_nodes(&args),
        Cli::Exec(args) => exec_command(&args),
        Cli::WaitReady(args) => wait_ready(&args),
    }
}

fn fuel_client() -> Result<FuelClient<HttpFuelApi, ProcessCommandRunner>, CliError> {
    let fuel_config = FuelConfig::load_without_cli_args()?;
    let ssh_config = SshConfig::load_without_cli_args()?;
    let api = HttpFuelApi::new(&fuel_config)?;
    let ssh = SshExecutor::with_process_runner(ssh_config)?;
    Ok(FuelClient::new(fuel_config, api, ssh)?)
}

fn list_nodes(args: &NodesCommand) -> Result<i32, CliError> {
    let client = fuel_client()?;
    let env = client.last_created_cluster()?;
    let nodes = match args.role.as_deref() {
        Some(role) => env.nodes_by_role(role)?,
        None => env.all_nodes()?,
    };
    let mut stdout = io::stdout();
    for node in &nodes {
        writeln!(stdout, "{}", render_node(node)).ok();
    }
    Ok(0)
}

fn render_node(node: &Node) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}",
        node.id,
        node.fqdn,
        node.ip,
        node.roles.join(","),
        if node.online { "online" } else { "offline" }
    )
}

fn exec_command(args: &ExecCommand) -> Result<i32, CliError> {
    validate_command_args(&args.command)?;
    let remote_command = render_remote_command(&args.command);

    if let Some(result) = fake_exec_from_env(args, &remote_command) {
        return result;
    }

    let client = fuel_client()?;
    let env = client.last_created_cluster()?;
    let targets = select_targets(&env, args)?;
    let label_output = targets.len() > 1;

    let mut highest = 0;
    for node in &targets {
        let session = env.ssh_to_node(&node.ip)?;
        let result = if args.strict {
            session.check_call(&remote_command)?
        } else {
            session.execute(&remote_command)?
        };
        session.close()?;

        let prefix = label_output.then_some(node.fqdn.as_str());
        write_command_output(io::stdout(), io::stderr(), prefix, &result);
        let status = result
            .exit_status()
            .ok_or_else(|| CliError::MissingExitCode(node.fqdn.clone()))?;
        highest = highest.max(status);
    }
    Ok(highest)
}

fn select_targets<A, R, C>(
    env: &Environment<'_, A, R, C>,
    args: &ExecCommand,
) -> Result<Vec<Node>, CliError>
where
    A: FuelApi,
    R: CommandRunner,
    C: Clock,
{
    if let Some(fqdn) = args.fqdn.as_deref() {
        return Ok(vec![env.find_node_by_fqdn(fqdn)?]);
    }
    let role = args.role.as_deref().unwrap_or_default();
    let nodes = env.nodes_by_role(role)?;
    if nodes.is_empty() {
        return Err(CliError::NoTargets(format!("role {role}")));
    }
    Ok(nodes)
}

fn write_command_output(
    mut stdout: impl Write,
    mut stderr: impl Write,
    prefix: Option<&str>,
    result: &CommandResult,
) {
    for line in result.stdout() {
        write_line(&mut stdout, prefix, line);
    }
    for line in result.stderr() {
        write_line(&mut stderr, prefix, line);
    }
}

fn write_line(target: &mut impl Write, prefix: Option<&str>, line: &str) {
    if let Some(label) = prefix {
        write!(target, "[{label}] ").ok();
    }
    write!(target, "{line}").ok();
    if !line.ends_with('\n') {
        writeln!(target).ok();
    }
}

fn wait_ready(args: &WaitReadyCommand) -> Result<i32, CliError> {
    let timeout = Duration::from_secs(args.timeout_secs);
    let client = fuel_client()?;
    let env = client.last_created_cluster()?;

    let ostf = WaitOptions::new(timeout)
        .sleep(OSTF_POLL_INTERVAL)
        .waiting_for("OSTF tests to finish");
    if !env.is_ostf_tests_pass(&ostf)? {
        return Err(CliError::NotReady(String::from("OSTF tests failed")));
    }

    let controller_ip = env.primary_controller_ip()?;
    let certificate = env.certificate()?;
    let os_config = OpenStackConfig::load_without_cli_args()?;
    let cloud = OpenStackClient::new(&os_config, &controller_ip, certificate.as_deref())?;
    let nova = WaitOptions::new(timeout)
        .sleep(NOVA_POLL_INTERVAL)
        .waiting_for("nova computes to be ready");
    fuelcheck::wait(&nova, is_nova_ready(&cloud)).map_err(LifecycleError::from)?;

    info!(cluster_id = env.id(), "cluster is ready");
    writeln!(io::stdout(), "cluster {} is ready", env.id()).ok();
    Ok(0)
}

fn render_remote_command(args: &[String]) -> String {
    args.iter()
        .map(|arg| escape(arg.as_str().into()).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

fn validate_command_args(args: &[String]) -> Result<(), CliError> {
    for arg in args {
        if arg
            .chars()
            .any(|ch| matches!(ch, '\u{0000}'..='\u{001F}' | '\u{007F}'))
        {
            return Err(CliError::InvalidCommand(String::from(concat!(
                "command arguments must not contain control characters (ASCII ",
                "0x00-0x1F or 0x7F, e.g. newline, carriage return, tab, NUL)"
            ))));
        }
    }
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(feature = "test-backdoors")]
fn fake_exec_from_env(args: &ExecCommand, remote_command: &str) -> Option<Result<i32, CliError>> {
    let mode = env::var("FUELCHECK_FAKE_EXEC_MODE").ok()?;
    let target = args
        .fqdn
        .clone()
        .or_else(|| args.role.clone())
        .unwrap_or_default();
    match mode.as_str() {
        "echo" => {
            writeln!(io::stdout(), "{target}: {remote_command}").ok();
            Some(Ok(0))
        }
        "exit-7" => {
            writeln!(io::stdout(), "fake-stdout").ok();
            writeln!(io::stderr(), "fake-stderr").ok();
            Some(Ok(7))
        }
        "strict-failure" => Some(Err(CliError::Ssh(SshError::Command {
            host: target,
            command: remote_command.to_owned(),
            status: Some(3),
            status_text: String::from("3"),
            stderr: String::from("fake-stderr"),
        }))),
        "no-targets" => Some(Err(CliError::NoTargets(format!("role {target}")))),
        _ => None,
    }
}

#[cfg(not(feature = "test-backdoors"))]
const fn fake_exec_from_env(
    _args: &ExecCommand,
    _remote_command: &str,
) -> Option<Result<i32, CliError>> {
    None
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
