//! Cluster-scoped helpers: node lookup, controller discovery, power
//! operations, and OSTF.

use std::time::Duration;

use camino::Utf8PathBuf;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::ssh::{CommandRunner, Credentials, RemoteSession};
use crate::wait::{Clock, WaitOptions};

use super::types::{CONTROLLER_ROLE, Cluster, HA_MODE, Node, OPERATIONAL_STATUS, OstfTestRun};
use super::{FuelApi, FuelClient, FuelError};

/// Default upper bound for OSTF runs and node power transitions.
pub const OSTF_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Command powering a node off.
pub const SHUTDOWN_COMMAND: &str = "/sbin/shutdown -Ph now";

/// Command printing the Pacemaker cluster status.
pub const PCS_STATUS_COMMAND: &str = "pcs status cluster";

/// Command printing the Puppet role of a node.
pub const ROLE_QUERY_COMMAND: &str = "hiera role";

const PRIMARY_CONTROLLER_MARKER: &str = "primary-controller";

const NODE_USER: &str = "root";

/// One Fuel cluster, with the admin keys needed to reach its nodes.
#[derive(Debug)]
pub struct Environment<'a, A, R, C>
where
    A: FuelApi,
    R: CommandRunner,
    C: Clock,
{
    client: &'a FuelClient<A, R, C>,
    cluster_id: u64,
    admin_keys: Vec<Utf8PathBuf>,
}

impl<'a, A, R, C> Environment<'a, A, R, C>
where
    A: FuelApi,
    R: CommandRunner,
    C: Clock,
{
    /// Binds `client` to `cluster_id`; nodes are reached with `admin_keys`.
    #[must_use]
    pub const fn new(
        client: &'a FuelClient<A, R, C>,
        cluster_id: u64,
        admin_keys: Vec<Utf8PathBuf>,
    ) -> Self {
        Self {
            client,
            cluster_id,
            admin_keys,
        }
    }

    /// Cluster identifier.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.cluster_id
    }

    /// Keys offered to cluster nodes, in order.
    #[must_use]
    pub fn admin_keys(&self) -> &[Utf8PathBuf] {
        &self.admin_keys
    }

    /// Root credentials for cluster nodes.
    #[must_use]
    pub fn node_credentials(&self) -> Credentials {
        Credentials::private_keys(NODE_USER, self.admin_keys.iter().cloned())
    }

    /// Current cluster record.
    ///
    /// # Errors
    ///
    /// Returns [`FuelError::Api`] when the request fails.
    pub fn cluster(&self) -> Result<Cluster, FuelError> {
        self.client.api().cluster(self.cluster_id)
    }

    /// Every node in the cluster.
    ///
    /// # Errors
    ///
    /// Returns [`FuelError::Api`] when the request fails.
    pub fn all_nodes(&self) -> Result<Vec<Node>, FuelError> {
        self.client.api().nodes(self.cluster_id)
    }

    /// Nodes carrying `role`.
    ///
    /// # Errors
    ///
    /// Returns [`FuelError::Api`] when the request fails.
    pub fn nodes_by_role(&self, role: &str) -> Result<Vec<Node>, FuelError> {
        Ok(self
            .all_nodes()?
            .into_iter()
            .filter(|node| node.has_role(role))
            .collect())
    }

    /// The node whose FQDN equals `fqdn`.
    ///
    /// # Errors
    ///
    /// Returns [`FuelError::NodeNotFound`] when no node matches.
    pub fn find_node_by_fqdn(&self, fqdn: &str) -> Result<Node, FuelError> {
        self.all_nodes()?
            .into_iter()
            .find(|node| node.fqdn == fqdn)
            .ok_or_else(|| FuelError::NodeNotFound {
                fqdn: fqdn.to_owned(),
            })
    }

    /// Admin address of the node whose FQDN equals `host_name`.
    ///
    /// # Errors
    ///
    /// Returns [`FuelError::Api`] when the request fails.
    pub fn node_ip_by_host_name(&self, host_name: &str) -> Result<Option<String>, FuelError> {
        Ok(self
            .all_nodes()?
            .into_iter()
            .find(|node| node.fqdn == host_name)
            .map(|node| node.ip))
    }

    /// Public virtual IP of the controllers.
    ///
    /// # Errors
    ///
    /// Returns [`FuelError::MissingField`] when the network configuration
    /// carries no public VIP.
    pub fn primary_controller_ip(&self) -> Result<String, FuelError> {
        let cluster = self.cluster()?;
        self.client
            .api()
            .network_configuration(&cluster)?
            .public_vip
            .ok_or_else(|| FuelError::MissingField {
                field: String::from("public_vip"),
            })
    }

    /// Whether the cluster runs in HA mode.
    ///
    /// # Errors
    ///
    /// Returns [`FuelError::Api`] when the request fails.
    pub fn is_ha(&self) -> Result<bool, FuelError> {
        Ok(self.cluster()?.mode == HA_MODE)
    }

    /// Whether the cluster finished deploying.
    ///
    /// # Errors
    ///
    /// Returns [`FuelError::Api`] when the request fails.
    pub fn is_operational(&self) -> Result<bool, FuelError> {
        Ok(self.cluster()?.status == OPERATIONAL_STATUS)
    }

    /// Tenant network segmentation type, e.g. `vlan` or `tun`.
    ///
    /// # Errors
    ///
    /// Returns [`FuelError::MissingField`] when the configuration omits it.
    pub fn network_segmentation_type(&self) -> Result<String, FuelError> {
        let cluster = self.cluster()?;
        self.client
            .api()
            .network_configuration(&cluster)?
            .networking_parameters
            .segmentation_type
            .ok_or_else(|| FuelError::MissingField {
                field: String::from("networking_parameters.segmentation_type"),
            })
    }

    /// Public TLS certificate when SSL is enabled for OpenStack services.
    ///
    /// # Errors
    ///
    /// Returns [`FuelError::MissingField`] when SSL is enabled but no
    /// certificate content is published.
    pub fn certificate(&self) -> Result<Option<String>, FuelError> {
        let attributes = self.client.api().cluster_attributes(self.cluster_id)?;
        let enabled = attributes
            .pointer("/editable/public_ssl/services/value")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !enabled {
            return Ok(None);
        }
        attributes
            .pointer("/editable/public_ssl/cert_data/value/content")
            .and_then(Value::as_str)
            .map(|content| Some(content.to_owned()))
            .ok_or_else(|| FuelError::MissingField {
                field: String::from("editable.public_ssl.cert_data.value.content"),
            })
    }

    /// The controller Pacemaker reports in its cluster status.
    ///
    /// # Errors
    ///
    /// Returns [`FuelError::NoNodesWithRole`] when there are no controllers,
    /// or any SSH error from querying the first one.
    pub fn leader_controller(&self) -> Result<Option<Node>, FuelError> {
        let controllers = self.controllers()?;
        let Some(first) = controllers.first() else {
            return Err(FuelError::NoNodesWithRole {
                role: CONTROLLER_ROLE.to_owned(),
            });
        };
        let status = self.client.ssh().execute(
            &first.ip,
            &self.node_credentials(),
            PCS_STATUS_COMMAND,
        )?;
        let stdout = status.stdout_string();
        Ok(controllers
            .into_iter()
            .find(|controller| stdout.contains(&controller.fqdn)))
    }

    /// The controller whose Puppet role is `primary-controller`.
    ///
    /// # Errors
    ///
    /// Returns [`FuelError::NoNodesWithRole`] when there are no controllers,
    /// or any SSH error from querying them.
    pub fn primary_controller(&self) -> Result<Option<Node>, FuelError> {
        let controllers = self.controllers()?;
        if controllers.is_empty() {
            return Err(FuelError::NoNodesWithRole {
                role: CONTROLLER_ROLE.to_owned(),
            });
        }
        let credentials = self.node_credentials();
        for controller in controllers {
            let role = self
                .client
                .ssh()
                .execute(&controller.ip, &credentials, ROLE_QUERY_COMMAND)?;
            if role.stdout_string().contains(PRIMARY_CONTROLLER_MARKER) {
                return Ok(Some(controller));
            }
        }
        Ok(None)
    }

    /// Opens a root session to a cluster node.
    ///
    /// # Errors
    ///
    /// Returns [`FuelError::Ssh`] when the session cannot be opened.
    pub fn ssh_to_node(&self, ip: &str) -> Result<RemoteSession<'a, R>, FuelError> {
        Ok(self.client.ssh().connect(ip, &self.node_credentials())?)
    }

    /// Opens a session to a guest VM with caller-supplied credentials.
    ///
    /// # Errors
    ///
    /// Returns [`FuelError::Ssh`] when the session cannot be opened.
    pub fn ssh_to_vm(
        &self,
        ip: &str,
        credentials: &Credentials,
    ) -> Result<RemoteSession<'a, R>, FuelError> {
        Ok(self.client.ssh().connect(ip, credentials)?)
    }

    /// Waits until a guest VM answers SSH with `credentials`.
    ///
    /// # Errors
    ///
    /// Returns [`FuelError::Timeout`] when the VM never answers, or
    /// [`FuelError::Ssh`] when the client cannot be run.
    pub fn wait_vm_ssh_ready(
        &self,
        ip: &str,
        credentials: &Credentials,
        options: &WaitOptions,
    ) -> Result<(), FuelError> {
        self.client.waiter().until(options, || {
            Ok::<_, FuelError>(self.client.ssh().is_ssh_ready(ip, credentials)?)
        })?;
        info!(ip, "vm is reachable over ssh");
        Ok(())
    }

    /// Whether every node reports online.
    ///
    /// # Errors
    ///
    /// Returns [`FuelError::Api`] when the request fails.
    pub fn are_nodes_online(&self) -> Result<bool, FuelError> {
        Ok(self.all_nodes()?.iter().all(|node| node.online))
    }

    /// Whether every node whose admin address is in `ips` reports offline.
    ///
    /// # Errors
    ///
    /// Returns [`FuelError::Api`] when the request fails.
    pub fn are_nodes_offline(&self, ips: &[String]) -> Result<bool, FuelError> {
        Ok(self
            .all_nodes()?
            .iter()
            .filter(|node| ips.contains(&node.ip))
            .all(|node| !node.online))
    }

    /// Powers `nodes` off over SSH, then waits until Fuel reports them
    /// offline.
    ///
    /// A dropped connection while the shutdown command runs is expected and
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`FuelError::Ssh`] when a node rejects the command and
    /// [`FuelError::Timeout`] when the nodes stay online.
    pub fn shutdown_nodes(&self, nodes: &[Node], options: &WaitOptions) -> Result<(), FuelError> {
        for node in nodes {
            info!(node = %node.name, ip = %node.ip, "shutdown node");
            let session = self.ssh_to_node(&node.ip)?;
            match session.check_call(SHUTDOWN_COMMAND) {
                Ok(_) => {}
                Err(err) if err.is_connection() => {
                    debug!(node = %node.name, error = %err, "connection dropped during shutdown");
                }
                Err(err) => return Err(err.into()),
            }
            if let Err(err) = session.close() {
                debug!(node = %node.name, error = %err, "release after shutdown failed");
            }
        }

        info!("wait until the nodes get offline state");
        let ips: Vec<String> = nodes.iter().map(|node| node.ip.clone()).collect();
        self.client
            .waiter()
            .until(options, || self.are_nodes_offline(&ips))?;
        self.log_online_states()
    }

    /// Waits until every node reports online.
    ///
    /// # Errors
    ///
    /// Returns [`FuelError::Timeout`] when some node stays offline.
    pub fn wait_nodes_online(&self, options: &WaitOptions) -> Result<(), FuelError> {
        info!("wait until the nodes get online state");
        self.client
            .waiter()
            .until(options, || self.are_nodes_online())?;
        self.log_online_states()
    }

    /// Runs the `ha` (HA clusters) or `sanity` OSTF set and reports whether
    /// every test succeeded.
    ///
    /// Only the runs created by this call are polled, so results left over
    /// from earlier runs of any set are never read.
    ///
    /// # Errors
    ///
    /// Returns [`FuelError::Timeout`] when the runs do not finish in time,
    /// [`FuelError::MissingField`] when Fuel reports no started run, or any
    /// API error.
    pub fn is_ostf_tests_pass(&self, options: &WaitOptions) -> Result<bool, FuelError> {
        let test_set = if self.is_ha()? { "ha" } else { "sanity" };
        info!(test_set, "[Re]start OSTF tests");
        let run_ids = self
            .client
            .api()
            .run_test_sets(self.cluster_id, &[test_set])?;
        if run_ids.is_empty() {
            return Err(FuelError::MissingField {
                field: String::from("ostf testrun id"),
            });
        }
        debug!(run_ids = ?run_ids, "polling OSTF runs");

        let runs: Vec<OstfTestRun> = self.client.waiter().until(options, || {
            let runs = run_ids
                .iter()
                .map(|run_id| self.client.api().test_run(*run_id))
                .collect::<Result<Vec<_>, _>>()?;
            Ok::<_, FuelError>(runs.iter().all(OstfTestRun::is_finished).then_some(runs))
        })?;

        let mut passed = true;
        for test in runs
            .iter()
            .flat_map(|run| run.tests.iter())
            .filter(|test| !test.passed())
        {
            warn!(
                test = %test.name,
                status = %test.status,
                message = test.message.as_deref().unwrap_or_default(),
                "OSTF test did not pass"
            );
            passed = false;
        }
        Ok(passed)
    }

    fn controllers(&self) -> Result<Vec<Node>, FuelError> {
        self.nodes_by_role(CONTROLLER_ROLE)
    }

    fn log_online_states(&self) -> Result<(), FuelError> {
        for node in self.all_nodes()? {
            info!(node = %node.name, online = node.online, "node online state");
        }
        Ok(())
    }
}
