//! Records returned by the Fuel REST API and OSTF.

use serde::Deserialize;

/// Role name of controller nodes.
pub const CONTROLLER_ROLE: &str = "controller";

/// Role name of compute nodes.
pub const COMPUTE_ROLE: &str = "compute";

/// Deployment mode of highly available clusters.
pub const HA_MODE: &str = "ha_compact";

/// Cluster status once deployment completed.
pub const OPERATIONAL_STATUS: &str = "operational";

fn default_net_provider() -> String {
    String::from("neutron")
}

/// A Fuel environment (cluster).
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct Cluster {
    /// Cluster identifier; newer clusters have higher ids.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Deployment status, e.g. `operational`.
    pub status: String,
    /// Deployment mode, e.g. `ha_compact`.
    pub mode: String,
    /// Networking provider: `neutron` or `nova_network`.
    #[serde(default = "default_net_provider")]
    pub net_provider: String,
}

/// One logical network attached to a node.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct NodeNetwork {
    /// Network name, e.g. `management`.
    pub name: String,
    /// Address in CIDR notation, when the network carries one.
    #[serde(default)]
    pub ip: Option<String>,
}

/// A cluster node as reported by the Fuel inventory.
///
/// This is a snapshot; `Environment` re-queries the API on every call.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct Node {
    /// Node identifier.
    pub id: u64,
    /// Short name.
    pub name: String,
    /// Fully qualified domain name.
    pub fqdn: String,
    /// Address on the admin (PXE) network.
    pub ip: String,
    /// Assigned roles.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Whether the Fuel agent on the node currently reports in.
    pub online: bool,
    /// Provisioning status.
    #[serde(default)]
    pub status: String,
    /// Per-network addresses.
    #[serde(default)]
    pub network_data: Vec<NodeNetwork>,
}

impl Node {
    /// Addresses of every network that carries one, prefix length stripped.
    #[must_use]
    pub fn ip_list(&self) -> Vec<String> {
        self.network_data
            .iter()
            .filter_map(|network| network.ip.as_deref())
            .map(|cidr| cidr.split('/').next().unwrap_or(cidr).to_owned())
            .collect()
    }

    /// Returns `true` when `role` is assigned to this node.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|assigned| assigned == role)
    }

    /// Address on the named network, prefix length stripped.
    #[must_use]
    pub fn network_ip(&self, network: &str) -> Option<&str> {
        self.network_data
            .iter()
            .find(|entry| entry.name == network)
            .and_then(|entry| entry.ip.as_deref())
            .map(|cidr| cidr.split('/').next().unwrap_or(cidr))
    }
}

/// Provider-independent parameters of the cluster network.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct NetworkingParameters {
    /// Tenant network segmentation, e.g. `vlan`, `gre`, or `tun`.
    #[serde(default)]
    pub segmentation_type: Option<String>,
}

/// Cluster network configuration.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct NetworkConfiguration {
    /// Public virtual IP of the controllers.
    #[serde(default)]
    pub public_vip: Option<String>,
    /// Provider-independent parameters.
    #[serde(default)]
    pub networking_parameters: NetworkingParameters,
}

/// Result of a single OSTF test.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct OstfTest {
    /// Test name.
    pub name: String,
    /// Test status, `success` when it passed.
    pub status: String,
    /// Failure message, if any.
    #[serde(default)]
    pub message: Option<String>,
}

impl OstfTest {
    /// Returns `true` when the test passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.status == "success"
    }
}

/// An OSTF test run.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct OstfTestRun {
    /// Run identifier assigned when the run is started.
    pub id: u64,
    /// Test set, e.g. `sanity` or `ha`.
    #[serde(default)]
    pub testset: String,
    /// Run status; `finished` once every test reported.
    pub status: String,
    /// Per-test results.
    #[serde(default)]
    pub tests: Vec<OstfTest>,
}

impl OstfTestRun {
    /// Returns `true` once the run has completed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.status == "finished"
    }
}
