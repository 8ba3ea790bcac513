//! Nova and Cinder records, reduced to the fields status checks read.

use serde::Deserialize;

/// Server status once boot completed.
pub const ACTIVE: &str = "ACTIVE";

/// Server status after a failed build or action.
pub const ERROR: &str = "ERROR";

/// Server status while a deferred delete can still be undone.
pub const SOFT_DELETED: &str = "SOFT_DELETED";

/// Server status reported for purged servers visible to admins.
pub const DELETED: &str = "DELETED";

/// Cinder status of an idle resource.
pub const AVAILABLE: &str = "available";

/// Cinder status of a failed resource.
pub const CINDER_ERROR: &str = "error";

/// Binary name of Nova compute services.
pub const NOVA_COMPUTE_BINARY: &str = "nova-compute";

/// A Nova server.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct Server {
    /// Server UUID.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Status such as `ACTIVE` or `SOFT_DELETED`.
    pub status: String,
    /// Compute host running the server; admin-only.
    #[serde(rename = "OS-EXT-SRV-ATTR:host", default)]
    pub host: Option<String>,
    /// Hypervisor node name backing the server; admin-only.
    #[serde(rename = "OS-EXT-SRV-ATTR:hypervisor_hostname", default)]
    pub hypervisor_hostname: Option<String>,
}

/// Boot request for a new server.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ServerRequest {
    /// Display name.
    pub name: String,
    /// Image UUID to boot from.
    pub image_ref: String,
    /// Flavor id.
    pub flavor_ref: String,
    /// Keypair injected into the guest.
    pub key_name: Option<String>,
    /// Network UUIDs to attach, in NIC order.
    pub networks: Vec<String>,
}

impl ServerRequest {
    /// Boots `image_ref` with `flavor_ref` under `name`.
    pub fn new(
        name: impl Into<String>,
        image_ref: impl Into<String>,
        flavor_ref: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            image_ref: image_ref.into(),
            flavor_ref: flavor_ref.into(),
            ..Self::default()
        }
    }

    /// Injects the named keypair.
    #[must_use]
    pub fn key_name(mut self, key_name: impl Into<String>) -> Self {
        self.key_name = Some(key_name.into());
        self
    }

    /// Attaches one more network.
    #[must_use]
    pub fn network(mut self, network_id: impl Into<String>) -> Self {
        self.networks.push(network_id.into());
        self
    }
}

/// One attachment of a volume to a server.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct VolumeAttachment {
    /// Server holding the volume.
    pub server_id: String,
    /// Device path inside the server.
    #[serde(default)]
    pub device: Option<String>,
}

/// A Cinder volume.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct Volume {
    /// Volume UUID.
    pub id: String,
    /// Status such as `available` or `in-use`.
    pub status: String,
    /// Current attachments.
    #[serde(default)]
    pub attachments: Vec<VolumeAttachment>,
}

impl Volume {
    /// Returns `true` once the volume is available and attached nowhere.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.status == AVAILABLE && self.attachments.is_empty()
    }
}

/// A Cinder volume snapshot.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct Snapshot {
    /// Snapshot UUID.
    pub id: String,
    /// Status such as `creating` or `available`.
    pub status: String,
    /// Source volume.
    #[serde(default)]
    pub volume_id: String,
}

/// A Cinder volume backup.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct Backup {
    /// Backup UUID.
    pub id: String,
    /// Status such as `creating` or `available`.
    pub status: String,
    /// Source volume.
    #[serde(default)]
    pub volume_id: String,
}

/// A Nova service as listed by `os-services`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct ComputeService {
    /// Service binary, e.g. `nova-compute`.
    pub binary: String,
    /// Host running the service.
    pub host: String,
    /// Administrative status: `enabled` or `disabled`.
    pub status: String,
    /// Liveness: `up` or `down`.
    pub state: String,
}

impl ComputeService {
    /// Returns `true` unless an operator disabled the service.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.status == "enabled"
    }

    /// Returns `true` when the service is enabled and reporting.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.is_enabled() && self.state == "up"
    }
}
