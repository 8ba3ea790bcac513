//! Compute and block-storage status for the deployed cloud.
//!
//! [`OpenStackClient`] speaks Keystone v2.0, Nova, and Cinder; the
//! [`checks`] builders turn [`CloudApi`] lookups into predicates for
//! [`crate::wait`].

use thiserror::Error;

use crate::config::ConfigError;
use crate::keystone::KeystoneError;

pub mod checks;
mod client;
mod types;

pub use client::{CloudApi, OpenStackClient};
pub use types::{
    ACTIVE, AVAILABLE, Backup, CINDER_ERROR, ComputeService, DELETED, ERROR, NOVA_COMPUTE_BINARY,
    SOFT_DELETED, Server, ServerRequest, Snapshot, Volume, VolumeAttachment,
};

/// Errors surfaced by the OpenStack client and checks.
#[derive(Debug, Error)]
pub enum OpenStackError {
    /// Configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// An API request failed.
    #[error("openstack api error: {0}")]
    Api(#[from] KeystoneError),
    /// The trusted certificate could not be loaded.
    #[error("failed to load CA certificate from {source_name}: {message}")]
    Certificate {
        /// File path, or where the PEM came from.
        source_name: String,
        /// Loader error string.
        message: String,
    },
    /// A resource a check depends on does not exist.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Resource kind, e.g. `server`.
        kind: &'static str,
        /// Resource identifier.
        id: String,
    },
    /// A resource lacks an attribute the caller needs.
    #[error("{kind} {id} has no {attribute}")]
    MissingAttribute {
        /// Resource kind, e.g. `server`.
        kind: &'static str,
        /// Resource identifier.
        id: String,
        /// Attribute that was absent.
        attribute: &'static str,
    },
    /// A resource reached a terminal failure state.
    #[error("{kind} {id} status is {status}")]
    Failed {
        /// Resource kind, e.g. `snapshot`.
        kind: &'static str,
        /// Resource identifier.
        id: String,
        /// Status reported by the service.
        status: String,
    },
}
