//! Fuel inventory, environment helpers, and OSTF health checks.
//!
//! [`FuelClient`] talks to the Fuel master through a [`FuelApi`] and an
//! [`SshExecutor`](crate::ssh::SshExecutor); [`Environment`] scopes those
//! calls to one cluster. Nothing is cached between calls except the admin
//! keys, so every answer reflects the live inventory.

use std::time::Duration;

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::config::ConfigError;
use crate::keystone::KeystoneError;
use crate::ssh::SshError;
use crate::wait::WaitError;

mod api;
mod client;
mod environment;
pub mod keys;
mod types;

pub use api::{FuelApi, HttpFuelApi};
pub use client::FuelClient;
pub use environment::{Environment, OSTF_TIMEOUT, PCS_STATUS_COMMAND, ROLE_QUERY_COMMAND, SHUTDOWN_COMMAND};
pub use types::{
    COMPUTE_ROLE, CONTROLLER_ROLE, Cluster, HA_MODE, NetworkConfiguration, NetworkingParameters,
    Node, NodeNetwork, OPERATIONAL_STATUS, OstfTest, OstfTestRun,
};

/// Errors surfaced by the Fuel helpers.
#[derive(Debug, Error)]
pub enum FuelError {
    /// Configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The Fuel API request failed.
    #[error("fuel api error: {0}")]
    Api(#[from] KeystoneError),
    /// Remote execution failed.
    #[error(transparent)]
    Ssh(#[from] SshError),
    /// The master has no cluster.
    #[error("no clusters found on the fuel master")]
    NoClusters,
    /// No node in the cluster has the requested FQDN.
    #[error("node with fqdn {fqdn} not found")]
    NodeNotFound {
        /// Requested FQDN.
        fqdn: String,
    },
    /// The cluster has no node with the requested role.
    #[error("cluster has no {role} nodes")]
    NoNodesWithRole {
        /// Requested role.
        role: String,
    },
    /// An API payload lacked a value the helper needs.
    #[error("fuel api response is missing {field}")]
    MissingField {
        /// Dotted path of the missing value.
        field: String,
    },
    /// Admin keys could not be stored locally.
    #[error("failed to store admin key at {path}: {message}")]
    KeyStore {
        /// Path being written.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
    /// A wait on cluster state ran out of time.
    #[error("timed out after {}s waiting for {waiting_for}", .elapsed.as_secs())]
    Timeout {
        /// Label describing what was awaited.
        waiting_for: String,
        /// Time spent polling.
        elapsed: Duration,
    },
}

impl From<WaitError<Self>> for FuelError {
    fn from(value: WaitError<Self>) -> Self {
        match value {
            WaitError::Timeout {
                waiting_for,
                elapsed,
                ..
            } => Self::Timeout {
                waiting_for,
                elapsed,
            },
            WaitError::Failed { source, .. } => source,
        }
    }
}
