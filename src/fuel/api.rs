//! HTTP seam to the Fuel (Nailgun) REST API and OSTF.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::config::FuelConfig;
use crate::keystone::{AuthorizedHttp, KeystoneAuth, KeystoneError};

use super::FuelError;
use super::types::{Cluster, NetworkConfiguration, Node, OstfTestRun};

/// Fuel operations the environment helpers are written against.
pub trait FuelApi {
    /// Lists every cluster.
    ///
    /// # Errors
    ///
    /// Returns [`FuelError::Api`] when the request fails.
    fn clusters(&self) -> Result<Vec<Cluster>, FuelError>;

    /// Fetches one cluster.
    ///
    /// # Errors
    ///
    /// Returns [`FuelError::Api`] when the request fails.
    fn cluster(&self, cluster_id: u64) -> Result<Cluster, FuelError>;

    /// Lists the nodes assigned to a cluster.
    ///
    /// # Errors
    ///
    /// Returns [`FuelError::Api`] when the request fails.
    fn nodes(&self, cluster_id: u64) -> Result<Vec<Node>, FuelError>;

    /// Fetches the network configuration, using the provider-specific path.
    ///
    /// # Errors
    ///
    /// Returns [`FuelError::Api`] when the request fails.
    fn network_configuration(&self, cluster: &Cluster) -> Result<NetworkConfiguration, FuelError>;

    /// Fetches the raw cluster attributes (settings tab).
    ///
    /// # Errors
    ///
    /// Returns [`FuelError::Api`] when the request fails.
    fn cluster_attributes(&self, cluster_id: u64) -> Result<Value, FuelError>;

    /// Starts the given OSTF test sets and returns the ids of the runs
    /// created, in request order.
    ///
    /// # Errors
    ///
    /// Returns [`FuelError::Api`] when the request fails.
    fn run_test_sets(&self, cluster_id: u64, test_sets: &[&str]) -> Result<Vec<u64>, FuelError>;

    /// Fetches one OSTF run by id.
    ///
    /// # Errors
    ///
    /// Returns [`FuelError::Api`] when the request fails.
    fn test_run(&self, run_id: u64) -> Result<OstfTestRun, FuelError>;
}

#[derive(Deserialize)]
struct StartedRun {
    id: u64,
}

/// [`FuelApi`] backed by the blocking `reqwest` client.
#[derive(Debug)]
pub struct HttpFuelApi {
    http: AuthorizedHttp,
    base_url: String,
}

impl HttpFuelApi {
    /// Builds a client for the master named in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`FuelError::Config`] when validation fails and
    /// [`FuelError::Api`] when the HTTP client cannot be built.
    pub fn new(config: &FuelConfig) -> Result<Self, FuelError> {
        config.validate()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|err| KeystoneError::Http {
                url: config.api_url(),
                message: err.to_string(),
            })?;
        let auth = KeystoneAuth {
            auth_url: config.keystone_url(),
            username: config.login.clone(),
            password: config.password.clone(),
            tenant_name: config.tenant.clone(),
        };
        Ok(Self {
            http: AuthorizedHttp::new(client, auth),
            base_url: config.api_url(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl FuelApi for HttpFuelApi {
    fn clusters(&self) -> Result<Vec<Cluster>, FuelError> {
        Ok(self.http.get_json(&self.url("/api/clusters"))?)
    }

    fn cluster(&self, cluster_id: u64) -> Result<Cluster, FuelError> {
        Ok(self
            .http
            .get_json(&self.url(&format!("/api/clusters/{cluster_id}")))?)
    }

    fn nodes(&self, cluster_id: u64) -> Result<Vec<Node>, FuelError> {
        Ok(self
            .http
            .get_json(&self.url(&format!("/api/nodes?cluster_id={cluster_id}")))?)
    }

    fn network_configuration(&self, cluster: &Cluster) -> Result<NetworkConfiguration, FuelError> {
        let path = format!(
            "/api/clusters/{}/network_configuration/{}",
            cluster.id, cluster.net_provider
        );
        Ok(self.http.get_json(&self.url(&path))?)
    }

    fn cluster_attributes(&self, cluster_id: u64) -> Result<Value, FuelError> {
        Ok(self
            .http
            .get_json(&self.url(&format!("/api/clusters/{cluster_id}/attributes")))?)
    }

    fn run_test_sets(&self, cluster_id: u64, test_sets: &[&str]) -> Result<Vec<u64>, FuelError> {
        let body = Value::Array(
            test_sets
                .iter()
                .map(|set| {
                    json!({
                        "testset": set,
                        "metadata": { "cluster_id": cluster_id, "config": {} },
                    })
                })
                .collect(),
        );
        info!(cluster_id, test_sets = ?test_sets, "starting OSTF test sets");
        let started: Vec<StartedRun> = self.http.post_json(&self.url("/ostf/testruns"), &body)?;
        Ok(started.into_iter().map(|run| run.id).collect())
    }

    fn test_run(&self, run_id: u64) -> Result<OstfTestRun, FuelError> {
        Ok(self
            .http
            .get_json(&self.url(&format!("/ostf/testruns/{run_id}")))?)
    }
}
