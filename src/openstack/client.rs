//! Keystone-authenticated Nova and Cinder client.

use std::time::Duration;

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use reqwest::Certificate;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::config::OpenStackConfig;
use crate::keystone::{AuthorizedHttp, KeystoneAuth, KeystoneError};

use super::OpenStackError;
use super::types::{Backup, ComputeService, Server, ServerRequest, Snapshot, Volume};

const COMPUTE_SERVICE: &[&str] = &["compute"];
const VOLUME_SERVICE: &[&str] = &["volumev2", "volume"];

/// Compute and block-storage operations the status checks rely on.
pub trait CloudApi {
    /// Fetches a server; `None` once it no longer exists.
    ///
    /// # Errors
    ///
    /// Returns [`OpenStackError::Api`] when the request fails.
    fn server(&self, server_id: &str) -> Result<Option<Server>, OpenStackError>;

    /// Boots a server and returns its id; the build continues in the
    /// background.
    ///
    /// # Errors
    ///
    /// Returns [`OpenStackError::Api`] when the request fails.
    fn create_server(&self, request: &ServerRequest) -> Result<String, OpenStackError>;

    /// Name of the hypervisor hosting the server.
    ///
    /// # Errors
    ///
    /// Returns [`OpenStackError::NotFound`] when the server is gone,
    /// [`OpenStackError::MissingAttribute`] when the attribute is hidden
    /// (non-admin credentials), or any API error.
    fn hypervisor_name(&self, server_id: &str) -> Result<String, OpenStackError> {
        let server = self.server(server_id)?.ok_or_else(|| OpenStackError::NotFound {
            kind: "server",
            id: server_id.to_owned(),
        })?;
        server
            .hypervisor_hostname
            .ok_or_else(|| OpenStackError::MissingAttribute {
                kind: "server",
                id: server_id.to_owned(),
                attribute: "OS-EXT-SRV-ATTR:hypervisor_hostname",
            })
    }

    /// Requests deletion; with deferred delete enabled the server becomes
    /// `SOFT_DELETED`.
    ///
    /// # Errors
    ///
    /// Returns [`OpenStackError::Api`] when the request fails.
    fn delete_server(&self, server_id: &str) -> Result<(), OpenStackError>;

    /// Purges a server immediately, including a soft-deleted one.
    ///
    /// # Errors
    ///
    /// Returns [`OpenStackError::Api`] when the request fails.
    fn force_delete_server(&self, server_id: &str) -> Result<(), OpenStackError>;

    /// Restores a soft-deleted server.
    ///
    /// # Errors
    ///
    /// Returns [`OpenStackError::Api`] when the request fails.
    fn restore_server(&self, server_id: &str) -> Result<(), OpenStackError>;

    /// Lists Nova services.
    ///
    /// # Errors
    ///
    /// Returns [`OpenStackError::Api`] when the request fails.
    fn compute_services(&self) -> Result<Vec<ComputeService>, OpenStackError>;

    /// Fetches a volume; `None` once it no longer exists.
    ///
    /// # Errors
    ///
    /// Returns [`OpenStackError::Api`] when the request fails.
    fn volume(&self, volume_id: &str) -> Result<Option<Volume>, OpenStackError>;

    /// Fetches a snapshot; `None` once it no longer exists.
    ///
    /// # Errors
    ///
    /// Returns [`OpenStackError::Api`] when the request fails.
    fn snapshot(&self, snapshot_id: &str) -> Result<Option<Snapshot>, OpenStackError>;

    /// Lists every visible snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`OpenStackError::Api`] when the request fails.
    fn snapshots(&self) -> Result<Vec<Snapshot>, OpenStackError>;

    /// Fetches a backup; `None` once it no longer exists.
    ///
    /// # Errors
    ///
    /// Returns [`OpenStackError::Api`] when the request fails.
    fn backup(&self, backup_id: &str) -> Result<Option<Backup>, OpenStackError>;

    /// Lists every visible backup.
    ///
    /// # Errors
    ///
    /// Returns [`OpenStackError::Api`] when the request fails.
    fn backups(&self) -> Result<Vec<Backup>, OpenStackError>;
}

#[derive(Deserialize)]
struct ServerBody {
    server: Server,
}

#[derive(Deserialize)]
struct CreatedServerBody {
    server: CreatedServer,
}

#[derive(Deserialize)]
struct CreatedServer {
    id: String,
}

#[derive(Deserialize)]
struct ServicesBody {
    services: Vec<ComputeService>,
}

#[derive(Deserialize)]
struct VolumeBody {
    volume: Volume,
}

#[derive(Deserialize)]
struct SnapshotBody {
    snapshot: Snapshot,
}

#[derive(Deserialize)]
struct SnapshotsBody {
    snapshots: Vec<Snapshot>,
}

#[derive(Deserialize)]
struct BackupBody {
    backup: Backup,
}

#[derive(Deserialize)]
struct BackupsBody {
    backups: Vec<Backup>,
}

/// [`CloudApi`] over the public endpoints of one cloud.
#[derive(Debug)]
pub struct OpenStackClient {
    http: AuthorizedHttp,
}

impl OpenStackClient {
    /// Builds a client authenticating against Keystone on `controller_ip`.
    ///
    /// TLS is used when `config.ca_cert` names a PEM file or when
    /// `certificate` carries the PEM published by Fuel; the file wins when
    /// both are present. Without either, plain HTTP is used.
    ///
    /// # Errors
    ///
    /// Returns [`OpenStackError::Config`] when validation fails,
    /// [`OpenStackError::Certificate`] when the PEM cannot be loaded, and
    /// [`OpenStackError::Api`] when the HTTP client cannot be built.
    pub fn new(
        config: &OpenStackConfig,
        controller_ip: &str,
        certificate: Option<&str>,
    ) -> Result<Self, OpenStackError> {
        config.validate()?;
        let pem = match config.ca_cert.as_deref() {
            Some(path) => Some(read_pem(Utf8Path::new(path))?),
            None => certificate.map(|content| content.as_bytes().to_vec()),
        };
        let scheme = if pem.is_some() { "https" } else { "http" };
        let auth_url = format!("{scheme}://{controller_ip}:{}/v2.0", config.keystone_port);

        let mut builder = Client::builder().timeout(Duration::from_secs(config.request_timeout_secs));
        if let Some(bytes) = pem {
            let root = Certificate::from_pem(&bytes).map_err(|err| OpenStackError::Certificate {
                source_name: config
                    .ca_cert
                    .clone()
                    .unwrap_or_else(|| String::from("fuel cluster attributes")),
                message: err.to_string(),
            })?;
            builder = builder.add_root_certificate(root);
        }
        let http = builder.build().map_err(|err| KeystoneError::Http {
            url: auth_url.clone(),
            message: err.to_string(),
        })?;
        debug!(auth_url = %auth_url, "init openstack client");

        Ok(Self {
            http: AuthorizedHttp::new(
                http,
                KeystoneAuth {
                    auth_url,
                    username: config.username.clone(),
                    password: config.password.clone(),
                    tenant_name: config.tenant_name.clone(),
                },
            ),
        })
    }

    fn compute_url(&self, path: &str) -> Result<String, OpenStackError> {
        Ok(format!("{}{path}", self.http.endpoint(COMPUTE_SERVICE)?))
    }

    fn volume_url(&self, path: &str) -> Result<String, OpenStackError> {
        Ok(format!("{}{path}", self.http.endpoint(VOLUME_SERVICE)?))
    }

    fn server_action(&self, server_id: &str, action: &str) -> Result<(), OpenStackError> {
        let url = self.compute_url(&format!("/servers/{server_id}/action"))?;
        debug!(server_id, action, "server action");
        let mut body = Map::new();
        body.insert(action.to_owned(), Value::Null);
        Ok(self.http.post(&url, &Value::Object(body))?)
    }
}

fn read_pem(path: &Utf8Path) -> Result<Vec<u8>, OpenStackError> {
    let certificate_error = |message: String| OpenStackError::Certificate {
        source_name: path.to_string(),
        message,
    };
    let parent = path
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| certificate_error(String::from("path has no file name")))?;
    let dir = Dir::open_ambient_dir(parent, ambient_authority())
        .map_err(|err| certificate_error(err.to_string()))?;
    dir.read(file_name)
        .map_err(|err| certificate_error(err.to_string()))
}

impl CloudApi for OpenStackClient {
    fn server(&self, server_id: &str) -> Result<Option<Server>, OpenStackError> {
        let url = self.compute_url(&format!("/servers/{server_id}"))?;
        Ok(self
            .http
            .get_optional_json::<ServerBody>(&url)?
            .map(|body| body.server))
    }

    fn create_server(&self, request: &ServerRequest) -> Result<String, OpenStackError> {
        let url = self.compute_url("/servers")?;
        let mut server = Map::new();
        server.insert(String::from("name"), json!(request.name));
        server.insert(String::from("imageRef"), json!(request.image_ref));
        server.insert(String::from("flavorRef"), json!(request.flavor_ref));
        if let Some(key_name) = &request.key_name {
            server.insert(String::from("key_name"), json!(key_name));
        }
        if !request.networks.is_empty() {
            server.insert(
                String::from("networks"),
                request
                    .networks
                    .iter()
                    .map(|network_id| json!({ "uuid": network_id }))
                    .collect(),
            );
        }
        debug!(name = %request.name, "create server");
        let created: CreatedServerBody = self.http.post_json(&url, &json!({ "server": server }))?;
        Ok(created.server.id)
    }

    fn delete_server(&self, server_id: &str) -> Result<(), OpenStackError> {
        let url = self.compute_url(&format!("/servers/{server_id}"))?;
        Ok(self.http.delete(&url)?)
    }

    fn force_delete_server(&self, server_id: &str) -> Result<(), OpenStackError> {
        self.server_action(server_id, "forceDelete")
    }

    fn restore_server(&self, server_id: &str) -> Result<(), OpenStackError> {
        self.server_action(server_id, "restore")
    }

    fn compute_services(&self) -> Result<Vec<ComputeService>, OpenStackError> {
        let url = self.compute_url("/os-services")?;
        Ok(self.http.get_json::<ServicesBody>(&url)?.services)
    }

    fn volume(&self, volume_id: &str) -> Result<Option<Volume>, OpenStackError> {
        let url = self.volume_url(&format!("/volumes/{volume_id}"))?;
        Ok(self
            .http
            .get_optional_json::<VolumeBody>(&url)?
            .map(|body| body.volume))
    }

    fn snapshot(&self, snapshot_id: &str) -> Result<Option<Snapshot>, OpenStackError> {
        let url = self.volume_url(&format!("/snapshots/{snapshot_id}"))?;
        Ok(self
            .http
            .get_optional_json::<SnapshotBody>(&url)?
            .map(|body| body.snapshot))
    }

    fn snapshots(&self) -> Result<Vec<Snapshot>, OpenStackError> {
        let url = self.volume_url("/snapshots/detail")?;
        Ok(self.http.get_json::<SnapshotsBody>(&url)?.snapshots)
    }

    fn backup(&self, backup_id: &str) -> Result<Option<Backup>, OpenStackError> {
        let url = self.volume_url(&format!("/backups/{backup_id}"))?;
        Ok(self
            .http
            .get_optional_json::<BackupBody>(&url)?
            .map(|body| body.backup))
    }

    fn backups(&self) -> Result<Vec<Backup>, OpenStackError> {
        let url = self.volume_url("/backups/detail")?;
        Ok(self.http.get_json::<BackupsBody>(&url)?.backups)
    }
}
