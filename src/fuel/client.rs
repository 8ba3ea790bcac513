//! Entry point bound to one Fuel master.

use std::cell::RefCell;

use camino::Utf8PathBuf;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::config::FuelConfig;
use crate::ssh::{CommandRunner, Credentials, SshExecutor};
use crate::wait::{Clock, SystemClock, Waiter};

use super::keys::{ADMIN_KEY_PATHS, local_key_name, store_keys};
use super::{Environment, FuelApi, FuelError};

const KEY_DIR_PREFIX: &str = "fuelcheck-keys-";

/// Fuel master client: inventory through `api`, shell access through `ssh`.
#[derive(Debug)]
pub struct FuelClient<A, R, C = SystemClock>
where
    A: FuelApi,
    R: CommandRunner,
    C: Clock,
{
    config: FuelConfig,
    api: A,
    ssh: SshExecutor<R>,
    waiter: Waiter<C>,
    admin_keys: RefCell<Option<Vec<Utf8PathBuf>>>,
    key_scratch: RefCell<Option<TempDir>>,
}

impl<A, R> FuelClient<A, R, SystemClock>
where
    A: FuelApi,
    R: CommandRunner,
{
    /// Creates a client that polls on the wall clock.
    ///
    /// # Errors
    ///
    /// Returns [`FuelError::Config`] when `config` fails validation.
    pub fn new(config: FuelConfig, api: A, ssh: SshExecutor<R>) -> Result<Self, FuelError> {
        config.validate()?;
        debug!(master = %config.master_ip, "init fuel client");
        Ok(Self {
            config,
            api,
            ssh,
            waiter: Waiter::new(),
            admin_keys: RefCell::new(None),
            key_scratch: RefCell::new(None),
        })
    }
}

impl<A, R, C> FuelClient<A, R, C>
where
    A: FuelApi,
    R: CommandRunner,
    C: Clock,
{
    /// Replaces the clock driving every wait issued through this client.
    #[must_use]
    pub fn with_clock<D: Clock>(self, clock: D) -> FuelClient<A, R, D> {
        FuelClient {
            config: self.config,
            api: self.api,
            ssh: self.ssh,
            waiter: Waiter::with_clock(clock),
            admin_keys: self.admin_keys,
            key_scratch: self.key_scratch,
        }
    }

    /// Client configuration.
    #[must_use]
    pub const fn config(&self) -> &FuelConfig {
        &self.config
    }

    /// Underlying API.
    #[must_use]
    pub const fn api(&self) -> &A {
        &self.api
    }

    /// Underlying SSH executor.
    #[must_use]
    pub const fn ssh(&self) -> &SshExecutor<R> {
        &self.ssh
    }

    /// Waiter used for cluster-state polling.
    #[must_use]
    pub const fn waiter(&self) -> &Waiter<C> {
        &self.waiter
    }

    /// Returns the cluster with the highest id, bound to the admin keys.
    ///
    /// # Errors
    ///
    /// Returns [`FuelError::NoClusters`] when the master has none, or any
    /// error from listing clusters or fetching the keys.
    pub fn last_created_cluster(&self) -> Result<Environment<'_, A, R, C>, FuelError> {
        let cluster = self
            .api
            .clusters()?
            .into_iter()
            .max_by_key(|cluster| cluster.id)
            .ok_or(FuelError::NoClusters)?;
        info!(cluster_id = cluster.id, name = %cluster.name, "selected cluster");
        let keys = self.admin_keys()?;
        Ok(Environment::new(self, cluster.id, keys))
    }

    /// Private keys of the master's root account, fetched once over SSH and
    /// stored with mode 0600.
    ///
    /// Keys go to `key_cache_dir` when configured. Otherwise they live in a
    /// fresh private temporary directory removed when the client is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`FuelError::Ssh`] when the keys cannot be read and
    /// [`FuelError::KeyStore`] when they cannot be stored.
    pub fn admin_keys(&self) -> Result<Vec<Utf8PathBuf>, FuelError> {
        if let Some(keys) = self.admin_keys.borrow().as_ref() {
            return Ok(keys.clone());
        }

        let credentials =
            Credentials::password(&self.config.ssh_login, &self.config.ssh_password);
        let contents = self
            .ssh
            .with_session(&self.config.master_ip, &credentials, |session| {
                ADMIN_KEY_PATHS
                    .iter()
                    .map(|path| {
                        session
                            .read_file(path)
                            .map(|content| (local_key_name(path), content))
                    })
                    .collect::<Result<Vec<_>, _>>()
            })?;
        let stored = store_keys(&self.key_dir()?, &contents)?;
        info!(count = stored.len(), "fetched admin keys from fuel master");
        *self.admin_keys.borrow_mut() = Some(stored.clone());
        Ok(stored)
    }

    fn key_dir(&self) -> Result<Utf8PathBuf, FuelError> {
        if let Some(dir) = &self.config.key_cache_dir {
            return Ok(Utf8PathBuf::from(dir));
        }
        let mut scratch = self.key_scratch.borrow_mut();
        let path = match scratch.as_ref() {
            Some(dir) => dir.path().to_path_buf(),
            None => {
                let created = tempfile::Builder::new()
                    .prefix(KEY_DIR_PREFIX)
                    .tempdir()
                    .map_err(|err| FuelError::KeyStore {
                        path: Utf8PathBuf::from(std::env::temp_dir().to_string_lossy().into_owned()),
                        message: err.to_string(),
                    })?;
                let fresh = created.path().to_path_buf();
                *scratch = Some(created);
                fresh
            }
        };
        Utf8PathBuf::from_path_buf(path).map_err(|raw| FuelError::KeyStore {
            path: Utf8PathBuf::from(raw.to_string_lossy().into_owned()),
            message: String::from("temporary directory path is not UTF-8"),
        })
    }
}
