//! Configuration loading via `ortho-config`.
//!
//! Each client takes an explicit configuration object; nothing is read from
//! process-wide state after loading. Every struct discovers its own file
//! (`fuelcheck-fuel.toml`, `fuelcheck-openstack.toml`), so keys such as
//! `password` reach exactly one client.

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Default Fuel (Nailgun) API port.
pub const DEFAULT_FUEL_API_PORT: u16 = 8000;

/// Default Keystone public port.
pub const DEFAULT_KEYSTONE_PORT: u16 = 5000;

/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Project-level file holding [`FuelConfig`] keys.
pub const FUEL_CONFIG_FILE: &str = "fuelcheck-fuel.toml";

/// Project-level file holding [`OpenStackConfig`] keys.
pub const OPENSTACK_CONFIG_FILE: &str = "fuelcheck-openstack.toml";

/// Fuel master connection settings.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "FUEL",
    discovery(
        app_name = "fuelcheck",
        env_var = "FUELCHECK_FUEL_CONFIG_PATH",
        config_file_name = "fuel.toml",
        dotfile_name = ".fuelcheck-fuel.toml",
        project_file_name = "fuelcheck-fuel.toml"
    )
)]
pub struct FuelConfig {
    /// Address of the Fuel master node. This value is required.
    pub master_ip: String,
    /// Port of the Fuel REST API.
    #[ortho_config(default = DEFAULT_FUEL_API_PORT)]
    pub api_port: u16,
    /// Port of the Keystone instance guarding the Fuel API.
    #[ortho_config(default = DEFAULT_KEYSTONE_PORT)]
    pub keystone_port: u16,
    /// Keystone user for the Fuel API.
    #[ortho_config(default = "admin".to_owned())]
    pub login: String,
    /// Keystone password for the Fuel API.
    #[ortho_config(default = "admin".to_owned())]
    pub password: String,
    /// Keystone tenant for the Fuel API.
    #[ortho_config(default = "admin".to_owned())]
    pub tenant: String,
    /// SSH login on the Fuel master.
    #[ortho_config(default = "root".to_owned())]
    pub ssh_login: String,
    /// SSH password on the Fuel master.
    #[ortho_config(default = "r00tme".to_owned())]
    pub ssh_password: String,
    /// Directory receiving the admin private keys fetched from the master.
    /// Defaults to a per-master directory under the system temp dir.
    pub key_cache_dir: Option<String>,
    /// Timeout for a single HTTP request, in seconds.
    #[ortho_config(default = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub request_timeout_secs: u64,
}

/// OpenStack API credentials for the deployed cloud.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "OS",
    discovery(
        app_name = "fuelcheck",
        env_var = "FUELCHECK_OPENSTACK_CONFIG_PATH",
        config_file_name = "openstack.toml",
        dotfile_name = ".fuelcheck-openstack.toml",
        project_file_name = "fuelcheck-openstack.toml"
    )
)]
pub struct OpenStackConfig {
    /// Keystone user.
    #[ortho_config(default = "admin".to_owned())]
    pub username: String,
    /// Keystone password.
    #[ortho_config(default = "admin".to_owned())]
    pub password: String,
    /// Keystone tenant.
    #[ortho_config(default = "admin".to_owned())]
    pub tenant_name: String,
    /// Keystone public port on the controller VIP.
    #[ortho_config(default = DEFAULT_KEYSTONE_PORT)]
    pub keystone_port: u16,
    /// PEM file trusted for TLS; overrides the certificate published by Fuel.
    pub ca_cert: Option<String>,
    /// Timeout for a single HTTP request, in seconds.
    #[ortho_config(default = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub request_timeout_secs: u64,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
    file: &'static str,
}

impl FieldMetadata {
    const fn new(
        description: &'static str,
        env_var: &'static str,
        toml_key: &'static str,
        file: &'static str,
    ) -> Self {
        Self {
            description,
            env_var,
            toml_key,
            file,
        }
    }
}

fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingField(format!(
            "missing {}: set {} or add {} to {}",
            metadata.description, metadata.env_var, metadata.toml_key, metadata.file
        )));
    }
    Ok(())
}

fn require_port(value: u16, metadata: &FieldMetadata) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::MissingField(format!(
            "invalid {}: set {} or {} in {} to a non-zero port",
            metadata.description, metadata.env_var, metadata.toml_key, metadata.file
        )));
    }
    Ok(())
}

impl FuelConfig {
    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("fuelcheck")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation on required fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] naming the environment variable
    /// and TOML key of the first blank field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_field(
            &self.master_ip,
            &FieldMetadata::new(
                "Fuel master address",
                "FUEL_MASTER_IP",
                "master_ip",
                FUEL_CONFIG_FILE,
            ),
        )?;
        require_port(
            self.api_port,
            &FieldMetadata::new("Fuel API port", "FUEL_API_PORT", "api_port", FUEL_CONFIG_FILE),
        )?;
        require_port(
            self.keystone_port,
            &FieldMetadata::new(
                "Fuel Keystone port",
                "FUEL_KEYSTONE_PORT",
                "keystone_port",
                FUEL_CONFIG_FILE,
            ),
        )?;
        require_field(
            &self.login,
            &FieldMetadata::new("Fuel API login", "FUEL_LOGIN", "login", FUEL_CONFIG_FILE),
        )?;
        require_field(
            &self.password,
            &FieldMetadata::new("Fuel API password", "FUEL_PASSWORD", "password", FUEL_CONFIG_FILE),
        )?;
        require_field(
            &self.tenant,
            &FieldMetadata::new("Fuel API tenant", "FUEL_TENANT", "tenant", FUEL_CONFIG_FILE),
        )?;
        require_field(
            &self.ssh_login,
            &FieldMetadata::new(
                "Fuel master SSH login",
                "FUEL_SSH_LOGIN",
                "ssh_login",
                FUEL_CONFIG_FILE,
            ),
        )?;
        require_field(
            &self.ssh_password,
            &FieldMetadata::new(
                "Fuel master SSH password",
                "FUEL_SSH_PASSWORD",
                "ssh_password",
                FUEL_CONFIG_FILE,
            ),
        )?;
        if let Some(dir) = self.key_cache_dir.as_deref() {
            require_field(
                dir,
                &FieldMetadata::new(
                    "admin key cache directory",
                    "FUEL_KEY_CACHE_DIR",
                    "key_cache_dir",
                    FUEL_CONFIG_FILE,
                ),
            )?;
        }
        Ok(())
    }

    /// Base URL of the Fuel REST API.
    #[must_use]
    pub fn api_url(&self) -> String {
        format!("http://{}:{}", self.master_ip, self.api_port)
    }

    /// Keystone v2.0 URL guarding the Fuel API.
    #[must_use]
    pub fn keystone_url(&self) -> String {
        format!("http://{}:{}/v2.0", self.master_ip, self.keystone_port)
    }
}

impl OpenStackConfig {
    /// Loads configuration without attempting to parse CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("fuelcheck")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation on required fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] for the first blank field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_field(
            &self.username,
            &FieldMetadata::new("OpenStack user", "OS_USERNAME", "username", OPENSTACK_CONFIG_FILE),
        )?;
        require_field(
            &self.password,
            &FieldMetadata::new(
                "OpenStack password",
                "OS_PASSWORD",
                "password",
                OPENSTACK_CONFIG_FILE,
            ),
        )?;
        require_field(
            &self.tenant_name,
            &FieldMetadata::new(
                "OpenStack tenant",
                "OS_TENANT_NAME",
                "tenant_name",
                OPENSTACK_CONFIG_FILE,
            ),
        )?;
        require_port(
            self.keystone_port,
            &FieldMetadata::new(
                "OpenStack Keystone port",
                "OS_KEYSTONE_PORT",
                "keystone_port",
                OPENSTACK_CONFIG_FILE,
            ),
        )
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn fuel() -> FuelConfig {
        FuelConfig {
            master_ip: String::from("10.20.0.2"),
            api_port: DEFAULT_FUEL_API_PORT,
            keystone_port: DEFAULT_KEYSTONE_PORT,
            login: String::from("admin"),
            password: String::from("admin"),
            tenant: String::from("admin"),
            ssh_login: String::from("root"),
            ssh_password: String::from("r00tme"),
            key_cache_dir: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }

    #[test]
    fn fuel_urls_use_master_address() {
        let fuel = fuel();
        assert!(fuel.validate().is_ok());
        assert_eq!(fuel.api_url(), "http://10.20.0.2:8000");
        assert_eq!(fuel.keystone_url(), "http://10.20.0.2:5000/v2.0");
    }

    #[rstest]
    #[case::master_ip(FuelConfig { master_ip: String::new(), ..fuel() }, "FUEL_MASTER_IP")]
    #[case::login(FuelConfig { login: String::from("  "), ..fuel() }, "FUEL_LOGIN")]
    #[case::ssh_password(FuelConfig { ssh_password: String::new(), ..fuel() }, "FUEL_SSH_PASSWORD")]
    #[case::key_cache_dir(FuelConfig { key_cache_dir: Some(String::new()), ..fuel() }, "FUEL_KEY_CACHE_DIR")]
    #[case::api_port(FuelConfig { api_port: 0, ..fuel() }, "FUEL_API_PORT")]
    fn fuel_validation_names_env_var(#[case] cfg: FuelConfig, #[case] env_var: &str) {
        let err = cfg.validate().expect_err("validation should fail");
        let ConfigError::MissingField(message) = err else {
            panic!("expected MissingField, got {err:?}");
        };
        assert!(message.contains(env_var), "message: {message}");
        assert!(message.contains(FUEL_CONFIG_FILE), "message: {message}");
    }

    #[test]
    fn openstack_validation_names_env_var() {
        let cfg = OpenStackConfig {
            username: String::from("admin"),
            password: String::new(),
            tenant_name: String::from("admin"),
            keystone_port: DEFAULT_KEYSTONE_PORT,
            ca_cert: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        };
        let err = cfg.validate().expect_err("blank password should fail");
        assert!(err.to_string().contains("OS_PASSWORD"), "{err}");
    }
}
