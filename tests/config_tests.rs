//! Integration tests for layered configuration loading and validation.

use std::fs;

use fuelcheck::config::{DEFAULT_FUEL_API_PORT, FUEL_CONFIG_FILE, OPENSTACK_CONFIG_FILE};
use fuelcheck::test_support::EnvGuard;
use fuelcheck::{ConfigError, FuelConfig, OpenStackConfig, SshConfig};
use rstest::*;
use tempfile::TempDir;

#[fixture]
fn valid_fuel() -> FuelConfig {
    FuelConfig {
        master_ip: String::from("10.20.0.2"),
        api_port: 8000,
        keystone_port: 5000,
        login: String::from("admin"),
        password: String::from("admin"),
        tenant: String::from("admin"),
        ssh_login: String::from("root"),
        ssh_password: String::from("r00tme"),
        key_cache_dir: None,
        request_timeout_secs: 60,
    }
}

#[fixture]
fn valid_openstack() -> OpenStackConfig {
    OpenStackConfig {
        username: String::from("admin"),
        password: String::from("admin"),
        tenant_name: String::from("admin"),
        keystone_port: 5000,
        ca_cert: None,
        request_timeout_secs: 60,
    }
}

fn assert_actionable(error: &ConfigError, env_var: &str, toml_key: &str, file: &str) {
    let message = error.to_string();
    assert!(
        message.contains(env_var),
        "error should mention env var {env_var}: {message}"
    );
    assert!(
        message.contains(file),
        "error should mention config file: {message}"
    );
    assert!(
        message.contains(toml_key),
        "error should mention TOML key {toml_key}: {message}"
    );
}

#[rstest]
fn fuel_defaults_validate(valid_fuel: FuelConfig) {
    assert!(valid_fuel.validate().is_ok());
    assert_eq!(valid_fuel.api_url(), "http://10.20.0.2:8000");
    assert_eq!(valid_fuel.keystone_url(), "http://10.20.0.2:5000/v2.0");
}

#[rstest]
#[case::master_ip(|cfg: &mut FuelConfig| cfg.master_ip = String::from("  "), "FUEL_MASTER_IP", "master_ip")]
#[case::api_port(|cfg: &mut FuelConfig| cfg.api_port = 0, "FUEL_API_PORT", "api_port")]
#[case::login(|cfg: &mut FuelConfig| cfg.login = String::new(), "FUEL_LOGIN", "login")]
#[case::tenant(|cfg: &mut FuelConfig| cfg.tenant = String::new(), "FUEL_TENANT", "tenant")]
#[case::ssh_password(|cfg: &mut FuelConfig| cfg.ssh_password = String::new(), "FUEL_SSH_PASSWORD", "ssh_password")]
#[case::key_cache_dir(|cfg: &mut FuelConfig| cfg.key_cache_dir = Some(String::from(" ")), "FUEL_KEY_CACHE_DIR", "key_cache_dir")]
fn fuel_validation_names_the_setting(
    mut valid_fuel: FuelConfig,
    #[case] mutate: fn(&mut FuelConfig),
    #[case] env_var: &str,
    #[case] toml_key: &str,
) {
    mutate(&mut valid_fuel);

    let error = valid_fuel.validate().expect_err("validation should fail");

    assert!(matches!(error, ConfigError::MissingField(_)));
    assert_actionable(&error, env_var, toml_key, FUEL_CONFIG_FILE);
}

#[rstest]
#[case::username(|cfg: &mut OpenStackConfig| cfg.username = String::new(), "OS_USERNAME", "username")]
#[case::password(|cfg: &mut OpenStackConfig| cfg.password = String::new(), "OS_PASSWORD", "password")]
#[case::tenant(|cfg: &mut OpenStackConfig| cfg.tenant_name = String::new(), "OS_TENANT_NAME", "tenant_name")]
#[case::port(|cfg: &mut OpenStackConfig| cfg.keystone_port = 0, "OS_KEYSTONE_PORT", "keystone_port")]
fn openstack_validation_names_the_setting(
    mut valid_openstack: OpenStackConfig,
    #[case] mutate: fn(&mut OpenStackConfig),
    #[case] env_var: &str,
    #[case] toml_key: &str,
) {
    mutate(&mut valid_openstack);

    let error = valid_openstack
        .validate()
        .expect_err("validation should fail");

    assert_actionable(&error, env_var, toml_key, OPENSTACK_CONFIG_FILE);
}

#[test]
fn fuel_config_reads_environment() {
    let _guard = EnvGuard::set_vars(&[
        ("FUEL_MASTER_IP", "172.18.0.2"),
        ("FUEL_SSH_PASSWORD", "secret"),
    ]);

    let cfg = FuelConfig::load_without_cli_args().expect("config should load");

    assert_eq!(cfg.master_ip, "172.18.0.2");
    assert_eq!(cfg.ssh_password, "secret");
    assert_eq!(cfg.api_port, DEFAULT_FUEL_API_PORT);
    assert_eq!(cfg.ssh_login, "root");
}

#[test]
fn openstack_config_reads_environment() {
    let _guard = EnvGuard::set_vars(&[("OS_USERNAME", "tester"), ("OS_TENANT_NAME", "qa")]);

    let cfg = OpenStackConfig::load_without_cli_args().expect("config should load");

    assert_eq!(cfg.username, "tester");
    assert_eq!(cfg.tenant_name, "qa");
    assert_eq!(cfg.password, "admin");
    assert!(cfg.ca_cert.is_none());
}

#[test]
fn ssh_config_defaults_favour_lab_hosts() {
    let _guard = EnvGuard::set_var("FUELCHECK_SSH_PORT", "2222");

    let cfg = SshConfig::load_without_cli_args().expect("config should load");

    assert_eq!(cfg.port, 2222);
    assert!(!cfg.strict_host_key_checking);
    assert_eq!(cfg.known_hosts_file, "/dev/null");
    assert!(cfg.validate().is_ok());
}

#[test]
fn each_config_reads_only_its_own_file() {
    let tmp = TempDir::new().expect("temp dir");
    let fuel_file = tmp.path().join(FUEL_CONFIG_FILE);
    let openstack_file = tmp.path().join(OPENSTACK_CONFIG_FILE);
    fs::write(
        &fuel_file,
        "master_ip = \"10.20.0.2\"\npassword = \"fuelpw\"\nkeystone_port = 35357\n",
    )
    .expect("write fuel file");
    fs::write(&openstack_file, "password = \"ospw\"\n").expect("write openstack file");
    let fuel_path = fuel_file.to_string_lossy().into_owned();
    let openstack_path = openstack_file.to_string_lossy().into_owned();
    let _guard = EnvGuard::set_vars(&[
        ("FUELCHECK_FUEL_CONFIG_PATH", fuel_path.as_str()),
        ("FUELCHECK_OPENSTACK_CONFIG_PATH", openstack_path.as_str()),
    ]);

    let fuel = FuelConfig::load_without_cli_args().expect("fuel config should load");
    let openstack = OpenStackConfig::load_without_cli_args().expect("openstack config should load");

    assert_eq!(fuel.master_ip, "10.20.0.2");
    assert_eq!(fuel.password, "fuelpw");
    assert_eq!(fuel.keystone_port, 35357);
    assert_eq!(openstack.password, "ospw");
    assert_eq!(openstack.keystone_port, 5000);
}
