//! Core library for the `fuelcheck` cluster test harness.
//!
//! The crate drives Fuel-deployed OpenStack clouds during functional tests:
//! it runs commands on nodes over multiplexed SSH sessions, polls cluster
//! and resource state until a condition holds, and wraps the Fuel, Nova,
//! and Cinder APIs the checks read from.

pub mod config;
pub mod fuel;
pub mod keystone;
pub mod lifecycle;
pub mod openstack;
pub mod ssh;
pub mod test_support;
pub mod wait;

pub use config::{ConfigError, FuelConfig, OpenStackConfig};
pub use fuel::{Environment, FuelApi, FuelClient, FuelError, HttpFuelApi, Node};
pub use lifecycle::{Lifecycle, LifecycleError, LifecycleTimeouts};
pub use openstack::{CloudApi, OpenStackClient, OpenStackError};
pub use ssh::{
    CommandOutput, CommandResult, CommandRunner, Credentials, ProcessCommandRunner, RemoteSession,
    SshConfig, SshError, SshExecutor,
};
pub use wait::{
    Clock, SleepSchedule, SystemClock, WaitError, WaitOptions, Waiter, wait, wait_tolerating,
};
