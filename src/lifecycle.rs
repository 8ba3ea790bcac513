//! Deferred-delete workflows: each action is followed by a wait for the
//! state Nova or Cinder should settle in.

use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::openstack::checks::{
    is_server_active, is_server_deleted, is_volume_released, server_status_is,
};
use crate::openstack::{ACTIVE, CloudApi, OpenStackError, SOFT_DELETED, Server, ServerRequest};
use crate::wait::{Clock, SystemClock, WaitError, WaitOptions, Waiter};

/// Default upper bound for one lifecycle transition.
pub const DEFAULT_LIFECYCLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Default pause between status polls.
pub const DEFAULT_LIFECYCLE_SLEEP: Duration = Duration::from_secs(5);

/// Timeout and poll interval applied to every transition.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LifecycleTimeouts {
    /// Upper bound for one transition.
    pub timeout: Duration,
    /// Pause between polls.
    pub sleep: Duration,
}

impl Default for LifecycleTimeouts {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_LIFECYCLE_TIMEOUT,
            sleep: DEFAULT_LIFECYCLE_SLEEP,
        }
    }
}

impl LifecycleTimeouts {
    fn options(&self, waiting_for: String) -> WaitOptions {
        WaitOptions::new(self.timeout)
            .sleep(self.sleep)
            .waiting_for(waiting_for)
    }
}

/// Errors raised by lifecycle workflows.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The action or a status query failed.
    #[error(transparent)]
    Cloud(#[from] OpenStackError),
    /// The resource did not settle in time.
    #[error("timed out after {}s waiting for {waiting_for}", .elapsed.as_secs())]
    Timeout {
        /// Label describing what was awaited.
        waiting_for: String,
        /// Time spent polling.
        elapsed: Duration,
    },
}

impl From<WaitError<OpenStackError>> for LifecycleError {
    fn from(value: WaitError<OpenStackError>) -> Self {
        match value {
            WaitError::Timeout {
                waiting_for,
                elapsed,
                ..
            } => Self::Timeout {
                waiting_for,
                elapsed,
            },
            WaitError::Failed { source, .. } => Self::Cloud(source),
        }
    }
}

/// Runs server and volume transitions against one cloud.
#[derive(Debug)]
pub struct Lifecycle<'a, A: CloudApi, C: Clock = SystemClock> {
    api: &'a A,
    waiter: Waiter<C>,
    timeouts: LifecycleTimeouts,
}

impl<'a, A: CloudApi> Lifecycle<'a, A> {
    /// Uses the default timeouts and the wall clock.
    #[must_use]
    pub fn new(api: &'a A) -> Self {
        Self {
            api,
            waiter: Waiter::new(),
            timeouts: LifecycleTimeouts::default(),
        }
    }
}

impl<'a, A: CloudApi, C: Clock> Lifecycle<'a, A, C> {
    /// Replaces the timeouts.
    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: LifecycleTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Replaces the clock driving the waits.
    #[must_use]
    pub fn with_clock<D: Clock>(self, clock: D) -> Lifecycle<'a, A, D> {
        Lifecycle {
            api: self.api,
            waiter: Waiter::with_clock(clock),
            timeouts: self.timeouts,
        }
    }

    /// Timeouts in effect.
    #[must_use]
    pub const fn timeouts(&self) -> LifecycleTimeouts {
        self.timeouts
    }

    /// Boots a server, waits for it to become `ACTIVE`, and returns its
    /// current record.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Cloud`] holding [`OpenStackError::Failed`]
    /// when the build ends in `ERROR`, [`LifecycleError::Timeout`] when it
    /// never finishes, or any API error.
    pub fn create_server(&self, request: &ServerRequest) -> Result<Server, LifecycleError> {
        info!(name = %request.name, "create server");
        let server_id = self.api.create_server(request)?;
        let options = self
            .timeouts
            .options(format!("server {} status change to {ACTIVE}", request.name));
        self.waiter
            .until(&options, is_server_active(self.api, &server_id))?;
        let server = self.api.server(&server_id)?.ok_or(OpenStackError::NotFound {
            kind: "server",
            id: server_id,
        })?;
        info!(server_id = %server.id, name = %server.name, "server is active");
        Ok(server)
    }

    /// Deletes the server and waits for it to become `SOFT_DELETED`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Timeout`] when the status never changes, or
    /// any API error.
    pub fn soft_delete(&self, server_id: &str) -> Result<(), LifecycleError> {
        info!(server_id, "soft delete server");
        self.api.delete_server(server_id)?;
        self.wait_server_status(server_id, SOFT_DELETED)
    }

    /// Restores a soft-deleted server and waits for it to become `ACTIVE`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Timeout`] when the status never changes, or
    /// any API error.
    pub fn restore(&self, server_id: &str) -> Result<(), LifecycleError> {
        info!(server_id, "restore server");
        self.api.restore_server(server_id)?;
        self.wait_server_status(server_id, ACTIVE)
    }

    /// Force-deletes the server and waits until it is gone.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Timeout`] when the server remains, or any
    /// API error.
    pub fn force_delete(&self, server_id: &str) -> Result<(), LifecycleError> {
        info!(server_id, "force delete server");
        self.api.force_delete_server(server_id)?;
        let options = self
            .timeouts
            .options(format!("server {server_id} to be deleted"));
        self.waiter
            .until(&options, is_server_deleted(self.api, server_id))?;
        Ok(())
    }

    /// Waits until the volume is `available` with no attachments.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Timeout`] when the volume stays attached,
    /// or [`LifecycleError::Cloud`] when it disappears or fails.
    pub fn wait_volume_released(&self, volume_id: &str) -> Result<(), LifecycleError> {
        let options = self
            .timeouts
            .options(format!("volume {volume_id} to be released"));
        self.waiter
            .until(&options, is_volume_released(self.api, volume_id))?;
        Ok(())
    }

    fn wait_server_status(&self, server_id: &str, status: &str) -> Result<(), LifecycleError> {
        let options = self
            .timeouts
            .options(format!("server {server_id} status change to {status}"));
        self.waiter
            .until(&options, server_status_is(self.api, server_id, status))?;
        Ok(())
    }
}
