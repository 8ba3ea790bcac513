//! Re-evaluable predicates over [`CloudApi`] state.
//!
//! Every builder returns a closure that queries the API afresh on each call,
//! so it can be handed straight to [`crate::wait::Waiter::until`]. States
//! that can never become ready are reported as
//! [`OpenStackError::Failed`] rather than `false`.

use super::types::{ACTIVE, AVAILABLE, CINDER_ERROR, DELETED, ERROR, NOVA_COMPUTE_BINARY};
use super::{CloudApi, OpenStackError};

/// Ready when the server reports `status`; a missing server is not ready.
pub fn server_status_is<'a, A: CloudApi + ?Sized>(
    api: &'a A,
    server_id: &'a str,
    status: &'a str,
) -> impl Fn() -> Result<bool, OpenStackError> + 'a {
    move || Ok(api.server(server_id)?.is_some_and(|server| server.status == status))
}

/// Ready when the server is `ACTIVE`.
///
/// Fails once the server reports `ERROR` or disappears.
pub fn is_server_active<'a, A: CloudApi + ?Sized>(
    api: &'a A,
    server_id: &'a str,
) -> impl Fn() -> Result<bool, OpenStackError> + 'a {
    move || {
        let server = api.server(server_id)?.ok_or_else(|| OpenStackError::NotFound {
            kind: "server",
            id: server_id.to_owned(),
        })?;
        if server.status == ERROR {
            return Err(OpenStackError::Failed {
                kind: "server",
                id: server.id,
                status: server.status,
            });
        }
        Ok(server.status == ACTIVE)
    }
}

/// Ready once the server is gone or reported `DELETED`.
pub fn is_server_deleted<'a, A: CloudApi + ?Sized>(
    api: &'a A,
    server_id: &'a str,
) -> impl Fn() -> Result<bool, OpenStackError> + 'a {
    move || {
        Ok(api
            .server(server_id)?
            .is_none_or(|server| server.status == DELETED))
    }
}

/// Ready when at least one `nova-compute` service is enabled and every
/// enabled one is up. Disabled computes are ignored.
pub fn is_nova_ready<A: CloudApi + ?Sized>(
    api: &A,
) -> impl Fn() -> Result<bool, OpenStackError> + '_ {
    move || {
        let computes: Vec<_> = api
            .compute_services()?
            .into_iter()
            .filter(|service| service.binary == NOVA_COMPUTE_BINARY && service.is_enabled())
            .collect();
        Ok(!computes.is_empty() && computes.iter().all(|service| service.is_available()))
    }
}

/// Ready when the volume reports `status`; a missing volume is not ready.
pub fn volume_status_is<'a, A: CloudApi + ?Sized>(
    api: &'a A,
    volume_id: &'a str,
    status: &'a str,
) -> impl Fn() -> Result<bool, OpenStackError> + 'a {
    move || Ok(api.volume(volume_id)?.is_some_and(|volume| volume.status == status))
}

/// Ready when the volume is `available` with no attachments.
///
/// Fails when the volume disappears or reports `error`.
pub fn is_volume_released<'a, A: CloudApi + ?Sized>(
    api: &'a A,
    volume_id: &'a str,
) -> impl Fn() -> Result<bool, OpenStackError> + 'a {
    move || {
        let volume = api.volume(volume_id)?.ok_or_else(|| OpenStackError::NotFound {
            kind: "volume",
            id: volume_id.to_owned(),
        })?;
        if volume.status == CINDER_ERROR {
            return Err(OpenStackError::Failed {
                kind: "volume",
                id: volume.id,
                status: volume.status,
            });
        }
        Ok(volume.is_released())
    }
}

fn cinder_available(
    kind: &'static str,
    id: &str,
    status: Option<String>,
) -> Result<bool, OpenStackError> {
    match status {
        None => Err(OpenStackError::NotFound {
            kind,
            id: id.to_owned(),
        }),
        Some(value) if value == CINDER_ERROR => Err(OpenStackError::Failed {
            kind,
            id: id.to_owned(),
            status: value,
        }),
        Some(value) => Ok(value == AVAILABLE),
    }
}

/// Ready when the snapshot is `available`; `error` is fatal.
pub fn is_snapshot_available<'a, A: CloudApi + ?Sized>(
    api: &'a A,
    snapshot_id: &'a str,
) -> impl Fn() -> Result<bool, OpenStackError> + 'a {
    move || {
        let status = api.snapshot(snapshot_id)?.map(|snapshot| snapshot.status);
        cinder_available("snapshot", snapshot_id, status)
    }
}

/// Ready when the backup is `available`; `error` is fatal.
pub fn is_backup_available<'a, A: CloudApi + ?Sized>(
    api: &'a A,
    backup_id: &'a str,
) -> impl Fn() -> Result<bool, OpenStackError> + 'a {
    move || {
        let status = api.backup(backup_id)?.map(|backup| backup.status);
        cinder_available("backup", backup_id, status)
    }
}

/// Ready once none of `snapshot_ids` is listed.
pub fn are_snapshots_deleted<'a, A: CloudApi + ?Sized>(
    api: &'a A,
    snapshot_ids: &'a [String],
) -> impl Fn() -> Result<bool, OpenStackError> + 'a {
    move || {
        Ok(!api
            .snapshots()?
            .iter()
            .any(|snapshot| snapshot_ids.contains(&snapshot.id)))
    }
}

/// Ready once none of `backup_ids` is listed.
pub fn are_backups_deleted<'a, A: CloudApi + ?Sized>(
    api: &'a A,
    backup_ids: &'a [String],
) -> impl Fn() -> Result<bool, OpenStackError> + 'a {
    move || {
        Ok(!api
            .backups()?
            .iter()
            .any(|backup| backup_ids.contains(&backup.id)))
    }
}
