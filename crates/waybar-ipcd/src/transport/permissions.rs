//! Applies the configured mode and ownership to a freshly bound socket file.
//!
//! Failures never stop the daemon: the socket stays usable with whatever
//! permissions the bind produced, and each problem is logged as a warning.

use std::fs::{self, Permissions};
use std::os::unix::fs::{PermissionsExt, chown};

use camino::Utf8Path;
use nix::unistd::{Group, User, geteuid};
use tracing::{info, warn};

use waybar_ipc_config::{OwnerSpec, SocketOwner, SocketSettings};

use super::LISTENER_TARGET;
use super::errors::PermissionError;

/// Applies mode and ownership from `settings`, logging any failure.
pub(crate) fn apply(settings: &SocketSettings) {
    let path = settings.path();
    match set_mode(path, settings.mode().bits()) {
        Ok(()) => info!(
            target: LISTENER_TARGET,
            path = %path,
            mode = %settings.mode(),
            "applied socket permissions"
        ),
        Err(error) => warn!(target: LISTENER_TARGET, %error, "could not set socket permissions"),
    }

    let owner = settings.owner();
    if owner.is_unset() {
        return;
    }
    if !geteuid().is_root() {
        warn!(
            target: LISTENER_TARGET,
            path = %path,
            "not running as root; leaving socket ownership unchanged"
        );
        return;
    }
    apply_owner(path, owner);
}

fn set_mode(path: &Utf8Path, mode: u32) -> Result<(), PermissionError> {
    fs::set_permissions(path, Permissions::from_mode(mode)).map_err(|source| {
        PermissionError::Chmod {
            path: path.to_path_buf(),
            mode,
            source,
        }
    })
}

fn apply_owner(path: &Utf8Path, owner: &SocketOwner) {
    let uid = owner.user.as_ref().and_then(|spec| {
        resolve_user(spec)
            .inspect_err(|error| warn!(target: LISTENER_TARGET, %error, "skipping socket owner"))
            .ok()
    });
    let gid = owner.group.as_ref().and_then(|spec| {
        resolve_group(spec)
            .inspect_err(|error| warn!(target: LISTENER_TARGET, %error, "skipping socket group"))
            .ok()
    });
    if uid.is_none() && gid.is_none() {
        return;
    }

    match change_owner(path, uid, gid) {
        Ok(()) => info!(
            target: LISTENER_TARGET,
            path = %path,
            uid = ?uid,
            gid = ?gid,
            "changed socket ownership"
        ),
        Err(error) => warn!(target: LISTENER_TARGET, %error, "could not change socket ownership"),
    }
}

fn resolve_user(spec: &OwnerSpec) -> Result<u32, PermissionError> {
    match spec {
        OwnerSpec::Id(uid) => Ok(*uid),
        OwnerSpec::Name(name) => User::from_name(name)
            .map_err(|source| PermissionError::Lookup {
                name: name.clone(),
                source,
            })?
            .map(|user| user.uid.as_raw())
            .ok_or_else(|| PermissionError::UnknownUser { name: name.clone() }),
    }
}

fn resolve_group(spec: &OwnerSpec) -> Result<u32, PermissionError> {
    match spec {
        OwnerSpec::Id(gid) => Ok(*gid),
        OwnerSpec::Name(name) => Group::from_name(name)
            .map_err(|source| PermissionError::Lookup {
                name: name.clone(),
                source,
            })?
            .map(|group| group.gid.as_raw())
            .ok_or_else(|| PermissionError::UnknownGroup { name: name.clone() }),
    }
}

fn change_owner(path: &Utf8Path, uid: Option<u32>, gid: Option<u32>) -> Result<(), PermissionError> {
    chown(path, uid, gid).map_err(|source| PermissionError::Chown {
        path: path.to_path_buf(),
        source,
    })
}
