//! Dropping elevated privileges before running a target
//!
//! The bootstrap process may have been started with an effective uid or gid
//! that differs from the invoking user's (setuid installs, sudo wrappers).
//! The target must not inherit those rights, so the bootstrap resets every
//! id to the real one before it does anything else.

use log::debug;
use nix::unistd::{Gid, Uid, getgid, getuid, setresgid, setresuid};

use crate::{MstatError, Result};

/// Real user and group ids of the current process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RealIds {
    pub uid: Uid,
    pub gid: Gid,
}

impl RealIds {
    pub fn current() -> Self {
        Self {
            uid: getuid(),
            gid: getgid(),
        }
    }
}

/// Set real, effective and saved ids to the real uid/gid.
///
/// The group is changed first: once the uid is dropped the process may no
/// longer be allowed to change its groups.
pub fn drop_to_real_ids() -> Result<RealIds> {
    let ids = RealIds::current();

    setresgid(ids.gid, ids.gid, ids.gid)
        .map_err(|e| MstatError::Privilege(format!("setresgid({}): {}", ids.gid, e)))?;
    setresuid(ids.uid, ids.uid, ids.uid)
        .map_err(|e| MstatError::Privilege(format!("setresuid({}): {}", ids.uid, e)))?;

    debug!("dropped to real ids uid={} gid={}", ids.uid, ids.gid);
    Ok(ids)
}
