//! Plugdev group checks and repair.
//!
//! The shipped udev rule grants the device to the `plugdev` group, so
//! the group has to exist and the current user has to be in it.

use std::io;

use tracing::info;

use crate::runner::{capture, PasswordPrompt, PrivilegedRunner, RunOutcome};

/// Group the udev rule grants device access to.
pub const DEVICE_GROUP: &str = "plugdev";

/// Errors from the membership check/repair flow.
#[derive(Debug, thiserror::Error)]
pub enum GroupError {
    /// The password prompt was dismissed; nothing was changed.
    #[error("operation cancelled")]
    Cancelled,
    /// A privileged command failed; carries its error text.
    #[error("{0}")]
    Command(String),
    /// An unprivileged probe could not be spawned.
    #[error("failed to run {program}: {source}")]
    Probe {
        /// Program that failed to spawn.
        program: &'static str,
        /// Underlying I/O error.
        source: io::Error,
    },
}

/// How the user ended up in the device group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    /// The user was already a member; nothing changed.
    AlreadyMember,
    /// The user was added; a re-login is needed for it to take effect.
    Added,
}

/// Outcome of [`ensure_plugdev_membership`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupStatus {
    /// User the check ran for.
    pub user: String,
    /// Whether the group had to be created first.
    pub group_created: bool,
    /// Resulting membership state.
    pub membership: Membership,
}

/// Whether `group` exists, per `getent group`.
///
/// # Errors
///
/// Returns [`GroupError::Probe`] when `getent` cannot be spawned.
pub fn group_exists(group: &str) -> Result<bool, GroupError> {
    let probe = capture("getent", &["group", group]).map_err(|source| GroupError::Probe {
        program: "getent",
        source,
    })?;
    Ok(probe.success())
}

/// Whether `user` is in `group`, per `groups(1)`.
///
/// # Errors
///
/// Returns [`GroupError::Probe`] when `groups` cannot be spawned and
/// [`GroupError::Command`] when it exits non-zero (unknown user).
pub fn user_in_group(user: &str, group: &str) -> Result<bool, GroupError> {
    let probe = capture("groups", &[user]).map_err(|source| GroupError::Probe {
        program: "groups",
        source,
    })?;
    if !probe.success() {
        return Err(GroupError::Command(probe.stderr));
    }
    Ok(lists_group(&probe.stdout, group))
}

/// Whether a `groups(1)` output line names `group` exactly.
///
/// Token comparison, not a substring match, so `plugdev` does not match
/// a hypothetical `plugdev2`.
pub fn lists_group(groups_output: &str, group: &str) -> bool {
    groups_output
        .split_whitespace()
        .any(|entry| entry == group)
}

/// Make sure [`DEVICE_GROUP`] exists and `user` is a member.
///
/// Creates the group via `groupadd` when missing and adds the user via
/// `usermod -a -G` when absent, both through the runner.
///
/// # Errors
///
/// Returns [`GroupError::Cancelled`] when the password prompt is
/// dismissed and [`GroupError::Command`] when a privileged step fails.
pub fn ensure_plugdev_membership(
    runner: &mut PrivilegedRunner,
    prompt: &mut dyn PasswordPrompt,
    user: &str,
) -> Result<GroupStatus, GroupError> {
    let mut group_created = false;
    if !group_exists(DEVICE_GROUP)? {
        info!(group = DEVICE_GROUP, "group missing, creating");
        match runner.run(&format!("groupadd {DEVICE_GROUP}"), prompt) {
            RunOutcome::Success(_) => group_created = true,
            RunOutcome::Cancelled => return Err(GroupError::Cancelled),
            RunOutcome::Failed(err) => return Err(GroupError::Command(err)),
        }
    }

    if user_in_group(user, DEVICE_GROUP)? {
        return Ok(GroupStatus {
            user: user.to_owned(),
            group_created,
            membership: Membership::AlreadyMember,
        });
    }

    info!(user, group = DEVICE_GROUP, "adding user to group");
    match runner.run(&format!("usermod -a -G {DEVICE_GROUP} {user}"), prompt) {
        RunOutcome::Success(_) => Ok(GroupStatus {
            user: user.to_owned(),
            group_created,
            membership: Membership::Added,
        }),
        RunOutcome::Cancelled => Err(GroupError::Cancelled),
        RunOutcome::Failed(err) => Err(GroupError::Command(err)),
    }
}
