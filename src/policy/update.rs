//! Update eligibility and rollback gating

use std::fmt;

use serde::Serialize;

use crate::config::Config;
use crate::container::{Container, ContainerState, OsType, Snapshot};

/// Why a container was left alone in the update phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    Excluded,
    NotRunning { state: ContainerState },
    NotUpgradeSafe,
    NoCommand { os_type: OsType },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Excluded => write!(f, "excluded from updates"),
            SkipReason::NotRunning { state } => write!(f, "not running ({})", state),
            SkipReason::NotUpgradeSafe => write!(f, "upgrade not safe"),
            SkipReason::NoCommand { os_type } => {
                write!(f, "no update command for OS type {}", os_type)
            }
        }
    }
}

/// Terminal state of one container in the update phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpdateOutcome {
    Skipped { reason: SkipReason },
    Succeeded,
    /// The update failed and no rollback was attempted
    Failed { error: String },
    FailedRolledBack { error: String, snapshot: String },
    FailedRollbackFailed { error: String, rollback_error: String },
}

impl UpdateOutcome {
    pub fn skipped(reason: SkipReason) -> Self {
        UpdateOutcome::Skipped { reason }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, UpdateOutcome::Skipped { .. } | UpdateOutcome::Succeeded)
    }
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateOutcome::Skipped { reason } => write!(f, "skipped: {}", reason),
            UpdateOutcome::Succeeded => write!(f, "updated"),
            UpdateOutcome::Failed { error } => write!(f, "failed: {}", error),
            UpdateOutcome::FailedRolledBack { error, snapshot } => {
                write!(f, "failed: {}; rolled back to {}", error, snapshot)
            }
            UpdateOutcome::FailedRollbackFailed {
                error,
                rollback_error,
            } => write!(f, "failed: {}; rollback failed: {}", error, rollback_error),
        }
    }
}

/// The command to run for a container: per-id override first, then the
/// distribution default. Blank commands count as unset.
pub fn resolve_command<'a>(container: &Container, config: &'a Config) -> Option<&'a str> {
    config
        .update_overrides
        .get(&container.id)
        .or_else(|| config.update_commands.get(&container.config.os_type))
        .map(|cmd| cmd.trim())
        .filter(|cmd| !cmd.is_empty())
}

/// Run the eligibility checks in order, yielding the update command
pub fn check_eligibility<'a>(
    container: &Container,
    config: &'a Config,
) -> std::result::Result<&'a str, SkipReason> {
    if config.exclude_from_update.contains(&container.id) {
        return Err(SkipReason::Excluded);
    }
    if !container.is_running() {
        return Err(SkipReason::NotRunning {
            state: container.state,
        });
    }
    if !container.upgrade_safe {
        return Err(SkipReason::NotUpgradeSafe);
    }
    resolve_command(container, config).ok_or(SkipReason::NoCommand {
        os_type: container.config.os_type,
    })
}

/// Whether a failed update of `ctid` is rolled back
pub fn should_rollback(ctid: u32, config: &Config) -> bool {
    config.rollback_on_error && !config.exclude_from_rollback.contains(&ctid)
}

/// The snapshot a failed update is rolled back to: the newest managed one.
pub fn rollback_target(container: &Container) -> Option<&Snapshot> {
    container.newest_snapshot()
}
