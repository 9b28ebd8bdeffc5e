//! Update phase: run package upgrades, rolling back on failure

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::Config;
use crate::container::Container;
use crate::control::ControlInterface;
use crate::policy::{check_eligibility, rollback_target, should_rollback, UpdateOutcome};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    pub ctid: u32,
    #[serde(flatten)]
    pub outcome: UpdateOutcome,
}

/// Drive one container through the update state machine.
///
/// Every path ends in a terminal outcome; nothing is retried.
pub async fn update_container(
    control: &dyn ControlInterface,
    container: &Container,
    config: &Config,
) -> UpdateOutcome {
    let ctid = container.id;
    let command = match check_eligibility(container, config) {
        Ok(command) => command,
        Err(reason) => {
            info!(ct = ctid, "Skipping update of CT {}: {}", ctid, reason);
            return UpdateOutcome::skipped(reason);
        }
    };

    info!(ct = ctid, "Updating CT {}...", ctid);
    let error = match control.exec(ctid, command, config.update_timeout()).await {
        Ok(out) if out.success() => {
            debug!(ct = ctid, "{}", out.output.trim_end());
            info!(ct = ctid, "Done updating CT {}", ctid);
            return UpdateOutcome::Succeeded;
        }
        Ok(out) => {
            warn!(ct = ctid, "{}", out.output.trim_end());
            match out.exit_code {
                Some(code) => format!("update command exited with status {}", code),
                None => "update command was killed by a signal".to_string(),
            }
        }
        Err(e) => e.to_string(),
    };
    error!(ct = ctid, "Update of CT {} failed: {}", ctid, error);

    if !should_rollback(ctid, config) {
        return UpdateOutcome::Failed { error };
    }

    let Some(target) = rollback_target(container) else {
        error!(ct = ctid, "No managed snapshot to roll CT {} back to", ctid);
        return UpdateOutcome::FailedRollbackFailed {
            error,
            rollback_error: "no managed snapshot available".to_string(),
        };
    };

    match control.rollback(ctid, &target.tag, true).await {
        Ok(()) => {
            info!(ct = ctid, "Rolled CT {} back to {}", ctid, target.tag);
            UpdateOutcome::FailedRolledBack {
                error,
                snapshot: target.tag.clone(),
            }
        }
        Err(e) => {
            error!(ct = ctid, "Rollback of CT {} to {} failed: {}", ctid, target.tag, e);
            UpdateOutcome::FailedRollbackFailed {
                error,
                rollback_error: e.to_string(),
            }
        }
    }
}

/// Update every container, at most `update_parallelism` at a time.
///
/// Reports come back in container order. A task that panics is reported as
/// failed without affecting the others.
pub async fn run_updates(
    control: Arc<dyn ControlInterface>,
    containers: &[Container],
    config: Arc<Config>,
) -> Vec<UpdateReport> {
    info!(parallelism = config.update_parallelism, "Starting updates");
    let permits = Arc::new(Semaphore::new(config.update_parallelism));

    let mut handles = Vec::with_capacity(containers.len());
    for container in containers {
        let ctid = container.id;
        let container = container.clone();
        let control = Arc::clone(&control);
        let config = Arc::clone(&config);
        let permits = Arc::clone(&permits);

        let handle = tokio::spawn(
            async move {
                let _permit = permits.acquire_owned().await.ok();
                update_container(control.as_ref(), &container, &config).await
            }
            .instrument(info_span!("ct", id = ctid)),
        );
        handles.push((ctid, handle));
    }

    let mut reports = Vec::with_capacity(handles.len());
    for (ctid, handle) in handles {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(ct = ctid, "Update task for CT {} aborted: {}", ctid, e);
                UpdateOutcome::Failed {
                    error: format!("update task aborted: {}", e),
                }
            }
        };
        reports.push(UpdateReport { ctid, outcome });
    }

    info!("Done with updates");
    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerState;
    use crate::control::{ControlCall, MockContainer, MockControl, MockExec};
    use crate::engine::{build_inventory, create_snapshots};
    use crate::policy::SkipReason;
    use chrono::{NaiveDate, NaiveDateTime};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 8)
            .unwrap()
            .and_hms_opt(3, 0, 0)
            .unwrap()
    }

    async fn snapshotted(control: &MockControl, config: &Config) -> Vec<Container> {
        let mut containers = build_inventory(control).await.unwrap();
        create_snapshots(control, &mut containers, now(), config).await;
        control.clear_calls();
        containers
    }

    fn exec_calls(control: &MockControl) -> usize {
        control
            .calls()
            .iter()
            .filter(|c| matches!(c, ControlCall::Exec { .. }))
            .count()
    }

    #[tokio::test]
    async fn test_successful_update() {
        let control = MockControl::new().with_container(
            100,
            MockContainer::running("alpine").with_exec(MockExec::Succeed("OK: 25 MiB".into())),
        );
        let config = Config::default();
        let containers = snapshotted(&control, &config).await;

        let outcome = update_container(&control, &containers[0], &config).await;
        assert_eq!(outcome, UpdateOutcome::Succeeded);
        assert_eq!(
            control.calls(),
            vec![ControlCall::Exec {
                ctid: 100,
                command: "apk update && apk upgrade".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_stopped_container_never_runs_command() {
        let control = MockControl::new().with_container(103, MockContainer::stopped("debian"));
        let mut config = Config::default();
        config.update_overrides.insert(103, "apt full-upgrade -y".to_string());
        let containers = snapshotted(&control, &config).await;

        let outcome = update_container(&control, &containers[0], &config).await;
        assert_eq!(
            outcome,
            UpdateOutcome::skipped(SkipReason::NotRunning {
                state: ContainerState::Stopped
            })
        );
        assert_eq!(exec_calls(&control), 0);
    }

    #[tokio::test]
    async fn test_failed_update_rolls_back_to_todays_snapshot() {
        let control = MockControl::new().with_container(
            104,
            MockContainer::running("debian")
                .with_snapshot("snapshot-daily-20240506_030000")
                .with_snapshot("snapshot-daily-20240507_030000")
                .with_exec(MockExec::Exit(100, "E: Unable to locate package".into())),
        );
        let config = Config::default();
        let containers = snapshotted(&control, &config).await;

        let outcome = update_container(&control, &containers[0], &config).await;
        assert_eq!(
            outcome,
            UpdateOutcome::FailedRolledBack {
                error: "update command exited with status 100".to_string(),
                snapshot: "snapshot-daily-20240508_030000".to_string(),
            }
        );
        assert_eq!(
            control.calls().last(),
            Some(&ControlCall::Rollback {
                ctid: 104,
                tag: "snapshot-daily-20240508_030000".to_string(),
                autostart: true,
            })
        );
    }

    #[tokio::test]
    async fn test_timeout_is_a_failure() {
        let control = MockControl::new()
            .with_container(104, MockContainer::running("debian").with_exec(MockExec::Timeout));
        let config = Config::default();
        let containers = snapshotted(&control, &config).await;

        let outcome = update_container(&control, &containers[0], &config).await;
        assert!(matches!(outcome, UpdateOutcome::FailedRolledBack { .. }));
    }

    #[tokio::test]
    async fn test_rollback_gating() {
        let control = MockControl::new()
            .with_container(104, MockContainer::running("debian").with_exec(MockExec::Broken))
            .with_container(105, MockContainer::running("debian").with_exec(MockExec::Broken));
        let mut config = Config::default();
        config.exclude_from_rollback.insert(104);
        let containers = snapshotted(&control, &config).await;

        let excluded = update_container(&control, &containers[0], &config).await;
        assert!(matches!(excluded, UpdateOutcome::Failed { .. }));

        let included = update_container(&control, &containers[1], &config).await;
        assert!(matches!(included, UpdateOutcome::FailedRolledBack { .. }));

        config.rollback_on_error = false;
        let disabled = update_container(&control, &containers[1], &config).await;
        assert!(matches!(disabled, UpdateOutcome::Failed { .. }));

        let rollbacks: Vec<u32> = control
            .calls()
            .iter()
            .filter_map(|c| match c {
                ControlCall::Rollback { ctid, .. } => Some(*ctid),
                _ => None,
            })
            .collect();
        assert_eq!(rollbacks, vec![105]);
    }

    #[tokio::test]
    async fn test_rollback_failure_is_reported() {
        let control = MockControl::new().with_container(
            104,
            MockContainer::running("debian")
                .with_exec(MockExec::Exit(1, String::new()))
                .failing_rollback(),
        );
        let config = Config::default();
        let containers = snapshotted(&control, &config).await;

        let outcome = update_container(&control, &containers[0], &config).await;
        assert!(matches!(outcome, UpdateOutcome::FailedRollbackFailed { .. }));
        let rollbacks = control
            .calls()
            .iter()
            .filter(|c| matches!(c, ControlCall::Rollback { .. }))
            .count();
        assert_eq!(rollbacks, 1);
    }

    #[tokio::test]
    async fn test_no_snapshot_to_roll_back_to() {
        let control = MockControl::new()
            .with_container(104, MockContainer::running("debian").with_exec(MockExec::Broken));
        let config = Config {
            do_snapshots: false,
            ..Config::default()
        };
        let containers = build_inventory(&control).await.unwrap();

        let outcome = update_container(&control, &containers[0], &config).await;
        assert!(matches!(outcome, UpdateOutcome::FailedRollbackFailed { .. }));
    }

    #[tokio::test]
    async fn test_already_snapshotted_is_not_upgrade_safe() {
        let control = MockControl::new().with_container(
            105,
            MockContainer::running("debian").with_snapshot("snapshot-daily-20240508_010000"),
        );
        let config = Config::default();
        let containers = snapshotted(&control, &config).await;

        let outcome = update_container(&control, &containers[0], &config).await;
        assert_eq!(outcome, UpdateOutcome::skipped(SkipReason::NotUpgradeSafe));
        assert_eq!(exec_calls(&control), 0);
    }

    #[tokio::test]
    async fn test_run_updates_in_parallel_keeps_order() {
        let control = Arc::new(
            MockControl::new()
                .with_container(100, MockContainer::running("debian"))
                .with_container(101, MockContainer::stopped("debian"))
                .with_container(102, MockContainer::running("alpine").with_exec(MockExec::Broken))
                .with_container(103, MockContainer::running("fedora")),
        );
        let config = Arc::new(Config {
            update_parallelism: 3,
            ..Config::default()
        });
        let containers = snapshotted(&control, &config).await;

        let reports = run_updates(control.clone(), &containers, config).await;
        let ids: Vec<u32> = reports.iter().map(|r| r.ctid).collect();
        assert_eq!(ids, vec![100, 101, 102, 103]);
        assert_eq!(reports[0].outcome, UpdateOutcome::Succeeded);
        assert!(matches!(reports[1].outcome, UpdateOutcome::Skipped { .. }));
        assert!(matches!(reports[2].outcome, UpdateOutcome::FailedRolledBack { .. }));
        assert_eq!(reports[3].outcome, UpdateOutcome::Succeeded);
        assert_eq!(exec_calls(&control), 3);
    }
}
