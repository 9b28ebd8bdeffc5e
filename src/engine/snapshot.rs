//! Snapshot phase: create today's snapshot, then prune each tier

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::{Config, RetentionConfig};
use crate::container::{Cadence, Container, Snapshot};
use crate::control::ControlInterface;
use crate::error::Result;
use crate::policy::{plan_prune, plan_snapshot, SnapshotDecision};

/// What the creation step did for one container
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotReport {
    pub ctid: u32,
    pub decision: SnapshotDecision,
    pub created: Option<String>,
    pub error: Option<String>,
}

/// What pruning did for one container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    pub ctid: u32,
    pub deleted: Vec<String>,
    /// Tag and error of every deletion that failed
    pub failed: Vec<(String, String)>,
}

/// Create a snapshot of `cadence` at `now` and record it on the container
pub async fn take_snapshot(
    control: &dyn ControlInterface,
    container: &mut Container,
    cadence: Cadence,
    now: NaiveDateTime,
    description: &str,
) -> Result<Snapshot> {
    let snapshot = Snapshot::new(cadence, now);
    control
        .create_snapshot(container.id, &snapshot.tag, description)
        .await?;
    container.record_snapshot(snapshot.clone());
    Ok(snapshot)
}

/// Apply the snapshot decision to every container, in order.
///
/// A container whose snapshot cannot be created is marked not upgrade-safe
/// since it has no fresh rollback point.
pub async fn create_snapshots(
    control: &dyn ControlInterface,
    containers: &mut [Container],
    now: NaiveDateTime,
    config: &Config,
) -> Vec<SnapshotReport> {
    info!("Starting snapshot creation");
    let mut reports = Vec::with_capacity(containers.len());

    for container in containers.iter_mut() {
        let ctid = container.id;
        let decision = plan_snapshot(container, now, config);
        let mut report = SnapshotReport {
            ctid,
            decision,
            created: None,
            error: None,
        };

        match decision {
            SnapshotDecision::Excluded => {
                info!(ct = ctid, "Skipping snapshot creation for CT {} due to exclude list", ctid);
            }
            SnapshotDecision::AlreadyTaken => {
                info!(
                    ct = ctid,
                    "A managed snapshot of CT {} already exists today. Skipping creation", ctid
                );
                container.upgrade_safe = false;
            }
            SnapshotDecision::Disabled => {
                warn!(
                    ct = ctid,
                    "All snapshot tiers are disabled, skipping snapshot of CT {}. This is not recommended",
                    ctid
                );
            }
            SnapshotDecision::Create(cadence) => {
                let description = &config.snapshot_description;
                match take_snapshot(control, container, cadence, now, description).await {
                    Ok(snapshot) => {
                        info!(
                            ct = ctid,
                            "Created {} snapshot {} for CT {}", cadence, snapshot.tag, ctid
                        );
                        report.created = Some(snapshot.tag);
                    }
                    Err(e) => {
                        error!(
                            ct = ctid,
                            "Failed to create {} snapshot for CT {}: {}", cadence, ctid, e
                        );
                        container.upgrade_safe = false;
                        report.error = Some(e.to_string());
                    }
                }
            }
        }
        reports.push(report);
    }

    info!("Done creating snapshots");
    reports
}

/// Delete the snapshots of one container that exceed their tier quota.
///
/// Deletion is best effort: a failure is logged and the rest still run.
pub async fn prune_container(
    control: &dyn ControlInterface,
    container: &mut Container,
    retention: &RetentionConfig,
) -> PruneReport {
    let ctid = container.id;
    let doomed: Vec<String> = plan_prune(container.snapshots(), retention)
        .into_iter()
        .map(|s| s.tag.clone())
        .collect();

    let mut report = PruneReport {
        ctid,
        ..PruneReport::default()
    };
    for tag in doomed {
        match control.delete_snapshot(ctid, &tag).await {
            Ok(()) => {
                container.forget_snapshot(&tag);
                info!(ct = ctid, "Removed snapshot {} for CT {}", tag, ctid);
                report.deleted.push(tag);
            }
            Err(e) => {
                warn!(ct = ctid, "Failed to remove snapshot {} for CT {}: {}", tag, ctid, e);
                report.failed.push((tag, e.to_string()));
            }
        }
    }
    report
}

pub async fn prune_snapshots(
    control: &dyn ControlInterface,
    containers: &mut [Container],
    config: &Config,
) -> Vec<PruneReport> {
    info!("Starting snapshot cleanup");
    let mut reports = Vec::with_capacity(containers.len());
    for container in containers.iter_mut() {
        reports.push(prune_container(control, container, &config.retention).await);
    }
    info!("Done cleaning snapshots");
    reports
}
