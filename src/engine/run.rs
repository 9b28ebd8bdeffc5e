//! A full maintenance run over every container

use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::info;

use super::inventory::build_inventory;
use super::snapshot::{create_snapshots, prune_snapshots, PruneReport, SnapshotReport};
use super::update::run_updates;
use crate::config::Config;
use crate::container::Container;
use crate::control::ControlInterface;
use crate::error::Result;
use crate::policy::UpdateOutcome;

/// Which phases a run executes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phases {
    pub snapshots: bool,
    pub updates: bool,
}

impl Phases {
    pub fn from_config(config: &Config) -> Self {
        Self {
            snapshots: config.do_snapshots,
            updates: config.do_update,
        }
    }

    pub fn snapshots_only() -> Self {
        Self {
            snapshots: true,
            updates: false,
        }
    }
}

/// Everything that happened to one container
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerReport {
    pub ctid: u32,
    pub hostname: String,
    pub snapshot: Option<SnapshotReport>,
    pub pruned: Option<PruneReport>,
    pub update: Option<UpdateOutcome>,
}

impl ContainerReport {
    pub fn has_failures(&self) -> bool {
        self.snapshot.as_ref().is_some_and(|s| s.error.is_some())
            || self.pruned.as_ref().is_some_and(|p| !p.failed.is_empty())
            || self.update.as_ref().is_some_and(UpdateOutcome::is_failure)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started: NaiveDateTime,
    pub elapsed_secs: f64,
    pub containers: Vec<ContainerReport>,
}

impl RunReport {
    pub fn failures(&self) -> usize {
        self.containers.iter().filter(|c| c.has_failures()).count()
    }
}

/// Runs the maintenance phases against one control backend
pub struct Maintenance {
    control: Arc<dyn ControlInterface>,
    config: Arc<Config>,
}

impl Maintenance {
    pub fn new(control: Arc<dyn ControlInterface>, config: Config) -> Self {
        Self {
            control,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn inventory(&self) -> Result<Vec<Container>> {
        build_inventory(self.control.as_ref()).await
    }

    /// Inventory, then snapshot creation and pruning, then updates.
    ///
    /// Fails only when the container list itself cannot be read.
    pub async fn run(&self, now: NaiveDateTime, phases: Phases) -> Result<RunReport> {
        let started = Instant::now();
        let control = self.control.as_ref();

        info!("Gathering containers...");
        let mut containers = self.inventory().await?;
        info!("Done gathering containers ({} found)", containers.len());

        let mut reports: Vec<ContainerReport> = containers
            .iter()
            .map(|c| ContainerReport {
                ctid: c.id,
                hostname: c.config.hostname.clone(),
                snapshot: None,
                pruned: None,
                update: None,
            })
            .collect();

        if phases.snapshots {
            let created = create_snapshots(control, &mut containers, now, &self.config).await;
            let pruned = prune_snapshots(control, &mut containers, &self.config).await;
            for ((report, created), pruned) in reports.iter_mut().zip(created).zip(pruned) {
                report.snapshot = Some(created);
                report.pruned = Some(pruned);
            }
        }

        if phases.updates {
            let updates =
                run_updates(Arc::clone(&self.control), &containers, Arc::clone(&self.config)).await;
            for (report, update) in reports.iter_mut().zip(updates) {
                report.update = Some(update.outcome);
            }
        }

        let elapsed = started.elapsed();
        info!("Execution finished. Time taken: {:.1}s", elapsed.as_secs_f64());
        Ok(RunReport {
            started: now,
            elapsed_secs: elapsed.as_secs_f64(),
            containers: reports,
        })
    }
}
