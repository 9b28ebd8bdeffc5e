//! Execution engine for maintenance runs

pub mod inventory;
pub mod run;
pub mod snapshot;
pub mod update;

pub use inventory::{build_inventory, load_container};
pub use run::{ContainerReport, Maintenance, Phases, RunReport};
pub use snapshot::{
    create_snapshots, prune_container, prune_snapshots, take_snapshot, PruneReport, SnapshotReport,
};
pub use update::{run_updates, update_container, UpdateReport};
