//! Container and snapshot model
//!
//! Containers are built once per run from `pct` output and mutated in place:
//! - snapshots are recorded or forgotten as the snapshot phase acts
//! - `upgrade_safe` is cleared when no fresh rollback point exists

mod snapshot;
mod types;

pub use snapshot::{format_tag, is_managed_tag, parse_tag, Cadence, Snapshot};
pub use types::{Arch, Container, ContainerConfig, ContainerState, OsType};

#[cfg(test)]
pub(crate) use types::tests::sample_config;
