//! Snapmox - scheduled snapshot retention and package updates for Proxmox LXC containers
//!
//! Each run inventories the host's containers, takes at most one snapshot per
//! container per day at the highest-priority cadence due, prunes every cadence
//! down to its retain count and finally upgrades the packages of running
//! containers, rolling a container back to its newest snapshot when the
//! upgrade fails.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use snapmox::{format_report, Config, Maintenance, OutputFormat, PctControl, Phases};
//!
//! # async fn demo() -> snapmox::Result<()> {
//! let config = Config::default();
//! let phases = Phases::from_config(&config);
//! let maintenance = Maintenance::new(Arc::new(PctControl::new()), config);
//! let report = maintenance.run(chrono::Local::now().naive_local(), phases).await?;
//! println!("{}", format_report(&report, &OutputFormat::Human));
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod container;
pub mod control;
pub mod engine;
pub mod error;
pub mod output;
pub mod parser;
pub mod policy;

pub use config::Config;
pub use container::{Cadence, Container, ContainerState, OsType, Snapshot};
pub use control::{ControlInterface, DryRunControl, PctControl};
pub use engine::{Maintenance, Phases, RunReport};
pub use error::{Result, SnapmoxError};
pub use output::{format_inventory, format_report, OutputFormat};
